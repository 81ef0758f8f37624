//! Synthetic head-tracking poses.
//!
//! A [`PoseStream`] plays the part of the tracker: each tick it composes a
//! small rigid motion onto the previous pose and reports the result as a 4x4
//! affine matrix, the same thing a VR runtime hands a render callback.

use nalgebra::{Isometry3, Matrix4, Translation3, UnitQuaternion, Vector3};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// How much a simulated head moves per tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionProfile {
    /// Deliberate translation per tick, in tracker units
    pub step_translation: f64,

    /// Largest deliberate rotation per tick about each axis, in radians
    pub step_rotation: f64,

    /// Standard deviation of tracking noise added to both parts
    pub noise_std: f64,
}

impl MotionProfile {
    /// Translation only.
    pub fn walk() -> Self {
        Self {
            step_translation: 0.02,
            step_rotation: 0.0,
            noise_std: 0.0,
        }
    }

    /// Rotation only.
    pub fn turn() -> Self {
        Self {
            step_translation: 0.0,
            step_rotation: 0.03,
            noise_std: 0.0,
        }
    }

    /// Translation and rotation on every tick.
    pub fn wander() -> Self {
        Self {
            step_translation: 0.015,
            step_rotation: 0.02,
            noise_std: 0.001,
        }
    }

    /// A head held still: sensor noise around a fixed pose.
    pub fn jitter() -> Self {
        Self {
            step_translation: 0.0,
            step_rotation: 0.0,
            noise_std: 1e-4,
        }
    }

    fn validate(&self) -> Result<(), SimError> {
        let fields = [
            ("step_translation", self.step_translation),
            ("step_rotation", self.step_rotation),
            ("noise_std", self.noise_std),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(SimError::InvalidProfile(format!(
                    "{} must be finite and non-negative, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Seeded generator of consecutive tracker poses.
pub struct PoseStream {
    rng: ChaCha8Rng,
    profile: MotionProfile,
    noise: Normal<f64>,
    current: Isometry3<f64>,
    ticks: u64,
}

impl PoseStream {
    /// Creates a stream starting at a standing head height.
    pub fn new(seed: u64, profile: MotionProfile) -> Result<Self, SimError> {
        profile.validate()?;
        let noise = Normal::new(0.0, profile.noise_std)
            .map_err(|e| SimError::InvalidProfile(e.to_string()))?;

        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            profile,
            noise,
            current: Isometry3::translation(0.0, 1.7, 0.0),
            ticks: 0,
        })
    }

    /// Current pose as an affine matrix.
    pub fn current(&self) -> Matrix4<f64> {
        self.current.to_homogeneous()
    }

    /// Number of poses produced so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Advances the simulated head one tick and returns the new pose.
    pub fn next_pose(&mut self) -> Matrix4<f64> {
        let step = self.next_step();
        self.current = step * self.current;
        // keep the quaternion unit length over long runs
        self.current.rotation.renormalize();
        self.ticks += 1;
        self.current()
    }

    /// Rigid motion for one tick: mostly forward, wandering sideways.
    fn next_step(&mut self) -> Isometry3<f64> {
        let p = self.profile;

        let heading = Vector3::new(
            self.rng.gen_range(-0.5..=0.5),
            self.rng.gen_range(-0.1..=0.1),
            1.0,
        )
        .normalize();
        let translation = heading * p.step_translation + self.noise_vector();

        let axis_angle = Vector3::new(
            self.rng.gen_range(-1.0..=1.0),
            self.rng.gen_range(-1.0..=1.0),
            self.rng.gen_range(-1.0..=1.0),
        ) * p.step_rotation
            + self.noise_vector();

        Isometry3::from_parts(
            Translation3::from(translation),
            UnitQuaternion::from_scaled_axis(axis_angle),
        )
    }

    fn noise_vector(&mut self) -> Vector3<f64> {
        Vector3::new(
            self.noise.sample(&mut self.rng),
            self.noise.sample(&mut self.rng),
            self.noise.sample(&mut self.rng),
        )
    }
}

impl Iterator for PoseStream {
    type Item = Matrix4<f64>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_pose())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_same_seed_same_poses() {
        let a: Vec<_> = PoseStream::new(7, MotionProfile::wander()).unwrap().take(50).collect();
        let b: Vec<_> = PoseStream::new(7, MotionProfile::wander()).unwrap().take(50).collect();
        let c: Vec<_> = PoseStream::new(8, MotionProfile::wander()).unwrap().take(50).collect();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_walk_does_not_rotate() {
        let mut stream = PoseStream::new(1, MotionProfile::walk()).unwrap();
        let start = stream.current();
        let pose = stream.nth(9).unwrap();

        let rotation = pose.fixed_view::<3, 3>(0, 0).into_owned();
        assert_relative_eq!(rotation, start.fixed_view::<3, 3>(0, 0).into_owned(), epsilon = 1e-12);
        assert!((pose.column(3).into_owned() - start.column(3).into_owned()).norm() > 0.1);
        assert_eq!(stream.ticks(), 10);
    }

    #[test]
    fn test_turn_does_not_translate() {
        let mut stream = PoseStream::new(1, MotionProfile::turn()).unwrap();
        let start = stream.current();
        let pose = stream.nth(9).unwrap();

        // rotating about the origin swings the head-height offset around
        let start_distance = start.fixed_view::<3, 1>(0, 3).norm();
        let distance = pose.fixed_view::<3, 1>(0, 3).norm();
        assert_relative_eq!(distance, start_distance, epsilon = 1e-9);
    }

    #[test]
    fn test_invalid_profile_is_rejected() {
        let profile = MotionProfile {
            noise_std: -1.0,
            ..MotionProfile::jitter()
        };
        assert!(matches!(
            PoseStream::new(0, profile),
            Err(SimError::InvalidProfile(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_poses_stay_rigid(seed in any::<u64>()) {
            let mut stream = PoseStream::new(seed, MotionProfile::wander()).unwrap();
            let pose = stream.nth(199).unwrap();

            let rotation = pose.fixed_view::<3, 3>(0, 0).into_owned();
            prop_assert!((rotation.determinant() - 1.0).abs() < 1e-9);
            prop_assert!((rotation.transpose() * rotation - nalgebra::Matrix3::identity()).norm() < 1e-9);
            prop_assert_eq!(pose.row(3).into_owned(), nalgebra::RowVector4::new(0.0, 0.0, 0.0, 1.0));
        }
    }
}
