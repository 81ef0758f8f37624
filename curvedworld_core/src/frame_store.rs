//! Per-viewpoint frame storage shared across render threads.
//!
//! Every window or eye renders from its own [`OrthonormalFrame4`]. The map
//! from [`ViewpointId`] to state sits behind a reader/writer lock: lookups
//! from different render threads proceed in parallel, and only the first
//! observation of a viewpoint takes the write lock. Each state has its own
//! mutex, which in practice is only ever locked by the thread rendering that
//! viewpoint.

use nalgebra::Matrix4;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, error};

use crate::config::{EngineConfig, InitialPose};
use crate::error::{RotationError, RotationResult};
use crate::frame::{OrthonormalFrame4, ViewpointId};
use crate::frame_advance::advance;

/// Stored state of one viewpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewpointState {
    /// Pose seen on the previous observation
    pub previous_transform: Matrix4<f64>,

    /// Current frame
    pub frame: OrthonormalFrame4,
}

type SharedState = Arc<Mutex<ViewpointState>>;

/// Thread-safe map of viewpoint frames.
///
/// # Example
///
/// ```
/// use curvedworld_core::{EngineConfig, FrameStore, ViewpointId};
/// use nalgebra::{Matrix4, Vector3};
///
/// let store = FrameStore::new(EngineConfig::default()).unwrap();
/// let eye = ViewpointId(0);
///
/// store.observe(eye, &Matrix4::identity()).unwrap();
/// let frame = store
///     .observe(eye, &Matrix4::new_translation(&Vector3::new(0.0, 0.0, 0.1)))
///     .unwrap();
/// assert!(frame.verify().is_ok());
/// ```
#[derive(Debug, Default)]
pub struct FrameStore {
    viewpoints: RwLock<HashMap<ViewpointId, SharedState>>,
    config: EngineConfig,
}

impl FrameStore {
    /// Creates an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`RotationError::InvalidConfig`](crate::RotationError::InvalidConfig)
    /// if the configuration does not validate.
    pub fn new(config: EngineConfig) -> RotationResult<Self> {
        config.validate()?;
        Ok(Self {
            viewpoints: RwLock::new(HashMap::new()),
            config,
        })
    }

    /// Creates an `Arc`-wrapped store for sharing between render threads.
    pub fn shared(config: EngineConfig) -> RotationResult<Arc<Self>> {
        Self::new(config).map(Arc::new)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Feeds the current pose of `viewpoint` and returns its updated frame.
    ///
    /// The first observation creates the viewpoint with the canonical frame.
    /// Later observations advance the frame by the motion since the previous
    /// pose. On error the stored frame and previous pose are left as they
    /// were, so the viewpoint keeps its last good frame.
    ///
    /// # Errors
    ///
    /// A non-finite or non-invertible `transform` is rejected before the
    /// store is touched: it never creates a viewpoint or becomes a baseline.
    pub fn observe(
        &self,
        viewpoint: ViewpointId,
        transform: &Matrix4<f64>,
    ) -> RotationResult<OrthonormalFrame4> {
        if let Err(e) = check_pose(transform) {
            error!("Rejected pose for {}: {}", viewpoint, e);
            return Err(e);
        }

        let (entry, created) = self.entry(viewpoint, transform);
        let mut state = entry.lock().unwrap_or_else(PoisonError::into_inner);

        if created && self.config.initial_pose == InitialPose::AdoptFirst {
            return Ok(state.frame);
        }

        let previous = state.previous_transform;
        if let Err(e) = advance(&previous, transform, self.config.movement_scale, &mut state.frame) {
            error!("Frame advance failed for {}: {}", viewpoint, e);
            return Err(e);
        }
        state.previous_transform = *transform;
        Ok(state.frame)
    }

    /// Current frame of `viewpoint`, if it has been observed.
    pub fn frame(&self, viewpoint: ViewpointId) -> Option<OrthonormalFrame4> {
        self.state(viewpoint).map(|state| state.frame)
    }

    /// Full stored state of `viewpoint`, if it has been observed.
    pub fn state(&self, viewpoint: ViewpointId) -> Option<ViewpointState> {
        let entry = self.lookup(viewpoint)?;
        let state = entry.lock().unwrap_or_else(PoisonError::into_inner);
        Some(*state)
    }

    /// Forgets `viewpoint` (its window or eye was torn down). Returns the
    /// last state if there was one.
    pub fn remove(&self, viewpoint: ViewpointId) -> Option<ViewpointState> {
        let removed = self
            .viewpoints
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&viewpoint)?;
        debug!("Removed {}", viewpoint);
        let state = removed.lock().unwrap_or_else(PoisonError::into_inner);
        Some(*state)
    }

    /// Observed viewpoints in ascending order.
    pub fn viewpoints(&self) -> Vec<ViewpointId> {
        let mut ids: Vec<ViewpointId> = self
            .viewpoints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.viewpoints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ========== Private Helper Methods ==========

    fn lookup(&self, viewpoint: ViewpointId) -> Option<SharedState> {
        self.viewpoints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&viewpoint)
            .cloned()
    }

    /// Returns the state for `viewpoint`, creating it if needed. The flag is
    /// true when this call created it.
    fn entry(&self, viewpoint: ViewpointId, transform: &Matrix4<f64>) -> (SharedState, bool) {
        if let Some(existing) = self.lookup(viewpoint) {
            return (existing, false);
        }

        let mut viewpoints = self
            .viewpoints
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        // another thread may have inserted between the two locks
        if let Some(existing) = viewpoints.get(&viewpoint) {
            return (Arc::clone(existing), false);
        }

        let previous_transform = match self.config.initial_pose {
            InitialPose::AdoptFirst => *transform,
            InitialPose::FromIdentity => Matrix4::identity(),
        };
        let state = Arc::new(Mutex::new(ViewpointState {
            previous_transform,
            frame: OrthonormalFrame4::canonical(),
        }));
        viewpoints.insert(viewpoint, Arc::clone(&state));
        debug!("Created {} with canonical frame", viewpoint);

        (state, true)
    }
}

/// A pose can serve as a baseline only if it is finite and invertible.
fn check_pose(transform: &Matrix4<f64>) -> RotationResult<()> {
    if transform.iter().any(|c| !c.is_finite()) {
        return Err(RotationError::NanPropagation { context: "pose" });
    }
    if transform.try_inverse().is_none() {
        return Err(RotationError::SingularTransform);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Eye;
    use nalgebra::{Isometry3, Vector3, Vector4};

    fn pose(t: [f64; 3], axis_angle: [f64; 3]) -> Matrix4<f64> {
        Isometry3::new(Vector3::from(t), Vector3::from(axis_angle)).to_homogeneous()
    }

    /// Deterministic pose stream distinct per `salt`.
    fn pose_stream(salt: f64, len: usize) -> Vec<Matrix4<f64>> {
        let mut current = Matrix4::identity();
        (0..len)
            .map(|k| {
                let k = k as f64 + salt;
                let step = pose(
                    [0.02 * (k * 0.9).sin(), 0.01 * (k * 0.4).cos(), 0.03 * (k * 1.7).sin()],
                    [0.01 * (k * 0.3).cos(), 0.04 * (k * salt).sin(), 0.02 * (k * 0.8).cos()],
                );
                current = step * current;
                current
            })
            .collect()
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_store_is_shareable() {
        assert_send_sync::<FrameStore>();
    }

    #[test]
    fn test_first_observation_adopts_pose() {
        let store = FrameStore::new(EngineConfig::default()).unwrap();
        let start = pose([0.5, 1.7, -0.3], [0.0, 0.8, 0.0]);

        let frame = store.observe(ViewpointId(1), &start).unwrap();
        assert_eq!(frame, OrthonormalFrame4::canonical());
        assert_eq!(store.len(), 1);
        assert_eq!(store.state(ViewpointId(1)).unwrap().previous_transform, start);
    }

    #[test]
    fn test_first_observation_from_identity() {
        let config = EngineConfig::default().with_initial_pose(InitialPose::FromIdentity);
        let store = FrameStore::new(config).unwrap();
        let start = Matrix4::new_translation(&Vector3::new(0.0, 0.0, 0.2));

        let frame = store.observe(ViewpointId(1), &start).unwrap();
        assert!((frame.pos() - Vector4::new(0.2f64.sin(), 0.2f64.cos(), 0.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_subsequent_observations_advance() {
        let store = FrameStore::new(EngineConfig::default().with_movement_scale(2.0)).unwrap();
        let id = ViewpointId(7);

        store.observe(id, &Matrix4::identity()).unwrap();
        let frame = store
            .observe(id, &Matrix4::new_translation(&Vector3::new(0.0, 0.0, 0.1)))
            .unwrap();

        assert!((frame.pos() - Vector4::new(0.2f64.sin(), 0.2f64.cos(), 0.0, 0.0)).norm() < 1e-12);
        assert_eq!(store.frame(id), Some(frame));
    }

    #[test]
    fn test_eyes_advance_independently() {
        let store = FrameStore::new(EngineConfig::default()).unwrap();
        let left = ViewpointId::for_eye(0, Eye::Left);
        let right = ViewpointId::for_eye(0, Eye::Right);

        store.observe(left, &Matrix4::identity()).unwrap();
        store.observe(right, &Matrix4::identity()).unwrap();
        store
            .observe(left, &Matrix4::new_translation(&Vector3::new(0.3, 0.0, 0.0)))
            .unwrap();

        assert_ne!(store.frame(left), store.frame(right));
        assert_eq!(store.frame(right), Some(OrthonormalFrame4::canonical()));
        assert_eq!(store.viewpoints(), vec![right, left]);
    }

    #[test]
    fn test_remove_forgets_viewpoint() {
        let store = FrameStore::new(EngineConfig::default()).unwrap();
        store.observe(ViewpointId(3), &Matrix4::identity()).unwrap();

        assert!(store.remove(ViewpointId(3)).is_some());
        assert!(store.remove(ViewpointId(3)).is_none());
        assert!(store.frame(ViewpointId(3)).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_failed_advance_keeps_last_good_state() {
        let store = FrameStore::new(EngineConfig::default()).unwrap();
        let id = ViewpointId(2);
        let good = Matrix4::new_translation(&Vector3::new(0.1, 0.0, 0.0));

        store.observe(id, &Matrix4::identity()).unwrap();
        let frame = store.observe(id, &good).unwrap();

        let mut bad = good;
        bad[(0, 3)] = f64::NAN;
        let err = store.observe(id, &bad).unwrap_err();
        assert!(matches!(err, RotationError::NanPropagation { .. }));

        let state = store.state(id).unwrap();
        assert_eq!(state.frame, frame);
        assert_eq!(state.previous_transform, good);
    }

    #[test]
    fn test_bad_first_pose_creates_nothing() {
        let store = FrameStore::new(EngineConfig::default()).unwrap();
        let id = ViewpointId(4);

        let err = store.observe(id, &Matrix4::zeros()).unwrap_err();
        assert_eq!(err, RotationError::SingularTransform);
        let mut nan = Matrix4::identity();
        nan[(1, 3)] = f64::NAN;
        let err = store.observe(id, &nan).unwrap_err();
        assert!(matches!(err, RotationError::NanPropagation { .. }));
        assert!(store.is_empty());

        // the viewpoint starts cleanly once a usable pose arrives
        assert_eq!(store.observe(id, &Matrix4::identity()), Ok(OrthonormalFrame4::canonical()));
        let frame = store
            .observe(id, &Matrix4::new_translation(&Vector3::new(0.0, 0.0, 0.1)))
            .unwrap();
        assert!((frame.pos() - Vector4::new(0.1f64.sin(), 0.1f64.cos(), 0.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_singular_pose_never_becomes_baseline() {
        let store = FrameStore::new(EngineConfig::default()).unwrap();
        let id = ViewpointId(5);
        let good = Matrix4::new_translation(&Vector3::new(0.0, 0.0, 0.1));

        store.observe(id, &Matrix4::identity()).unwrap();
        let frame = store.observe(id, &good).unwrap();

        // rigid part intact but no homogeneous row
        let mut flat = good;
        flat[(3, 3)] = 0.0;
        assert_eq!(store.observe(id, &flat), Err(RotationError::SingularTransform));
        assert_eq!(store.state(id).unwrap().previous_transform, good);
        assert_eq!(store.frame(id), Some(frame));

        assert!(store.observe(id, &good).is_ok());
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = EngineConfig::default().with_movement_scale(f64::NAN);
        assert!(matches!(
            FrameStore::new(config),
            Err(RotationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_concurrent_viewpoints_match_isolated_runs() {
        let streams: Vec<(ViewpointId, Vec<Matrix4<f64>>)> = (0..4)
            .map(|i| (ViewpointId(i), pose_stream(0.5 + i as f64, 2_000)))
            .collect();

        let shared = FrameStore::shared(EngineConfig::default()).unwrap();
        std::thread::scope(|scope| {
            for (id, stream) in &streams {
                let store = Arc::clone(&shared);
                scope.spawn(move || {
                    for transform in stream {
                        store.observe(*id, transform).unwrap();
                    }
                });
            }
        });

        for (id, stream) in &streams {
            let isolated = FrameStore::new(EngineConfig::default()).unwrap();
            let mut expected = OrthonormalFrame4::canonical();
            for transform in stream {
                expected = isolated.observe(*id, transform).unwrap();
            }
            assert_eq!(shared.frame(*id), Some(expected));
        }
        assert_eq!(shared.len(), streams.len());
    }
}
