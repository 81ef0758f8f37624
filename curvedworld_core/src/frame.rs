//! Orthonormal 4D frames and viewpoint identifiers.
//!
//! A frame is a point `pos` on the unit 3-sphere plus an orthonormal tangent
//! basis (forward, up, right) at that point. All four vectors live in R^4 and
//! are mutually orthogonal.

use nalgebra::Vector4;
use serde::{Deserialize, Serialize};

use crate::error::{RotationError, RotationResult};

/// Tolerance for every orthogonality and unit-norm check.
pub const ORTHONORMAL_TOLERANCE: f64 = 1e-4;

/// Named slot of a frame vector.
///
/// Rotations that move the whole frame take a list of slots rather than
/// aliasing references, so "pos is both the plane basis and a payload" is
/// spelled out at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameSlot {
    Pos,
    Forward,
    Up,
    Right,
}

impl FrameSlot {
    /// All four slots, in storage order.
    pub const ALL: [FrameSlot; 4] = [
        FrameSlot::Pos,
        FrameSlot::Forward,
        FrameSlot::Up,
        FrameSlot::Right,
    ];

    fn index(self) -> usize {
        match self {
            FrameSlot::Pos => 0,
            FrameSlot::Forward => 1,
            FrameSlot::Up => 2,
            FrameSlot::Right => 3,
        }
    }

    /// Short lowercase name, used in error contexts.
    pub fn name(self) -> &'static str {
        match self {
            FrameSlot::Pos => "pos",
            FrameSlot::Forward => "forward",
            FrameSlot::Up => "up",
            FrameSlot::Right => "right",
        }
    }
}

/// Position and facing of a viewpoint in the curved world.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrthonormalFrame4 {
    vectors: [Vector4<f64>; 4],
}

impl Default for OrthonormalFrame4 {
    fn default() -> Self {
        Self::canonical()
    }
}

impl OrthonormalFrame4 {
    /// The frame every viewpoint starts from.
    pub fn canonical() -> Self {
        Self::new(
            Vector4::new(0.0, 1.0, 0.0, 0.0),
            Vector4::new(1.0, 0.0, 0.0, 0.0),
            Vector4::new(0.0, 0.0, 0.0, 1.0),
            Vector4::new(0.0, 0.0, 1.0, 0.0),
        )
    }

    /// Builds a frame from explicit vectors. No checks are made; call
    /// [`OrthonormalFrame4::verify`] if the inputs are untrusted.
    pub fn new(
        pos: Vector4<f64>,
        forward_dir: Vector4<f64>,
        up_dir: Vector4<f64>,
        right_dir: Vector4<f64>,
    ) -> Self {
        Self {
            vectors: [pos, forward_dir, up_dir, right_dir],
        }
    }

    pub fn pos(&self) -> Vector4<f64> {
        self.vectors[0]
    }

    pub fn forward_dir(&self) -> Vector4<f64> {
        self.vectors[1]
    }

    pub fn up_dir(&self) -> Vector4<f64> {
        self.vectors[2]
    }

    pub fn right_dir(&self) -> Vector4<f64> {
        self.vectors[3]
    }

    /// Returns the vector stored in `slot`.
    pub fn get(&self, slot: FrameSlot) -> Vector4<f64> {
        self.vectors[slot.index()]
    }

    /// Overwrites the vector stored in `slot`.
    pub fn set(&mut self, slot: FrameSlot, value: Vector4<f64>) {
        self.vectors[slot.index()] = value;
    }

    /// Mutable references to the requested slots, in storage order.
    ///
    /// Duplicate slots are yielded once.
    pub fn slots_mut(&mut self, slots: &[FrameSlot]) -> impl Iterator<Item = &mut Vector4<f64>> {
        let mut wanted = [false; 4];
        for slot in slots {
            wanted[slot.index()] = true;
        }
        self.vectors
            .iter_mut()
            .zip(wanted)
            .filter_map(|(v, keep)| keep.then_some(v))
    }

    /// Frame vectors as `f32` quadruples in the order pos, forward, up, right,
    /// ready for uniform upload.
    pub fn to_uniforms(&self) -> [[f32; 4]; 4] {
        self.vectors.map(|v| [v.x as f32, v.y as f32, v.z as f32, v.w as f32])
    }

    /// Largest |dot| over the six pairs of frame vectors.
    pub fn max_orthogonality_error(&self) -> f64 {
        let mut worst: f64 = 0.0;
        for i in 0..4 {
            for j in (i + 1)..4 {
                worst = worst.max(self.vectors[i].dot(&self.vectors[j]).abs());
            }
        }
        worst
    }

    /// Largest deviation of any frame vector's norm from 1.
    pub fn max_norm_error(&self) -> f64 {
        self.vectors
            .iter()
            .map(|v| (v.norm() - 1.0).abs())
            .fold(0.0, f64::max)
    }

    /// Checks the frame invariant: finite components, unit norms and
    /// pairwise orthogonality, all within [`ORTHONORMAL_TOLERANCE`].
    pub fn verify(&self) -> RotationResult<()> {
        for slot in FrameSlot::ALL {
            let v = self.get(slot);
            if v.iter().any(|c| !c.is_finite()) {
                return Err(RotationError::NanPropagation { context: slot.name() });
            }
        }

        // pos against each tangent, then the tangents among themselves
        const PAIRS: [(FrameSlot, FrameSlot, &str); 6] = [
            (FrameSlot::Pos, FrameSlot::Forward, "pos/forward"),
            (FrameSlot::Pos, FrameSlot::Up, "pos/up"),
            (FrameSlot::Pos, FrameSlot::Right, "pos/right"),
            (FrameSlot::Right, FrameSlot::Up, "right/up"),
            (FrameSlot::Up, FrameSlot::Forward, "up/forward"),
            (FrameSlot::Forward, FrameSlot::Right, "forward/right"),
        ];
        for (a, b, context) in PAIRS {
            let dot = self.get(a).dot(&self.get(b));
            if dot.abs() > ORTHONORMAL_TOLERANCE {
                return Err(RotationError::not_orthogonal(context, dot));
            }
        }

        for slot in FrameSlot::ALL {
            let norm = self.get(slot).norm();
            if (norm - 1.0).abs() > ORTHONORMAL_TOLERANCE {
                return Err(RotationError::NormDrift {
                    expected: 1.0,
                    actual: norm,
                });
            }
        }

        Ok(())
    }
}

/// Which eye a render callback is drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Eye {
    Left,
    Right,
    Mono,
}

/// Offset added to a window id for its left-eye viewpoint.
const LEFT_EYE_OFFSET: u32 = 0xF0;

/// Key of an independently advancing frame (a window, or one eye of it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ViewpointId(pub u32);

impl ViewpointId {
    /// Viewpoint for one eye of a window, so stereo eyes advance separately.
    pub fn for_eye(window_id: u32, eye: Eye) -> Self {
        match eye {
            Eye::Left => Self(window_id.wrapping_add(LEFT_EYE_OFFSET)),
            Eye::Right | Eye::Mono => Self(window_id),
        }
    }
}

impl std::fmt::Display for ViewpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "viewpoint-{}", self.0)
    }
}
