//! Frame advancement from tracked pose deltas
//!
//! A head-tracking device reports 3D affine poses. Two consecutive poses
//! give a delta `to * from^-1`, which splits into a translation and a
//! rotation:
//!
//! - the translation, expressed in the frame's own right/up/forward basis,
//!   picks a tangent direction at `pos`; walking that way on the 3-sphere is
//!   a rotation of the whole frame in the plane of `pos` and that direction.
//! - the rotation turns the tangent basis: the images of the canonical axes
//!   are re-expressed in the (already moved) right/up/forward basis.
//!
//! Translation is applied before rotation, so a combined delta behaves like
//! its pure translation part followed by its pure rotation part.

use nalgebra::{Matrix3, Matrix4, Matrix4x3, Rotation3, Vector3};

use crate::error::{RotationError, RotationResult};
use crate::frame::{FrameSlot, OrthonormalFrame4};
use crate::plane_rotation::{rotate_in_plane, MIN_ROTATION_ANGLE};

/// Translation and rotation extracted from the change between two poses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformDelta {
    /// Rotation part, with scale and skew removed
    pub rotation: Rotation3<f64>,

    /// Translation part (x = right, y = up, z = forward)
    pub translation: Vector3<f64>,
}

impl TransformDelta {
    /// Delta that carries pose `from` to pose `to`: `to * from^-1`.
    pub fn between(from: &Matrix4<f64>, to: &Matrix4<f64>) -> RotationResult<Self> {
        let inverse = from
            .try_inverse()
            .ok_or(RotationError::SingularTransform)?;
        Self::decompose(&(to * inverse))
    }

    /// Splits an affine transform into rotation and translation.
    ///
    /// Scale is dropped by normalizing the basis columns, skew by
    /// Gram-Schmidt. The perspective row is ignored apart from the
    /// homogeneous weight.
    pub fn decompose(change: &Matrix4<f64>) -> RotationResult<Self> {
        if change.iter().any(|c| !c.is_finite()) {
            return Err(RotationError::NanPropagation { context: "change matrix" });
        }

        let weight = change[(3, 3)];
        let weight = if weight.abs() > f64::EPSILON { weight } else { 1.0 };
        let translation = Vector3::new(change[(0, 3)], change[(1, 3)], change[(2, 3)]) / weight;

        let linear: Matrix3<f64> = change.fixed_view::<3, 3>(0, 0).into_owned();
        let x = linear.column(0).normalize();
        let y_column = linear.column(1).into_owned();
        let y = (y_column - x * x.dot(&y_column)).normalize();
        let z = x.cross(&y);

        let basis = Matrix3::from_columns(&[x, y, z]);
        if basis.iter().any(|c| !c.is_finite()) {
            return Err(RotationError::NanPropagation { context: "rotation decomposition" });
        }

        Ok(Self {
            rotation: Rotation3::from_matrix_unchecked(basis),
            translation,
        })
    }

    /// Applies this delta to `frame`.
    ///
    /// The frame is only written if every step and the final invariant check
    /// succeed.
    pub fn apply(&self, movement_scale: f64, frame: &mut OrthonormalFrame4) -> RotationResult<()> {
        let mut next = *frame;
        self.translate(movement_scale, &mut next)?;
        self.rotate_basis(&mut next);
        next.verify()?;

        *frame = next;
        Ok(())
    }

    /// Geodesic step of `movement_scale * |translation|` radians toward the
    /// translation direction.
    fn translate(&self, movement_scale: f64, frame: &mut OrthonormalFrame4) -> RotationResult<()> {
        let move_amount = movement_scale * self.translation.norm();
        if !move_amount.is_finite() {
            return Err(RotationError::NanPropagation { context: "move amount" });
        }
        if move_amount.abs() < MIN_ROTATION_ANGLE {
            // nothing to do, and the direction below would be NaN
            return Ok(());
        }

        let t = self.translation;
        let move_direction =
            (frame.right_dir() * t.x + frame.up_dir() * t.y + frame.forward_dir() * t.z).normalize();
        if move_direction.iter().any(|c| !c.is_finite()) {
            return Err(RotationError::NanPropagation { context: "move direction" });
        }

        rotate_in_plane(
            frame.pos(),
            move_direction,
            move_amount,
            frame.slots_mut(&FrameSlot::ALL),
        )
    }

    /// Re-expresses the rotated canonical axes in the frame's tangent basis.
    fn rotate_basis(&self, frame: &mut OrthonormalFrame4) {
        let basis = Matrix4x3::from_columns(&[frame.right_dir(), frame.up_dir(), frame.forward_dir()]);
        // column i of the rotation is the image of canonical axis i
        let rebased = basis * self.rotation.matrix();

        frame.set(FrameSlot::Right, rebased.column(0).into_owned());
        frame.set(FrameSlot::Up, rebased.column(1).into_owned());
        frame.set(FrameSlot::Forward, rebased.column(2).into_owned());
    }
}

/// Advances `frame` by the motion between poses `from_mat` and `to_mat`.
///
/// # Arguments
/// * `from_mat` - Previous pose (must be invertible)
/// * `to_mat` - Current pose
/// * `movement_scale` - Arc angle per unit of tracked translation
/// * `frame` - Frame to update; untouched if an error is returned
pub fn advance(
    from_mat: &Matrix4<f64>,
    to_mat: &Matrix4<f64>,
    movement_scale: f64,
    frame: &mut OrthonormalFrame4,
) -> RotationResult<()> {
    TransformDelta::between(from_mat, to_mat)?.apply(movement_scale, frame)
}
