//! Single-plane rotations in R^4
//!
//! In four dimensions a simple rotation acts inside one 2-plane and leaves
//! its orthogonal complement fixed. Here the plane is given by two unit
//! vectors: `from` is the first basis vector and the component of `to`
//! orthogonal to `from` is the second. Rotating by +angle turns `from`
//! toward `to`.
//!
//! Moving along a great circle of the 3-sphere is one of these rotations,
//! which is how the frame advancer turns head translation into motion.

use nalgebra::{Vector2, Vector4};
use std::f64::consts::PI;

use crate::error::{PlaneAxis, RotationError, RotationResult};

/// Angles below this (0.00001 degrees) are treated as "no rotation".
pub const MIN_ROTATION_ANGLE: f64 = 0.00001 * PI / 180.0;

/// Allowed deviation from unit length for plane-defining vectors.
pub const UNIT_TOLERANCE: f64 = 1e-4;

/// Below this length the rejection of `to` from `from` spans no plane.
pub const DEGENERATE_PLANE_EPSILON: f64 = 1e-5;

// ============================================================================
// ROTATION PLANE
// ============================================================================

/// Orthonormal basis `(from, perp)` of a rotation plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationPlane {
    from: Vector4<f64>,
    perp: Vector4<f64>,
}

impl RotationPlane {
    /// Builds the plane through two unit vectors.
    ///
    /// Returns `Ok(None)` when `to` is (anti)parallel to `from`, since no
    /// unique plane exists.
    pub fn through(from: Vector4<f64>, to: Vector4<f64>) -> RotationResult<Option<Self>> {
        let from = checked_unit(from, PlaneAxis::From)?;
        let to = checked_unit(to, PlaneAxis::To)?;
        Self::from_unit(from, to)
    }

    fn from_unit(from: Vector4<f64>, to: Vector4<f64>) -> RotationResult<Option<Self>> {
        let rejection = to - from * to.dot(&from);
        if rejection.norm() < DEGENERATE_PLANE_EPSILON {
            return Ok(None);
        }

        let perp = rejection.normalize();
        check_plane_basis(from, perp)?;

        Ok(Some(Self { from, perp }))
    }

    /// First basis vector (the normalized `from`).
    pub fn from_vector(&self) -> Vector4<f64> {
        self.from
    }

    /// Second basis vector, orthogonal to `from`.
    pub fn perpendicular(&self) -> Vector4<f64> {
        self.perp
    }

    /// Rotates one vector counter-clockwise (from -> perp) by `angle`.
    ///
    /// The result depends only on `v` and the plane.
    pub fn rotate(&self, v: Vector4<f64>, angle: f64) -> RotationResult<Vector4<f64>> {
        check_angle(angle)?;
        let from_component = v.dot(&self.from);
        let perp_component = v.dot(&self.perp);
        let ortho = v - (self.from * from_component + self.perp * perp_component);

        let dot = ortho.dot(&self.from);
        if dot.abs() > UNIT_TOLERANCE {
            return Err(RotationError::not_orthogonal("residual/from", dot));
        }
        let dot = ortho.dot(&self.perp);
        if dot.abs() > UNIT_TOLERANCE {
            return Err(RotationError::not_orthogonal("residual/perpendicular", dot));
        }

        let rotated = rotate_2d(Vector2::new(from_component, perp_component), angle);
        let result = ortho + self.from * rotated.x + self.perp * rotated.y;

        let expected = v.norm();
        let actual = result.norm();
        if !((actual - expected).abs() <= UNIT_TOLERANCE) {
            return Err(RotationError::NormDrift { expected, actual });
        }

        Ok(result)
    }
}

// ============================================================================
// ROTATIONS
// ============================================================================

/// Rotates every vector in `vectors` by `angle` inside the plane spanned by
/// `from` and `to`.
///
/// `from` and `to` are copied in, so the batch may contain the storage
/// `from` was read from; that vector then rotates along with the rest.
/// The batch is all-or-nothing: if any vector fails a check, none is written.
///
/// # Arguments
/// * `from` - Unit vector, first basis vector of the plane
/// * `to` - Unit vector, positive angles turn `from` toward it
/// * `angle` - Signed angle in radians
/// * `vectors` - Vectors to rotate in place (need not be unit length)
pub fn rotate_in_plane<'a, I>(
    from: Vector4<f64>,
    to: Vector4<f64>,
    angle: f64,
    vectors: I,
) -> RotationResult<()>
where
    I: IntoIterator<Item = &'a mut Vector4<f64>>,
{
    let from = checked_unit(from, PlaneAxis::From)?;
    let to = checked_unit(to, PlaneAxis::To)?;
    check_angle(angle)?;

    if angle.abs() < MIN_ROTATION_ANGLE {
        return Ok(());
    }

    let Some(plane) = RotationPlane::from_unit(from, to)? else {
        return Ok(());
    };

    let targets: Vec<&mut Vector4<f64>> = vectors.into_iter().collect();
    let rotated = targets
        .iter()
        .map(|v| plane.rotate(**v, angle))
        .collect::<RotationResult<Vec<_>>>()?;

    for (target, value) in targets.into_iter().zip(rotated) {
        *target = value;
    }
    Ok(())
}

/// Rotates `vectors` along the shortest arc that carries `from` onto `to`.
///
/// The angle is `acos(from . to)`, clamped so near-parallel unit vectors
/// whose dot product overshoots 1 do not produce NaN.
pub fn rotate_shortest_arc<'a, I>(
    from: Vector4<f64>,
    to: Vector4<f64>,
    vectors: I,
) -> RotationResult<()>
where
    I: IntoIterator<Item = &'a mut Vector4<f64>>,
{
    let from = checked_unit(from, PlaneAxis::From)?;
    let to = checked_unit(to, PlaneAxis::To)?;

    let angle = arc_angle(from, to);
    rotate_in_plane(from, to, angle, vectors)
}

/// Non-negative angle between two unit vectors.
pub fn arc_angle(from: Vector4<f64>, to: Vector4<f64>) -> f64 {
    from.dot(&to).clamp(-1.0, 1.0).acos()
}

/// Moves `position` along the great circle through `direction` by `angle`,
/// turning `direction` with it so it stays tangent.
///
/// `direction` must be a unit vector orthogonal to `position`.
pub fn move_in_direction(position: &mut Vector4<f64>, direction: &mut Vector4<f64>, angle: f64) {
    let (sin, cos) = angle.sin_cos();
    let new_position = *position * cos + *direction * sin;
    let new_direction = *direction * cos - *position * sin;

    *position = new_position;
    *direction = new_direction;
}

// ========== Private Helpers ==========

fn checked_unit(v: Vector4<f64>, axis: PlaneAxis) -> RotationResult<Vector4<f64>> {
    let norm = v.norm();
    // written so that a NaN norm fails too
    if !((norm - 1.0).abs() <= UNIT_TOLERANCE) {
        return Err(RotationError::NonUnitInput { axis, norm });
    }
    Ok(v / norm)
}

fn check_angle(angle: f64) -> RotationResult<()> {
    if !angle.is_finite() {
        return Err(RotationError::NanPropagation { context: "rotation angle" });
    }
    Ok(())
}

/// `perp` must be finite, orthogonal to `from` and unit length. A bad length
/// is reported as perp/perp, whose dot product should be exactly 1.
fn check_plane_basis(from: Vector4<f64>, perp: Vector4<f64>) -> RotationResult<()> {
    if perp.iter().any(|c| !c.is_finite()) {
        return Err(RotationError::NanPropagation { context: "plane perpendicular" });
    }
    let dot = perp.dot(&from);
    if dot.abs() > UNIT_TOLERANCE {
        return Err(RotationError::not_orthogonal("perp/from", dot));
    }
    let self_dot = perp.dot(&perp);
    if (self_dot - 1.0).abs() > UNIT_TOLERANCE {
        return Err(RotationError::not_orthogonal("perp/perp", self_dot));
    }
    Ok(())
}

/// Counter-clockwise rotation of a 2D coordinate pair.
fn rotate_2d(v: Vector2<f64>, angle: f64) -> Vector2<f64> {
    let (sin, cos) = angle.sin_cos();
    Vector2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}
