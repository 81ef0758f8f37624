//! Error types for the CurvedWorld rotation engine.
//!
//! Degenerate geometry (zero angle, coincident plane vectors, no movement) is
//! never an error: those operations return `Ok(())` without touching their
//! inputs. Everything below aborts the current operation.

use thiserror::Error;

/// Result alias used throughout the engine.
pub type RotationResult<T> = Result<T, RotationError>;

/// Which of the two plane-defining vectors broke the unit-length contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneAxis {
    /// The vector the rotation starts from.
    From,
    /// The vector the rotation heads toward.
    To,
}

impl std::fmt::Display for PlaneAxis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaneAxis::From => write!(f, "from-vector"),
            PlaneAxis::To => write!(f, "to-vector"),
        }
    }
}

/// Coarse grouping of [`RotationError`] variants.
///
/// Lets a host tell a caller bug (bad inputs, bad config) apart from
/// numerical drift inside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A caller supplied something outside the documented contract.
    InputContract,
    /// A post-operation orthogonality or norm check failed.
    Invariant,
    /// A computation produced NaN or infinity.
    NonFinite,
    /// The engine configuration was rejected.
    Configuration,
}

/// Errors raised by the plane rotator, the frame advancer and the frame store.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RotationError {
    /// A plane-defining vector is not unit length.
    #[error("Non-unit {axis}: norm {norm}")]
    NonUnitInput { axis: PlaneAxis, norm: f64 },

    /// Two vectors that must be orthogonal are not.
    #[error("Orthonormality violated ({context}): dot {dot}")]
    OrthonormalityViolation { context: &'static str, dot: f64 },

    /// A vector changed length when it should not have.
    #[error("Norm drift: expected {expected}, got {actual}")]
    NormDrift { expected: f64, actual: f64 },

    /// A non-finite component appeared.
    #[error("NaN propagation in {context}")]
    NanPropagation { context: &'static str },

    /// The previous transform has no inverse.
    #[error("Transform is not invertible")]
    SingularTransform,

    /// Rejected configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RotationError {
    /// Returns the category this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            RotationError::NonUnitInput { .. } | RotationError::SingularTransform => {
                ErrorCategory::InputContract
            }
            RotationError::OrthonormalityViolation { .. } | RotationError::NormDrift { .. } => {
                ErrorCategory::Invariant
            }
            RotationError::NanPropagation { .. } => ErrorCategory::NonFinite,
            RotationError::InvalidConfig(_) => ErrorCategory::Configuration,
        }
    }

    /// Creates an orthonormality violation.
    pub(crate) fn not_orthogonal(context: &'static str, dot: f64) -> Self {
        Self::OrthonormalityViolation { context, dot }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        let err = RotationError::NonUnitInput { axis: PlaneAxis::To, norm: 2.0 };
        assert_eq!(err.category(), ErrorCategory::InputContract);

        let err = RotationError::not_orthogonal("pos/up", 0.1);
        assert_eq!(err.category(), ErrorCategory::Invariant);

        let err = RotationError::NanPropagation { context: "perp" };
        assert_eq!(err.category(), ErrorCategory::NonFinite);

        let err = RotationError::InvalidConfig("scale".into());
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn test_display_names_axis() {
        let from = RotationError::NonUnitInput { axis: PlaneAxis::From, norm: 0.5 };
        let to = RotationError::NonUnitInput { axis: PlaneAxis::To, norm: 0.5 };
        assert!(from.to_string().contains("from-vector"));
        assert!(to.to_string().contains("to-vector"));
    }
}
