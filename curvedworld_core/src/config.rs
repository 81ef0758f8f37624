//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::{RotationError, RotationResult};

/// How the first transform seen for a viewpoint is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialPose {
    /// The first transform becomes the baseline; the frame stays canonical.
    #[default]
    AdoptFirst,
    /// The first transform is applied as a delta from the identity pose.
    FromIdentity,
}

/// Configuration for a [`FrameStore`](crate::FrameStore).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Arc angle (radians on the unit 3-sphere) per unit of tracked
    /// translation (default: 1.0)
    pub movement_scale: f64,

    /// Treatment of a viewpoint's first transform (default: adopt it)
    pub initial_pose: InitialPose,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            movement_scale: 1.0,
            initial_pose: InitialPose::AdoptFirst,
        }
    }
}

impl EngineConfig {
    /// Sets the movement scale.
    pub fn with_movement_scale(mut self, movement_scale: f64) -> Self {
        self.movement_scale = movement_scale;
        self
    }

    /// Sets the initial pose policy.
    pub fn with_initial_pose(mut self, initial_pose: InitialPose) -> Self {
        self.initial_pose = initial_pose;
        self
    }

    /// Parses and validates a JSON configuration. Missing fields take their
    /// defaults.
    pub fn from_json_str(json: &str) -> RotationResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| RotationError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the engine cannot work with.
    pub fn validate(&self) -> RotationResult<()> {
        if !self.movement_scale.is_finite() {
            return Err(RotationError::InvalidConfig(format!(
                "movement_scale must be finite, got {}",
                self.movement_scale
            )));
        }
        Ok(())
    }
}
