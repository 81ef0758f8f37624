//! JSON exporter for frame trajectories.
//!
//! Exports sampled viewpoint frames so a run can be plotted or diffed
//! against another seed offline.

use curvedworld_core::{OrthonormalFrame4, ViewpointId};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::SimError;

/// All viewpoints at one sampled tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimFrame {
    /// Tick the sample was taken after
    pub tick: u64,

    /// One entry per viewpoint, in ascending id order
    pub viewpoints: Vec<ViewpointFrame>,
}

/// Frame of one viewpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewpointFrame {
    pub viewpoint: u32,
    pub pos: [f64; 4],
    pub forward: [f64; 4],
    pub up: [f64; 4],
    pub right: [f64; 4],
    pub orthogonality_error: f64,
}

impl ViewpointFrame {
    pub fn new(viewpoint: ViewpointId, frame: &OrthonormalFrame4) -> Self {
        let arr = |v: nalgebra::Vector4<f64>| [v.x, v.y, v.z, v.w];
        Self {
            viewpoint: viewpoint.0,
            pos: arr(frame.pos()),
            forward: arr(frame.forward_dir()),
            up: arr(frame.up_dir()),
            right: arr(frame.right_dir()),
            orthogonality_error: frame.max_orthogonality_error(),
        }
    }
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Movement scale the engine ran with
    pub movement_scale: f64,

    /// Sampled frames
    pub frames: Vec<SimFrame>,

    /// Final result
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64, movement_scale: f64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            movement_scale,
            frames: Vec::new(),
            passed: false,
            failure_reason: None,
        }
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: SimFrame) {
        self.frames.push(frame);
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, failure_reason: Option<String>) {
        self.passed = passed;
        self.failure_reason = failure_reason;
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), SimError> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewpoint_frame_from_canonical() {
        let frame = ViewpointFrame::new(ViewpointId(3), &OrthonormalFrame4::canonical());

        assert_eq!(frame.viewpoint, 3);
        assert_eq!(frame.pos, [0.0, 1.0, 0.0, 0.0]);
        assert_eq!(frame.orthogonality_error, 0.0);
    }

    #[test]
    fn test_export_serializes_without_empty_reason() {
        let mut export = SimExport::new("walk", 42, 1.0);
        export.add_frame(SimFrame {
            tick: 0,
            viewpoints: vec![ViewpointFrame::new(
                ViewpointId(0),
                &OrthonormalFrame4::canonical(),
            )],
        });
        export.finalize(true, None);

        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(json["scenario"], "walk");
        assert_eq!(json["frames"].as_array().unwrap().len(), 1);
        assert!(json.get("failure_reason").is_none());
    }
}
