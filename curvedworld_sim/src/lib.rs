//! CurvedWorld Simulation Harness
//!
//! Drives the curved-world engine with synthetic, seeded head-tracking poses
//! and checks what a render loop would rely on:
//! - **Orthonormality**: frames stay orthonormal over 10,000+ ticks
//! - **Isolation**: viewpoints sharing a store never affect each other
//! - **Determinism**: the same seed reproduces the same frames
//!
//! # Usage
//!
//! ```no_run
//! use curvedworld_sim::{ScenarioId, ScenarioRunner};
//!
//! let runner = ScenarioRunner::new(42, 2).with_ticks(500);
//! let result = runner.run(ScenarioId::Wander);
//! assert!(result.passed);
//! ```

pub mod error;
pub mod exporter;
pub mod pose;
pub mod runner;
pub mod scenarios;

pub use error::SimError;
pub use exporter::{SimExport, SimFrame, ViewpointFrame};
pub use pose::{MotionProfile, PoseStream};
pub use runner::{DriftStats, ScenarioResult, ScenarioRunner};
pub use scenarios::ScenarioId;
