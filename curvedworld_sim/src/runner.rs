//! Scenario execution against a shared frame store.
//!
//! Every viewpoint gets its own render thread and its own seeded pose stream,
//! all feeding one [`FrameStore`], the way stereo eyes and extra windows share
//! an engine in a real session. After the run, one viewpoint is replayed alone
//! in a fresh store: its final frame must match bit for bit, otherwise state
//! leaked between viewpoints.

use curvedworld_core::frame::ORTHONORMAL_TOLERANCE;
use curvedworld_core::{EngineConfig, Eye, FrameStore, OrthonormalFrame4, ViewpointId};
use serde::Serialize;
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

use crate::error::SimError;
use crate::exporter::{SimExport, SimFrame, ViewpointFrame};
use crate::pose::PoseStream;
use crate::scenarios::ScenarioId;

/// Worst-case frame error seen over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DriftStats {
    /// Largest |dot| between two frame vectors
    pub max_orthogonality_error: f64,

    /// Largest | |v| - 1 | of any frame vector
    pub max_norm_error: f64,

    /// Frames inspected
    pub frames: u64,
}

impl DriftStats {
    pub fn record(&mut self, frame: &OrthonormalFrame4) {
        self.max_orthogonality_error = self
            .max_orthogonality_error
            .max(frame.max_orthogonality_error());
        self.max_norm_error = self.max_norm_error.max(frame.max_norm_error());
        self.frames += 1;
    }

    pub fn merge(&mut self, other: &DriftStats) {
        self.max_orthogonality_error = self
            .max_orthogonality_error
            .max(other.max_orthogonality_error);
        self.max_norm_error = self.max_norm_error.max(other.max_norm_error);
        self.frames += other.frames;
    }

    /// True when both errors are inside the frame tolerance.
    pub fn within_tolerance(&self) -> bool {
        self.max_orthogonality_error <= ORTHONORMAL_TOLERANCE
            && self.max_norm_error <= ORTHONORMAL_TOLERANCE
    }
}

/// Outcome of one scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub scenario: String,
    pub seed: u64,
    pub passed: bool,
    pub ticks: u64,
    pub viewpoints: u32,
    pub drift: DriftStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

/// What one viewpoint thread produced.
struct ViewpointRun {
    id: ViewpointId,
    final_frame: OrthonormalFrame4,
    drift: DriftStats,
    samples: Vec<(u64, ViewpointFrame)>,
}

/// Runs scenarios for a fixed seed and viewpoint count.
#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    seed: u64,
    viewpoints: u32,
    ticks: u64,
    movement_scale: f64,
}

impl ScenarioRunner {
    /// Creates a runner with 1000 ticks and unit movement scale.
    pub fn new(seed: u64, viewpoints: u32) -> Self {
        Self {
            seed,
            viewpoints: viewpoints.max(1),
            ticks: 1000,
            movement_scale: 1.0,
        }
    }

    pub fn with_ticks(mut self, ticks: u64) -> Self {
        self.ticks = ticks;
        self
    }

    pub fn with_movement_scale(mut self, movement_scale: f64) -> Self {
        self.movement_scale = movement_scale;
        self
    }

    /// Runs `scenario` and reports the outcome.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        self.execute(scenario, None).0
    }

    /// Runs `scenario`, sampling every viewpoint's frame each `interval` ticks.
    pub fn run_with_export(&self, scenario: ScenarioId, interval: u64) -> (ScenarioResult, SimExport) {
        let (result, samples) = self.execute(scenario, Some(interval.max(1)));

        let mut export = SimExport::new(scenario.name(), self.seed, self.movement_scale);
        for frame in samples {
            export.add_frame(frame);
        }
        export.finalize(result.passed, result.failure_reason.clone());
        (result, export)
    }

    // ========== Private Helper Methods ==========

    fn execute(&self, scenario: ScenarioId, interval: Option<u64>) -> (ScenarioResult, Vec<SimFrame>) {
        let ticks = scenario.ticks(self.ticks);
        info!(
            "Running {} with {} viewpoints for {} ticks (seed {})",
            scenario, self.viewpoints, ticks, self.seed
        );

        let mut result = ScenarioResult {
            scenario: scenario.name().to_string(),
            seed: self.seed,
            passed: false,
            ticks,
            viewpoints: self.viewpoints,
            drift: DriftStats::default(),
            failure_reason: None,
        };

        let runs = match self.run_shared(scenario, ticks, interval) {
            Ok(runs) => runs,
            Err(reason) => {
                warn!("{} failed: {}", scenario, reason);
                result.failure_reason = Some(reason);
                return (result, Vec::new());
            }
        };

        for run in &runs {
            result.drift.merge(&run.drift);
        }

        let failure = self
            .check(scenario, &runs)
            .err()
            .or_else(|| self.check_isolation(scenario, ticks, &runs).err());

        match failure {
            Some(reason) => {
                warn!("{} failed: {}", scenario, reason);
                result.failure_reason = Some(reason);
            }
            None => {
                info!(
                    "{} passed: max orthogonality error {:.3e}, max norm error {:.3e}",
                    scenario, result.drift.max_orthogonality_error, result.drift.max_norm_error
                );
                result.passed = true;
            }
        }

        let frames = interval.map(|_| collect_samples(runs)).unwrap_or_default();
        (result, frames)
    }

    /// All viewpoints at once, one scoped thread each, over a shared store.
    fn run_shared(
        &self,
        scenario: ScenarioId,
        ticks: u64,
        interval: Option<u64>,
    ) -> Result<Vec<ViewpointRun>, String> {
        let store = self.new_store().map_err(|e| e.to_string())?;

        thread::scope(|scope| {
            let handles: Vec<_> = (0..self.viewpoints)
                .map(|index| {
                    let store = Arc::clone(&store);
                    scope.spawn(move || self.drive(&store, index, scenario, ticks, interval))
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| match handle.join() {
                    Ok(run) => run.map_err(|e| e.to_string()),
                    Err(_) => Err("viewpoint thread panicked".to_string()),
                })
                .collect()
        })
    }

    /// Feeds one viewpoint's pose stream into `store` for `ticks` ticks.
    fn drive(
        &self,
        store: &FrameStore,
        index: u32,
        scenario: ScenarioId,
        ticks: u64,
        interval: Option<u64>,
    ) -> Result<ViewpointRun, SimError> {
        let id = viewpoint_id(index);
        let mut poses = PoseStream::new(viewpoint_seed(self.seed, index), scenario.motion_profile())?;
        let mut drift = DriftStats::default();
        let mut samples = Vec::new();

        let mut frame = store.observe(id, &poses.current())?;
        for tick in 1..=ticks {
            frame = store.observe(id, &poses.next_pose())?;
            drift.record(&frame);

            if let Some(interval) = interval {
                if tick % interval == 0 || tick == ticks {
                    samples.push((tick, ViewpointFrame::new(id, &frame)));
                }
            }
        }

        debug!(
            "{} finished {} ticks, orthogonality error {:.3e}",
            id,
            ticks,
            drift.max_orthogonality_error
        );

        Ok(ViewpointRun {
            id,
            final_frame: frame,
            drift,
            samples,
        })
    }

    /// Scenario-specific expectations on the finished runs.
    fn check(&self, scenario: ScenarioId, runs: &[ViewpointRun]) -> Result<(), String> {
        for run in runs {
            if !run.drift.within_tolerance() {
                return Err(format!(
                    "{} drifted: orthogonality {:.3e}, norm {:.3e}",
                    run.id, run.drift.max_orthogonality_error, run.drift.max_norm_error
                ));
            }
            run.final_frame
                .verify()
                .map_err(|e| format!("{} final frame invalid: {}", run.id, e))?;

            let home = OrthonormalFrame4::canonical().pos();
            let travelled = (run.final_frame.pos() - home).norm();
            match scenario {
                // pure head rotation never moves the viewer
                ScenarioId::Turn if travelled > 1e-9 => {
                    return Err(format!("{} moved {:.3e} while only turning", run.id, travelled));
                }
                ScenarioId::Walk if self.movement_scale != 0.0 && travelled == 0.0 => {
                    return Err(format!("{} never left the start position", run.id));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Replays viewpoint 0 alone and compares against the shared run.
    fn check_isolation(&self, scenario: ScenarioId, ticks: u64, runs: &[ViewpointRun]) -> Result<(), String> {
        let Some(shared) = runs.first() else {
            return Ok(());
        };
        let store = self.new_store().map_err(|e| e.to_string())?;
        let alone = self
            .drive(&store, 0, scenario, ticks, None)
            .map_err(|e| format!("isolated replay failed: {}", e))?;

        if alone.final_frame != shared.final_frame {
            return Err(format!(
                "{} diverged from its isolated replay, viewpoints are not independent",
                shared.id
            ));
        }
        Ok(())
    }

    fn new_store(&self) -> Result<Arc<FrameStore>, SimError> {
        let config = EngineConfig::default().with_movement_scale(self.movement_scale);
        Ok(FrameStore::shared(config)?)
    }
}

/// Viewpoints come in stereo pairs: left and right eye of the same window.
fn viewpoint_id(index: u32) -> ViewpointId {
    let eye = if index % 2 == 0 { Eye::Left } else { Eye::Right };
    ViewpointId::for_eye(index / 2, eye)
}

/// Per-viewpoint seed; adding viewpoints does not change existing streams.
fn viewpoint_seed(master_seed: u64, index: u32) -> u64 {
    master_seed
        .wrapping_mul(0x9e3779b97f4a7c15)
        .wrapping_add((index as u64).wrapping_mul(0x517cc1b727220a95))
}

/// Regroups per-viewpoint samples by tick.
fn collect_samples(mut runs: Vec<ViewpointRun>) -> Vec<SimFrame> {
    runs.sort_by_key(|run| run.id);

    let mut frames: Vec<SimFrame> = Vec::new();
    for run in runs {
        for (i, (tick, sample)) in run.samples.into_iter().enumerate() {
            match frames.get_mut(i) {
                Some(frame) => frame.viewpoints.push(sample),
                None => frames.push(SimFrame {
                    tick,
                    viewpoints: vec![sample],
                }),
            }
        }
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_scenario_passes() {
        let runner = ScenarioRunner::new(42, 2).with_ticks(200);
        for scenario in ScenarioId::all() {
            if scenario == ScenarioId::Marathon {
                continue;
            }
            let result = runner.run(scenario);
            assert!(result.passed, "{}: {:?}", scenario, result.failure_reason);
            assert_eq!(result.drift.frames, 400);
        }
    }

    #[test]
    fn test_marathon_runs_ten_thousand_ticks() {
        let result = ScenarioRunner::new(7, 1).with_ticks(10).run(ScenarioId::Marathon);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.ticks, 10_000);
        assert!(result.drift.max_orthogonality_error < ORTHONORMAL_TOLERANCE);
    }

    #[test]
    fn test_same_seed_is_reproducible() {
        let runner = ScenarioRunner::new(99, 3).with_ticks(100);
        let a = runner.run(ScenarioId::Wander);
        let b = runner.run(ScenarioId::Wander);

        assert_eq!(a.drift, b.drift);
    }

    #[test]
    fn test_invalid_movement_scale_fails_cleanly() {
        let result = ScenarioRunner::new(1, 1)
            .with_movement_scale(f64::NAN)
            .run(ScenarioId::Walk);

        assert!(!result.passed);
        assert!(result.failure_reason.is_some());
    }

    #[test]
    fn test_export_samples_every_viewpoint() {
        let (result, export) = ScenarioRunner::new(5, 2)
            .with_ticks(50)
            .run_with_export(ScenarioId::Walk, 10);

        assert!(result.passed);
        assert!(export.passed);
        assert_eq!(export.frames.len(), 5);
        assert_eq!(export.frames[0].tick, 10);
        assert_eq!(export.frames[4].tick, 50);
        assert!(export.frames.iter().all(|f| f.viewpoints.len() == 2));
    }

    #[test]
    fn test_viewpoints_are_stereo_pairs() {
        assert_eq!(viewpoint_id(0), ViewpointId::for_eye(0, Eye::Left));
        assert_eq!(viewpoint_id(1), ViewpointId(0));
        assert_eq!(viewpoint_id(3), ViewpointId(1));
        assert_ne!(viewpoint_seed(1, 0), viewpoint_seed(1, 1));
    }

    #[test]
    fn test_drift_merge_keeps_worst() {
        let mut a = DriftStats {
            max_orthogonality_error: 1e-9,
            max_norm_error: 1e-7,
            frames: 3,
        };
        a.merge(&DriftStats {
            max_orthogonality_error: 1e-6,
            max_norm_error: 1e-12,
            frames: 2,
        });

        assert_eq!(a.max_orthogonality_error, 1e-6);
        assert_eq!(a.max_norm_error, 1e-7);
        assert_eq!(a.frames, 5);
        assert!(a.within_tolerance());
    }
}
