//! CurvedWorld Simulator CLI
//!
//! Run seeded head-motion scenarios against the frame engine.

use clap::Parser;
use curvedworld_sim::{ScenarioId, ScenarioResult, ScenarioRunner};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// CurvedWorld frame engine simulator
#[derive(Parser, Debug)]
#[command(name = "curvedworld-sim")]
#[command(about = "Run seeded head-motion simulations against the curved-world frame engine", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of viewpoints (stereo eyes) sharing one store
    #[arg(short = 'n', long, default_value = "2")]
    viewpoints: u32,

    /// Ticks per scenario (marathon always runs at least 10000)
    #[arg(short, long, default_value = "1000")]
    ticks: u64,

    /// Tracker units to radians on the sphere
    #[arg(short, long, default_value = "1.0")]
    movement_scale: f64,

    /// Scenario to run (walk, turn, wander, jitter, marathon, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Number of consecutive seeds to test (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: u64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export sampled frames of a single scenario to a JSON file
    #[arg(long)]
    export: Option<String>,

    /// Ticks between exported samples
    #[arg(long, default_value = "10")]
    export_interval: u64,
}

/// Log level used when RUST_LOG is not set.
fn default_log_level(verbose: bool, json: bool) -> &'static str {
    if verbose {
        "debug"
    } else if json {
        // keep stdout free for the summary
        "warn"
    } else {
        "info"
    }
}

fn main() {
    let args = Args::parse();

    // Initialize logging; RUST_LOG overrides the flag-derived level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_level(args.verbose, args.json)));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    if !args.json {
        info!("CurvedWorld Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            eprintln!("Available scenarios: walk, turn, wander, jitter, marathon, all");
            std::process::exit(1);
        })]
    };

    // Determine base seed
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    // Handle --export mode
    if let Some(export_path) = &args.export {
        if scenarios.len() > 1 {
            eprintln!("Error: --export only supports a single scenario, not 'all'");
            std::process::exit(1);
        }
        let scenario = scenarios[0];

        info!("Running with export to: {}", export_path);
        let runner = ScenarioRunner::new(base_seed, args.viewpoints)
            .with_ticks(args.ticks)
            .with_movement_scale(args.movement_scale);
        let (result, export) = runner.run_with_export(scenario, args.export_interval);

        match export.write_to_file(export_path) {
            Ok(()) => info!("Exported {} frames to {}", export.frames.len(), export_path),
            Err(e) => {
                error!("Failed to write export: {}", e);
                std::process::exit(1);
            }
        }

        if result.passed {
            info!("✓ {} (seed={}) PASSED", scenario.name(), base_seed);
        } else {
            error!(
                "✗ {} FAILED: {}",
                scenario.name(),
                result.failure_reason.as_deref().unwrap_or("unknown")
            );
            std::process::exit(1);
        }
        return;
    }

    // Run simulations
    let mut all_results: Vec<ScenarioResult> = Vec::new();
    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset);
        let runner = ScenarioRunner::new(seed, args.viewpoints)
            .with_ticks(args.ticks)
            .with_movement_scale(args.movement_scale);

        for scenario in &scenarios {
            let result = runner.run(*scenario);

            if !args.json {
                if result.passed {
                    info!("✓ {} (seed={}) PASSED", scenario.name(), seed);
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
                        scenario.name(),
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }

            all_results.push(result);
        }
    }

    // Summary
    let total = all_results.len();
    let failed_count = all_results.iter().filter(|r| !r.passed).count();

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": total - failed_count,
            "failed": failed_count,
            "results": all_results,
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Failed to serialize summary: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);
            for result in all_results.iter().filter(|r| !r.passed) {
                error!(
                    "  - {} seed={}: {}",
                    result.scenario,
                    result.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_level() {
        assert_eq!(default_log_level(true, false), "debug");
        assert_eq!(default_log_level(true, true), "debug");
        assert_eq!(default_log_level(false, true), "warn");
        assert_eq!(default_log_level(false, false), "info");

        // every default must parse as a filter directive
        for level in ["debug", "warn", "info"] {
            assert!(EnvFilter::try_new(level).is_ok());
        }
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["curvedworld-sim", "-S", "walk", "-n", "4", "--json"]);
        assert_eq!(args.scenario, "walk");
        assert_eq!(args.viewpoints, 4);
        assert!(args.json);
        assert_eq!(args.ticks, 1000);
    }
}
