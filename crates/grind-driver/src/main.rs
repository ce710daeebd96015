//! Aging experiment binary
//!
//! Replays a graphlog against a registered library implementation.
//!
//! ```bash
//! grind-aging <updates.graphlog> [num_threads] [library]
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG` - log level (default: info)
//! - `GRIND_BUILD_FREQ_MS` - build service frequency, 0 disables it
//! - `GRIND_REPORTS_PER_OPS` - progress reports per final-edge-count ops
//! - `GRIND_MEASURE_LATENCY` - record per-update latency (any value)
//! - `GRIND_RESULTS` - JSON history file to append the result to

use std::env;
use std::time::Duration;

use grind_driver::AgingExperiment;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(true).init();

    let mut args = env::args().skip(1);
    let path_log = match args.next() {
        Some(path) => path,
        None => {
            eprintln!("usage: grind-aging <updates.graphlog> [num_threads] [library]");
            std::process::exit(1);
        }
    };
    let num_threads: usize = args
        .next()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(1);
    let library_name = args.next().unwrap_or_else(|| "memory".to_string());

    let library = match grind_core::library_by_name(&library_name) {
        Ok(library) => library,
        Err(error) => {
            eprintln!("{error}");
            std::process::exit(1);
        }
    };

    let build_frequency = env::var("GRIND_BUILD_FREQ_MS")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::ZERO);
    let reports_per_ops = env::var("GRIND_REPORTS_PER_OPS")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(1);

    info!(
        path = %path_log,
        num_threads,
        library = %library_name,
        "starting the aging experiment"
    );

    let mut experiment = AgingExperiment::new(library, &path_log)
        .with_parallelism_degree(num_threads)
        .with_build_frequency(build_frequency)
        .with_num_reports_per_ops(reports_per_ops)
        .with_measure_latency(env::var("GRIND_MEASURE_LATENCY").is_ok());
    if let Ok(sink) = env::var("GRIND_RESULTS") {
        experiment = experiment.with_result_sink(sink);
    }

    match experiment.execute() {
        Ok(result) => {
            info!(
                completion_time_ms = result.completion_time_us / 1000,
                throughput_ops_per_sec = result.throughput_ops_per_sec() as u64,
                counts_match = result.counts_match(),
                "experiment finished"
            );
            match serde_json::to_string_pretty(&result) {
                Ok(json) => println!("{json}"),
                Err(error) => eprintln!("failed to render the result: {error}"),
            }
            if !result.counts_match() {
                std::process::exit(2);
            }
        }
        Err(error) => {
            eprintln!("experiment failed: {error}");
            std::process::exit(1);
        }
    }
}
