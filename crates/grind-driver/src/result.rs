//! Experiment results
//!
//! One `AgingResult` per run, appended to a JSON history file so repeated
//! runs of the same engine can be compared over time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Summary statistics over the per-operation latency samples
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyStats {
    pub num_samples: u64,
    pub mean_us: f64,
    pub p50_us: u64,
    pub p90_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

impl LatencyStats {
    /// `None` when no samples were collected
    pub fn from_samples(mut samples: Vec<u64>) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        samples.sort_unstable();
        let num_samples = samples.len() as u64;
        let sum: u64 = samples.iter().sum();
        let percentile = |p: f64| {
            let rank = ((samples.len() - 1) as f64 * p).round() as usize;
            samples[rank]
        };
        Some(Self {
            num_samples,
            mean_us: sum as f64 / num_samples as f64,
            p50_us: percentile(0.50),
            p90_us: percentile(0.90),
            p99_us: percentile(0.99),
            max_us: samples[samples.len() - 1],
        })
    }
}

/// Immutable record of one finished experiment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgingResult {
    pub timestamp: DateTime<Utc>,
    pub num_threads: usize,
    /// Wall-clock time of the update phase, microseconds
    pub completion_time_us: u64,
    /// `build()` invocations performed by the build service
    pub num_build_invocations: u64,
    pub num_operations_total: u64,
    /// Operations dropped after exhausting the add_edge retry budget
    pub num_operations_dropped: u64,
    pub num_artificial_vertices: u64,
    /// Counts declared by the graphlog
    pub num_vertices_expected: u64,
    pub num_edges_expected: u64,
    /// Counts reported by the library after the replay
    pub num_vertices_final: u64,
    pub num_edges_final: u64,
    /// A vertex id sampled from the stream, for analytics clients
    pub random_vertex_id: u64,
    /// Elapsed microseconds at each completed epoch
    pub progress_us: Vec<u64>,
    pub latency: Option<LatencyStats>,
}

impl AgingResult {
    /// True when the library holds exactly the graph the log declared
    pub fn counts_match(&self) -> bool {
        self.num_vertices_final == self.num_vertices_expected
            && self.num_edges_final == self.num_edges_expected
    }

    /// Completed operations per second during the update phase
    pub fn throughput_ops_per_sec(&self) -> f64 {
        if self.completion_time_us == 0 {
            return 0.0;
        }
        self.num_operations_total as f64 / (self.completion_time_us as f64 / 1_000_000.0)
    }
}

/// Append-only JSON history of experiment results
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResultHistory {
    pub runs: Vec<AgingResult>,
}

impl ResultHistory {
    /// Load from file, empty if the file does not exist or does not parse
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
    }

    pub fn add_run(&mut self, run: AgingResult) {
        self.runs.push(run);
    }

    pub fn latest(&self) -> Option<&AgingResult> {
        self.runs.last()
    }

    /// Load, append one run and save back
    pub fn append_to<P: AsRef<Path>>(path: P, run: AgingResult) -> std::io::Result<()> {
        let mut history = Self::load_from(&path);
        history.add_run(run);
        history.save_to(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> AgingResult {
        AgingResult {
            timestamp: Utc::now(),
            num_threads: 2,
            completion_time_us: 1_000_000,
            num_build_invocations: 4,
            num_operations_total: 100,
            num_operations_dropped: 0,
            num_artificial_vertices: 3,
            num_vertices_expected: 10,
            num_edges_expected: 20,
            num_vertices_final: 10,
            num_edges_final: 20,
            random_vertex_id: 7,
            progress_us: vec![10, 20, 30],
            latency: None,
        }
    }

    #[test]
    fn latency_stats_percentiles() {
        let stats = LatencyStats::from_samples((1..=101).collect()).unwrap();
        assert_eq!(stats.num_samples, 101);
        assert_eq!(stats.p50_us, 51);
        assert_eq!(stats.p99_us, 100);
        assert_eq!(stats.max_us, 101);
        assert!((stats.mean_us - 51.0).abs() < 1e-9);
    }

    #[test]
    fn latency_stats_empty_is_none() {
        assert!(LatencyStats::from_samples(Vec::new()).is_none());
    }

    #[test]
    fn counts_match_and_throughput() {
        let result = sample_result();
        assert!(result.counts_match());
        assert!((result.throughput_ops_per_sec() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn history_appends_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");

        ResultHistory::append_to(&path, sample_result()).unwrap();
        ResultHistory::append_to(&path, sample_result()).unwrap();

        let history = ResultHistory::load_from(&path);
        assert_eq!(history.runs.len(), 2);
        assert_eq!(history.latest().unwrap().num_edges_final, 20);
    }
}
