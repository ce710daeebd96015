//! Experiment configuration
//!
//! Builder for the aging experiment. Parameters are validated once at
//! `execute()`; a library without the update tier is rejected here rather
//! than mid-run.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use grind_core::{GraphLibrary, GrindError, GrindResult};

use crate::master::AgingMaster;
use crate::result::AgingResult;

pub struct AgingExperiment {
    pub(crate) library: Arc<dyn GraphLibrary>,
    pub(crate) path_log: PathBuf,
    pub(crate) num_threads: usize,
    pub(crate) worker_granularity: u64,
    pub(crate) build_frequency: Duration,
    pub(crate) num_reports_per_ops: u64,
    pub(crate) measure_latency: bool,
    pub(crate) result_sink: Option<PathBuf>,
}

impl AgingExperiment {
    pub fn new(library: Arc<dyn GraphLibrary>, path_log: impl Into<PathBuf>) -> Self {
        Self {
            library,
            path_log: path_log.into(),
            num_threads: 1,
            worker_granularity: 1024,
            build_frequency: Duration::ZERO,
            num_reports_per_ops: 1,
            measure_latency: false,
            result_sink: None,
        }
    }

    /// Number of worker threads replaying updates
    pub fn with_parallelism_degree(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// Contiguous operations a worker performs between scheduler checkpoints
    pub fn with_worker_granularity(mut self, granularity: u64) -> Self {
        self.worker_granularity = granularity;
        self
    }

    /// How often the build service creates a new snapshot; zero disables it
    pub fn with_build_frequency(mut self, frequency: Duration) -> Self {
        self.build_frequency = frequency;
        self
    }

    /// Progress reports per `num_edges` operations. With N = 1 progress is
    /// saved after 1x, 2x, 3x, ... the final edge count; with N = 4 after
    /// 0.25x, 0.5x, 0.75x, 1x, ...
    pub fn with_num_reports_per_ops(mut self, reports: u64) -> Self {
        self.num_reports_per_ops = reports;
        self
    }

    /// Record the wall-clock latency of every update call
    pub fn with_measure_latency(mut self, measure: bool) -> Self {
        self.measure_latency = measure;
        self
    }

    /// Append the finished result to this JSON history file
    pub fn with_result_sink(mut self, path: impl Into<PathBuf>) -> Self {
        self.result_sink = Some(path.into());
        self
    }

    /// Run the experiment with the configured parameters
    pub fn execute(self) -> GrindResult<AgingResult> {
        self.validate()?;
        AgingMaster::new(self)?.execute()
    }

    fn validate(&self) -> GrindResult<()> {
        if self.num_threads == 0 {
            return Err(GrindError::Config {
                name: "num_threads",
                message: "at least one worker thread is required".into(),
            });
        }
        if self.worker_granularity == 0 {
            return Err(GrindError::Config {
                name: "worker_granularity",
                message: "granularity must be positive".into(),
            });
        }
        if self.num_reports_per_ops == 0 {
            return Err(GrindError::Config {
                name: "num_reports_per_ops",
                message: "the minimum value is 1".into(),
            });
        }
        if self.library.updates().is_none() {
            return Err(GrindError::NotSupported {
                operation: "updates",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grind_core::MemoryGraph;

    #[test]
    fn rejects_zero_threads() {
        let experiment = AgingExperiment::new(Arc::new(MemoryGraph::new()), "missing.graphlog")
            .with_parallelism_degree(0);
        assert!(matches!(
            experiment.execute(),
            Err(GrindError::Config { name: "num_threads", .. })
        ));
    }

    #[test]
    fn rejects_zero_reports() {
        let experiment = AgingExperiment::new(Arc::new(MemoryGraph::new()), "missing.graphlog")
            .with_num_reports_per_ops(0);
        assert!(matches!(experiment.execute(), Err(GrindError::Config { .. })));
    }
}
