//! Aging2 workload driver
//!
//! Replays a pre-recorded graphlog of edge insertions and deletions against
//! a pluggable graph library, measuring throughput and update latency.
//!
//! The driver is a master/worker design: the master streams edge batches
//! from the log through a double buffer, every worker scans each batch and
//! queues the operations its partition owns, and a background build service
//! pulses `build()` on the library while the workers replay their queues.
//! Per-epoch progress is recorded lock-free into a shared slot array.
//!
//! ```no_run
//! use std::sync::Arc;
//! use grind_core::MemoryGraph;
//! use grind_driver::AgingExperiment;
//!
//! let library = Arc::new(MemoryGraph::new());
//! let result = AgingExperiment::new(library, "updates.graphlog")
//!     .with_parallelism_degree(8)
//!     .with_build_frequency(std::time::Duration::from_millis(50))
//!     .execute()?;
//! println!("completed in {} us", result.completion_time_us);
//! # Ok::<(), grind_core::GrindError>(())
//! ```

pub mod build;
pub mod experiment;
pub mod master;
pub mod progress;
pub mod result;
pub mod shared;
pub mod worker;

pub use build::BuildService;
pub use experiment::AgingExperiment;
pub use progress::ProgressTracker;
pub use result::{AgingResult, LatencyStats, ResultHistory};
