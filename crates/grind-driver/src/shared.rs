//! State shared between the master and its workers
//!
//! Workers never own the master; they hold an `Arc<DriverShared>` handed to
//! them at construction. Everything on the worker hot path is an atomic.

use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Arc;

use grind_core::GraphLibrary;

use crate::progress::ProgressTracker;

pub struct DriverShared {
    pub library: Arc<dyn GraphLibrary>,
    pub num_workers: usize,
    /// Operations a worker executes between two scheduler checkpoints
    pub granularity: u64,
    pub measure_latency: bool,
    /// Cooperative stop signal checked at every checkpoint
    pub stop: AtomicBool,
    /// Operations completed across all workers
    pub ops_completed: AtomicU64,
    pub progress: ProgressTracker,
}
