//! The pluggable graph-library contract
//!
//! A concrete engine implements `GraphLibrary` and opts into the optional
//! tiers by overriding the capability accessors. Callers test a capability
//! once (`library.updates().is_some()`) instead of downcasting per call;
//! the RPC dispatcher consults the same accessors and answers
//! `NOT_SUPPORTED` when a tier is absent.
//!
//! # Threading contract
//!
//! - `on_main_init(n)` / `on_main_destroy()` bracket the whole process.
//!   `n` is the number of thread ids that will ever be registered.
//! - Every thread registers with `on_thread_init(id)` before its first call
//!   and deregisters with `on_thread_destroy(id)` after its last one;
//!   `id` is in `[0, n)`.
//! - `build()` is only ever invoked from a single thread at a time.
//! - Concurrent updates are only issued for disjoint vertex pairs.

use std::path::Path;

use crate::error::GrindResult;
use crate::types::{Edge, WeightedEdge};

/// Base tier: lifecycle brackets, read queries and snapshot builds.
///
/// Implementations must be safe for concurrent calls from registered
/// threads; everything else about internal synchronization is up to the
/// engine.
pub trait GraphLibrary: Send + Sync {
    fn on_main_init(&self, num_threads: usize);
    fn on_main_destroy(&self);
    fn on_thread_init(&self, thread_id: usize);
    fn on_thread_destroy(&self, thread_id: usize);

    fn num_edges(&self) -> u64;
    fn num_vertices(&self) -> u64;
    fn is_directed(&self) -> bool;

    fn has_vertex(&self, vertex: u64) -> bool;
    fn has_edge(&self, source: u64, destination: u64) -> bool;

    /// Weight of the given edge, `f64::NAN` if the edge is absent
    fn get_weight(&self, source: u64, destination: u64) -> f64;

    /// Flush buffered mutations into a queryable snapshot.
    ///
    /// Callers guarantee single-threaded invocation.
    fn build(&self);

    /// Opaque text description of the current state, for diagnostics
    fn dump(&self) -> String {
        format!(
            "vertices: {}, edges: {}, directed: {}",
            self.num_vertices(),
            self.num_edges(),
            self.is_directed()
        )
    }

    /// Update tier, if the engine supports online mutations
    fn updates(&self) -> Option<&dyn UpdateOps> {
        None
    }

    /// Loader tier, if the engine can bulk-load a graph from a file
    fn loader(&self) -> Option<&dyn LoaderOps> {
        None
    }

    /// Analytics tier, if the engine ships the Graphalytics kernels
    fn analytics(&self) -> Option<&dyn AnalyticsOps> {
        None
    }
}

/// Optional update tier: online vertex and edge mutations.
pub trait UpdateOps: Send + Sync {
    /// Returns `Ok(true)` if the vertex was inserted, `Ok(false)` if it was
    /// already present. Repeated insertion is idempotent and never an error.
    fn add_vertex(&self, vertex: u64) -> GrindResult<bool>;

    fn remove_vertex(&self, vertex: u64) -> GrindResult<bool>;

    /// Returns `Ok(false)` to signal "retry": typically one endpoint vertex
    /// is not committed yet. Callers retry after a scheduling yield.
    fn add_edge(&self, edge: WeightedEdge) -> GrindResult<bool>;

    fn remove_edge(&self, edge: Edge) -> GrindResult<bool>;
}

/// Optional loader tier: bulk-load a graph from a file.
pub trait LoaderOps: Send + Sync {
    fn load(&self, path: &Path) -> GrindResult<()>;
}

/// Optional analytics tier: the six Graphalytics kernels.
///
/// Each kernel optionally writes its per-vertex output to `output`; the
/// engine owns the algorithm, callers only dispatch.
pub trait AnalyticsOps: Send + Sync {
    fn bfs(&self, root: u64, output: Option<&Path>) -> GrindResult<()>;
    fn pagerank(&self, iterations: u64, damping: f64, output: Option<&Path>) -> GrindResult<()>;
    fn wcc(&self, output: Option<&Path>) -> GrindResult<()>;
    fn cdlp(&self, max_iterations: u64, output: Option<&Path>) -> GrindResult<()>;
    fn lcc(&self, output: Option<&Path>) -> GrindResult<()>;
    fn sssp(&self, root: u64, output: Option<&Path>) -> GrindResult<()>;
}
