//! Grind core - shared contract between the workload driver and the server
//!
//! This crate defines the pieces every other grind crate builds on:
//! - Edge value types and the symmetric worker partition rule
//! - The `GraphLibrary` trait and its optional capability tiers
//! - The workspace-wide error type
//! - `MemoryGraph`, an in-memory reference library for tests and demos
//!
//! The crate never performs I/O on its own; concrete engines, the graphlog
//! reader and the network surface live in sibling crates and interact with
//! this one exclusively through the traits defined here.

pub mod error;
pub mod library;
pub mod mem;
pub mod types;

// Re-export commonly used types
pub use error::{GrindError, GrindResult};
pub use library::{AnalyticsOps, GraphLibrary, LoaderOps, UpdateOps};
pub use mem::MemoryGraph;
pub use types::{Edge, WeightedEdge};

use std::sync::Arc;

/// Instantiate a library implementation by its registry name.
///
/// External engines hook in here; the built-in `memory` entry keeps the
/// binaries usable without one.
pub fn library_by_name(name: &str) -> GrindResult<Arc<dyn GraphLibrary>> {
    match name {
        "memory" => Ok(Arc::new(MemoryGraph::new())),
        _ => Err(GrindError::Config {
            name: "library_name",
            message: format!("unknown library {name:?}, expected one of: memory"),
        }),
    }
}
