//! Test infrastructure for the grind workspace
//!
//! Provides reusable mocks and fixtures: an instrumented library wrapper,
//! tier-hiding and failure-injecting wrappers, a graphlog writer and
//! workload generators.

pub mod counting;
pub mod failing;
pub mod graphlog;
pub mod helpers;
pub mod read_only;

pub use counting::CountingLibrary;
pub use failing::FailingLibrary;
pub use graphlog::GraphlogBuilder;
pub use helpers::{random_workload, write_temp_log};
pub use read_only::ReadOnlyLibrary;
