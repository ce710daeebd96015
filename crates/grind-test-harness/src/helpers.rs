//! Shared fixtures

use std::path::PathBuf;

use grind_core::WeightedEdge;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

use crate::graphlog::GraphlogBuilder;

/// Write the builder to a fresh temporary directory.
///
/// Keep the returned `TempDir` alive for as long as the log is needed.
pub fn write_temp_log(builder: &GraphlogBuilder) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("updates.graphlog");
    builder.write_to(&path).expect("write graphlog");
    (dir, path)
}

/// Deterministic churn workload: mostly insertions over `num_vertices`
/// random endpoints, with a quarter of the stream deleting an edge that is
/// alive at that point.
pub fn random_workload(num_vertices: u64, num_operations: usize, seed: u64) -> Vec<WeightedEdge> {
    assert!(num_vertices >= 2, "need at least two vertices");
    let mut rng = StdRng::seed_from_u64(seed);
    let pair = |a: u64, b: u64| (a.min(b), a.max(b));

    let mut alive: Vec<(u64, u64)> = Vec::new();
    let mut operations = Vec::with_capacity(num_operations);
    while operations.len() < num_operations {
        if !alive.is_empty() && rng.gen_bool(0.25) {
            let index = rng.gen_range(0..alive.len());
            let (source, destination) = alive.swap_remove(index);
            operations.push(WeightedEdge::new(source, destination, -1.0));
        } else {
            let source = rng.gen_range(1..=num_vertices);
            let destination = rng.gen_range(1..=num_vertices);
            if source == destination || alive.contains(&pair(source, destination)) {
                continue;
            }
            alive.push(pair(source, destination));
            operations.push(WeightedEdge::new(
                source,
                destination,
                rng.gen_range(0.1..100.0),
            ));
        }
    }
    operations
}
