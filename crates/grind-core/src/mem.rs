//! In-memory reference library
//!
//! `MemoryGraph` is an undirected adjacency-map engine implementing the
//! base and update tiers. It exists so the driver and the server run
//! without an external engine, and so tests exercise the real retry
//! contract: `add_edge` refuses the edge while an endpoint vertex is
//! missing, exactly like a deferred-commit engine would.
//!
//! Not an engine under evaluation: correctness over speed, one `RwLock`
//! around the whole state.

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::GrindResult;
use crate::library::{GraphLibrary, UpdateOps};
use crate::types::{Edge, WeightedEdge};

#[derive(Default)]
struct GraphState {
    vertices: FxHashSet<u64>,
    /// Each undirected edge is stored under both endpoints.
    adjacency: FxHashMap<u64, FxHashMap<u64, f64>>,
    num_edges: u64,
}

/// Undirected in-memory graph implementing the base and update tiers
#[derive(Default)]
pub struct MemoryGraph {
    state: RwLock<GraphState>,
    num_builds: AtomicU64,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times `build()` has been invoked
    pub fn num_builds(&self) -> u64 {
        self.num_builds.load(Ordering::Relaxed)
    }
}

impl GraphLibrary for MemoryGraph {
    fn on_main_init(&self, num_threads: usize) {
        tracing::debug!(num_threads, "memory graph initialised");
    }

    fn on_main_destroy(&self) {}

    fn on_thread_init(&self, _thread_id: usize) {}

    fn on_thread_destroy(&self, _thread_id: usize) {}

    fn num_edges(&self) -> u64 {
        self.state.read().num_edges
    }

    fn num_vertices(&self) -> u64 {
        self.state.read().vertices.len() as u64
    }

    fn is_directed(&self) -> bool {
        false
    }

    fn has_vertex(&self, vertex: u64) -> bool {
        self.state.read().vertices.contains(&vertex)
    }

    fn has_edge(&self, source: u64, destination: u64) -> bool {
        self.state
            .read()
            .adjacency
            .get(&source)
            .is_some_and(|n| n.contains_key(&destination))
    }

    fn get_weight(&self, source: u64, destination: u64) -> f64 {
        self.state
            .read()
            .adjacency
            .get(&source)
            .and_then(|n| n.get(&destination))
            .copied()
            .unwrap_or(f64::NAN)
    }

    fn build(&self) {
        // All mutations are applied eagerly; only the counter matters.
        self.num_builds.fetch_add(1, Ordering::Relaxed);
    }

    fn updates(&self) -> Option<&dyn UpdateOps> {
        Some(self)
    }
}

impl UpdateOps for MemoryGraph {
    fn add_vertex(&self, vertex: u64) -> GrindResult<bool> {
        Ok(self.state.write().vertices.insert(vertex))
    }

    fn remove_vertex(&self, vertex: u64) -> GrindResult<bool> {
        let mut state = self.state.write();
        if !state.vertices.remove(&vertex) {
            return Ok(false);
        }
        if let Some(neighbours) = state.adjacency.remove(&vertex) {
            state.num_edges -= neighbours.len() as u64;
            for (neighbour, _) in neighbours {
                if let Some(back) = state.adjacency.get_mut(&neighbour) {
                    back.remove(&vertex);
                }
            }
        }
        Ok(true)
    }

    fn add_edge(&self, edge: WeightedEdge) -> GrindResult<bool> {
        let mut state = self.state.write();
        if !state.vertices.contains(&edge.source) || !state.vertices.contains(&edge.destination) {
            // Endpoint not committed yet: ask the caller to retry.
            return Ok(false);
        }
        let inserted = state
            .adjacency
            .entry(edge.source)
            .or_default()
            .insert(edge.destination, edge.weight)
            .is_none();
        state
            .adjacency
            .entry(edge.destination)
            .or_default()
            .insert(edge.source, edge.weight);
        if inserted {
            state.num_edges += 1;
        }
        Ok(true)
    }

    fn remove_edge(&self, edge: Edge) -> GrindResult<bool> {
        let mut state = self.state.write();
        let removed = state
            .adjacency
            .get_mut(&edge.source)
            .is_some_and(|n| n.remove(&edge.destination).is_some());
        if removed {
            if let Some(back) = state.adjacency.get_mut(&edge.destination) {
                back.remove(&edge.source);
            }
            state.num_edges -= 1;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_edge_requires_both_endpoints() {
        let graph = MemoryGraph::new();
        let updates = graph.updates().unwrap();

        assert!(!updates.add_edge(WeightedEdge::new(1, 2, 1.0)).unwrap());
        updates.add_vertex(1).unwrap();
        assert!(!updates.add_edge(WeightedEdge::new(1, 2, 1.0)).unwrap());
        updates.add_vertex(2).unwrap();
        assert!(updates.add_edge(WeightedEdge::new(1, 2, 1.0)).unwrap());

        assert!(graph.has_edge(1, 2));
        assert!(graph.has_edge(2, 1));
        assert_eq!(graph.num_edges(), 1);
        assert_eq!(graph.get_weight(2, 1), 1.0);
    }

    #[test]
    fn add_vertex_is_idempotent() {
        let graph = MemoryGraph::new();
        let updates = graph.updates().unwrap();

        assert!(updates.add_vertex(42).unwrap());
        assert!(!updates.add_vertex(42).unwrap());
        assert_eq!(graph.num_vertices(), 1);
    }

    #[test]
    fn remove_edge_clears_both_directions() {
        let graph = MemoryGraph::new();
        let updates = graph.updates().unwrap();
        updates.add_vertex(1).unwrap();
        updates.add_vertex(2).unwrap();
        updates.add_edge(WeightedEdge::new(1, 2, 3.5)).unwrap();

        assert!(updates.remove_edge(Edge::new(2, 1)).unwrap());
        assert!(!graph.has_edge(1, 2));
        assert_eq!(graph.num_edges(), 0);
        assert!(!updates.remove_edge(Edge::new(1, 2)).unwrap());
    }

    #[test]
    fn remove_vertex_drops_incident_edges() {
        let graph = MemoryGraph::new();
        let updates = graph.updates().unwrap();
        for v in [1, 2, 3] {
            updates.add_vertex(v).unwrap();
        }
        updates.add_edge(WeightedEdge::new(1, 2, 1.0)).unwrap();
        updates.add_edge(WeightedEdge::new(1, 3, 1.0)).unwrap();

        assert!(updates.remove_vertex(1).unwrap());
        assert_eq!(graph.num_vertices(), 2);
        assert_eq!(graph.num_edges(), 0);
        assert!(!graph.has_edge(2, 1));
    }

    #[test]
    fn missing_edge_weight_is_nan() {
        let graph = MemoryGraph::new();
        assert!(graph.get_weight(5, 6).is_nan());
    }

    #[test]
    fn build_counter_is_monotonic() {
        let graph = MemoryGraph::new();
        graph.build();
        graph.build();
        assert_eq!(graph.num_builds(), 2);
    }
}
