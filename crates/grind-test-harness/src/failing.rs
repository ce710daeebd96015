//! Failure-injecting wrapper
//!
//! Every update operation fails with a recoverable library error. Used to
//! assert that the server maps library failures to `ERROR` responses and
//! that the driver aborts cleanly.

use grind_core::{Edge, GraphLibrary, GrindError, GrindResult, UpdateOps, WeightedEdge};

pub struct FailingLibrary<L> {
    inner: L,
    message: String,
}

impl<L: GraphLibrary> FailingLibrary<L> {
    pub fn new(inner: L, message: impl Into<String>) -> Self {
        Self {
            inner,
            message: message.into(),
        }
    }

    fn fail<T>(&self) -> GrindResult<T> {
        Err(GrindError::library(self.message.clone()))
    }
}

impl<L: GraphLibrary> GraphLibrary for FailingLibrary<L> {
    fn on_main_init(&self, num_threads: usize) {
        self.inner.on_main_init(num_threads);
    }

    fn on_main_destroy(&self) {
        self.inner.on_main_destroy();
    }

    fn on_thread_init(&self, thread_id: usize) {
        self.inner.on_thread_init(thread_id);
    }

    fn on_thread_destroy(&self, thread_id: usize) {
        self.inner.on_thread_destroy(thread_id);
    }

    fn num_edges(&self) -> u64 {
        self.inner.num_edges()
    }

    fn num_vertices(&self) -> u64 {
        self.inner.num_vertices()
    }

    fn is_directed(&self) -> bool {
        self.inner.is_directed()
    }

    fn has_vertex(&self, vertex: u64) -> bool {
        self.inner.has_vertex(vertex)
    }

    fn has_edge(&self, source: u64, destination: u64) -> bool {
        self.inner.has_edge(source, destination)
    }

    fn get_weight(&self, source: u64, destination: u64) -> f64 {
        self.inner.get_weight(source, destination)
    }

    fn build(&self) {
        self.inner.build();
    }

    fn updates(&self) -> Option<&dyn UpdateOps> {
        Some(self)
    }
}

impl<L: GraphLibrary> UpdateOps for FailingLibrary<L> {
    fn add_vertex(&self, _vertex: u64) -> GrindResult<bool> {
        self.fail()
    }

    fn remove_vertex(&self, _vertex: u64) -> GrindResult<bool> {
        self.fail()
    }

    fn add_edge(&self, _edge: WeightedEdge) -> GrindResult<bool> {
        self.fail()
    }

    fn remove_edge(&self, _edge: Edge) -> GrindResult<bool> {
        self.fail()
    }
}
