//! Tier-hiding wrapper
//!
//! Exposes only the base tier of the wrapped library, whatever the inner
//! implementation supports. Lets tests drive the `NOT_SUPPORTED` paths of
//! the dispatcher against a real engine.

use grind_core::GraphLibrary;

pub struct ReadOnlyLibrary<L> {
    inner: L,
}

impl<L: GraphLibrary> ReadOnlyLibrary<L> {
    pub fn new(inner: L) -> Self {
        Self { inner }
    }
}

impl<L: GraphLibrary> GraphLibrary for ReadOnlyLibrary<L> {
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

    // The update, loader and analytics accessors keep their `None` defaults.
}
