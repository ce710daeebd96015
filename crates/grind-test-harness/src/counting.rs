//! Instrumented library wrapper
//!
//! Counts lifecycle and build calls so tests can assert the threading
//! contract, and optionally delays every update to stretch the runtime of
//! timing-sensitive experiments.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use grind_core::{
    AnalyticsOps, Edge, GraphLibrary, GrindError, GrindResult, LoaderOps, UpdateOps, WeightedEdge,
};

pub struct CountingLibrary<L> {
    inner: L,
    update_delay: Duration,
    num_builds: AtomicU64,
    num_thread_inits: AtomicU64,
    num_thread_destroys: AtomicU64,
    main_init_threads: AtomicUsize,
}

impl<L: GraphLibrary> CountingLibrary<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            update_delay: Duration::ZERO,
            num_builds: AtomicU64::new(0),
            num_thread_inits: AtomicU64::new(0),
            num_thread_destroys: AtomicU64::new(0),
            main_init_threads: AtomicUsize::new(0),
        }
    }

    /// Sleep this long inside every update call
    pub fn with_update_delay(mut self, delay: Duration) -> Self {
        self.update_delay = delay;
        self
    }

    pub fn num_builds(&self) -> u64 {
        self.num_builds.load(Ordering::Relaxed)
    }

    pub fn num_thread_inits(&self) -> u64 {
        self.num_thread_inits.load(Ordering::Relaxed)
    }

    pub fn num_thread_destroys(&self) -> u64 {
        self.num_thread_destroys.load(Ordering::Relaxed)
    }

    /// Thread count announced by the last `on_main_init`
    pub fn main_init_threads(&self) -> usize {
        self.main_init_threads.load(Ordering::Relaxed)
    }

    fn inner_updates(&self) -> GrindResult<&dyn UpdateOps> {
        self.inner
            .updates()
            .ok_or(GrindError::NotSupported {
                operation: "updates",
            })
    }

    fn delay(&self) {
        if !self.update_delay.is_zero() {
            std::thread::sleep(self.update_delay);
        }
    }
}

impl<L: GraphLibrary> GraphLibrary for CountingLibrary<L> {
    fn on_main_init(&self, num_threads: usize) {
        self.main_init_threads.store(num_threads, Ordering::Relaxed);
        self.inner.on_main_init(num_threads);
    }

    fn on_main_destroy(&self) {
        self.inner.on_main_destroy();
    }

    fn on_thread_init(&self, thread_id: usize) {
        self.num_thread_inits.fetch_add(1, Ordering::Relaxed);
        self.inner.on_thread_init(thread_id);
    }

    fn on_thread_destroy(&self, thread_id: usize) {
        self.num_thread_destroys.fetch_add(1, Ordering::Relaxed);
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
        self.num_builds.fetch_add(1, Ordering::Relaxed);
        self.inner.build();
    }

    fn dump(&self) -> String {
        self.inner.dump()
    }

    fn updates(&self) -> Option<&dyn UpdateOps> {
        self.inner.updates().map(|_| self as &dyn UpdateOps)
    }

    fn loader(&self) -> Option<&dyn LoaderOps> {
        self.inner.loader()
    }

    fn analytics(&self) -> Option<&dyn AnalyticsOps> {
        self.inner.analytics()
    }
}

impl<L: GraphLibrary> UpdateOps for CountingLibrary<L> {
    fn add_vertex(&self, vertex: u64) -> GrindResult<bool> {
        self.inner_updates()?.add_vertex(vertex)
    }

    fn remove_vertex(&self, vertex: u64) -> GrindResult<bool> {
        self.inner_updates()?.remove_vertex(vertex)
    }

    fn add_edge(&self, edge: WeightedEdge) -> GrindResult<bool> {
        self.delay();
        self.inner_updates()?.add_edge(edge)
    }

    fn remove_edge(&self, edge: Edge) -> GrindResult<bool> {
        self.delay();
        self.inner_updates()?.remove_edge(edge)
    }
}
