//! Background build service
//!
//! A single thread that wakes every `frequency` and invokes `build()` on
//! the library so the engine keeps materializing snapshots while the
//! workers replay updates. The master guarantees at most one active
//! service per library, which preserves the single-threaded `build()`
//! contract.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use grind_core::GraphLibrary;

pub struct BuildService {
    shutdown_tx: mpsc::Sender<()>,
    thread: Option<JoinHandle<()>>,
    invocations: Arc<AtomicU64>,
}

impl BuildService {
    /// Spawn the service.
    ///
    /// `thread_id` is the library thread id reserved for the service. With
    /// a zero `frequency` the thread registers its id, exits immediately
    /// and records zero invocations.
    pub fn start(library: Arc<dyn GraphLibrary>, thread_id: usize, frequency: Duration) -> Self {
        let invocations = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&invocations);
        let (shutdown_tx, shutdown_rx) = mpsc::channel();

        let thread = thread::spawn(move || {
            library.on_thread_init(thread_id);
            if !frequency.is_zero() {
                loop {
                    match shutdown_rx.recv_timeout(frequency) {
                        Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                        Err(mpsc::RecvTimeoutError::Timeout) => {
                            library.build();
                            counter.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            }
            library.on_thread_destroy(thread_id);
            tracing::debug!(thread_id, "build service stopped");
        });

        Self {
            shutdown_tx,
            thread: Some(thread),
            invocations,
        }
    }

    /// Number of `build()` invocations performed so far
    pub fn num_invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }

    /// Signal the service and wait for the thread to exit
    pub fn stop(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for BuildService {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grind_core::MemoryGraph;

    #[test]
    fn pulses_build_at_the_requested_frequency() {
        let library = Arc::new(MemoryGraph::new());
        let mut service =
            BuildService::start(library.clone(), 1, Duration::from_millis(10));
        thread::sleep(Duration::from_millis(105));
        service.stop();

        let invocations = service.num_invocations();
        assert!(
            (5..=15).contains(&invocations),
            "unexpected invocation count {invocations}"
        );
        assert_eq!(library.num_builds(), invocations);
    }

    #[test]
    fn zero_frequency_is_inert() {
        let library = Arc::new(MemoryGraph::new());
        let mut service = BuildService::start(library.clone(), 1, Duration::ZERO);
        thread::sleep(Duration::from_millis(20));
        service.stop();

        assert_eq!(service.num_invocations(), 0);
        assert_eq!(library.num_builds(), 0);
    }
}
