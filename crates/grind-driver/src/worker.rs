//! Aging worker threads
//!
//! Each worker owns a queue of pending operations and executes the subset
//! of the log its partition owns. The master drives workers through task
//! messages; every task is acknowledged with a [`TaskOutcome`], and
//! `wait()` blocks for exactly one acknowledgement. Task order per worker
//! therefore equals send order, which keeps per-worker operations in log
//! order.

use std::sync::atomic::Ordering;
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use grind_core::{GrindError, GrindResult, UpdateOps, WeightedEdge};
use grind_graphlog::EdgeBatch;

use crate::shared::DriverShared;

/// Retries of a refused `add_edge` before the operation is dropped
const MAX_ADD_EDGE_ATTEMPTS: u64 = 1 << 20;

enum WorkerTask {
    /// Scan the batch and queue the operations this worker owns
    LoadEdges(Arc<EdgeBatch>),
    /// Drain the queue against the library
    ExecuteUpdates,
    /// Remove the worker's stride of the temporary vertices
    RemoveVertices(Arc<Vec<u64>>),
    Shutdown,
}

/// Acknowledgement of one completed task
#[derive(Debug, Default)]
pub struct TaskOutcome {
    /// Per-operation latencies in microseconds, when measurement is on
    pub latencies: Vec<u64>,
    /// Operations dropped after exhausting the add_edge retry budget
    pub num_dropped: u64,
    /// First unrecoverable library failure, if any
    pub failure: Option<String>,
}

/// Handle to one worker thread
pub struct AgingWorker {
    worker_id: usize,
    tasks: mpsc::Sender<WorkerTask>,
    acks: mpsc::Receiver<TaskOutcome>,
    thread: Option<JoinHandle<()>>,
}

impl AgingWorker {
    pub fn spawn(worker_id: usize, shared: Arc<DriverShared>) -> Self {
        let (task_tx, task_rx) = mpsc::channel();
        let (ack_tx, ack_rx) = mpsc::channel();
        let thread = thread::spawn(move || {
            WorkerState::new(worker_id, shared).run(task_rx, ack_tx);
        });
        Self {
            worker_id,
            tasks: task_tx,
            acks: ack_rx,
            thread: Some(thread),
        }
    }

    pub fn load_edges(&self, batch: Arc<EdgeBatch>) {
        let _ = self.tasks.send(WorkerTask::LoadEdges(batch));
    }

    pub fn execute_updates(&self) {
        let _ = self.tasks.send(WorkerTask::ExecuteUpdates);
    }

    pub fn remove_vertices(&self, vertices: Arc<Vec<u64>>) {
        let _ = self.tasks.send(WorkerTask::RemoveVertices(vertices));
    }

    /// Block until the worker acknowledges its current task
    pub fn wait(&self) -> GrindResult<TaskOutcome> {
        let outcome = self.acks.recv().map_err(|_| {
            GrindError::library(format!("worker {} terminated unexpectedly", self.worker_id))
        })?;
        if let Some(message) = &outcome.failure {
            return Err(GrindError::library(format!(
                "worker {}: {message}",
                self.worker_id
            )));
        }
        Ok(outcome)
    }
}

impl Drop for AgingWorker {
    fn drop(&mut self) {
        let _ = self.tasks.send(WorkerTask::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

struct WorkerState {
    worker_id: usize,
    shared: Arc<DriverShared>,
    queue: Vec<WeightedEdge>,
}

impl WorkerState {
    fn new(worker_id: usize, shared: Arc<DriverShared>) -> Self {
        Self {
            worker_id,
            shared,
            queue: Vec::new(),
        }
    }

    fn run(mut self, tasks: mpsc::Receiver<WorkerTask>, acks: mpsc::Sender<TaskOutcome>) {
        while let Ok(task) = tasks.recv() {
            let outcome = match task {
                WorkerTask::LoadEdges(batch) => {
                    self.scan_batch(&batch);
                    TaskOutcome::default()
                }
                WorkerTask::ExecuteUpdates => self.execute_updates(),
                WorkerTask::RemoveVertices(vertices) => self.remove_vertices(&vertices),
                WorkerTask::Shutdown => break,
            };
            if acks.send(outcome).is_err() {
                break;
            }
        }
    }

    /// Loading phase: read-only scan, may run concurrently on all workers
    fn scan_batch(&mut self, batch: &EdgeBatch) {
        let num_workers = self.shared.num_workers;
        for edge in batch.iter() {
            if edge.worker(num_workers) == self.worker_id {
                self.queue.push(edge);
            }
        }
    }

    /// Execution phase: drain the queue in insertion order
    fn execute_updates(&mut self) -> TaskOutcome {
        let mut outcome = TaskOutcome::default();
        let updates = match self.shared.library.updates() {
            Some(updates) => updates,
            None => {
                outcome.failure = Some("library lost its update tier".into());
                return outcome;
            }
        };

        self.shared.library.on_thread_init(self.worker_id);

        let mut queue = std::mem::take(&mut self.queue);
        let mut since_checkpoint = 0u64;
        for &operation in &queue {
            let started = self.shared.measure_latency.then(Instant::now);
            let result = if operation.is_insertion() {
                self.add_edge_with_retry(updates, operation, &mut outcome)
            } else {
                updates.remove_edge(operation.edge()).map(|_| ())
            };
            if let Some(started) = started {
                outcome.latencies.push(started.elapsed().as_micros() as u64);
            }
            if let Err(error) = result {
                outcome.failure = Some(error.to_string());
                break;
            }

            since_checkpoint += 1;
            if since_checkpoint == self.shared.granularity {
                self.checkpoint(since_checkpoint);
                since_checkpoint = 0;
                if self.shared.stop.load(Ordering::Relaxed) {
                    break;
                }
            }
        }
        if since_checkpoint > 0 {
            self.checkpoint(since_checkpoint);
        }

        self.shared.library.on_thread_destroy(self.worker_id);
        queue.clear();
        self.queue = queue;
        outcome
    }

    /// Insert one edge, creating its endpoints on first refusal.
    ///
    /// A `false` from the library means an endpoint is not committed yet;
    /// retry after a scheduling yield, bounded so a stuck writer surfaces
    /// in the log instead of hanging the experiment.
    fn add_edge_with_retry(
        &self,
        updates: &dyn UpdateOps,
        operation: WeightedEdge,
        outcome: &mut TaskOutcome,
    ) -> GrindResult<()> {
        let mut attempts = 0u64;
        loop {
            if updates.add_edge(operation)? {
                return Ok(());
            }
            if attempts == 0 {
                updates.add_vertex(operation.source)?;
                updates.add_vertex(operation.destination)?;
            }
            attempts += 1;
            if attempts >= MAX_ADD_EDGE_ATTEMPTS {
                outcome.num_dropped += 1;
                tracing::warn!(
                    worker_id = self.worker_id,
                    edge = %operation,
                    attempts,
                    "add_edge retry budget exhausted, operation dropped"
                );
                return Ok(());
            }
            thread::yield_now();
        }
    }

    /// Advance the shared counters and claim any newly crossed epochs
    fn checkpoint(&self, completed: u64) {
        let total = self
            .shared
            .ops_completed
            .fetch_add(completed, Ordering::Relaxed)
            + completed;
        self.shared.progress.record(total);
    }

    /// Vertex-removal sub-phase: this worker's stride of the slice
    fn remove_vertices(&mut self, vertices: &[u64]) -> TaskOutcome {
        let mut outcome = TaskOutcome::default();
        let updates = match self.shared.library.updates() {
            Some(updates) => updates,
            None => {
                outcome.failure = Some("library lost its update tier".into());
                return outcome;
            }
        };

        self.shared.library.on_thread_init(self.worker_id);
        let mut index = self.worker_id;
        while index < vertices.len() {
            if let Err(error) = updates.remove_vertex(vertices[index]) {
                outcome.failure = Some(error.to_string());
                break;
            }
            index += self.shared.num_workers;
        }
        self.shared.library.on_thread_destroy(self.worker_id);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressTracker;
    use grind_core::{GraphLibrary, MemoryGraph};
    use std::sync::atomic::{AtomicBool, AtomicU64};

    fn shared(library: Arc<MemoryGraph>, num_workers: usize) -> Arc<DriverShared> {
        Arc::new(DriverShared {
            library,
            num_workers,
            granularity: 4,
            measure_latency: false,
            stop: AtomicBool::new(false),
            ops_completed: AtomicU64::new(0),
            progress: ProgressTracker::new(16, 4, 1),
        })
    }

    fn batch_of(edges: &[(u64, u64, f64)]) -> Arc<EdgeBatch> {
        let mut batch = EdgeBatch::with_capacity(edges.len());
        for &(s, d, w) in edges {
            batch.push(WeightedEdge::new(s, d, w));
        }
        Arc::new(batch)
    }

    #[test]
    fn worker_only_executes_its_partition() {
        let library = Arc::new(MemoryGraph::new());
        let shared = shared(library.clone(), 2);
        let worker0 = AgingWorker::spawn(0, shared.clone());
        let worker1 = AgingWorker::spawn(1, shared.clone());

        // min(s, d) mod 2 routes both 1-2 and 3-4 to worker 1.
        let batch = batch_of(&[(1, 2, 1.0), (3, 4, 2.0), (2, 1, -1.0)]);
        worker0.load_edges(batch.clone());
        worker1.load_edges(batch);
        worker0.wait().unwrap();
        worker1.wait().unwrap();

        worker0.execute_updates();
        worker1.execute_updates();
        worker0.wait().unwrap();
        worker1.wait().unwrap();

        assert!(library.has_edge(3, 4));
        assert!(!library.has_edge(1, 2));
        assert_eq!(library.num_edges(), 1);
        assert_eq!(shared.ops_completed.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn deletions_follow_insertions_in_log_order() {
        let library = Arc::new(MemoryGraph::new());
        let shared = shared(library.clone(), 1);
        let worker = AgingWorker::spawn(0, shared);

        let batch = batch_of(&[(1, 2, 1.0), (1, 2, -1.0), (1, 2, 0.5)]);
        worker.load_edges(batch);
        worker.wait().unwrap();
        worker.execute_updates();
        worker.wait().unwrap();

        assert!(library.has_edge(1, 2));
        assert_eq!(library.get_weight(1, 2), 0.5);
    }

    #[test]
    fn latency_samples_are_collected_when_enabled() {
        let library = Arc::new(MemoryGraph::new());
        let shared = Arc::new(DriverShared {
            library,
            num_workers: 1,
            granularity: 2,
            measure_latency: true,
            stop: AtomicBool::new(false),
            ops_completed: AtomicU64::new(0),
            progress: ProgressTracker::new(4, 2, 1),
        });
        let worker = AgingWorker::spawn(0, shared);

        worker.load_edges(batch_of(&[(1, 2, 1.0), (2, 3, 1.0)]));
        worker.wait().unwrap();
        worker.execute_updates();
        let outcome = worker.wait().unwrap();
        assert_eq!(outcome.latencies.len(), 2);
        assert_eq!(outcome.num_dropped, 0);
    }

    #[test]
    fn strided_vertex_removal() {
        let library = Arc::new(MemoryGraph::new());
        {
            let updates = library.updates().unwrap();
            for v in 0..6 {
                updates.add_vertex(v).unwrap();
            }
        }
        let shared = shared(library.clone(), 2);
        let worker0 = AgingWorker::spawn(0, shared.clone());
        let worker1 = AgingWorker::spawn(1, shared);

        let vertices = Arc::new(vec![0, 1, 2, 3]);
        worker0.remove_vertices(vertices.clone());
        worker1.remove_vertices(vertices);
        worker0.wait().unwrap();
        worker1.wait().unwrap();

        assert_eq!(library.num_vertices(), 2);
        assert!(library.has_vertex(4));
        assert!(library.has_vertex(5));
    }
}
