//! Experiment orchestration
//!
//! The master owns the log file handle, the workers and the build service.
//! Phases, in order: parse the log header, spawn workers, stream edge
//! batches through a double buffer, run the timed update phase with the
//! build service pulsing in the background, remove the temporary vertices,
//! and capture the result.

use std::fs::File;
use std::io::BufReader;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use grind_core::{GrindError, GrindResult};
use grind_graphlog::{
    format, parse_properties, parse_properties_from, property_u64, set_marker, EdgeBatch,
    EdgeLoader, Section, VertexLoader,
};
use tracing::info;

use crate::build::BuildService;
use crate::experiment::AgingExperiment;
use crate::progress::ProgressTracker;
use crate::result::{AgingResult, LatencyStats, ResultHistory};
use crate::shared::DriverShared;
use crate::worker::AgingWorker;

pub struct AgingMaster {
    params: AgingExperiment,
    shared: Arc<DriverShared>,
    workers: Vec<AgingWorker>,
    num_operations_total: u64,
    num_vertices_expected: u64,
    num_edges_expected: u64,
    num_artificial_vertices: u64,
    block_size: u64,
    random_vertex_id: u64,
    completion_time_us: u64,
    num_build_invocations: u64,
    num_dropped: u64,
    latencies: Vec<u64>,
}

impl AgingMaster {
    pub fn new(params: AgingExperiment) -> GrindResult<Self> {
        let properties = parse_properties(&params.path_log)?;
        let num_artificial_vertices =
            property_u64(&properties, format::PROP_NUM_VERTICES_TEMPORARY)?;
        let num_vertices_expected = property_u64(&properties, format::PROP_NUM_VERTICES_FINAL)?;
        let num_edges_expected = property_u64(&properties, format::PROP_NUM_EDGES_FINAL)?;
        let num_operations_total = property_u64(&properties, format::PROP_NUM_OPERATIONS)?;
        let block_size = property_u64(&properties, format::PROP_BLOCK_SIZE)?;
        if block_size < 3 {
            return Err(GrindError::bad_log(format!(
                "implausible block size {block_size}"
            )));
        }

        let shared = Arc::new(DriverShared {
            library: Arc::clone(&params.library),
            num_workers: params.num_threads,
            granularity: params.worker_granularity,
            measure_latency: params.measure_latency,
            stop: AtomicBool::new(false),
            ops_completed: AtomicU64::new(0),
            progress: ProgressTracker::new(
                num_operations_total,
                num_edges_expected,
                params.num_reports_per_ops,
            ),
        });

        // Thread ids: workers 0..n, master n, build service n+1.
        params.library.on_main_init(params.num_threads + 2);

        let started = Instant::now();
        let workers = (0..params.num_threads)
            .map(|worker_id| AgingWorker::spawn(worker_id, Arc::clone(&shared)))
            .collect();
        params.library.on_thread_init(params.num_threads);
        info!(
            num_threads = params.num_threads,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "workers initialised"
        );

        Ok(Self {
            params,
            shared,
            workers,
            num_operations_total,
            num_vertices_expected,
            num_edges_expected,
            num_artificial_vertices,
            block_size,
            random_vertex_id: 0,
            completion_time_us: 0,
            num_build_invocations: 0,
            num_dropped: 0,
            latencies: Vec::new(),
        })
    }

    pub fn execute(mut self) -> GrindResult<AgingResult> {
        self.load_edges()?;
        self.run_experiment()?;
        self.remove_vertices()?;

        let result = self.store_results();
        if let Some(sink) = &self.params.result_sink {
            ResultHistory::append_to(sink, result.clone())?;
        }
        self.log_counts(&result);
        Ok(result)
    }

    /// Stream the EDGES section through a double buffer: while the workers
    /// scan one batch, the next one is read from disk.
    fn load_edges(&mut self) -> GrindResult<()> {
        info!(path = %self.params.path_log.display(), "loading the update sequence");
        let started = Instant::now();

        let mut reader = BufReader::new(File::open(&self.params.path_log)?);
        let properties = parse_properties_from(&mut reader)?;
        let section_length = set_marker(&properties, &mut reader, Section::Edges)?;
        let mut loader = EdgeLoader::new(reader, section_length);

        let capacity = (self.block_size / 3).max(1) as usize;
        let mut front = Arc::new(EdgeBatch::with_capacity(capacity));
        let mut back = Arc::new(EdgeBatch::with_capacity(capacity));

        let mut num_edges = loader.load(Arc::make_mut(&mut front), capacity)?;
        while num_edges > 0 {
            for worker in &self.workers {
                worker.load_edges(Arc::clone(&front));
            }
            if self.random_vertex_id == 0 {
                self.sample_random_vertex(&front);
            }

            // Fill the spare buffer while the workers scan the current one.
            let num_next = loader.load(Arc::make_mut(&mut back), capacity)?;
            self.wait_all()?;

            std::mem::swap(&mut front, &mut back);
            num_edges = num_next;
        }

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "graphlog loaded"
        );
        Ok(())
    }

    /// The timed update phase, with the build service in the background
    fn run_experiment(&mut self) -> GrindResult<()> {
        info!("experiment started");
        self.shared.progress.mark_start();

        let mut build_service = BuildService::start(
            Arc::clone(&self.params.library),
            self.params.num_threads + 1,
            self.params.build_frequency,
        );

        let started = Instant::now();
        for worker in &self.workers {
            worker.execute_updates();
        }
        self.wait_all()?;
        build_service.stop();
        self.params.library.build(); // flush the last changes
        self.completion_time_us = started.elapsed().as_micros() as u64;
        self.num_build_invocations = build_service.num_invocations();

        info!(
            num_threads = self.params.num_threads,
            completion_time_ms = self.completion_time_us / 1000,
            num_builds = self.num_build_invocations,
            "experiment completed"
        );
        Ok(())
    }

    /// Remove the artificial vertices the producer injected into the stream
    fn remove_vertices(&mut self) -> GrindResult<()> {
        info!("removing the temporary vertices");
        let started = Instant::now();

        let mut reader = BufReader::new(File::open(&self.params.path_log)?);
        let properties = parse_properties_from(&mut reader)?;
        let section_length = set_marker(&properties, &mut reader, Section::VtxTemp)?;
        let mut loader = VertexLoader::new(reader, section_length);

        let mut vertices = Vec::with_capacity(self.num_artificial_vertices as usize);
        loader.load(&mut vertices, self.num_artificial_vertices as usize)?;
        self.num_artificial_vertices = vertices.len() as u64;

        let vertices = Arc::new(vertices);
        for worker in &self.workers {
            worker.remove_vertices(Arc::clone(&vertices));
        }
        self.wait_all()?;
        self.params.library.build();

        info!(
            num_artificial_vertices = self.num_artificial_vertices,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "temporary vertices removed"
        );
        Ok(())
    }

    /// Collect one acknowledgement per worker, stopping everyone on failure
    fn wait_all(&mut self) -> GrindResult<()> {
        let mut first_error = None;
        for worker in &self.workers {
            match worker.wait() {
                Ok(outcome) => {
                    self.num_dropped += outcome.num_dropped;
                    self.latencies.extend(outcome.latencies);
                }
                Err(error) => {
                    self.shared.stop.store(true, Ordering::Relaxed);
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn sample_random_vertex(&mut self, batch: &EdgeBatch) {
        if let Some(edge) = batch.iter().find(|edge| edge.is_insertion()) {
            self.random_vertex_id = edge.source;
        }
    }

    fn store_results(&mut self) -> AgingResult {
        AgingResult {
            timestamp: Utc::now(),
            num_threads: self.params.num_threads,
            completion_time_us: self.completion_time_us,
            num_build_invocations: self.num_build_invocations,
            num_operations_total: self.num_operations_total,
            num_operations_dropped: self.num_dropped,
            num_artificial_vertices: self.num_artificial_vertices,
            num_vertices_expected: self.num_vertices_expected,
            num_edges_expected: self.num_edges_expected,
            num_vertices_final: self.params.library.num_vertices(),
            num_edges_final: self.params.library.num_edges(),
            random_vertex_id: self.random_vertex_id,
            progress_us: self.shared.progress.snapshot(),
            latency: LatencyStats::from_samples(std::mem::take(&mut self.latencies)),
        }
    }

    fn log_counts(&self, result: &AgingResult) {
        info!(
            num_vertices = result.num_vertices_final,
            num_vertices_expected = result.num_vertices_expected,
            num_edges = result.num_edges_final,
            num_edges_expected = result.num_edges_expected,
            counts_match = result.counts_match(),
            "replay finished"
        );
    }
}

impl Drop for AgingMaster {
    fn drop(&mut self) {
        // Workers first: each drop sends the shutdown task and joins.
        self.workers.clear();
        self.params.library.on_thread_destroy(self.params.num_threads);
        self.params.library.on_main_destroy();
    }
}
