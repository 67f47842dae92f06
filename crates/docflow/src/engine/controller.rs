use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use tokio::sync::broadcast;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::artifacts;
use crate::broadcast::{Job, JobOwner, JobProgressBroadcaster, JobProgressEvent, JobStatus, JobStore};
use crate::config::EngineConfig;
use crate::engine::aggregator;
use crate::engine::persistence::{self, PersistStop};
use crate::error::WorkerError;
use crate::storage::StorageService;
use crate::worker::job::{ItemProcessor, TaskResult, WorkItem};
use crate::worker::pool::WorkerPool;
use crate::worker::scanner::{BatchScanner, InputFile};

/// Entry point of the engine: accepts batches, runs them in the background
/// and answers status queries.
///
/// Cloning is cheap; clones share the same job store.
#[derive(Clone)]
pub struct JobController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: EngineConfig,
    scanner: BatchScanner,
    processor: Arc<dyn ItemProcessor>,
    storage: Arc<dyn StorageService>,
    store: JobStore,
}

/// How the dispatch phase ended.
enum Dispatch {
    /// Every dispatched item produced a result.
    Drained,
    /// The job record disappeared mid-run.
    Cleared,
}

impl JobController {
    pub fn new(
        config: EngineConfig,
        processor: Arc<dyn ItemProcessor>,
        storage: Arc<dyn StorageService>,
    ) -> Self {
        if artifacts::init_global(config.artifact_ttl()) {
            debug!(ttl_secs = ?config.artifact_ttl_secs, "Artifact cache initialized");
        }
        let scanner = BatchScanner::from_config(&config);
        let store = JobStore::new(JobProgressBroadcaster::new(config.progress_channel_capacity));

        Self {
            inner: Arc::new(ControllerInner {
                config,
                scanner,
                processor,
                storage,
                store,
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &JobStore {
        &self.inner.store
    }

    /// Flattens `inputs`, registers the job and starts processing it in the
    /// background. Returns the new job id once the record is visible.
    pub fn submit(&self, inputs: Vec<InputFile>, owner: JobOwner) -> String {
        let job_id = Uuid::new_v4().to_string();
        let _span = info_span!("submit", job_id = %job_id, inputs = inputs.len()).entered();

        let extraction = self.inner.scanner.scan(inputs);
        let mut job = Job::new(&job_id, owner, extraction.discovered());
        aggregator::record_discovery_failures(&mut job, &extraction.failures);
        self.inner.store.insert(job);

        info!(
            total = extraction.items.len(),
            rejected = extraction.failures.len(),
            "Job submitted"
        );

        // Shared so the items survive a failed spawn.
        let pending = Arc::new(Mutex::new(Some(extraction.items)));
        let inner = Arc::clone(&self.inner);
        let thread_pending = Arc::clone(&pending);
        let thread_job_id = job_id.clone();

        let spawned = thread::Builder::new()
            .name(format!("docflow-job-{}", &job_id[..8]))
            .spawn(move || {
                if let Some(items) = take_items(&thread_pending) {
                    inner.run_job(&thread_job_id, items);
                }
            });

        if let Err(e) = spawned {
            warn!("Failed to spawn job thread, running inline: {}", e);
            if let Some(items) = take_items(&pending) {
                self.inner.run_job(&job_id, items);
            }
        }

        job_id
    }

    /// Snapshot of a job.
    pub fn status(&self, job_id: &str) -> Option<Job> {
        self.inner.store.get(job_id)
    }

    /// Marks a processing job cancelled. Returns `false` for unknown or
    /// already finished jobs.
    pub fn cancel(&self, job_id: &str) -> bool {
        let cancelled = self
            .inner
            .store
            .modify(job_id, |job| job.finish(JobStatus::Cancelled))
            .unwrap_or(false);

        if cancelled {
            info!(job_id = %job_id, "Job cancelled");
        }
        cancelled
    }

    /// Forgets a job. Work still in flight for it is discarded.
    pub fn clear(&self, job_id: &str) -> bool {
        let removed = self.inner.store.remove(job_id);
        if removed {
            debug!(job_id = %job_id, "Job cleared");
        }
        removed
    }

    pub fn list_all(&self) -> HashMap<String, Job> {
        self.inner.store.list()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.inner.store.subscribe()
    }
}

fn take_items(pending: &Mutex<Option<Vec<WorkItem>>>) -> Option<Vec<WorkItem>> {
    match pending.lock() {
        Ok(mut guard) => guard.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    }
}

impl ControllerInner {
    fn run_job(&self, job_id: &str, items: Vec<WorkItem>) {
        let _job_span = info_span!("job", job_id = %job_id, items = items.len()).entered();
        let start = Instant::now();

        if !items.is_empty() {
            if let Dispatch::Cleared = self.dispatch(job_id, items) {
                info!("Job cleared during processing, stopping");
                return;
            }
        }

        let report = {
            let _step = info_span!("persist").entered();
            persistence::persist_results(
                &self.store,
                job_id,
                self.storage.as_ref(),
                self.config.persist_chunk_size,
            )
        };
        if report.stopped == Some(PersistStop::Cleared) {
            info!("Job cleared during persistence, stopping");
            return;
        }

        let finished = self.store.modify(job_id, |job| {
            job.finish(JobStatus::Completed);
            (job.status, job.counters)
        });

        match finished {
            Some((status, counters)) => info!(
                status = %status,
                processed = counters.processed,
                successful = counters.successful,
                failed = counters.failed,
                saved = counters.saved,
                duration_ms = start.elapsed().as_millis() as u64,
                "Job finished"
            ),
            None => info!("Job cleared before it could be finalized"),
        }
    }

    /// Runs every item through a fresh worker pool and aggregates results as
    /// they arrive.
    fn dispatch(&self, job_id: &str, items: Vec<WorkItem>) -> Dispatch {
        let workers = self.config.effective_workers(items.len());
        let mut pool = match WorkerPool::new(
            Arc::clone(&self.processor),
            workers,
            self.config.item_timeout(),
        ) {
            Ok(pool) => pool,
            Err(e) => {
                error!("Failed to start worker pool: {}", e);
                return self.fail_items(job_id, items.into_iter(), &e);
            }
        };

        // Dispatched but not yet reported, by index.
        let mut outstanding: HashMap<usize, String> = HashMap::with_capacity(items.len());
        let mut remaining = items.into_iter();

        while let Some(item) = remaining.next() {
            while let Some(result) = pool.try_recv_result() {
                if !self.collect(job_id, &mut outstanding, result) {
                    pool.shutdown();
                    return Dispatch::Cleared;
                }
            }

            match self.store.read(job_id, |job| job.status) {
                None => {
                    pool.shutdown();
                    return Dispatch::Cleared;
                }
                Some(JobStatus::Cancelled) => {
                    debug!("Job cancelled, not dispatching {} remaining items", remaining.len() + 1);
                    break;
                }
                Some(_) => {}
            }

            let (index, name) = (item.index, item.name.clone());
            if let Err(e) = pool.submit(item) {
                error!("Worker pool rejected item {}: {}", index, e);
                let failed = std::iter::once(WorkItem::new(index, name, Vec::new())).chain(remaining);
                if let Dispatch::Cleared = self.fail_items(job_id, failed, &e) {
                    pool.shutdown();
                    return Dispatch::Cleared;
                }
                break;
            }
            outstanding.insert(index, name);
        }

        pool.close();

        while !outstanding.is_empty() {
            match pool.recv_result() {
                Some(result) => {
                    if !self.collect(job_id, &mut outstanding, result) {
                        pool.shutdown();
                        return Dispatch::Cleared;
                    }
                }
                None => {
                    error!("{} items were lost by the worker pool", outstanding.len());
                    let lost = outstanding
                        .drain()
                        .map(|(index, name)| WorkItem::new(index, name, Vec::new()));
                    return self.fail_items(job_id, lost, &WorkerError::TaskVanished);
                }
            }
        }

        // Workers pinned by a timed-out task are left to finish on their own.
        drop(pool);
        Dispatch::Drained
    }

    fn collect(
        &self,
        job_id: &str,
        outstanding: &mut HashMap<usize, String>,
        result: TaskResult,
    ) -> bool {
        outstanding.remove(&result.index());
        aggregator::apply_result(&self.store, job_id, result)
    }

    fn fail_items(
        &self,
        job_id: &str,
        items: impl Iterator<Item = WorkItem>,
        error: &WorkerError,
    ) -> Dispatch {
        for item in items {
            let result = TaskResult::failure(item.name, item.index, error);
            if !aggregator::apply_result(&self.store, job_id, result) {
                return Dispatch::Cleared;
            }
        }
        Dispatch::Drained
    }
}
