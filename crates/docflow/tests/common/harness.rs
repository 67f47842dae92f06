//! Test harness and fake collaborators.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use docflow::config::EngineConfig;
use docflow::engine::{wait_for_job, JobController};
use docflow::error::{ProcessError, StorageError};
use docflow::pipeline::Pipeline;
use docflow::processor::{DocumentRecord, XmlDocumentParser};
use docflow::storage::{MemoryStorage, SaveEntry, StorageService};
use docflow::worker::{ItemProcessor, ProcessedItem, WorkItem};
use docflow::{Job, JobOwner};

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(20);

/// A controller wired to in-memory storage.
pub struct TestHarness {
    pub controller: JobController,
    pub storage: Arc<MemoryStorage>,
}

impl TestHarness {
    /// Harness running the stock XML pipeline.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_processor(config, Arc::new(Pipeline::parse_only(Arc::new(XmlDocumentParser))))
    }

    pub fn with_processor(config: EngineConfig, processor: Arc<dyn ItemProcessor>) -> Self {
        let storage = Arc::new(MemoryStorage::new());
        let controller = JobController::new(config, processor, storage.clone());
        Self {
            controller,
            storage,
        }
    }

    /// Blocks until the job is terminal and returns its final snapshot.
    pub fn wait(&self, job_id: &str) -> Job {
        wait_for_job(&self.controller, job_id, Duration::from_millis(10), WAIT_TIMEOUT)
            .expect("job did not finish in time")
    }
}

pub fn owner() -> JobOwner {
    JobOwner::new("acme", "user-1")
}

/// Processor that succeeds for every item with a small JSON document.
pub fn echo_processor() -> Arc<dyn ItemProcessor> {
    Arc::new(|item: &WorkItem| -> Result<ProcessedItem, ProcessError> {
        Ok(ProcessedItem {
            document: serde_json::json!({ "name": item.name, "size": item.payload.len() }),
            issues: Vec::new(),
            classification: None,
        })
    })
}

/// Processor that sleeps before succeeding.
pub fn slow_processor(delay: Duration) -> Arc<dyn ItemProcessor> {
    Arc::new(move |item: &WorkItem| -> Result<ProcessedItem, ProcessError> {
        std::thread::sleep(delay);
        Ok(ProcessedItem {
            document: serde_json::json!({ "name": item.name }),
            issues: Vec::new(),
            classification: None,
        })
    })
}

/// Processor whose items block until the gate is opened.
#[derive(Clone, Default)]
pub struct Gate {
    state: Arc<(Mutex<bool>, Condvar)>,
    entered: Arc<AtomicUsize>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) {
        let (lock, cvar) = &*self.state;
        *lock.lock().unwrap() = true;
        cvar.notify_all();
    }

    /// Number of items that reached the gate.
    pub fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }

    /// Spins until at least `count` items are waiting at the gate.
    pub fn wait_for_entered(&self, count: usize) {
        let deadline = std::time::Instant::now() + WAIT_TIMEOUT;
        while self.entered() < count {
            assert!(std::time::Instant::now() < deadline, "items never reached the gate");
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

impl ItemProcessor for Gate {
    fn process(&self, item: &WorkItem) -> Result<ProcessedItem, ProcessError> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        let (lock, cvar) = &*self.state;
        let mut open = lock.lock().unwrap();
        while !*open {
            open = cvar.wait(open).unwrap();
        }
        Ok(ProcessedItem {
            document: serde_json::json!({ "name": item.name }),
            issues: Vec::new(),
            classification: None,
        })
    }
}

/// Storage that fails (or panics) on one call and saves everything else.
pub struct FlakyStorage {
    pub inner: MemoryStorage,
    calls: AtomicUsize,
    fail_on_call: usize,
    panic: bool,
}

impl FlakyStorage {
    pub fn failing_on(call: usize) -> Self {
        Self {
            inner: MemoryStorage::new(),
            calls: AtomicUsize::new(0),
            fail_on_call: call,
            panic: false,
        }
    }

    pub fn panicking_on(call: usize) -> Self {
        Self {
            panic: true,
            ..Self::failing_on(call)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl StorageService for FlakyStorage {
    fn save_batch(
        &self,
        owner: &JobOwner,
        entries: &[SaveEntry],
    ) -> Result<Vec<DocumentRecord>, StorageError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on_call {
            if self.panic {
                panic!("storage exploded on call {}", call);
            }
            return Err(StorageError::Unavailable(format!("call {} rejected", call)));
        }
        self.inner.save_batch(owner, entries)
    }
}

/// Checks the counter invariants that must hold at every observation.
pub fn assert_consistent(job: &Job) {
    let c = &job.counters;
    assert_eq!(c.processed, c.successful + c.failed, "processed != successful + failed: {:?}", c);
    assert!(c.saved <= c.successful, "saved > successful: {:?}", c);
    assert!(c.processed <= c.total + c.rejected, "processed > total + rejected: {:?}", c);
    assert_eq!(c.total, c.discovered);
}
