use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};

use crate::error::{ProcessError, WorkerError};
use crate::worker::job::{ItemProcessor, ProcessedItem, TaskResult, WorkItem};

/// Fixed-size pool of worker threads that runs an [`ItemProcessor`] over
/// submitted items and reports results in completion order.
///
/// Every item runs on its own task thread so the worker can enforce the
/// per-item timeout. A timed-out item is reported as a failure right away,
/// but the worker keeps its slot until the task thread returns. A call that
/// never returns therefore pins one worker (and one thread) for the life of
/// the process.
pub struct WorkerPool {
    item_sender: Option<Sender<WorkItem>>,
    result_receiver: Receiver<TaskResult>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Starts `worker_count` workers.
    ///
    /// # Panics
    /// Panics if `worker_count` is 0.
    pub fn new(
        processor: Arc<dyn ItemProcessor>,
        worker_count: usize,
        item_timeout: Duration,
    ) -> Result<Self, WorkerError> {
        assert!(worker_count > 0, "worker_count must be > 0");
        let (item_sender, item_receiver) = bounded::<WorkItem>(worker_count * 2);
        // Unbounded so a worker never blocks on delivery while the dispatcher
        // is still blocked on a full item queue.
        let (result_sender, result_receiver) = unbounded::<TaskResult>();
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let item_rx = item_receiver.clone();
            let result_tx = result_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_processor = Arc::clone(&processor);

            let handle = thread::Builder::new()
                .name(format!("docflow-worker-{}", worker_id))
                .spawn(move || {
                    run_worker(
                        worker_id,
                        item_rx,
                        result_tx,
                        shutdown_flag,
                        worker_processor,
                        item_timeout,
                    );
                })
                .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

            workers.push(handle);
        }

        info!("Started {} workers", worker_count);

        Ok(Self {
            item_sender: Some(item_sender),
            result_receiver,
            workers,
            shutdown,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Queues an item, blocking while the queue is full.
    pub fn submit(&self, item: WorkItem) -> Result<(), WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ChannelClosed);
        }

        match &self.item_sender {
            Some(sender) => sender.send(item).map_err(|_| WorkerError::ChannelClosed),
            None => Err(WorkerError::ChannelClosed),
        }
    }

    /// Signals that no more items will be submitted. Workers exit once the
    /// queue drains.
    pub fn close(&mut self) {
        self.item_sender.take();
    }

    pub fn try_recv_result(&self) -> Option<TaskResult> {
        self.result_receiver.try_recv().ok()
    }

    /// Blocks for the next result. Returns `None` once every worker has
    /// exited and all results were consumed.
    pub fn recv_result(&self) -> Option<TaskResult> {
        self.result_receiver.recv().ok()
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Closes the queue and joins every worker. Blocks for as long as any
    /// worker is pinned by a task that never returns.
    pub fn wait(mut self) {
        self.close();

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }
}

fn run_worker(
    worker_id: usize,
    item_receiver: Receiver<WorkItem>,
    result_sender: Sender<TaskResult>,
    shutdown: Arc<AtomicBool>,
    processor: Arc<dyn ItemProcessor>,
    item_timeout: Duration,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match item_receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(item) => {
                debug!("Worker {} processing item {}: {}", worker_id, item.index, item.name);

                let (result, task) = execute_with_timeout(&processor, item, item_timeout);

                if let Err(e) = result_sender.send(result) {
                    error!("Worker {} failed to send result: {}", worker_id, e);
                    break;
                }

                // Hold the slot until an abandoned task actually returns.
                if let Some(handle) = task {
                    if handle.join().is_err() {
                        warn!("Worker {} abandoned task thread panicked", worker_id);
                    }
                    debug!("Worker {} reclaimed slot from timed-out task", worker_id);
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Worker {} item channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}

type TaskOutcome = std::thread::Result<Result<ProcessedItem, ProcessError>>;

/// Runs one item on a dedicated task thread and waits at most `timeout` for it.
///
/// Returns the result plus, when the task timed out, the handle of the task
/// thread that is still running.
fn execute_with_timeout(
    processor: &Arc<dyn ItemProcessor>,
    item: WorkItem,
    timeout: Duration,
) -> (TaskResult, Option<JoinHandle<()>>) {
    let name = item.name.clone();
    let index = item.index;
    let (outcome_tx, outcome_rx) = bounded::<(TaskOutcome, WorkItem)>(1);
    let task_processor = Arc::clone(processor);

    let spawned = thread::Builder::new()
        .name(format!("docflow-task-{}", index))
        .spawn(move || {
            let outcome = catch_unwind(AssertUnwindSafe(|| task_processor.process(&item)));
            let _ = outcome_tx.send((outcome, item));
        });

    let handle = match spawned {
        Ok(handle) => handle,
        Err(e) => {
            let err = WorkerError::SpawnFailed(e.to_string());
            error!("Item {} ({}) could not be started: {}", index, name, err);
            return (TaskResult::failure(name, index, err), None);
        }
    };

    match outcome_rx.recv_timeout(timeout) {
        Ok((Ok(Ok(output)), item)) => {
            let _ = handle.join();
            (TaskResult::success(&item, output), None)
        }
        Ok((Ok(Err(e)), _)) => {
            let _ = handle.join();
            debug!("Item {} ({}) failed: {}", index, name, e);
            (TaskResult::failure(name, index, e), None)
        }
        Ok((Err(panic), _)) => {
            let _ = handle.join();
            let message = panic_message(panic.as_ref());
            error!("Item {} ({}) panicked: {}", index, name, message);
            (
                TaskResult::failure(name, index, ProcessError::Panicked(message)),
                None,
            )
        }
        Err(RecvTimeoutError::Timeout) => {
            warn!(
                "Item {} ({}) exceeded {}s timeout, abandoning",
                index,
                name,
                timeout.as_secs()
            );
            (
                TaskResult::failure(name, index, ProcessError::Timeout(timeout.as_secs())),
                Some(handle),
            )
        }
        Err(RecvTimeoutError::Disconnected) => {
            let _ = handle.join();
            error!("Item {} ({}) task exited without a result", index, name);
            (
                TaskResult::failure(name, index, WorkerError::TaskVanished),
                None,
            )
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
