//! In-memory job store: the single source of truth for batch job state.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::broadcast::job_progress::{
    JobCounters, JobProgressBroadcaster, JobProgressEvent, JobStatus,
};
use crate::processor::{ClassificationRecord, DocumentRecord, IssueRecord};

// ─── Job record ─────────────────────────────────────────────────────────────

/// Tags identifying who submitted a job. Never interpreted by the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobOwner {
    pub company_id: String,
    pub user_id: String,
}

impl JobOwner {
    pub fn new(company_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            company_id: company_id.into(),
            user_id: user_id.into(),
        }
    }
}

/// Stage at which an item failed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Rejected while flattening the batch.
    Discovery,
    /// Parser, validator, classifier fault or timeout.
    Processing,
    /// Processed fine but could not be saved.
    Persistence,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub file: String,
    /// Flattened item index for `processing` and `persistence` records.
    /// Discovery records never reach the flattening step and carry the
    /// position of the rejected input in the submitted batch instead, so
    /// `(kind, index)` identifies a record while `index` alone may repeat.
    pub index: usize,
    pub error: String,
    pub kind: ErrorKind,
}

impl ErrorRecord {
    pub fn new(file: impl Into<String>, index: usize, error: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            file: file.into(),
            index,
            error: error.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SuccessRecord {
    pub file: String,
    pub index: usize,
    pub document: DocumentRecord,
    pub issues: Vec<IssueRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<ClassificationRecord>,
}

/// A submitted batch and its aggregate progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    #[serde(flatten)]
    pub counters: JobCounters,
    pub results: Vec<SuccessRecord>,
    pub errors: Vec<ErrorRecord>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub owner: JobOwner,
}

impl Job {
    pub fn new(id: impl Into<String>, owner: JobOwner, total: usize) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Processing,
            counters: JobCounters::with_total(total),
            results: Vec::new(),
            errors: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
            owner,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// Moves a processing job to `status`. Terminal jobs are left untouched.
    /// Returns whether the transition happened.
    pub fn finish(&mut self, status: JobStatus) -> bool {
        if self.is_finished() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        self.completed_at = Some(Utc::now());
        true
    }

    pub fn progress_event(&self) -> JobProgressEvent {
        JobProgressEvent::new(&self.id, self.status, self.counters, self.errors.len())
    }
}

// ─── JobStore ───────────────────────────────────────────────────────────────

/// Concurrency-safe map from job id to job record.
///
/// Every mutation runs under the write lock and publishes a progress event
/// before the lock is released, so subscribers never trail the store by more
/// than one update. Closures passed to [`JobStore::update`] and
/// [`JobStore::modify`] must only touch fields: no I/O, no calls into
/// collaborators, no other locks.
pub struct JobStore {
    jobs: RwLock<HashMap<String, Job>>,
    broadcaster: JobProgressBroadcaster,
}

impl JobStore {
    pub fn new(broadcaster: JobProgressBroadcaster) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            broadcaster,
        }
    }

    fn read_jobs(&self) -> RwLockReadGuard<'_, HashMap<String, Job>> {
        match self.jobs.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_jobs(&self) -> RwLockWriteGuard<'_, HashMap<String, Job>> {
        match self.jobs.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Inserts (or replaces) a job record.
    pub fn insert(&self, job: Job) {
        let mut jobs = self.write_jobs();
        self.broadcaster.send(job.progress_event());
        jobs.insert(job.id.clone(), job);
    }

    /// Returns a snapshot of a job.
    pub fn get(&self, job_id: &str) -> Option<Job> {
        self.read_jobs().get(job_id).cloned()
    }

    /// Reads from a job without cloning it.
    pub fn read<R>(&self, job_id: &str, f: impl FnOnce(&Job) -> R) -> Option<R> {
        self.read_jobs().get(job_id).map(f)
    }

    /// Applies `f` atomically and returns the resulting snapshot.
    pub fn update(&self, job_id: &str, f: impl FnOnce(&mut Job)) -> Option<Job> {
        self.modify(job_id, |job| {
            f(job);
            job.clone()
        })
    }

    /// Applies `f` atomically and returns whatever it returns, without
    /// cloning the record.
    pub fn modify<R>(&self, job_id: &str, f: impl FnOnce(&mut Job) -> R) -> Option<R> {
        let mut jobs = self.write_jobs();
        let job = jobs.get_mut(job_id)?;
        let out = f(job);
        self.broadcaster.send(job.progress_event());
        Some(out)
    }

    /// Removes a job. Returns whether it existed.
    pub fn remove(&self, job_id: &str) -> bool {
        let mut jobs = self.write_jobs();
        match jobs.remove(job_id) {
            Some(job) => {
                self.broadcaster
                    .send(JobProgressEvent::cleared(&job.id, job.status, job.counters));
                true
            }
            None => false,
        }
    }

    /// Snapshot of every job, keyed by id.
    pub fn list(&self) -> HashMap<String, Job> {
        self.read_jobs().clone()
    }

    pub fn len(&self) -> usize {
        self.read_jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_jobs().is_empty()
    }

    /// Returns `(processing, completed, cancelled)` job counts.
    pub fn counts(&self) -> (usize, usize, usize) {
        let jobs = self.read_jobs();
        let mut processing = 0;
        let mut completed = 0;
        let mut cancelled = 0;

        for job in jobs.values() {
            match job.status {
                JobStatus::Processing => processing += 1,
                JobStatus::Completed => completed += 1,
                JobStatus::Cancelled => cancelled += 1,
            }
        }

        (processing, completed, cancelled)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.broadcaster.subscribe()
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new(JobProgressBroadcaster::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn store_with(id: &str, total: usize) -> JobStore {
        let store = JobStore::default();
        store.insert(Job::new(id, JobOwner::new("acme", "u1"), total));
        store
    }

    #[test]
    fn test_get_returns_independent_snapshot() {
        let store = store_with("job-1", 3);

        let mut snapshot = store.get("job-1").unwrap();
        snapshot.counters.processed = 99;

        assert_eq!(store.get("job-1").unwrap().counters.processed, 0);
    }

    #[test]
    fn test_get_missing() {
        let store = JobStore::default();
        assert!(store.get("nope").is_none());
        assert!(store.update("nope", |_| {}).is_none());
        assert!(store.modify("nope", |_| 1).is_none());
    }

    #[test]
    fn test_update_returns_resulting_snapshot() {
        let store = store_with("job-1", 3);

        let snapshot = store
            .update("job-1", |job| {
                job.counters.processed += 1;
                job.counters.failed += 1;
            })
            .unwrap();

        assert_eq!(snapshot.counters.processed, 1);
        assert_eq!(snapshot.counters.failed, 1);
    }

    #[test]
    fn test_updates_are_published() {
        let store = JobStore::default();
        let mut rx = store.subscribe();

        store.insert(Job::new("job-1", JobOwner::default(), 2));
        store.modify("job-1", |job| job.counters.processed += 1);

        let inserted = rx.try_recv().unwrap();
        assert_eq!(inserted.counters.processed, 0);
        let updated = rx.try_recv().unwrap();
        assert_eq!(updated.counters.processed, 1);
        assert_eq!(updated.job_id, "job-1");
    }

    #[test]
    fn test_remove_publishes_cleared_event() {
        let store = store_with("job-1", 3);
        let mut rx = store.subscribe();

        store.modify("job-1", |job| job.counters.processed += 1);
        assert!(store.remove("job-1"));

        let progress = rx.try_recv().unwrap();
        assert!(!progress.cleared);
        let removed = rx.try_recv().unwrap();
        assert!(removed.cleared);
        assert_eq!(removed.job_id, "job-1");
        assert_eq!(removed.status, JobStatus::Processing);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let store = store_with("job-1", 0);
        assert!(store.remove("job-1"));
        assert!(!store.remove("job-1"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_finish_only_from_processing() {
        let mut job = Job::new("job-1", JobOwner::default(), 0);
        assert!(job.finish(JobStatus::Cancelled));
        assert!(job.completed_at.is_some());
        assert!(!job.finish(JobStatus::Completed));
        assert_eq!(job.status, JobStatus::Cancelled);
        assert!(!Job::new("job-2", JobOwner::default(), 0).finish(JobStatus::Processing));
    }

    #[test]
    fn test_counts() {
        let store = JobStore::default();
        store.insert(Job::new("a", JobOwner::default(), 0));
        store.insert(Job::new("b", JobOwner::default(), 0));
        store.insert(Job::new("c", JobOwner::default(), 0));
        store.modify("b", |job| job.finish(JobStatus::Completed));
        store.modify("c", |job| job.finish(JobStatus::Cancelled));

        assert_eq!(store.counts(), (1, 1, 1));
        assert_eq!(store.list().len(), 3);
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let store = Arc::new(store_with("job-1", 800));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..100 {
                        store.modify("job-1", |job| {
                            job.counters.processed += 1;
                            job.counters.successful += 1;
                        });
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let job = store.get("job-1").unwrap();
        assert_eq!(job.counters.processed, 800);
        assert_eq!(job.counters.successful, 800);
    }

    #[test]
    fn test_snapshot_serialization() {
        let mut job = Job::new("job-1", JobOwner::new("acme", "u1"), 1);
        job.errors.push(ErrorRecord::new("a.txt", 0, "Unsupported file type", ErrorKind::Discovery));

        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["status"], "processing");
        assert_eq!(json["total"], 1);
        assert_eq!(json["saved"], 0);
        assert_eq!(json["errors"][0]["file"], "a.txt");
        assert_eq!(json["errors"][0]["kind"], "discovery");
        assert_eq!(json["owner"]["companyId"], "acme");
        assert!(json.get("completedAt").is_none());
    }
}
