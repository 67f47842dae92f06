//! Chunked persistence of a job's successful results.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, info_span, warn};

use crate::broadcast::{ErrorKind, ErrorRecord, JobStatus, JobStore, SuccessRecord};
use crate::error::StorageError;
use crate::storage::{SaveEntry, StorageService};
use crate::worker::pool::panic_message;

/// Why persistence stopped before the last chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistStop {
    Cancelled,
    Cleared,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PersistReport {
    /// Chunks handed to storage (or skipped because every entry was malformed).
    pub chunks: usize,
    pub saved: usize,
    pub faulted_chunks: usize,
    /// Items withdrawn because their document was not a JSON object.
    pub malformed: usize,
    pub stopped: Option<PersistStop>,
}

/// Saves the job's `results` in chunks of `chunk_size`.
///
/// A chunk that errors or panics in storage produces one persistence error
/// per item and leaves the success counters alone. The job is re-checked
/// before every chunk; a cancelled or cleared job stops the stage.
pub fn persist_results(
    store: &JobStore,
    job_id: &str,
    storage: &dyn StorageService,
    chunk_size: usize,
) -> PersistReport {
    let mut report = PersistReport::default();

    let Some((results, owner)) = store.read(job_id, |job| (job.results.clone(), job.owner.clone()))
    else {
        report.stopped = Some(PersistStop::Cleared);
        return report;
    };

    for (chunk_no, chunk) in results.chunks(chunk_size.max(1)).enumerate() {
        match store.read(job_id, |job| job.status) {
            None => {
                report.stopped = Some(PersistStop::Cleared);
                return report;
            }
            Some(JobStatus::Cancelled) => {
                debug!("Job {} cancelled, skipping remaining chunks", job_id);
                report.stopped = Some(PersistStop::Cancelled);
                return report;
            }
            Some(_) => {}
        }

        let _chunk_span = info_span!("persist_chunk", chunk = chunk_no, size = chunk.len()).entered();
        report.chunks += 1;

        let (entries, malformed) = assemble_chunk(chunk);
        if !malformed.is_empty() {
            report.malformed += malformed.len();
            withdraw_malformed(store, job_id, malformed);
        }
        if entries.is_empty() {
            continue;
        }

        let outcome = catch_unwind(AssertUnwindSafe(|| storage.save_batch(&owner, &entries)));
        let fault = match outcome {
            Ok(Ok(saved)) => {
                let count = saved.len().min(entries.len());
                report.saved += count;
                store.modify(job_id, |job| job.counters.saved += count);
                debug!(saved = count, "Chunk {} persisted", chunk_no);
                continue;
            }
            Ok(Err(e)) => e.to_string(),
            Err(panic) => format!("Storage panicked: {}", panic_message(panic.as_ref())),
        };

        warn!("Chunk {} of job {} failed to persist: {}", chunk_no, job_id, fault);
        report.faulted_chunks += 1;
        store.modify(job_id, |job| {
            job.errors.extend(entries.iter().map(|entry| {
                ErrorRecord::new(
                    &entry.file,
                    entry.index,
                    format!("Failed to save document: {}", fault),
                    ErrorKind::Persistence,
                )
            }));
        });
    }

    report
}

/// An item whose document cannot be handed to storage.
struct Malformed {
    index: usize,
    error: StorageError,
}

/// Splits a chunk into storable entries and items whose document is not a
/// structured object.
fn assemble_chunk(chunk: &[SuccessRecord]) -> (Vec<SaveEntry>, Vec<Malformed>) {
    let mut entries = Vec::with_capacity(chunk.len());
    let mut malformed = Vec::new();

    for record in chunk {
        if !record.document.is_object() {
            warn!("Withdrawing {}: document is not a JSON object", record.file);
            malformed.push(Malformed {
                index: record.index,
                error: StorageError::MalformedEntry {
                    file: record.file.clone(),
                    reason: "document record is not a structured object".to_string(),
                },
            });
            continue;
        }
        entries.push(SaveEntry {
            file: record.file.clone(),
            index: record.index,
            document: record.document.clone(),
            issues: record.issues.clone(),
            classification: record.classification.clone(),
        });
    }

    (entries, malformed)
}

/// Moves malformed items from `results` to `errors`, turning each success
/// into a failure so `processed == successful + failed` still holds.
fn withdraw_malformed(store: &JobStore, job_id: &str, malformed: Vec<Malformed>) {
    store.modify(job_id, |job| {
        for item in malformed {
            let Some(pos) = job.results.iter().position(|r| r.index == item.index) else {
                continue;
            };
            let record = job.results.remove(pos);

            job.counters.successful = job.counters.successful.saturating_sub(1);
            job.counters.failed += 1;
            job.errors.push(ErrorRecord::new(
                record.file,
                record.index,
                item.error.to_string(),
                ErrorKind::Persistence,
            ));
        }
    });
}
