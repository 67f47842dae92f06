//! Folds task outcomes into the job record.
//!
//! Each call is one store critical section and performs no I/O.

use crate::broadcast::{ErrorKind, ErrorRecord, Job, JobStore, SuccessRecord};
use crate::worker::job::TaskResult;
use crate::worker::scanner::DiscoveryFailure;

/// Applies one completed task to the job. Returns `false` if the job no
/// longer exists.
pub fn apply_result(store: &JobStore, job_id: &str, result: TaskResult) -> bool {
    store
        .modify(job_id, move |job| record_result(job, result))
        .is_some()
}

/// Applies a task result to a job record in place.
pub fn record_result(job: &mut Job, result: TaskResult) {
    job.counters.processed += 1;

    match result {
        TaskResult::Success {
            name,
            index,
            output,
        } => {
            job.counters.successful += 1;
            job.counters.parsed += 1;
            job.counters.validated += 1;
            job.results.push(SuccessRecord {
                file: name,
                index,
                document: output.document,
                issues: output.issues,
                classification: output.classification,
            });
        }
        TaskResult::Failure { name, index, error } => {
            job.counters.failed += 1;
            job.errors
                .push(ErrorRecord::new(name, index, error, ErrorKind::Processing));
        }
    }
}

/// Records inputs rejected during discovery. They count as processed and
/// failed immediately but never toward `total`.
pub fn record_discovery_failures(job: &mut Job, failures: &[DiscoveryFailure]) {
    for failure in failures {
        job.counters.processed += 1;
        job.counters.failed += 1;
        job.counters.rejected += 1;
        job.errors.push(ErrorRecord::new(
            &failure.name,
            failure.position,
            failure.error.to_string(),
            ErrorKind::Discovery,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::JobOwner;
    use crate::error::ExtractError;
    use crate::worker::job::{ProcessedItem, WorkItem};
    use serde_json::json;

    fn store_with_job(total: usize) -> JobStore {
        let store = JobStore::default();
        store.insert(Job::new("job-1", JobOwner::default(), total));
        store
    }

    fn success(index: usize) -> TaskResult {
        let item = WorkItem::new(index, format!("doc{}.xml", index), Vec::new());
        TaskResult::success(
            &item,
            ProcessedItem {
                document: json!({ "root": "invoice" }),
                issues: vec![json!({ "code": "missing_field" })],
                classification: None,
            },
        )
    }

    #[test]
    fn test_success_increments_stage_counters() {
        let store = store_with_job(2);

        assert!(apply_result(&store, "job-1", success(0)));

        let job = store.get("job-1").unwrap();
        assert_eq!(job.counters.processed, 1);
        assert_eq!(job.counters.successful, 1);
        assert_eq!(job.counters.parsed, 1);
        assert_eq!(job.counters.validated, 1);
        assert_eq!(job.results[0].file, "doc0.xml");
        assert_eq!(job.results[0].issues.len(), 1);
    }

    #[test]
    fn test_failure_appends_processing_error() {
        let store = store_with_job(1);

        apply_result(&store, "job-1", TaskResult::failure("bad.xml", 4, "Parse error: eof"));

        let job = store.get("job-1").unwrap();
        assert_eq!(job.counters.processed, 1);
        assert_eq!(job.counters.failed, 1);
        assert_eq!(job.counters.successful, 0);
        assert_eq!(
            job.errors[0],
            ErrorRecord::new("bad.xml", 4, "Parse error: eof", ErrorKind::Processing)
        );
    }

    #[test]
    fn test_missing_job_is_reported() {
        let store = JobStore::default();
        assert!(!apply_result(&store, "gone", success(0)));
    }

    #[test]
    fn test_discovery_failures_count_as_processed_not_total() {
        let mut job = Job::new("job-1", JobOwner::default(), 5);
        let failures = vec![DiscoveryFailure {
            position: 2,
            name: "broken.zip".to_string(),
            error: ExtractError::CorruptArchive {
                name: "broken.zip".to_string(),
                reason: "invalid Zip archive".to_string(),
            },
        }];

        record_discovery_failures(&mut job, &failures);

        assert_eq!(job.counters.total, 5);
        assert_eq!(job.counters.processed, 1);
        assert_eq!(job.counters.failed, 1);
        assert_eq!(job.counters.rejected, 1);
        assert_eq!(job.errors[0].index, 2);
        assert_eq!(job.errors[0].kind, ErrorKind::Discovery);
        assert!(job.errors[0].error.contains("broken.zip"));
    }

    #[test]
    fn test_discovery_and_item_indices_are_distinguished_by_kind() {
        let mut job = Job::new("job-1", JobOwner::default(), 2);
        let failures = vec![DiscoveryFailure {
            position: 0,
            name: "notes.txt".to_string(),
            error: ExtractError::UnsupportedType {
                name: "notes.txt".to_string(),
            },
        }];

        record_discovery_failures(&mut job, &failures);
        record_result(&mut job, TaskResult::failure("doc0.xml", 0, "Parse error: eof"));

        assert_eq!(job.errors.len(), 2);
        assert_eq!(job.errors[0].index, job.errors[1].index);
        assert_eq!(job.errors[0].kind, ErrorKind::Discovery);
        assert_eq!(job.errors[1].kind, ErrorKind::Processing);
        assert_ne!(job.errors[0].file, job.errors[1].file);
    }
}
