//! Job progress broadcaster for real-time batch status streaming.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Lifecycle status of a batch job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Processing,
    Completed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Processing)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Progress counters of a job.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobCounters {
    /// Items discovered before dispatch. Fixed once dispatch begins.
    pub total: usize,
    /// Same as `total`, reported separately for display.
    pub discovered: usize,
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub parsed: usize,
    pub validated: usize,
    pub saved: usize,
    /// Inputs rejected during discovery (unsupported or unreadable).
    pub rejected: usize,
}

impl JobCounters {
    pub fn with_total(total: usize) -> Self {
        Self {
            total,
            discovered: total,
            ..Default::default()
        }
    }

    /// Items still expected to produce a result.
    pub fn pending(&self) -> usize {
        (self.total + self.rejected).saturating_sub(self.processed)
    }
}

/// Published on every job state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgressEvent {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(flatten)]
    pub counters: JobCounters,
    /// Number of error records attached to the job.
    pub error_count: usize,
    /// Set on the final event of a job whose record was removed.
    #[serde(default)]
    pub cleared: bool,
    pub timestamp: DateTime<Utc>,
}

impl JobProgressEvent {
    pub fn new(job_id: &str, status: JobStatus, counters: JobCounters, error_count: usize) -> Self {
        Self {
            job_id: job_id.to_string(),
            status,
            counters,
            error_count,
            cleared: false,
            timestamp: Utc::now(),
        }
    }

    /// Event announcing that a job record was removed.
    pub fn cleared(job_id: &str, status: JobStatus, counters: JobCounters) -> Self {
        Self {
            cleared: true,
            ..Self::new(job_id, status, counters, 0)
        }
    }
}

/// Broadcasts job progress events for streaming.
#[derive(Clone)]
pub struct JobProgressBroadcaster {
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl JobProgressBroadcaster {
    /// Creates a new job progress broadcaster with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Sends a progress event to all subscribers.
    pub fn send(&self, event: JobProgressEvent) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }

    /// Creates a new subscriber for progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for JobProgressBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}
