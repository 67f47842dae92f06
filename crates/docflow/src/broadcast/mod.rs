//! Job state and its real-time event stream.
//!
//! The store is the only place job records live; the broadcaster carries a
//! counters-only event for every change so observers can push instead of poll.

pub mod job_progress;
pub mod job_store;

pub use job_progress::{JobCounters, JobProgressBroadcaster, JobProgressEvent, JobStatus};
pub use job_store::{ErrorKind, ErrorRecord, Job, JobOwner, JobStore, SuccessRecord};
