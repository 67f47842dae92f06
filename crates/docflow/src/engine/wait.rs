use std::thread;
use std::time::{Duration, Instant};

use crate::broadcast::Job;
use crate::engine::controller::JobController;
use crate::error::WaitError;

/// Polls a job every `poll_interval` until it is completed or cancelled.
///
/// Fails with [`WaitError::NotFound`] if the job is unknown (or is cleared
/// while waiting) and with [`WaitError::TimedOut`] once `timeout` elapses.
pub fn wait_for_job(
    controller: &JobController,
    job_id: &str,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<Job, WaitError> {
    let start = Instant::now();

    loop {
        let job = controller
            .status(job_id)
            .ok_or_else(|| WaitError::NotFound(job_id.to_string()))?;
        if job.is_finished() {
            return Ok(job);
        }

        let waited = start.elapsed();
        if waited >= timeout {
            return Err(WaitError::TimedOut {
                job_id: job_id.to_string(),
                waited,
            });
        }
        thread::sleep(poll_interval.min(timeout - waited));
    }
}

/// [`wait_for_job`] using the controller's configured poll interval.
pub fn wait_with_defaults(
    controller: &JobController,
    job_id: &str,
    timeout: Duration,
) -> Result<Job, WaitError> {
    wait_for_job(controller, job_id, controller.config().poll_interval(), timeout)
}
