//! Job orchestration: submission, aggregation, persistence and lifecycle.

pub mod aggregator;
pub mod controller;
pub mod persistence;
pub mod wait;

pub use controller::JobController;
pub use persistence::{persist_results, PersistReport, PersistStop};
pub use wait::{wait_for_job, wait_with_defaults};
