//! Shared test utilities for docflow integration tests.
//!
//! - `TestHarness` wires a `JobController` to in-memory storage
//! - builders for XML payloads and zip archives
//! - fake collaborators (gated and failing processors, flaky storage)

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::*;
