//! The default per-item processing function.

pub mod runner;

pub use runner::Pipeline;
