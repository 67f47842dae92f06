pub mod job;
pub mod pool;
pub mod scanner;

pub use job::{ItemProcessor, ProcessedItem, TaskResult, WorkItem};
pub use pool::WorkerPool;
pub use scanner::{BatchScanner, DiscoveryFailure, Extraction, InputFile, InputKind};
