pub mod artifacts;
pub mod broadcast;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod processor;
pub mod sanitize;
pub mod storage;
pub mod worker;

pub use artifacts::ArtifactCache;
pub use broadcast::{
    ErrorKind, ErrorRecord, Job, JobCounters, JobOwner, JobProgressBroadcaster, JobProgressEvent,
    JobStatus, JobStore, SuccessRecord,
};
pub use config::{load_config, load_config_from_str, EngineConfig, MAX_WORKERS};
pub use engine::{wait_for_job, JobController};
pub use error::{
    ConfigError, DocflowError, ExtractError, ProcessError, Result, StorageError, WaitError,
    WorkerError,
};
pub use logging::{init_logging, LogFormat};
pub use pipeline::Pipeline;
pub use processor::{
    Classifier, DocumentParser, DocumentValidator, RequiredFieldsValidator, XmlDocumentParser,
};
pub use storage::{FileStorage, MemoryStorage, SaveEntry, StorageService};
pub use worker::{InputFile, ItemProcessor, ProcessedItem, TaskResult, WorkItem, WorkerPool};
