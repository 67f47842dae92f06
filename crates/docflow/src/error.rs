use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocflowError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Processing error: {0}")]
    Process(#[from] ProcessError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Wait error: {0}")]
    Wait(#[from] WaitError),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

/// Discovery failures raised while flattening a submitted batch.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Unsupported file type: {name}")]
    UnsupportedType { name: String },

    #[error("Failed to open archive '{name}': {reason}")]
    CorruptArchive { name: String, reason: String },

    #[error("Failed to read archive entry '{entry}': {reason}")]
    UnreadableEntry { entry: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to parse document: {0}")]
    Parse(String),

    #[error("Document is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Classification failed: {0}")]
    Classification(String),

    #[error("Processing timed out after {0} seconds")]
    Timeout(u64),

    #[error("Processing panicked: {0}")]
    Panicked(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize document: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("File already exists: {0}")]
    FileExists(PathBuf),

    #[error("Malformed save entry for '{file}': {reason}")]
    MalformedEntry { file: String, reason: String },

    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,

    #[error("Task exited without reporting a result")]
    TaskVanished,
}

#[derive(Error, Debug)]
pub enum WaitError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Timed out after {waited:?} waiting for job {job_id}")]
    TimedOut {
        job_id: String,
        waited: std::time::Duration,
    },
}

pub type Result<T> = std::result::Result<T, DocflowError>;
