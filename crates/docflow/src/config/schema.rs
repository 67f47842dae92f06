use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hard ceiling on the number of worker threads any single job may use.
pub const MAX_WORKERS: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_item_timeout_secs")]
    pub item_timeout_secs: u64,
    #[serde(default = "default_persist_chunk_size")]
    pub persist_chunk_size: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_progress_channel_capacity")]
    pub progress_channel_capacity: usize,
    #[serde(default = "default_document_extension")]
    pub document_extension: String,
    #[serde(default = "default_archive_extension")]
    pub archive_extension: String,
    /// Largest decompressed archive entry accepted, in bytes.
    #[serde(default = "default_max_entry_bytes")]
    pub max_entry_bytes: u64,
    /// Time-to-live for cached artifacts. `None` keeps entries until cleared.
    #[serde(default)]
    pub artifact_ttl_secs: Option<u64>,
}

fn default_worker_count() -> usize {
    (num_cpus::get() + 4).min(MAX_WORKERS)
}

fn default_item_timeout_secs() -> u64 {
    60
}

fn default_persist_chunk_size() -> usize {
    100
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_progress_channel_capacity() -> usize {
    256
}

fn default_document_extension() -> String {
    "xml".to_string()
}

fn default_archive_extension() -> String {
    "zip".to_string()
}

fn default_max_entry_bytes() -> u64 {
    64 * 1024 * 1024
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            item_timeout_secs: default_item_timeout_secs(),
            persist_chunk_size: default_persist_chunk_size(),
            poll_interval_ms: default_poll_interval_ms(),
            progress_channel_capacity: default_progress_channel_capacity(),
            document_extension: default_document_extension(),
            archive_extension: default_archive_extension(),
            max_entry_bytes: default_max_entry_bytes(),
            artifact_ttl_secs: None,
        }
    }
}

impl EngineConfig {
    /// Worker threads for a job with `item_count` items, clamped to `[1, MAX_WORKERS]`.
    pub fn effective_workers(&self, item_count: usize) -> usize {
        self.worker_count
            .clamp(1, MAX_WORKERS)
            .min(item_count.max(1))
    }

    pub fn item_timeout(&self) -> Duration {
        Duration::from_secs(self.item_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn artifact_ttl(&self) -> Option<Duration> {
        self.artifact_ttl_secs.map(Duration::from_secs)
    }
}
