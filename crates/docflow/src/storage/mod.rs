//! Persistence of processed documents.

pub mod filesystem;
pub mod memory;

use serde::{Deserialize, Serialize};

use crate::broadcast::JobOwner;
use crate::error::StorageError;
use crate::processor::{ClassificationRecord, DocumentRecord, IssueRecord};

pub use filesystem::FileStorage;
pub use memory::MemoryStorage;

/// One processed document handed to storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SaveEntry {
    pub file: String,
    pub index: usize,
    pub document: DocumentRecord,
    pub issues: Vec<IssueRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<ClassificationRecord>,
}

/// Batch-save backend.
///
/// `save_batch` returns the subset of documents that were actually persisted.
/// Returning fewer documents than entries is a partial save, not an error;
/// `Err` means nothing in the batch can be assumed saved.
pub trait StorageService: Send + Sync {
    fn save_batch(
        &self,
        owner: &JobOwner,
        entries: &[SaveEntry],
    ) -> Result<Vec<DocumentRecord>, StorageError>;
}
