use std::sync::{Mutex, MutexGuard};

use crate::broadcast::JobOwner;
use crate::error::StorageError;
use crate::processor::DocumentRecord;
use crate::storage::{SaveEntry, StorageService};

/// Keeps every saved entry in memory, tagged with its owner.
#[derive(Default)]
pub struct MemoryStorage {
    saved: Mutex<Vec<(JobOwner, SaveEntry)>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Vec<(JobOwner, SaveEntry)>> {
        match self.saved.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Everything saved so far, in save order.
    pub fn saved(&self) -> Vec<SaveEntry> {
        self.entries().iter().map(|(_, entry)| entry.clone()).collect()
    }

    pub fn saved_for(&self, owner: &JobOwner) -> Vec<SaveEntry> {
        self.entries()
            .iter()
            .filter(|(o, _)| o == owner)
            .map(|(_, entry)| entry.clone())
            .collect()
    }
}

impl StorageService for MemoryStorage {
    fn save_batch(
        &self,
        owner: &JobOwner,
        entries: &[SaveEntry],
    ) -> Result<Vec<DocumentRecord>, StorageError> {
        let mut saved = self.entries();
        saved.extend(entries.iter().map(|entry| (owner.clone(), entry.clone())));
        Ok(entries.iter().map(|entry| entry.document.clone()).collect())
    }
}
