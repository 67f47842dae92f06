use std::fmt;

use crate::error::ProcessError;
use crate::processor::{ClassificationRecord, DocumentRecord, IssueRecord};

/// One processable unit produced by flattening a submitted batch.
#[derive(Clone)]
pub struct WorkItem {
    /// Position assigned during flattening. Only used for error attribution.
    pub index: usize,
    /// Original file name, or the entry name for items taken from an archive.
    pub name: String,
    pub payload: Vec<u8>,
}

impl WorkItem {
    pub fn new(index: usize, name: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            index,
            name: name.into(),
            payload,
        }
    }
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem")
            .field("index", &self.index)
            .field("name", &self.name)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

/// What a processing function hands back for a successful item.
#[derive(Debug, Clone)]
pub struct ProcessedItem {
    pub document: DocumentRecord,
    pub issues: Vec<IssueRecord>,
    pub classification: Option<ClassificationRecord>,
}

/// The function the worker pool runs for every item.
pub trait ItemProcessor: Send + Sync {
    fn process(&self, item: &WorkItem) -> Result<ProcessedItem, ProcessError>;
}

impl<F> ItemProcessor for F
where
    F: Fn(&WorkItem) -> Result<ProcessedItem, ProcessError> + Send + Sync,
{
    fn process(&self, item: &WorkItem) -> Result<ProcessedItem, ProcessError> {
        self(item)
    }
}

/// Outcome of processing one item.
#[derive(Debug)]
pub enum TaskResult {
    Success {
        name: String,
        index: usize,
        output: ProcessedItem,
    },
    Failure {
        name: String,
        index: usize,
        error: String,
    },
}

impl TaskResult {
    pub fn success(item: &WorkItem, output: ProcessedItem) -> Self {
        Self::Success {
            name: item.name.clone(),
            index: item.index,
            output,
        }
    }

    pub fn failure(name: impl Into<String>, index: usize, error: impl fmt::Display) -> Self {
        Self::Failure {
            name: name.into(),
            index,
            error: error.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Success { name, .. } | Self::Failure { name, .. } => name,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Self::Success { index, .. } | Self::Failure { index, .. } => *index,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}
