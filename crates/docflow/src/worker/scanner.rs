use std::io::{Cursor, Read};
use std::path::Path;

use log::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::ExtractError;
use crate::worker::job::WorkItem;

/// A named blob as submitted by the caller.
#[derive(Clone)]
pub struct InputFile {
    pub name: String,
    pub payload: Vec<u8>,
}

impl InputFile {
    pub fn new(name: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
        }
    }
}

impl std::fmt::Debug for InputFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputFile")
            .field("name", &self.name)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Document,
    Archive,
    Unsupported,
}

/// An input that was rejected before dispatch.
#[derive(Debug)]
pub struct DiscoveryFailure {
    /// Position of the offending input in the submitted batch.
    pub position: usize,
    pub name: String,
    pub error: ExtractError,
}

/// Result of flattening a batch.
#[derive(Debug, Default)]
pub struct Extraction {
    pub items: Vec<WorkItem>,
    pub failures: Vec<DiscoveryFailure>,
}

impl Extraction {
    /// Number of items that will be dispatched.
    pub fn discovered(&self) -> usize {
        self.items.len()
    }
}

/// Flattens a batch of standalone documents and archives into work items.
pub struct BatchScanner {
    document_extension: String,
    archive_extension: String,
    max_entry_bytes: u64,
}

/// Upper bound on the buffer reserved from an entry's declared size.
const MAX_PREALLOC: u64 = 1024 * 1024;

impl BatchScanner {
    pub fn new(document_extension: &str, archive_extension: &str) -> Self {
        Self {
            document_extension: document_extension.trim_start_matches('.').to_lowercase(),
            archive_extension: archive_extension.trim_start_matches('.').to_lowercase(),
            max_entry_bytes: u64::MAX,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(&config.document_extension, &config.archive_extension)
            .with_max_entry_bytes(config.max_entry_bytes)
    }

    /// Rejects archive entries that declare or inflate to more than `limit` bytes.
    pub fn with_max_entry_bytes(mut self, limit: u64) -> Self {
        self.max_entry_bytes = limit;
        self
    }

    pub fn classify(&self, name: &str) -> InputKind {
        match extension_of(name) {
            Some(ext) if ext == self.document_extension => InputKind::Document,
            Some(ext) if ext == self.archive_extension => InputKind::Archive,
            _ => InputKind::Unsupported,
        }
    }

    pub fn scan(&self, inputs: Vec<InputFile>) -> Extraction {
        let mut extraction = Extraction::default();

        for (position, input) in inputs.into_iter().enumerate() {
            match self.classify(&input.name) {
                InputKind::Document => {
                    let index = extraction.items.len();
                    debug!("Found document: {}", input.name);
                    extraction
                        .items
                        .push(WorkItem::new(index, input.name, input.payload));
                }
                InputKind::Archive => {
                    self.expand_archive(position, input, &mut extraction);
                }
                InputKind::Unsupported => {
                    warn!("Rejecting unsupported input: {}", input.name);
                    extraction.failures.push(DiscoveryFailure {
                        position,
                        error: ExtractError::UnsupportedType {
                            name: input.name.clone(),
                        },
                        name: input.name,
                    });
                }
            }
        }

        info!(
            "Scanned {} documents ({} rejected inputs)",
            extraction.items.len(),
            extraction.failures.len()
        );
        extraction
    }

    fn expand_archive(&self, position: usize, input: InputFile, extraction: &mut Extraction) {
        let mut archive = match zip::ZipArchive::new(Cursor::new(input.payload)) {
            Ok(archive) => archive,
            Err(e) => {
                warn!("Failed to open archive {}: {}", input.name, e);
                extraction.failures.push(DiscoveryFailure {
                    position,
                    error: ExtractError::CorruptArchive {
                        name: input.name.clone(),
                        reason: e.to_string(),
                    },
                    name: input.name,
                });
                return;
            }
        };

        let before = extraction.items.len();

        for i in 0..archive.len() {
            let entry_name = match archive.by_index_raw(i) {
                Ok(entry) if entry.is_dir() => continue,
                Ok(entry) => entry.name().to_string(),
                Err(e) => {
                    let entry = format!("{}[{}]", input.name, i);
                    extraction.failures.push(unreadable(position, entry, e.to_string()));
                    continue;
                }
            };

            if self.classify(&entry_name) != InputKind::Document {
                debug!("Skipping archive entry {}/{}", input.name, entry_name);
                continue;
            }

            let qualified = format!("{}/{}", input.name, entry_name);
            let payload = match archive.by_index(i) {
                Ok(entry) => match self.read_entry(entry) {
                    Ok(buf) => buf,
                    Err(reason) => {
                        extraction.failures.push(unreadable(position, qualified, reason));
                        continue;
                    }
                },
                Err(e) => {
                    extraction.failures.push(unreadable(position, qualified, e.to_string()));
                    continue;
                }
            };

            let index = extraction.items.len();
            extraction.items.push(WorkItem::new(index, entry_name, payload));
        }

        debug!(
            "Archive {} contributed {} documents",
            input.name,
            extraction.items.len() - before
        );
    }
}

impl BatchScanner {
    /// Reads one entry, trusting neither its declared nor its actual size.
    fn read_entry<R: Read>(&self, entry: zip::read::ZipFile<'_, R>) -> Result<Vec<u8>, String> {
        let declared = entry.size();
        if declared > self.max_entry_bytes {
            return Err(format!(
                "entry declares {} bytes, limit is {}",
                declared, self.max_entry_bytes
            ));
        }

        let mut buf = Vec::with_capacity(declared.min(MAX_PREALLOC) as usize);
        let limit = self.max_entry_bytes.saturating_add(1);
        entry
            .take(limit)
            .read_to_end(&mut buf)
            .map_err(|e| e.to_string())?;

        if buf.len() as u64 > self.max_entry_bytes {
            return Err(format!(
                "entry inflates past the limit of {} bytes",
                self.max_entry_bytes
            ));
        }
        Ok(buf)
    }
}

fn unreadable(position: usize, entry: String, reason: String) -> DiscoveryFailure {
    warn!("Failed to read archive entry {}: {}", entry, reason);
    DiscoveryFailure {
        position,
        error: ExtractError::UnreadableEntry {
            entry: entry.clone(),
            reason,
        },
        name: entry,
    }
}

fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}
