use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::broadcast::JobOwner;
use crate::error::StorageError;
use crate::processor::DocumentRecord;
use crate::sanitize::{file_stem, sanitize_file_name};
use crate::storage::{SaveEntry, StorageService};

const MAX_NAME_ATTEMPTS: usize = 1000;

/// Writes each saved entry as a pretty-printed JSON file under
/// `<output_directory>/<company_id>/<user_id>/`.
pub struct FileStorage {
    output_directory: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(output_directory: P) -> Self {
        Self {
            output_directory: output_directory.as_ref().to_path_buf(),
        }
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    /// Directory that receives documents for `owner`.
    pub fn owner_directory(&self, owner: &JobOwner) -> PathBuf {
        self.output_directory
            .join(sanitize_file_name(&owner.company_id))
            .join(sanitize_file_name(&owner.user_id))
    }

    /// Stores one entry and returns the path it was written to.
    pub fn store(&self, dir_path: &Path, entry: &SaveEntry) -> Result<PathBuf, StorageError> {
        let content = serde_json::to_vec_pretty(entry)?;
        let stem = file_stem(&sanitize_file_name(&entry.file)).to_string();
        self.store_with_atomic_creation(dir_path, &stem, &content)
    }

    /// Creates `<stem>.json`, or the first free `<stem>_N.json`, with
    /// `create_new` so concurrent writers never clobber each other.
    fn store_with_atomic_creation(
        &self,
        dir_path: &Path,
        stem: &str,
        content: &[u8],
    ) -> Result<PathBuf, StorageError> {
        for counter in 1..=MAX_NAME_ATTEMPTS {
            let try_filename = if counter == 1 {
                format!("{}.json", stem)
            } else {
                format!("{}_{}.json", stem, counter)
            };
            let try_path = dir_path.join(&try_filename);

            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&try_path)
            {
                Ok(mut file) => {
                    file.write_all(content)
                        .map_err(|e| StorageError::WriteFile {
                            path: try_path.clone(),
                            source: e,
                        })?;
                    return Ok(try_path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(StorageError::WriteFile {
                        path: try_path,
                        source: e,
                    });
                }
            }
        }

        Err(StorageError::FileExists(dir_path.join(format!("{}.json", stem))))
    }

    fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        if !path.exists() {
            std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }
}

impl StorageService for FileStorage {
    /// Entries that fail to write are skipped and left out of the returned
    /// list; only an unusable owner directory fails the whole batch.
    fn save_batch(
        &self,
        owner: &JobOwner,
        entries: &[SaveEntry],
    ) -> Result<Vec<DocumentRecord>, StorageError> {
        let dir_path = self.owner_directory(owner);
        self.ensure_directory(&dir_path)?;

        let mut saved = Vec::with_capacity(entries.len());
        for entry in entries {
            match self.store(&dir_path, entry) {
                Ok(path) => {
                    debug!("Saved {} to {}", entry.file, path.display());
                    saved.push(entry.document.clone());
                }
                Err(e) => warn!("Failed to save {}: {}", entry.file, e),
            }
        }
        Ok(saved)
    }
}
