use std::path::Path;

use crate::config::schema::{EngineConfig, MAX_WORKERS};
use crate::error::ConfigError;

/// Loads an engine config from disk. `.yaml`/`.yml` files are read as YAML,
/// everything else as JSON.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<EngineConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
        .unwrap_or(false);

    if is_yaml {
        let config: EngineConfig = serde_yaml::from_str(&content)?;
        validate_config(&config)?;
        Ok(config)
    } else {
        load_config_from_str(&content)
    }
}

pub fn load_config_from_str(content: &str) -> Result<EngineConfig, ConfigError> {
    let config: EngineConfig = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

pub fn validate_config(config: &EngineConfig) -> Result<(), ConfigError> {
    if config.persist_chunk_size == 0 {
        return Err(ConfigError::Validation {
            message: "persist_chunk_size must be greater than 0".to_string(),
        });
    }

    if config.item_timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "item_timeout_secs must be greater than 0".to_string(),
        });
    }

    if config.progress_channel_capacity == 0 {
        return Err(ConfigError::Validation {
            message: "progress_channel_capacity must be greater than 0".to_string(),
        });
    }

    if config.max_entry_bytes == 0 {
        return Err(ConfigError::Validation {
            message: "max_entry_bytes must be greater than 0".to_string(),
        });
    }

    let document_ext = config.document_extension.trim_start_matches('.');
    let archive_ext = config.archive_extension.trim_start_matches('.');
    if document_ext.is_empty() || archive_ext.is_empty() {
        return Err(ConfigError::Validation {
            message: "document_extension and archive_extension must not be empty".to_string(),
        });
    }
    if document_ext.eq_ignore_ascii_case(archive_ext) {
        return Err(ConfigError::Validation {
            message: format!(
                "document_extension and archive_extension must differ (both '{}')",
                document_ext
            ),
        });
    }

    if config.worker_count > MAX_WORKERS {
        log::warn!(
            "worker_count {} exceeds the maximum of {}, it will be capped",
            config.worker_count,
            MAX_WORKERS
        );
    }

    Ok(())
}
