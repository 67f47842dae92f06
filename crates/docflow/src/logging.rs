//! Subscriber setup for hosts that do not install their own.

use std::str::FromStr;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::DocflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = DocflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(DocflowError::Logging(format!("unknown log format '{}'", other))),
        }
    }
}

/// Builds the filter from `RUST_LOG`, falling back to `default_filter`.
pub fn env_filter(default_filter: &str) -> Result<EnvFilter, DocflowError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(default_filter)
            .map_err(|e| DocflowError::Logging(format!("invalid filter '{}': {}", default_filter, e))),
    }
}

/// Installs the global tracing subscriber and routes `log` records into it.
///
/// Fails if a global subscriber or logger is already installed.
pub fn init_logging(format: LogFormat, default_filter: &str) -> Result<(), DocflowError> {
    let filter = env_filter(default_filter)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match format {
        LogFormat::Pretty => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().with_target(true).with_thread_names(true)),
        ),
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().json().with_current_span(true)),
        ),
    };
    installed.map_err(|e| DocflowError::Logging(e.to_string()))?;

    tracing_log::LogTracer::init().map_err(|e| DocflowError::Logging(e.to_string()))?;
    Ok(())
}
