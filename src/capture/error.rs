use std::path::PathBuf;

use thiserror::Error;

/// Errors that terminate a capture run.
///
/// Transport timeouts, missing markers and buffer trimming are steady-state behavior
/// of a noisy link and never show up here. Only sink IO failures, fatal transport
/// failures and bad configuration do.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Rejected tunable (cap smaller than a marker, zero chunk size, ...).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The artifact file could not be created.
    #[error("failed to open artifact {path}: {source}")]
    SinkOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Appending to an open artifact failed.
    #[error("failed to write artifact {path} after {committed} bytes: {source}")]
    SinkWrite {
        path: PathBuf,
        committed: u64,
        #[source]
        source: std::io::Error,
    },

    /// Flushing or syncing a finished artifact failed.
    #[error("failed to sync artifact {path} ({committed} bytes committed): {source}")]
    SinkSync {
        path: PathBuf,
        committed: u64,
        #[source]
        source: std::io::Error,
    },

    /// The byte source failed with something other than a timeout.
    #[error("byte source {name} failed: {source}")]
    Source {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

impl CaptureError {
    /// Artifact path involved in the failure, if any.
    pub fn artifact_path(&self) -> Option<&PathBuf> {
        match self {
            CaptureError::SinkOpen { path, .. }
            | CaptureError::SinkWrite { path, .. }
            | CaptureError::SinkSync { path, .. } => Some(path),
            _ => None,
        }
    }
}
