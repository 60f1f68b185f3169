//! Append-only artifact sink bound to one capture session.
//!
//! The writer never seeks. Its position is a counter kept alongside the file rather
//! than read back from the OS, so the synchronizer's dedup bookkeeping does not depend
//! on the storage having a cursor at all.
use chrono::{DateTime, Utc};
use log::{debug, trace};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::error::CaptureError;

/// Completion notice for one finished artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedFrame {
    /// 1-based frame number within this run.
    pub sequence: u64,
    pub path: PathBuf,
    /// Byte size of the artifact, Start marker through End marker inclusive.
    pub size: u64,
    /// Hex SHA-256 of the artifact content.
    pub sha256: String,
    pub completed_at: DateTime<Utc>,
}

/// What was left on disk when a session ended without an End marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartialFrame {
    pub sequence: u64,
    pub path: PathBuf,
    pub size: u64,
}

pub struct IncrementalWriter {
    sequence: u64,
    path: PathBuf,
    out: BufWriter<File>,
    position: u64,
    hasher: Sha256,
}

impl std::fmt::Debug for IncrementalWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncrementalWriter")
            .field("sequence", &self.sequence)
            .field("path", &self.path)
            .field("position", &self.position)
            .finish()
    }
}

impl IncrementalWriter {
    /// Create (or truncate) the artifact at `path`, creating parent directories.
    pub fn create(path: &Path, sequence: u64) -> Result<Self, CaptureError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| CaptureError::SinkOpen {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let file = File::create(path).map_err(|source| CaptureError::SinkOpen {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Opened artifact {} (frame #{})", path.display(), sequence);
        Ok(Self {
            sequence,
            path: path.to_path_buf(),
            out: BufWriter::new(file),
            position: 0,
            hasher: Sha256::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Bytes appended so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Append `bytes` at the current position.
    pub fn append(&mut self, bytes: &[u8]) -> Result<(), CaptureError> {
        if bytes.is_empty() {
            return Ok(());
        }
        self.out
            .write_all(bytes)
            .map_err(|source| CaptureError::SinkWrite {
                path: self.path.clone(),
                committed: self.position,
                source,
            })?;
        self.hasher.update(bytes);
        self.position += bytes.len() as u64;
        trace!(
            "Appended {} bytes to {} (now {})",
            bytes.len(),
            self.path.display(),
            self.position
        );
        Ok(())
    }

    /// Flush, sync to stable storage and close. Any failing step fails the whole call.
    pub fn finalize(mut self) -> Result<SavedFrame, CaptureError> {
        self.flush_and_sync()?;
        let IncrementalWriter {
            sequence,
            path,
            out,
            position,
            hasher,
        } = self;
        // Buffer is already empty; dropping the inner file closes it.
        drop(out);
        Ok(SavedFrame {
            sequence,
            path,
            size: position,
            sha256: format!("{:x}", hasher.finalize()),
            completed_at: Utc::now(),
        })
    }

    /// Best-effort close of an unfinished artifact. The file stays on disk as written.
    pub fn abandon(mut self) -> Result<PartialFrame, CaptureError> {
        let result = self.flush_and_sync();
        let partial = PartialFrame {
            sequence: self.sequence,
            path: self.path.clone(),
            size: self.position,
        };
        result.map(|_| partial)
    }

    fn flush_and_sync(&mut self) -> Result<(), CaptureError> {
        self.out.flush().map_err(|e| self.sync_error(e))?;
        self.out.get_ref().sync_all().map_err(|e| self.sync_error(e))?;
        Ok(())
    }

    fn sync_error(&self, source: std::io::Error) -> CaptureError {
        CaptureError::SinkSync {
            path: self.path.clone(),
            committed: self.position,
            source,
        }
    }
}
