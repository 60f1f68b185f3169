//! Idle/Capturing state machine that turns chunked serial input into artifacts.
//!
//! Every chunk is appended to one accumulation buffer, which is then resolved as far as
//! possible:
//!
//! - **Idle**: look for SOI. Bytes in front of it (boot logs, `printf` output) are
//!   dropped. If none is found the idle bound applies and we wait for more input.
//! - **Capturing**: look for EOI. Everything up to and including it that has not yet
//!   reached the sink is appended, the artifact is synced and closed, and whatever
//!   follows EOI stays buffered so a frame sent right behind it is not lost. Without an
//!   EOI the new tail is appended and the capturing bound applies.
//!
//! SOI bytes seen while capturing are payload as far as this module is concerned; only
//! EOI ends a frame.
use bytes::{Buf, BytesMut};
use log::{debug, info, log_enabled, trace, warn, Level};

use super::error::CaptureError;
use super::guard::OverflowGuard;
use super::marker::{END_MARKER, START_MARKER};
use super::naming::ArtifactNamer;
use super::writer::{IncrementalWriter, PartialFrame, SavedFrame};
use crate::logutil::escape_log;
use crate::metrics::CaptureStats;

/// Longest noise preview written to the debug log.
const NOISE_PREVIEW: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Capturing,
}

/// The frame currently being written.
///
/// `committed` counts buffer bytes (from the current buffer front) already handed to
/// the writer. `trimmed` counts bytes of this frame dropped from the buffer by the
/// capturing bound after they were written. Together they always add up to the
/// writer's position.
#[derive(Debug)]
pub struct CaptureSession {
    writer: IncrementalWriter,
    committed: usize,
    trimmed: u64,
}

impl CaptureSession {
    pub fn committed(&self) -> usize {
        self.committed
    }

    pub fn trimmed(&self) -> u64 {
        self.trimmed
    }

    /// Bytes in the sink so far.
    pub fn written(&self) -> u64 {
        self.writer.position()
    }

    pub fn path(&self) -> &std::path::Path {
        self.writer.path()
    }

    pub fn invariant_holds(&self) -> bool {
        self.writer.position() == self.trimmed + self.committed as u64
    }
}

/// Owns the accumulation buffer and at most one open capture session.
#[derive(Debug)]
pub struct FrameSynchronizer {
    buf: BytesMut,
    session: Option<CaptureSession>,
    guard: OverflowGuard,
    namer: ArtifactNamer,
    stats: CaptureStats,
}

impl FrameSynchronizer {
    pub fn new(guard: OverflowGuard, namer: ArtifactNamer) -> Result<Self, CaptureError> {
        guard.validate()?;
        debug!(
            "Synchronizer ready: idle cap {} B, capturing cap {} B, {:?} naming",
            guard.idle_cap,
            guard.capturing_cap,
            namer.policy()
        );
        Ok(Self {
            buf: BytesMut::with_capacity(guard.idle_cap.min(64 * 1024)),
            session: None,
            guard,
            namer,
            stats: CaptureStats::default(),
        })
    }

    pub fn state(&self) -> SyncState {
        if self.session.is_some() {
            SyncState::Capturing
        } else {
            SyncState::Idle
        }
    }

    /// Bytes currently held in the accumulation buffer.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn session(&self) -> Option<&CaptureSession> {
        self.session.as_ref()
    }

    pub fn stats(&self) -> &CaptureStats {
        &self.stats
    }

    /// Append `chunk` and resolve every frame that can be completed with it.
    ///
    /// Frames come back in stream order. An empty chunk is a no-op.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<SavedFrame>, CaptureError> {
        let mut saved = Vec::new();
        if chunk.is_empty() {
            return Ok(saved);
        }
        self.buf.extend_from_slice(chunk);
        self.stats.bytes_received += chunk.len() as u64;

        loop {
            if self.session.is_none() && !self.begin_if_start_found()? {
                let dropped = self.guard.trim_idle(&mut self.buf);
                if dropped > 0 {
                    self.stats.noise_discarded += dropped as u64;
                    self.stats.idle_trims += 1;
                    trace!("No frame start yet; dropped {} idle bytes", dropped);
                }
                break;
            }
            match self.advance_capture()? {
                Some(frame) => saved.push(frame),
                None => break,
            }
        }
        Ok(saved)
    }

    /// Close any open session without an End marker, leaving the partial artifact on disk.
    pub fn shutdown(&mut self) -> Result<Option<PartialFrame>, CaptureError> {
        let Some(session) = self.session.take() else {
            return Ok(None);
        };
        let partial = session.writer.abandon()?;
        self.stats.partial_frames += 1;
        warn!(
            "Capture stopped mid-frame: {} left incomplete ({} bytes)",
            partial.path.display(),
            partial.size
        );
        Ok(Some(partial))
    }

    fn begin_if_start_found(&mut self) -> Result<bool, CaptureError> {
        let Some(start) = START_MARKER.find_in(&self.buf, 0) else {
            return Ok(false);
        };
        if start > 0 {
            if log_enabled!(Level::Debug) {
                let preview = String::from_utf8_lossy(&self.buf[..start.min(NOISE_PREVIEW + 1)]);
                debug!(
                    "Discarding {} bytes ahead of frame start: {}",
                    start,
                    escape_log(&preview, NOISE_PREVIEW)
                );
            }
            self.buf.advance(start);
            self.stats.noise_discarded += start as u64;
        }

        let (sequence, path) = self.namer.next_path();
        let writer = IncrementalWriter::create(&path, sequence)?;
        debug!(
            "Frame #{} started ({:?} marker at buffer front)",
            writer.sequence(),
            START_MARKER.role
        );
        self.session = Some(CaptureSession {
            writer,
            committed: 0,
            trimmed: 0,
        });
        Ok(true)
    }

    fn advance_capture(&mut self) -> Result<Option<SavedFrame>, CaptureError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(None);
        };

        // Anything before this point was already scanned on an earlier feed.
        let resume = session.committed.saturating_sub(END_MARKER.len() - 1);
        let Some(end) = END_MARKER.find_in(&self.buf, resume) else {
            if self.buf.len() > session.committed {
                let fresh = &self.buf[session.committed..];
                session.writer.append(fresh)?;
                self.stats.bytes_written += fresh.len() as u64;
                session.committed = self.buf.len();
            }
            let dropped = self.guard.trim_capturing(&mut self.buf, session.committed);
            if dropped > 0 {
                session.committed -= dropped;
                session.trimmed += dropped as u64;
                self.stats.capturing_trims += 1;
                trace!(
                    "{} still open after {} bytes; trimmed {} from buffer",
                    session.path().display(),
                    session.written(),
                    dropped
                );
            }
            debug_assert!(session.invariant_holds());
            return Ok(None);
        };

        let stop = end + END_MARKER.len();
        if stop > session.committed {
            let fresh = &self.buf[session.committed..stop];
            session.writer.append(fresh)?;
            self.stats.bytes_written += fresh.len() as u64;
            session.committed = stop;
        }
        debug_assert!(session.invariant_holds());
        self.buf.advance(stop);

        let Some(session) = self.session.take() else {
            return Ok(None);
        };
        let frame = session.writer.finalize()?;
        self.stats.frames_saved += 1;
        info!("Image saved: {} ({} bytes)", frame.path.display(), frame.size);
        Ok(Some(frame))
    }
}

impl Drop for FrameSynchronizer {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("Failed to close partial artifact: {}", e);
        }
    }
}
