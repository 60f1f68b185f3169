//! Capture counters.
//!
//! Owned by the synchronizer rather than kept in process-wide atomics: each stream
//! carries its own numbers, and a snapshot is just a copy.
use serde::Serialize;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CaptureStats {
    /// Raw bytes fed in from the source.
    pub bytes_received: u64,
    /// Bytes appended to artifacts (finished or not).
    pub bytes_written: u64,
    pub frames_saved: u64,
    /// Sessions closed without an End marker.
    pub partial_frames: u64,
    /// Bytes dropped while idle, either ahead of a Start marker or by the idle bound.
    pub noise_discarded: u64,
    pub idle_trims: u64,
    pub capturing_trims: u64,
}

impl CaptureStats {
    /// One-line summary suitable for the shutdown log.
    pub fn summary(&self) -> String {
        format!(
            "frames={} partial={} received={}B written={}B noise={}B trims(idle/capturing)={}/{}",
            self.frames_saved,
            self.partial_frames,
            self.bytes_received,
            self.bytes_written,
            self.noise_discarded,
            self.idle_trims,
            self.capturing_trims
        )
    }
}
