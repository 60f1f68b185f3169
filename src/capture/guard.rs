//! Bounds on accumulation buffer growth.
//!
//! Only bytes that can no longer change the outcome are dropped: while idle that is
//! noise older than the last `idle_cap` bytes, while capturing it is the front of the
//! buffer that has already been committed to the sink.
use bytes::{Buf, BytesMut};

use super::error::CaptureError;
use super::marker::{END_MARKER, START_MARKER};

/// Default bound while searching for a Start marker.
pub const DEFAULT_IDLE_CAP: usize = 1024;
/// Default bound while searching for an End marker.
pub const DEFAULT_CAPTURING_CAP: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverflowGuard {
    pub idle_cap: usize,
    pub capturing_cap: usize,
}

impl Default for OverflowGuard {
    fn default() -> Self {
        Self {
            idle_cap: DEFAULT_IDLE_CAP,
            capturing_cap: DEFAULT_CAPTURING_CAP,
        }
    }
}

impl OverflowGuard {
    pub fn new(idle_cap: usize, capturing_cap: usize) -> Result<Self, CaptureError> {
        let guard = Self {
            idle_cap,
            capturing_cap,
        };
        guard.validate()?;
        Ok(guard)
    }

    /// Caps below a marker length could cut a marker in half forever.
    pub fn validate(&self) -> Result<(), CaptureError> {
        let min = START_MARKER.len().max(END_MARKER.len());
        if self.idle_cap < min {
            return Err(CaptureError::InvalidConfig(format!(
                "idle_cap {} is smaller than the {}-byte marker",
                self.idle_cap, min
            )));
        }
        if self.capturing_cap < min {
            return Err(CaptureError::InvalidConfig(format!(
                "capturing_cap {} is smaller than the {}-byte marker",
                self.capturing_cap, min
            )));
        }
        Ok(())
    }

    /// Keep only the last `idle_cap` bytes. Returns how many were dropped.
    pub fn trim_idle(&self, buf: &mut BytesMut) -> usize {
        let len = buf.len();
        trim_front(buf, self.idle_cap, len)
    }

    /// Keep only the last `capturing_cap` bytes, never dropping past `committed`.
    /// Returns how many were dropped; the caller lowers its commit offset by that much.
    pub fn trim_capturing(&self, buf: &mut BytesMut, committed: usize) -> usize {
        trim_front(buf, self.capturing_cap, committed)
    }
}

fn trim_front(buf: &mut BytesMut, cap: usize, limit: usize) -> usize {
    if buf.len() <= cap {
        return 0;
    }
    let excess = (buf.len() - cap).min(limit);
    buf.advance(excess);
    excess
}
