//! Frame delimiters and the subsequence search used to locate them.
//!
//! The camera emits each JPEG between SOI (`FF D8`) and EOI (`FF D9`). The scanner
//! matches raw bytes only; nothing is escaped or aligned on the wire.
use memchr::memmem;

/// Which end of a frame a marker delimits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerRole {
    Start,
    End,
}

/// Fixed byte sequence delimiting a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteMarker {
    pub role: MarkerRole,
    bytes: &'static [u8],
}

/// JPEG start-of-image.
pub const START_MARKER: ByteMarker = ByteMarker {
    role: MarkerRole::Start,
    bytes: &[0xFF, 0xD8],
};

/// JPEG end-of-image.
pub const END_MARKER: ByteMarker = ByteMarker {
    role: MarkerRole::End,
    bytes: &[0xFF, 0xD9],
};

impl ByteMarker {
    pub fn as_bytes(&self) -> &'static [u8] {
        self.bytes
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Lowest index >= `offset` at which this marker occurs in `buf`.
    pub fn find_in(&self, buf: &[u8], offset: usize) -> Option<usize> {
        find_marker(buf, self.as_bytes(), offset)
    }
}

/// Return the lowest index >= `offset` where `marker` occurs contiguously in `buf`.
///
/// Pure; an offset at or past the end of `buf` yields `None`.
pub fn find_marker(buf: &[u8], marker: &[u8], offset: usize) -> Option<usize> {
    if offset >= buf.len() {
        return None;
    }
    memmem::find(&buf[offset..], marker).map(|pos| pos + offset)
}
