//! # Frame Capture Module
//!
//! Reassembles JPEG frames from an unframed, flow-control-free serial stream and
//! persists each finished frame exactly once.
//!
//! ## Components
//!
//! - [`marker`] - SOI/EOI constants and the subsequence scanner
//! - [`sync`] - the Idle/Capturing state machine owning the accumulation buffer
//! - [`writer`] - append-only artifact sink with durable finalize
//! - [`guard`] - idle and capturing bounds on buffer growth
//! - [`naming`] - destination naming policy
//!
//! ## Usage
//!
//! ```rust,no_run
//! use camcap::capture::{ArtifactNamer, FrameSynchronizer, NamingPolicy, OverflowGuard};
//!
//! # fn main() -> Result<(), camcap::capture::CaptureError> {
//! let namer = ArtifactNamer::new("captures", "latest.jpg", NamingPolicy::Sequence);
//! let mut sync = FrameSynchronizer::new(OverflowGuard::default(), namer)?;
//! for frame in sync.feed(b"boot log\n\xFF\xD8...\xFF\xD9")? {
//!     println!("Image saved: {} ({} bytes)", frame.path.display(), frame.size);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod guard;
pub mod marker;
pub mod naming;
pub mod sync;
pub mod writer;

pub use error::CaptureError;
pub use guard::OverflowGuard;
pub use marker::{find_marker, ByteMarker, MarkerRole, END_MARKER, START_MARKER};
pub use naming::{ArtifactNamer, NamingPolicy};
pub use sync::{CaptureSession, FrameSynchronizer, SyncState};
pub use writer::{IncrementalWriter, PartialFrame, SavedFrame};
