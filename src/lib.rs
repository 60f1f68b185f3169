//! # Camcap - Serial Camera Frame Capture
//!
//! Camcap listens to a camera module (ESP32-CAM and friends) that dumps JPEG frames
//! over a plain UART with no framing, no flow control and boot/debug text mixed in.
//! It finds each frame by its SOI/EOI markers and writes it to disk exactly once.
//!
//! ## Features
//!
//! - **Marker Synchronization**: Recovers frames from arbitrarily chunked reads, including
//!   markers split across reads, and drops any text in front of a frame.
//! - **Incremental Writes**: Frame bytes go to disk as they arrive and are never written twice.
//! - **Bounded Memory**: Idle and capturing bounds keep the buffer small even when a frame
//!   never terminates.
//! - **Durable Output**: Every finished artifact is flushed and synced before it is reported.
//! - **Raw Log Mode**: Unframed passthrough capture for debugging the firmware console.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use camcap::config::Config;
//! use camcap::capture::FrameSynchronizer;
//! use camcap::runner::run_capture;
//! use camcap::source::ReaderSource;
//! use std::sync::atomic::AtomicBool;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     config.validate()?;
//!     let mut sync = FrameSynchronizer::new(config.capture.guard(), config.capture.namer())?;
//!     let mut source = ReaderSource::open("capture.bin".as_ref())?;
//!     let stop = AtomicBool::new(false);
//!     run_capture(&mut source, &mut sync, config.capture.chunk_size, &stop, |frame| {
//!         println!("Image saved: {} ({} bytes)", frame.path.display(), frame.size);
//!     })?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`capture`] - marker scanner, synchronizer, writer, overflow guard, naming
//! - [`source`] - byte sources (serial port, recorded files)
//! - [`runner`] - blocking capture and passthrough loops
//! - [`config`] - configuration management and validation
//! - [`metrics`] - per-stream capture counters
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   Byte Source   │ ← serial port / recorded stream
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │ Frame Sync +    │ ← marker scan, state machine, overflow guard
//! │ Overflow Guard  │
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │ Incremental     │ ← append-only artifact files
//! │ Writer          │
//! └─────────────────┘
//! ```

pub mod capture;
pub mod config;
pub mod logutil;
pub mod metrics;
pub mod runner;
pub mod source;
