//! Blocking read loops driving a [`ByteSource`].
//!
//! Both loops check the stop flag once per iteration, so a Ctrl-C is honored within one
//! read timeout. They are meant to run on a blocking thread (`spawn_blocking`).
use log::{debug, error, info, log_enabled, trace, Level};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::capture::{CaptureError, FrameSynchronizer, PartialFrame, SavedFrame};
use crate::logutil::hex_snippet;
use crate::metrics::CaptureStats;
use crate::source::{is_quiet_error, ByteSource};

/// Why a loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The stop flag was raised.
    Cancelled,
    /// The source ran dry (replayed file finished).
    SourceExhausted,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub reason: StopReason,
    pub stats: CaptureStats,
    /// Artifact left incomplete when the loop ended mid-frame.
    pub partial: Option<PartialFrame>,
}

/// Feed `source` into `sync` until stopped, calling `on_frame` for every finished frame.
///
/// On every exit path the open session, if any, is closed and left on disk. A sink
/// failure or a non-timeout source failure ends the run with that error after cleanup.
pub fn run_capture<S, F>(
    source: &mut S,
    sync: &mut FrameSynchronizer,
    chunk_size: usize,
    stop: &AtomicBool,
    mut on_frame: F,
) -> Result<RunSummary, CaptureError>
where
    S: ByteSource + ?Sized,
    F: FnMut(&SavedFrame),
{
    if chunk_size == 0 {
        return Err(CaptureError::InvalidConfig(
            "chunk_size must be greater than zero".to_string(),
        ));
    }
    info!("Listening on {}", source.describe());
    let mut chunk = vec![0u8; chunk_size];

    let outcome = loop {
        if stop.load(Ordering::SeqCst) {
            break Ok(StopReason::Cancelled);
        }
        if source.is_exhausted() {
            break Ok(StopReason::SourceExhausted);
        }
        let n = match source.read_chunk(&mut chunk) {
            Ok(n) => n,
            Err(ref e) if is_quiet_error(e) => 0,
            Err(e) => {
                break Err(CaptureError::Source {
                    name: source.describe(),
                    source: e,
                })
            }
        };
        if n == 0 {
            continue;
        }
        if log_enabled!(Level::Trace) {
            trace!("RAW {} bytes: {}", n, hex_snippet(&chunk[..n], 32));
        }
        match sync.feed(&chunk[..n]) {
            Ok(frames) => frames.iter().for_each(&mut on_frame),
            Err(e) => break Err(e),
        }
    };

    let closed = sync.shutdown();
    match outcome {
        Ok(reason) => {
            let partial = closed?;
            info!("Capture stopped ({:?}): {}", reason, sync.stats().summary());
            Ok(RunSummary {
                reason,
                stats: *sync.stats(),
                partial,
            })
        }
        Err(e) => {
            if let Err(close_err) = closed {
                error!("Closing artifact after failure also failed: {}", close_err);
            }
            Err(e)
        }
    }
}

/// Append every received byte to `out_path`, unframed. Returns the byte count.
pub fn run_passthrough<S>(
    source: &mut S,
    out_path: &Path,
    chunk_size: usize,
    stop: &AtomicBool,
) -> Result<u64, CaptureError>
where
    S: ByteSource + ?Sized,
{
    if chunk_size == 0 {
        return Err(CaptureError::InvalidConfig(
            "chunk_size must be greater than zero".to_string(),
        ));
    }
    if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| CaptureError::SinkOpen {
            path: out_path.to_path_buf(),
            source,
        })?;
    }
    let mut out = OpenOptions::new()
        .create(true)
        .append(true)
        .open(out_path)
        .map_err(|source| CaptureError::SinkOpen {
            path: out_path.to_path_buf(),
            source,
        })?;
    info!(
        "Logging raw bytes from {} to {}",
        source.describe(),
        out_path.display()
    );

    let mut chunk = vec![0u8; chunk_size];
    let mut total: u64 = 0;
    while !stop.load(Ordering::SeqCst) && !source.is_exhausted() {
        let n = match source.read_chunk(&mut chunk) {
            Ok(n) => n,
            Err(ref e) if is_quiet_error(e) => 0,
            Err(e) => {
                // Keep what was logged before the link died.
                if let Err(sync_err) = out.sync_all() {
                    error!("Failed to sync {}: {}", out_path.display(), sync_err);
                }
                return Err(CaptureError::Source {
                    name: source.describe(),
                    source: e,
                });
            }
        };
        if n == 0 {
            continue;
        }
        out.write_all(&chunk[..n])
            .map_err(|source| CaptureError::SinkWrite {
                path: out_path.to_path_buf(),
                committed: total,
                source,
            })?;
        total += n as u64;
    }
    out.sync_all().map_err(|source| CaptureError::SinkSync {
        path: out_path.to_path_buf(),
        committed: total,
        source,
    })?;
    debug!("Raw log closed after {} bytes", total);
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{ArtifactNamer, NamingPolicy, OverflowGuard};
    use crate::source::ReaderSource;
    use std::io;

    /// Hands out scripted reads, then raises the stop flag.
    struct Scripted<'a> {
        reads: Vec<io::Result<Vec<u8>>>,
        stop: &'a AtomicBool,
    }

    impl ByteSource for Scripted<'_> {
        fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.reads.is_empty() {
                self.stop.store(true, Ordering::SeqCst);
                return Ok(0);
            }
            let data = self.reads.remove(0)?;
            buf[..data.len()].copy_from_slice(&data);
            Ok(data.len())
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    fn synchronizer(dir: &Path) -> FrameSynchronizer {
        let namer = ArtifactNamer::new(dir, "frame.jpg", NamingPolicy::Sequence);
        FrameSynchronizer::new(OverflowGuard::default(), namer).unwrap()
    }

    #[test]
    fn timeouts_and_empty_reads_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let stop = AtomicBool::new(false);
        let mut source = Scripted {
            reads: vec![
                Err(io::Error::from(io::ErrorKind::TimedOut)),
                Ok(vec![0xFF, 0xD8, 0x01]),
                Ok(vec![]),
                Ok(vec![0x02, 0xFF, 0xD9]),
            ],
            stop: &stop,
        };
        let mut sync = synchronizer(dir.path());
        let mut seen = Vec::new();
        let summary = run_capture(&mut source, &mut sync, 64, &stop, |f| seen.push(f.size)).unwrap();
        assert_eq!(summary.reason, StopReason::Cancelled);
        assert_eq!(seen, vec![6]);
        assert!(summary.partial.is_none());
    }

    #[test]
    fn cancellation_mid_frame_leaves_partial() {
        let dir = tempfile::tempdir().unwrap();
        let stop = AtomicBool::new(false);
        let mut source = Scripted {
            reads: vec![Ok(b"noise\xFF\xD8half".to_vec())],
            stop: &stop,
        };
        let mut sync = synchronizer(dir.path());
        let summary = run_capture(&mut source, &mut sync, 64, &stop, |_| {}).unwrap();
        let partial = summary.partial.expect("partial artifact");
        assert_eq!(std::fs::read(&partial.path).unwrap(), b"\xFF\xD8half");
        assert_eq!(summary.stats.partial_frames, 1);
    }

    #[test]
    fn source_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let stop = AtomicBool::new(false);
        let mut source = Scripted {
            reads: vec![
                Ok(vec![0xFF, 0xD8, 0x01]),
                Err(io::Error::from(io::ErrorKind::BrokenPipe)),
            ],
            stop: &stop,
        };
        let mut sync = synchronizer(dir.path());
        let err = run_capture(&mut source, &mut sync, 64, &stop, |_| {}).unwrap_err();
        assert!(matches!(err, CaptureError::Source { .. }));
        // The open frame was still closed on the way out.
        assert!(sync.session().is_none());
        assert_eq!(sync.stats().partial_frames, 1);
    }

    #[test]
    fn sink_open_failure_stops_the_run() {
        let dir = tempfile::tempdir().unwrap();
        // The output "directory" is a regular file, so no artifact can be created under it.
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"occupied").unwrap();

        let stop = AtomicBool::new(false);
        let mut source = Scripted {
            reads: vec![
                Ok(b"boot\xFF\xD8abc".to_vec()),
                Ok(b"\xFF\xD9".to_vec()),
            ],
            stop: &stop,
        };
        let mut sync = synchronizer(&blocker);
        let mut seen = 0;
        let err = run_capture(&mut source, &mut sync, 64, &stop, |_| seen += 1).unwrap_err();

        assert!(matches!(err, CaptureError::SinkOpen { .. }), "{:?}", err);
        assert_eq!(
            err.artifact_path().map(|p| p.as_path()),
            Some(blocker.join("frame-000001.jpg").as_path())
        );
        assert_eq!(seen, 0);
        assert!(sync.session().is_none());
        // The second read was never taken.
        assert_eq!(source.reads.len(), 1);
        assert_eq!(sync.stats().frames_saved, 0);
    }

    #[test]
    fn passthrough_keeps_logged_bytes_on_source_failure() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("serial.log");
        let stop = AtomicBool::new(false);
        let mut source = Scripted {
            reads: vec![
                Ok(b"[MAIN] Begin setup\r\n".to_vec()),
                Err(io::Error::from(io::ErrorKind::BrokenPipe)),
            ],
            stop: &stop,
        };
        let err = run_passthrough(&mut source, &out, 64, &stop).unwrap_err();
        assert!(matches!(err, CaptureError::Source { .. }));
        assert_eq!(std::fs::read(&out).unwrap(), b"[MAIN] Begin setup\r\n");
    }

    #[test]
    fn replay_stops_at_end_of_input() {
        let dir = tempfile::tempdir().unwrap();
        let stop = AtomicBool::new(false);
        let data = b"\xFF\xD8one\xFF\xD9\xFF\xD8two\xFF\xD9".to_vec();
        let mut source = ReaderSource::new("mem", io::Cursor::new(data));
        let mut sync = synchronizer(dir.path());
        let summary = run_capture(&mut source, &mut sync, 3, &stop, |_| {}).unwrap();
        assert_eq!(summary.reason, StopReason::SourceExhausted);
        assert_eq!(summary.stats.frames_saved, 2);
    }

    #[test]
    fn passthrough_appends_raw_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("logs/serial.log");
        std::fs::create_dir_all(out.parent().unwrap()).unwrap();
        std::fs::write(&out, b"earlier\n").unwrap();

        let stop = AtomicBool::new(false);
        let mut source = ReaderSource::new("mem", &b"[MAIN] Begin setup\r\n\xFF\xD8"[..]);
        let n = run_passthrough(&mut source, &out, 4, &stop).unwrap();
        assert_eq!(n, 22);
        assert_eq!(
            std::fs::read(&out).unwrap(),
            b"earlier\n[MAIN] Begin setup\r\n\xFF\xD8".to_vec()
        );
    }
}
