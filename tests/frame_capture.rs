//! End-to-end frame extraction: chunking, noise, back-to-back frames and bounds.

use camcap::capture::{ArtifactNamer, FrameSynchronizer, NamingPolicy, OverflowGuard, SavedFrame};
use std::path::Path;

const SCENARIO_FRAME: [u8; 8] = [0xFF, 0xD8, 0x41, 0x41, 0x41, 0x41, 0xFF, 0xD9];

fn synchronizer(dir: &Path) -> FrameSynchronizer {
    let namer = ArtifactNamer::new(dir, "frame.jpg", NamingPolicy::Sequence);
    FrameSynchronizer::new(OverflowGuard::default(), namer).expect("valid guard")
}

fn feed_all(sync: &mut FrameSynchronizer, chunks: &[&[u8]]) -> Vec<SavedFrame> {
    let mut out = Vec::new();
    for chunk in chunks {
        out.extend(sync.feed(chunk).expect("feed"));
    }
    out
}

fn fake_jpeg(payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8];
    out.extend_from_slice(payload);
    out.extend_from_slice(&[0xFF, 0xD9]);
    out
}

#[test]
fn single_read_produces_one_exact_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let mut sync = synchronizer(dir.path());
    let frames = feed_all(&mut sync, &[&SCENARIO_FRAME[..]]);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].size, 8);
    assert_eq!(std::fs::read(&frames[0].path).unwrap(), SCENARIO_FRAME);
}

#[test]
fn two_reads_produce_identical_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let mut sync = synchronizer(dir.path());
    let frames = feed_all(&mut sync, &[&SCENARIO_FRAME[..4], &SCENARIO_FRAME[4..]]);
    assert_eq!(frames.len(), 1);
    assert_eq!(std::fs::read(&frames[0].path).unwrap(), SCENARIO_FRAME);
}

#[test]
fn every_split_point_yields_the_same_artifact() {
    let mut stream = b"[CAM] boot\r\n".to_vec();
    let frame = fake_jpeg(b"\x00\x11\xFF\x22\xFF\xD8\x33");
    stream.extend_from_slice(&frame);
    stream.extend_from_slice(b"[MAIN] Sending Photo Complete\r\n");

    for split_a in 0..=stream.len() {
        for split_b in split_a..=stream.len() {
            let dir = tempfile::tempdir().unwrap();
            let mut sync = synchronizer(dir.path());
            let frames = feed_all(
                &mut sync,
                &[
                    &stream[..split_a],
                    &stream[split_a..split_b],
                    &stream[split_b..],
                ],
            );
            assert_eq!(frames.len(), 1, "splits at {} and {}", split_a, split_b);
            assert_eq!(
                std::fs::read(&frames[0].path).unwrap(),
                frame,
                "splits at {} and {}",
                split_a,
                split_b
            );
        }
    }
}

#[test]
fn byte_at_a_time_matches_single_read() {
    let dir = tempfile::tempdir().unwrap();
    let mut sync = synchronizer(dir.path());
    let mut frames = Vec::new();
    for b in SCENARIO_FRAME.iter() {
        frames.extend(sync.feed(std::slice::from_ref(b)).unwrap());
        if let Some(session) = sync.session() {
            assert!(session.invariant_holds());
        }
    }
    assert_eq!(frames.len(), 1);
    assert_eq!(std::fs::read(&frames[0].path).unwrap(), SCENARIO_FRAME);
}

#[test]
fn leading_garbage_never_reaches_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let mut sync = synchronizer(dir.path());
    let mut input = b"garbage".to_vec();
    input.extend_from_slice(&[0xFF, 0xD8, 0x42, 0x42, 0xFF, 0xD9]);
    let frames = feed_all(&mut sync, &[&input[..]]);
    assert_eq!(frames.len(), 1);
    let content = std::fs::read(&frames[0].path).unwrap();
    assert_eq!(content, vec![0xFF, 0xD8, 0x42, 0x42, 0xFF, 0xD9]);
    assert!(!content.windows(7).any(|w| w == b"garbage"));
    assert_eq!(sync.stats().noise_discarded, 7);
}

#[test]
fn back_to_back_frames_come_out_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut sync = synchronizer(dir.path());
    let first = fake_jpeg(b"first");
    let second = fake_jpeg(b"second");
    let mut input = first.clone();
    input.extend_from_slice(&second);

    let frames = feed_all(&mut sync, &[&input[..]]);
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].sequence, 1);
    assert_eq!(frames[1].sequence, 2);
    assert_eq!(std::fs::read(&frames[0].path).unwrap(), first);
    assert_eq!(std::fs::read(&frames[1].path).unwrap(), second);
}

#[test]
fn back_to_back_frames_across_reads() {
    let dir = tempfile::tempdir().unwrap();
    let mut sync = synchronizer(dir.path());
    let first = fake_jpeg(&[0x10; 40]);
    let second = fake_jpeg(&[0x20; 40]);
    let mut input = first.clone();
    input.extend_from_slice(b"[MAIN] Sending Photo Complete\r\n");
    input.extend_from_slice(&second);

    let chunks: Vec<&[u8]> = input.chunks(7).collect();
    let frames = feed_all(&mut sync, &chunks);
    assert_eq!(frames.len(), 2);
    assert_eq!(std::fs::read(&frames[0].path).unwrap(), first);
    assert_eq!(std::fs::read(&frames[1].path).unwrap(), second);
}

#[test]
fn overwrite_policy_keeps_only_latest_frame() {
    let dir = tempfile::tempdir().unwrap();
    let namer = ArtifactNamer::new(dir.path(), "latest.jpg", NamingPolicy::Overwrite);
    let mut sync = FrameSynchronizer::new(OverflowGuard::default(), namer).unwrap();
    let mut input = fake_jpeg(b"older frame");
    input.extend_from_slice(&fake_jpeg(b"new"));

    let frames = feed_all(&mut sync, &[&input[..]]);
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].path, frames[1].path);
    assert_eq!(
        std::fs::read(dir.path().join("latest.jpg")).unwrap(),
        fake_jpeg(b"new")
    );
}

#[test]
fn timestamp_policy_gives_back_to_back_frames_their_own_files() {
    let dir = tempfile::tempdir().unwrap();
    let namer = ArtifactNamer::new(dir.path(), "cam.jpg", NamingPolicy::Timestamp);
    let mut sync = FrameSynchronizer::new(OverflowGuard::default(), namer).unwrap();
    let first = fake_jpeg(b"first");
    let second = fake_jpeg(b"second");
    let mut input = first.clone();
    input.extend_from_slice(&second);

    let frames = feed_all(&mut sync, &[&input[..]]);
    assert_eq!(frames.len(), 2);
    assert_ne!(frames[0].path, frames[1].path);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    assert_eq!(std::fs::read(&frames[0].path).unwrap(), first);
    assert_eq!(std::fs::read(&frames[1].path).unwrap(), second);
}

#[test]
fn stream_without_start_marker_stays_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let mut sync = synchronizer(dir.path());
    let noise: Vec<u8> = (0..5000u32).map(|i| (i % 200) as u8).collect();
    for chunk in noise.chunks(256) {
        assert!(sync.feed(chunk).unwrap().is_empty());
        assert!(sync.buffered() <= 1024);
    }
    assert_eq!(sync.stats().frames_saved, 0);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn long_frame_is_bounded_and_still_exact() {
    let dir = tempfile::tempdir().unwrap();
    let namer = ArtifactNamer::new(dir.path(), "long.jpg", NamingPolicy::Sequence);
    let guard = OverflowGuard::new(64, 256).unwrap();
    let mut sync = FrameSynchronizer::new(guard, namer).unwrap();

    let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 250) as u8).collect();
    let frame = fake_jpeg(&payload);
    let mut frames = Vec::new();
    for chunk in frame.chunks(100) {
        frames.extend(sync.feed(chunk).unwrap());
        assert!(sync.buffered() <= 256 + 100);
        if let Some(session) = sync.session() {
            assert!(session.invariant_holds());
        }
    }
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].size, frame.len() as u64);
    assert_eq!(std::fs::read(&frames[0].path).unwrap(), frame);
}

#[test]
fn unterminated_frame_is_left_on_disk_at_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let mut sync = synchronizer(dir.path());
    let frames = feed_all(&mut sync, &[&b"log\xFF\xD8abc"[..], &b"def"[..]]);
    assert!(frames.is_empty());
    let partial = sync.shutdown().unwrap().expect("partial");
    assert_eq!(std::fs::read(&partial.path).unwrap(), b"\xFF\xD8abcdef");
}
