//! Behavioral tests for the chained-buffer scheduler
//!
//! Drives BufferScheduler against mock reader/render collaborators:
//! initial + lookahead scheduling, completion chaining, staleness guards,
//! stop ordering, and disk failure handling.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use helpers::{
    prepared_track, prepared_track_with_reader, wait_until, MockNode, MockReader, NodeOp,
    TEST_RATE,
};
use quaver_playback::config::PlaybackConfig;
use quaver_playback::scheduler::{outcome_channel, BufferScheduler, PlaybackOutcome};
use quaver_playback::session::SessionRegistry;

fn test_config() -> PlaybackConfig {
    PlaybackConfig::default() // 2s initial, 10s lookahead
}

const WAIT: Duration = Duration::from_secs(5);

#[test]
fn test_play_schedules_initial_buffer_and_starts_node() {
    let node = MockNode::new();
    let sessions = Arc::new(SessionRegistry::new());
    let (tx, _rx) = outcome_channel();
    let scheduler = BufferScheduler::new(node.clone(), Arc::clone(&sessions), tx, &test_config());

    let session = sessions.begin(prepared_track(100.0), 0.0, None);
    scheduler.play(&session).unwrap();

    // Initial 2s buffer handed off synchronously, node playing
    let buffers = node.scheduled_buffers();
    assert_eq!(buffers[0], 2 * TEST_RATE as u64);
    assert!(node.is_playing());

    // Lookahead (10s) follows via the worker
    assert!(wait_until(WAIT, || node.scheduled_buffers().len() == 2));
    assert_eq!(node.scheduled_buffers()[1], 10 * TEST_RATE as u64);
}

#[test]
fn test_completion_chain_reaches_track_end() {
    // 5s track: 2s initial + 3s final lookahead
    let node = MockNode::new();
    let sessions = Arc::new(SessionRegistry::new());
    let (tx, mut rx) = outcome_channel();
    let scheduler = BufferScheduler::new(node.clone(), Arc::clone(&sessions), tx, &test_config());

    let session = sessions.begin(prepared_track(5.0), 0.0, None);
    scheduler.play(&session).unwrap();

    assert!(wait_until(WAIT, || node.pending_completions() == 2));
    assert!(session.scheduling_completed());

    // First (non-final) completion does not announce
    assert!(node.complete_oldest());
    assert!(rx.try_recv().is_err());
    assert!(!session.playback_completed());

    // Final completion announces exactly once
    assert!(node.complete_oldest());
    assert!(session.playback_completed());
    match rx.try_recv().unwrap() {
        PlaybackOutcome::TrackCompleted { generation, .. } => {
            assert_eq!(generation, session.generation());
        }
        other => panic!("Expected TrackCompleted, got {:?}", other),
    }
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_track_shorter_than_initial_buffer() {
    // 1s track fits in the initial read entirely
    let node = MockNode::new();
    let sessions = Arc::new(SessionRegistry::new());
    let (tx, mut rx) = outcome_channel();
    let scheduler = BufferScheduler::new(node.clone(), Arc::clone(&sessions), tx, &test_config());

    let session = sessions.begin(prepared_track(1.0), 0.0, None);
    scheduler.play(&session).unwrap();

    assert_eq!(node.scheduled_buffers(), vec![TEST_RATE as u64]);
    assert!(session.scheduling_completed());

    assert!(node.complete_oldest());
    assert!(matches!(
        rx.try_recv().unwrap(),
        PlaybackOutcome::TrackCompleted { .. }
    ));
    // No lookahead was ever scheduled
    assert_eq!(node.scheduled_buffers().len(), 1);
}

#[test]
fn test_stale_completion_is_dropped() {
    let node = MockNode::new();
    let sessions = Arc::new(SessionRegistry::new());
    let (tx, mut rx) = outcome_channel();
    let scheduler = BufferScheduler::new(node.clone(), Arc::clone(&sessions), tx, &test_config());

    let stale = sessions.begin(prepared_track(100.0), 0.0, None);
    scheduler.play(&stale).unwrap();
    assert!(wait_until(WAIT, || node.scheduled_buffers().len() == 2));

    // Supersede without going through the scheduler
    let _current = sessions.begin(prepared_track(100.0), 0.0, None);

    // Stale completions must neither announce nor schedule more audio
    let before = node.scheduled_buffers().len();
    assert!(node.complete_oldest());
    assert!(node.complete_oldest());
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(node.scheduled_buffers().len(), before);
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_slow_read_completing_after_supersede_drops_buffer() {
    let node = MockNode::new();
    let sessions = Arc::new(SessionRegistry::new());
    let (tx, mut rx) = outcome_channel();
    let scheduler = BufferScheduler::new(node.clone(), Arc::clone(&sessions), tx, &test_config());

    // Lookahead reads stall 150ms, long enough to supersede mid-read
    let track = prepared_track_with_reader(
        100.0,
        Box::new(MockReader::with_delay(
            100 * TEST_RATE as u64,
            Duration::from_millis(150),
        )),
    );
    let session = sessions.begin(track, 0.0, None);
    scheduler.play(&session).unwrap();
    assert_eq!(node.scheduled_buffers().len(), 1);

    // Supersede while the lookahead read is (or is about to be) in flight
    std::thread::sleep(Duration::from_millis(30));
    let _current = sessions.begin(prepared_track(100.0), 0.0, None);

    // The slow read finishes but its buffer is discarded
    std::thread::sleep(Duration::from_millis(400));
    assert_eq!(node.scheduled_buffers().len(), 1);
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_stop_ordering_pause_drain_flush() {
    let node = MockNode::new();
    let sessions = Arc::new(SessionRegistry::new());
    let (tx, _rx) = outcome_channel();
    let scheduler = BufferScheduler::new(node.clone(), Arc::clone(&sessions), tx, &test_config());

    let session = sessions.begin(prepared_track(100.0), 0.0, None);
    scheduler.play(&session).unwrap();
    assert!(wait_until(WAIT, || node.pending_completions() == 2));

    scheduler.stop();

    // Pause (no flush) strictly precedes the final stop/flush
    let ops = node.ops();
    let pause_at = ops.iter().rposition(|op| *op == NodeOp::Pause).unwrap();
    let stop_at = ops.iter().rposition(|op| *op == NodeOp::Stop).unwrap();
    assert!(pause_at < stop_at, "expected pause before stop in {:?}", ops);

    // Queued audio was flushed, not completed
    assert_eq!(node.flushed_count(), 2);
    assert_eq!(node.pending_completions(), 0);
    assert!(!node.is_playing());
}

#[test]
fn test_seek_restarts_from_target_frame() {
    let node = MockNode::new();
    let sessions = Arc::new(SessionRegistry::new());
    let (tx, _rx) = outcome_channel();
    let scheduler = BufferScheduler::new(node.clone(), Arc::clone(&sessions), tx, &test_config());

    let reader = MockReader::new(100 * TEST_RATE as u64);
    let log = reader.log_handle();
    let track = prepared_track_with_reader(100.0, Box::new(reader));

    let session = sessions.begin(Arc::clone(&track), 0.0, None);
    scheduler.play(&session).unwrap();
    assert!(wait_until(WAIT, || node.scheduled_buffers().len() == 2));

    // Seek to 30s: a new session, scheduling restarts at the target frame
    let seek_session = sessions.begin(track, 30.0, None);
    scheduler.seek_to_time(&seek_session, 30.0).unwrap();

    let expected_frame = 30 * TEST_RATE as u64;
    assert_eq!(seek_session.start_frame(), expected_frame);
    assert!(wait_until(WAIT, || {
        log.lock().unwrap().iter().any(|&(pos, _)| pos == expected_frame)
    }));

    // Old queued audio was flushed before the new session's hand-offs
    let ops = node.ops();
    let stop_at = ops.iter().position(|op| *op == NodeOp::Stop).unwrap();
    let buffers_after_stop = ops[stop_at..]
        .iter()
        .filter(|op| matches!(op, NodeOp::ScheduleBuffer { .. }))
        .count();
    assert!(buffers_after_stop >= 1);
}

#[test]
fn test_disk_failure_reports_track_unplayable() {
    let node = MockNode::new();
    let sessions = Arc::new(SessionRegistry::new());
    let (tx, mut rx) = outcome_channel();
    let scheduler = BufferScheduler::new(node.clone(), Arc::clone(&sessions), tx, &test_config());

    // Initial read succeeds, the lookahead read fails
    let track = prepared_track_with_reader(
        100.0,
        Box::new(MockReader::failing_after(100 * TEST_RATE as u64, 1)),
    );
    let session = sessions.begin(track, 0.0, None);
    scheduler.play(&session).unwrap();

    assert!(wait_until(WAIT, || matches!(
        rx.try_recv(),
        Ok(PlaybackOutcome::TrackUnplayable { .. })
    )));
    // The failed read scheduled nothing further
    assert_eq!(node.scheduled_buffers().len(), 1);
}

#[test]
fn test_initial_read_failure_is_an_error() {
    let node = MockNode::new();
    let sessions = Arc::new(SessionRegistry::new());
    let (tx, _rx) = outcome_channel();
    let scheduler = BufferScheduler::new(node.clone(), Arc::clone(&sessions), tx, &test_config());

    let track = prepared_track_with_reader(
        100.0,
        Box::new(MockReader::failing_after(100 * TEST_RATE as u64, 0)),
    );
    let session = sessions.begin(track, 0.0, None);

    assert!(scheduler.play(&session).is_err());
    // Nothing was handed to the node
    assert!(node.scheduled_buffers().is_empty());
}

#[test]
fn test_seek_position_tracks_render_clock() {
    let node = MockNode::new();
    let sessions = Arc::new(SessionRegistry::new());
    let (tx, _rx) = outcome_channel();
    let scheduler = BufferScheduler::new(node.clone(), Arc::clone(&sessions), tx, &test_config());

    let session = sessions.begin(prepared_track(100.0), 10.0, None);
    // Clock unavailable before the node starts: cached start stands in
    assert_eq!(scheduler.seek_position(&session), 10.0);

    scheduler.play(&session).unwrap();
    node.set_sample_time(5 * TEST_RATE as u64);
    assert!((scheduler.seek_position(&session) - 15.0).abs() < 1e-6);
}
