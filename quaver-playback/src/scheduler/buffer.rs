//! Chained-buffer scheduler for continuous forward playback
//!
//! Playback starts with a small synchronously-read buffer so the render
//! node can begin within a fraction of a second, then a single-concurrency
//! worker keeps a larger lookahead buffer queued ahead of the render
//! position. Each render-thread buffer completion triggers the next
//! lookahead read, so hand-offs stay strictly FIFO per session.
//!
//! Every step that follows a disk read re-checks session currency before
//! handing audio to the render node: a slow read finishing after a newer
//! session began must drop its buffer on the floor.

use std::sync::Arc;

use tracing::{debug, info, warn};

use quaver_common::time;

use crate::clock::SeekClock;
use crate::config::PlaybackConfig;
use crate::error::{Error, Result};
use crate::render::RenderNode;
use crate::scheduler::worker::ScheduleWorker;
use crate::scheduler::{OutcomeSender, PlaybackOutcome};
use crate::session::{PlaybackSession, SessionRegistry};
use crate::track::ReadChunk;

/// Scheduler for normal (non-looping) playback
pub struct BufferScheduler {
    shared: Arc<BufferShared>,
}

struct BufferShared {
    node: Arc<dyn RenderNode>,
    sessions: Arc<SessionRegistry>,
    clock: SeekClock,
    worker: ScheduleWorker,
    outcomes: OutcomeSender,
    initial_buffer_seconds: f64,
    lookahead_buffer_seconds: f64,
}

impl BufferScheduler {
    pub fn new(
        node: Arc<dyn RenderNode>,
        sessions: Arc<SessionRegistry>,
        outcomes: OutcomeSender,
        config: &PlaybackConfig,
    ) -> Self {
        let clock = SeekClock::new(Arc::clone(&node));
        Self {
            shared: Arc::new(BufferShared {
                node,
                sessions,
                clock,
                worker: ScheduleWorker::new("buffer-scheduler"),
                outcomes,
                initial_buffer_seconds: config.initial_buffer_seconds,
                lookahead_buffer_seconds: config.lookahead_buffer_seconds,
            }),
        }
    }

    /// Begin playing the session's track from its start frame
    ///
    /// Schedules the initial small buffer, starts the render node, then
    /// hands lookahead scheduling to the worker.
    pub fn play(&self, session: &Arc<PlaybackSession>) -> Result<()> {
        info!(
            "Starting track {} (session {}, frame {})",
            session.track().track_id(),
            session.generation(),
            session.start_frame()
        );
        start_scheduling(&self.shared, session)
    }

    /// Stop, then begin scheduling from the session's seek target
    pub fn seek_to_time(&self, session: &Arc<PlaybackSession>, seconds: f64) -> Result<()> {
        debug_assert_eq!(
            session.start_frame(),
            session.track().frame_for_time(seconds),
            "session start frame must match the seek target"
        );
        info!(
            "Buffer seek to {:.3}s (session {})",
            seconds,
            session.generation()
        );
        self.stop();
        start_scheduling(&self.shared, session)
    }

    /// Halt playback: pause the node, drain the worker, then flush
    ///
    /// Ordering matters: pausing first silences output without discarding
    /// queued audio, draining guarantees no task is mid-hand-off when the
    /// node flushes, and the final stop discards whatever remains. A task
    /// that slipped a buffer in during the drain is flushed right here, and
    /// its completion callback fails the staleness check later.
    pub fn stop(&self) {
        debug!("Stopping buffer scheduler");
        self.shared.node.pause();
        self.shared.worker.cancel_pending_and_wait();
        self.shared.node.stop();
    }

    /// Suspend rendering without discarding scheduled audio
    pub fn pause(&self) {
        self.shared.node.pause();
    }

    /// Resume rendering
    pub fn resume(&self) {
        self.shared.node.play();
    }

    /// Current playback position of the session, in seconds
    pub fn seek_position(&self, session: &PlaybackSession) -> f64 {
        self.shared.clock.position_seconds(session)
    }
}

/// Read and schedule the initial buffer, start the node, submit lookahead
fn start_scheduling(shared: &Arc<BufferShared>, session: &Arc<PlaybackSession>) -> Result<()> {
    let track = Arc::clone(session.track());
    let rate = track.sample_rate();
    let start = session.start_frame();

    track
        .with_reader(|r| r.seek_to_frame(start))
        .map_err(|e| Error::TrackUnplayable(format!("seek to frame {} failed: {}", start, e)))?;

    let initial_frames = time::seconds_to_frames(shared.initial_buffer_seconds, rate).max(1);
    let chunk = track
        .with_reader(|r| r.read(initial_frames, None))
        .map_err(|e| Error::TrackUnplayable(format!("initial read failed: {}", e)))?;

    if chunk.reached_end {
        session.mark_scheduling_completed();
    }

    // Currency check after the disk read, before any hand-off
    if !shared.sessions.is_current(session) {
        debug!(
            "Session {} superseded during initial read; dropping buffer",
            session.generation()
        );
        return Ok(());
    }

    if chunk.pcm.is_empty() {
        if chunk.reached_end {
            // Zero-length span: nothing to render
            announce_completed(shared, session);
            return Ok(());
        }
        return Err(Error::TrackUnplayable(
            "reader returned no audio before end of file".to_string(),
        ));
    }

    hand_off(shared, session, chunk);
    shared.node.play();

    if !session.scheduling_completed() {
        submit_lookahead(shared, session);
    }
    Ok(())
}

/// Hand one chunk to the render node with its completion callback
fn hand_off(shared: &Arc<BufferShared>, session: &Arc<PlaybackSession>, chunk: ReadChunk) {
    let is_final = chunk.reached_end;
    if is_final {
        session.mark_scheduled_final();
    }
    session.increment_outstanding();

    debug!(
        "Scheduling {} frames for session {}{}",
        chunk.pcm.frames(),
        session.generation(),
        if is_final { " (final)" } else { "" }
    );

    let shared_cb = Arc::clone(shared);
    let session_cb = Arc::clone(session);
    shared.node.schedule_buffer(
        chunk.pcm,
        Box::new(move || on_buffer_complete(&shared_cb, &session_cb, is_final)),
    );
}

/// Render-thread buffer completion
///
/// If more audio remains to schedule, enqueue the next lookahead read;
/// if this was the last enqueued sample, publish completion.
fn on_buffer_complete(shared: &Arc<BufferShared>, session: &Arc<PlaybackSession>, is_final: bool) {
    let remaining = session.decrement_outstanding();

    if !shared.sessions.is_current(session) {
        debug!(
            "Stale buffer completion dropped (session {})",
            session.generation()
        );
        return;
    }

    if is_final {
        announce_completed(shared, session);
        return;
    }

    if session.scheduling_completed() {
        // EOF was discovered by an empty read, so no buffer carries the
        // final tag; the last scheduled buffer's completion announces.
        if !session.scheduled_final() && remaining == 0 {
            announce_completed(shared, session);
        }
        return;
    }

    submit_lookahead(shared, session);
}

/// Queue the next lookahead read on the worker
fn submit_lookahead(shared: &Arc<BufferShared>, session: &Arc<PlaybackSession>) {
    let shared_task = Arc::clone(shared);
    let session_task = Arc::clone(session);
    shared
        .worker
        .submit(Box::new(move || schedule_next_buffer(&shared_task, &session_task)));
}

/// Worker task: read the next lookahead chunk and hand it off
fn schedule_next_buffer(shared: &Arc<BufferShared>, session: &Arc<PlaybackSession>) {
    if !shared.sessions.is_current(session) {
        debug!(
            "Skipping lookahead for superseded session {}",
            session.generation()
        );
        return;
    }
    if session.scheduling_completed() {
        return;
    }

    let track = session.track();
    let rate = track.sample_rate();
    let frames = time::seconds_to_frames(shared.lookahead_buffer_seconds, rate).max(1);

    let chunk = match track.with_reader(|r| r.read(frames, None)) {
        Ok(chunk) => chunk,
        Err(e) => {
            if shared.sessions.is_current(session) {
                warn!(
                    "Lookahead read failed for track {}: {}",
                    track.track_id(),
                    e
                );
                let _ = shared.outcomes.send(PlaybackOutcome::TrackUnplayable {
                    generation: session.generation(),
                    track_id: track.track_id(),
                    reason: e.to_string(),
                });
            }
            return;
        }
    };

    if chunk.reached_end {
        session.mark_scheduling_completed();
    }

    // The read may have taken long enough for a seek to supersede us
    if !shared.sessions.is_current(session) {
        debug!(
            "Discarding lookahead read for stale session {}",
            session.generation()
        );
        return;
    }

    if chunk.pcm.is_empty() {
        // EOF landed exactly on the previous buffer's boundary. If the
        // render node already consumed everything, announce now; otherwise
        // the outstanding buffer's completion will.
        if chunk.reached_end && session.outstanding() == 0 {
            announce_completed(shared, session);
        }
        return;
    }

    hand_off(shared, session, chunk);
}

/// Publish TrackCompleted exactly once per session cycle
fn announce_completed(shared: &Arc<BufferShared>, session: &Arc<PlaybackSession>) {
    if session.mark_playback_completed() {
        debug!("Session {} playback completed", session.generation());
        let _ = shared.outcomes.send(PlaybackOutcome::TrackCompleted {
            generation: session.generation(),
            track_id: session.track().track_id(),
        });
    }
}
