//! Atomic-segment scheduler with completion polling
//!
//! Buffer chaining is ideal for continuous forward playback but awkward for
//! exact loop restarts and for stopping precisely at a non-EOF boundary.
//! This scheduler instead hands the render node one contiguous frame span
//! per logical unit (track tail after a seek, or a loop span) and detects
//! its end by polling elapsed position against the known boundary.
//!
//! Both completion signals — the render-thread callback and the poll — feed
//! one per-segment once-path (`finish_segment`), so loop restart and
//! track-advance logic is written once regardless of which source fired.
//! The poll is the signal that actually lands when the render callback is
//! delayed or suppressed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use quaver_common::time;

use crate::clock::SeekClock;
use crate::config::PlaybackConfig;
use crate::render::RenderNode;
use crate::scheduler::{OutcomeSender, PlaybackOutcome};
use crate::session::{PlaybackSession, SessionRegistry};

/// Scheduler for seek and loop playback
///
/// Must be created within a Tokio runtime: the completion poll runs on
/// spawned timer tasks.
pub struct SegmentScheduler {
    shared: Arc<SegmentShared>,
}

struct SegmentShared {
    node: Arc<dyn RenderNode>,
    sessions: Arc<SessionRegistry>,
    clock: SeekClock,
    outcomes: OutcomeSender,
    rt: tokio::runtime::Handle,
    poll_interval: Duration,
    tolerance: f64,

    /// Render node and poll timer move in lockstep through this flag: a
    /// paused poll must not spuriously detect completion.
    paused: AtomicBool,

    active: Mutex<Option<ActiveSegment>>,
}

/// Bookkeeping for the segment currently handed to the render node
struct ActiveSegment {
    session: Arc<PlaybackSession>,
    /// Position (seconds) at which this segment ends
    boundary: f64,
    /// Per-segment once-flag unifying callback- and poll-detected completion
    finished: Arc<AtomicBool>,
    poll_running: bool,
}

impl SegmentScheduler {
    pub fn new(
        node: Arc<dyn RenderNode>,
        sessions: Arc<SessionRegistry>,
        outcomes: OutcomeSender,
        config: &PlaybackConfig,
    ) -> Self {
        let clock = SeekClock::new(Arc::clone(&node));
        Self {
            shared: Arc::new(SegmentShared {
                node,
                sessions,
                clock,
                outcomes,
                rt: tokio::runtime::Handle::current(),
                poll_interval: time::millis_to_duration(config.completion_poll_interval_ms),
                tolerance: config.completion_tolerance_seconds,
                paused: AtomicBool::new(false),
                active: Mutex::new(None),
            }),
        }
    }

    /// Stop current playback and schedule a fresh segment from the seek
    /// target to the track end (or to the loop end, when the session
    /// carries a complete loop)
    pub fn seek_to_time(
        &self,
        session: &Arc<PlaybackSession>,
        seconds: f64,
        begin_playback: bool,
    ) {
        debug_assert_eq!(
            session.start_frame(),
            session.track().frame_for_time(seconds),
            "session start frame must match the seek target"
        );
        info!(
            "Segment seek to {:.3}s (session {}, begin={})",
            seconds,
            session.generation(),
            begin_playback
        );
        self.shared.node.stop();
        schedule_span(&self.shared, session, session.start_frame(), begin_playback);
    }

    /// Resume ordinary single-shot scheduling after a loop was removed
    ///
    /// Schedules from the old loop's end point to the track end.
    pub fn end_loop(&self, session: &Arc<PlaybackSession>, loop_end_time: f64) {
        debug_assert!(
            session.complete_loop().is_none(),
            "end_loop session must not carry a loop"
        );
        info!(
            "Loop removed; resuming single-shot playback from {:.3}s (session {})",
            loop_end_time,
            session.generation()
        );
        let begin = !self.shared.paused.load(Ordering::SeqCst);
        self.shared.node.stop();
        schedule_span(&self.shared, session, session.start_frame(), begin);
    }

    /// Pause the render node and the poll timer together
    pub fn pause(&self) {
        self.shared.paused.store(true, Ordering::SeqCst);
        self.shared.node.pause();
        debug!("Segment scheduler paused");
    }

    /// Resume the render node and the poll timer together
    pub fn resume(&self) {
        self.shared.node.play();
        self.shared.paused.store(false, Ordering::SeqCst);
        ensure_polling(&self.shared);
        debug!("Segment scheduler resumed");
    }

    /// Stop playback and discard the active segment
    pub fn stop(&self) {
        debug!("Stopping segment scheduler");
        if let Some(segment) = self.shared.active.lock().unwrap().take() {
            // Kills the poll task and neutralizes the flushed segment's
            // completion callback
            segment.finished.store(true, Ordering::SeqCst);
        }
        self.shared.node.stop();
    }

    /// Current playback position of the session, in seconds
    pub fn seek_position(&self, session: &PlaybackSession) -> f64 {
        self.shared.clock.position_seconds(session)
    }
}

/// Hand one frame span to the render node and arm completion detection
fn schedule_span(
    shared: &Arc<SegmentShared>,
    session: &Arc<PlaybackSession>,
    first_frame: u64,
    begin_playback: bool,
) {
    // Pause state settles first so any completion fired below (zero-length
    // span) observes it
    shared.paused.store(!begin_playback, Ordering::SeqCst);

    let track = Arc::clone(session.track());
    let rate = track.sample_rate();

    let (last_frame, boundary) = match session.complete_loop() {
        Some(lp) => (
            lp.end_frame(rate)
                .unwrap_or(track.total_frames())
                .min(track.total_frames()),
            lp.end_time.unwrap_or_else(|| track.duration()),
        ),
        None => (track.total_frames(), track.duration()),
    };

    let first = first_frame.min(last_frame);
    session.set_cached_position(time::frames_to_seconds(first, rate));

    let finished = Arc::new(AtomicBool::new(false));
    {
        let mut active = shared.active.lock().unwrap();
        *active = Some(ActiveSegment {
            session: Arc::clone(session),
            boundary,
            finished: Arc::clone(&finished),
            poll_running: false,
        });
    }

    let frame_count = last_frame - first;
    if frame_count == 0 {
        debug!(
            "Zero-length segment for session {}; completing immediately",
            session.generation()
        );
        finish_segment(shared, session, &finished);
        return;
    }

    debug!(
        "Scheduling segment [{}, {}] ({} frames) for session {}",
        first,
        last_frame,
        frame_count,
        session.generation()
    );

    let shared_cb = Arc::clone(shared);
    let session_cb = Arc::clone(session);
    let finished_cb = Arc::clone(&finished);
    shared.node.schedule_segment(
        track,
        first,
        frame_count,
        Box::new(move || finish_segment(&shared_cb, &session_cb, &finished_cb)),
    );

    if begin_playback {
        shared.node.play();
        ensure_polling(shared);
    }
}

/// Start the completion poll for the active segment, if not already running
///
/// The poll is armed only once the segment has been handed to a playing
/// node; while scheduled-but-paused, completion detection stays off.
fn ensure_polling(shared: &Arc<SegmentShared>) {
    let (session, finished, boundary) = {
        let mut active = shared.active.lock().unwrap();
        let Some(segment) = active.as_mut() else {
            return;
        };
        if segment.poll_running || segment.finished.load(Ordering::SeqCst) {
            return;
        }
        segment.poll_running = true;
        (
            Arc::clone(&segment.session),
            Arc::clone(&segment.finished),
            segment.boundary,
        )
    };

    let shared_poll = Arc::clone(shared);
    shared.rt.spawn(async move {
        let mut interval = tokio::time::interval(shared_poll.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            if finished.load(Ordering::SeqCst) {
                break;
            }
            if !shared_poll.sessions.is_current(&session) {
                debug!(
                    "Poll ending: session {} superseded",
                    session.generation()
                );
                break;
            }
            if shared_poll.paused.load(Ordering::SeqCst) {
                continue;
            }

            let position = shared_poll.clock.position_seconds(&session);
            if position + shared_poll.tolerance >= boundary {
                debug!(
                    "Poll detected segment boundary ({:.3}s vs {:.3}s)",
                    position, boundary
                );
                finish_segment(&shared_poll, &session, &finished);
                break;
            }
        }
    });
}

/// Unified "segment finished" path
///
/// Render callback and poll both land here; the once-flag makes the first
/// signal win and the second a no-op. While a complete loop is active this
/// restarts the span instead of propagating completion — the only place a
/// completion event re-invokes the scheduler.
fn finish_segment(
    shared: &Arc<SegmentShared>,
    session: &Arc<PlaybackSession>,
    finished: &Arc<AtomicBool>,
) {
    if finished.swap(true, Ordering::SeqCst) {
        return;
    }
    if !shared.sessions.is_current(session) {
        debug!(
            "Stale segment completion dropped (session {})",
            session.generation()
        );
        return;
    }

    session.mark_scheduling_completed();

    match session.complete_loop() {
        Some(lp) => {
            let rate = session.track().sample_rate();
            let first = lp.start_frame(rate);
            let last = lp.end_frame(rate).unwrap_or(first);

            if last <= first {
                // Loop span shorter than one frame: restarting would spin
                warn!(
                    "Loop [{:.3}s, {:?}s] spans no frames; completing track",
                    lp.start_time, lp.end_time
                );
                announce_completed(shared, session);
                return;
            }

            info!(
                "Loop reached {:.3}s; restarting at {:.3}s (session {})",
                lp.end_time.unwrap_or_default(),
                lp.start_time,
                session.generation()
            );

            shared.node.stop();
            session.reset_completion();
            session.set_start_frame(first);

            let begin = !shared.paused.load(Ordering::SeqCst);
            schedule_span(shared, session, first, begin);

            let _ = shared.outcomes.send(PlaybackOutcome::LoopRestarted {
                generation: session.generation(),
                track_id: session.track().track_id(),
                start_time: lp.start_time,
            });
        }
        None => announce_completed(shared, session),
    }
}

/// Publish TrackCompleted exactly once per session cycle
fn announce_completed(shared: &Arc<SegmentShared>, session: &Arc<PlaybackSession>) {
    if session.mark_playback_completed() {
        debug!("Session {} segment playback completed", session.generation());
        let _ = shared.outcomes.send(PlaybackOutcome::TrackCompleted {
            generation: session.generation(),
            track_id: session.track().track_id(),
        });
    }
}
