//! Playback engine - lifecycle and orchestration
//!
//! The engine is the thin coordinator between the sequencer (which decides
//! what plays next) and the schedulers (which make it play). It resolves
//! sequencer answers into prepared tracks, chooses the buffer scheduler for
//! plain forward playback and the segment scheduler for seek/loop spans,
//! reacts to scheduler outcomes, and republishes outward events.
//!
//! All policy lives elsewhere: the sequencer never touches a scheduler,
//! and the schedulers never pick tracks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use quaver_common::events::{PlaybackState, PlayerEvent, PositionInfo};
use quaver_common::{time, PlaybackModes, RepeatMode, ShuffleMode};
use uuid::Uuid;

use crate::config::PlaybackConfig;
use crate::error::{Error, Result};
use crate::library::{GroupKind, Library};
use crate::render::RenderNode;
use crate::scheduler::{
    outcome_channel, BufferScheduler, LoopController, OutcomeReceiver, PlaybackOutcome,
    SegmentScheduler,
};
use crate::sequencer::{PlaybackSequencer, SequenceScope, SequencedTrack};
use crate::session::{PlaybackSession, SessionRegistry};
use crate::state::{CurrentTrack, SharedState};
use crate::track::TrackOpener;

/// Which scheduler owns the current session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScheduleMode {
    /// Chained buffers: plain forward playback
    Buffered,
    /// Atomic segment + poll: seek and loop playback
    Segment,
}

/// Playback engine - orchestrates sequencing and scheduling
///
/// Must be created within a Tokio runtime.
pub struct PlaybackEngine {
    library: Arc<dyn Library>,
    opener: Arc<dyn TrackOpener>,
    state: Arc<SharedState>,
    config: PlaybackConfig,
    sessions: Arc<SessionRegistry>,
    buffers: BufferScheduler,
    segments: SegmentScheduler,
    sequencer: Mutex<PlaybackSequencer>,
    loops: Mutex<LoopController>,
    mode: Mutex<ScheduleMode>,
    /// Taken by `start`
    outcome_rx: Mutex<Option<OutcomeReceiver>>,
    running: AtomicBool,
}

impl PlaybackEngine {
    pub fn new(
        library: Arc<dyn Library>,
        opener: Arc<dyn TrackOpener>,
        node: Arc<dyn RenderNode>,
        config: PlaybackConfig,
    ) -> Arc<Self> {
        Self::build(library, opener, node, config, None)
    }

    /// Engine with deterministic shuffle draws (tests)
    pub fn with_sequencer_seed(
        library: Arc<dyn Library>,
        opener: Arc<dyn TrackOpener>,
        node: Arc<dyn RenderNode>,
        config: PlaybackConfig,
        seed: u64,
    ) -> Arc<Self> {
        Self::build(library, opener, node, config, Some(seed))
    }

    fn build(
        library: Arc<dyn Library>,
        opener: Arc<dyn TrackOpener>,
        node: Arc<dyn RenderNode>,
        config: PlaybackConfig,
        seed: Option<u64>,
    ) -> Arc<Self> {
        let config = config.validated();
        info!("Creating playback engine");

        let state = Arc::new(SharedState::new(config.event_channel_capacity));
        let sessions = Arc::new(SessionRegistry::new());
        let (outcome_tx, outcome_rx) = outcome_channel();

        let buffers = BufferScheduler::new(
            Arc::clone(&node),
            Arc::clone(&sessions),
            outcome_tx.clone(),
            &config,
        );
        let segments = SegmentScheduler::new(
            Arc::clone(&node),
            Arc::clone(&sessions),
            outcome_tx,
            &config,
        );

        let sequencer = match seed {
            Some(seed) => PlaybackSequencer::with_seed(Arc::clone(&library), seed),
            None => PlaybackSequencer::new(Arc::clone(&library)),
        };

        Arc::new(Self {
            library,
            opener,
            state,
            config,
            sessions,
            buffers,
            segments,
            sequencer: Mutex::new(sequencer),
            loops: Mutex::new(LoopController::new()),
            mode: Mutex::new(ScheduleMode::Buffered),
            outcome_rx: Mutex::new(Some(outcome_rx)),
            running: AtomicBool::new(false),
        })
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<PlayerEvent> {
        self.state.subscribe_events()
    }

    pub fn library(&self) -> &Arc<dyn Library> {
        &self.library
    }

    /// Spawn the outcome handler and the position update loop
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(mut rx) = self.outcome_rx.lock().unwrap().take() else {
            return;
        };

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(outcome) = rx.recv().await {
                if !engine.running.load(Ordering::SeqCst) {
                    break;
                }
                engine.handle_outcome(outcome).await;
            }
            debug!("Outcome handler exiting");
        });

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(time::millis_to_duration(
                engine.config.position_update_interval_ms,
            ));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                if !engine.running.load(Ordering::SeqCst) {
                    break;
                }
                if engine.state.get_playback_state().await != PlaybackState::Playing {
                    continue;
                }
                let Some(session) = engine.sessions.current() else {
                    continue;
                };
                let position = engine.position_for(&session);
                engine.state.emit_event(PlayerEvent::PositionUpdate {
                    track_id: session.track().track_id(),
                    position: PositionInfo {
                        position,
                        duration: session.track().duration(),
                    },
                    timestamp: time::now(),
                });
            }
            debug!("Position update loop exiting");
        });

        info!("Playback engine started");
    }

    /// Stop background loops and playback
    pub async fn shutdown(&self) {
        info!("Shutting down playback engine");
        self.running.store(false, Ordering::SeqCst);
        self.stop().await;
    }

    // ------------------------------------------------------------------
    // Sequencing entry points
    // ------------------------------------------------------------------

    /// Start playing the given scope from its beginning
    pub async fn begin(&self, scope: SequenceScope) {
        let first = { self.sequencer.lock().unwrap().begin(scope) };
        self.advance(first, None).await;
    }

    /// Skip to the following track
    pub async fn next(&self) {
        let previous = self.current_track_id().await;
        let candidate = { self.sequencer.lock().unwrap().next() };
        self.advance(candidate, previous).await;
    }

    /// Step back to the preceding track
    pub async fn previous(&self) {
        let previous = self.current_track_id().await;
        let candidate = { self.sequencer.lock().unwrap().previous() };
        self.advance(candidate, previous).await;
    }

    /// Play a specific track, re-scoping auto-advance to its context
    pub async fn select_track(&self, scope: SequenceScope, track_id: Uuid) {
        let previous = self.current_track_id().await;
        let selected = { self.sequencer.lock().unwrap().select_track(scope, track_id) };
        match selected {
            Some(st) => self.advance(Some(st), previous).await,
            None => warn!("Selected track {} is not in scope {}", track_id, scope),
        }
    }

    /// Play a group from its first (or shuffled) track
    pub async fn select_group(&self, kind: GroupKind, group: usize) {
        let previous = self.current_track_id().await;
        let first = { self.sequencer.lock().unwrap().select_group(kind, group) };
        self.advance(first, previous).await;
    }

    pub fn modes(&self) -> PlaybackModes {
        self.sequencer.lock().unwrap().modes()
    }

    pub fn set_modes(&self, modes: PlaybackModes) {
        self.sequencer.lock().unwrap().set_modes(modes);
    }

    pub fn set_repeat(&self, repeat: RepeatMode) {
        self.sequencer.lock().unwrap().set_repeat(repeat);
    }

    pub fn set_shuffle(&self, shuffle: ShuffleMode) {
        self.sequencer.lock().unwrap().set_shuffle(shuffle);
    }

    /// Library mutation notifications, forwarded to the sequencer
    pub fn tracks_added(&self) {
        self.sequencer.lock().unwrap().tracks_added();
    }

    pub fn tracks_removed(&self) {
        self.sequencer.lock().unwrap().tracks_removed();
    }

    pub fn reordered(&self) {
        self.sequencer.lock().unwrap().reordered();
    }

    pub fn cleared(&self) {
        self.sequencer.lock().unwrap().cleared();
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    pub async fn pause(&self) {
        if self.state.get_playback_state().await != PlaybackState::Playing {
            return;
        }
        match *self.mode.lock().unwrap() {
            ScheduleMode::Buffered => self.buffers.pause(),
            ScheduleMode::Segment => self.segments.pause(),
        }
        self.set_playback_state(PlaybackState::Paused).await;
    }

    pub async fn resume(&self) {
        if self.state.get_playback_state().await != PlaybackState::Paused {
            return;
        }
        match *self.mode.lock().unwrap() {
            ScheduleMode::Buffered => self.buffers.resume(),
            ScheduleMode::Segment => self.segments.resume(),
        }
        self.set_playback_state(PlaybackState::Playing).await;
    }

    /// Stop playback entirely
    pub async fn stop(&self) {
        self.stop_schedulers();
        self.sessions.clear();
        self.loops.lock().unwrap().reset();
        self.state.set_current_track(None).await;
        self.set_playback_state(PlaybackState::Stopped).await;
    }

    /// Seek within the current track
    ///
    /// Targets beyond the track end are clamped; a clamped-to-end seek
    /// completes the track through the normal path. An active complete
    /// loop keeps bounding playback across the seek.
    pub async fn seek(&self, seconds: f64) -> Result<()> {
        if !seconds.is_finite() {
            return Err(Error::InvalidSeek(format!("seek target {:?}", seconds)));
        }
        let session = self
            .sessions
            .current()
            .ok_or_else(|| Error::InvalidState("cannot seek: no track playing".to_string()))?;
        let track = Arc::clone(session.track());

        let target = track.clamp_seconds(seconds);
        if (target - seconds).abs() > 1e-9 {
            warn!(
                "Seek target {:.3}s clamped to {:.3}s (duration {:.3}s)",
                seconds,
                target,
                track.duration()
            );
        }

        let loop_span = self.loops.lock().unwrap().active_loop();
        let playing = self.state.get_playback_state().await == PlaybackState::Playing;

        // Leaving buffered mode: drain its worker before the segment path
        // flushes the node
        if *self.mode.lock().unwrap() == ScheduleMode::Buffered {
            self.buffers.stop();
        }

        let new_session = self.sessions.begin(track, target, loop_span);
        *self.mode.lock().unwrap() = ScheduleMode::Segment;
        self.segments.seek_to_time(&new_session, target, playing);
        Ok(())
    }

    /// Current playback position, if a track is active
    pub async fn position(&self) -> Option<PositionInfo> {
        let session = self.sessions.current()?;
        Some(PositionInfo {
            position: self.position_for(&session),
            duration: session.track().duration(),
        })
    }

    // ------------------------------------------------------------------
    // A–B loop
    // ------------------------------------------------------------------

    /// Mark the loop start point at the current position
    ///
    /// No scheduling change: the loop only bounds playback once complete.
    pub async fn loop_mark_start(&self) -> Result<()> {
        let session = self
            .sessions
            .current()
            .ok_or_else(|| Error::InvalidState("cannot mark loop: no track playing".to_string()))?;
        let position = self.position_for(&session);
        self.loops.lock().unwrap().mark_start(position)
    }

    /// Mark the loop end point at the current position, engaging the loop
    ///
    /// Scheduling flips to segment mode bounded by the loop; playback
    /// continues from the current position, so marking the end at the
    /// boundary immediately restarts from the start point.
    pub async fn loop_mark_end(&self) -> Result<()> {
        let session = self
            .sessions
            .current()
            .ok_or_else(|| Error::InvalidState("cannot mark loop: no track playing".to_string()))?;
        let track = Arc::clone(session.track());
        let position = self.position_for(&session);

        let lp = self.loops.lock().unwrap().mark_end(position)?;
        self.state.emit_event(PlayerEvent::LoopEngaged {
            track_id: track.track_id(),
            start_time: lp.start_time,
            end_time: position,
            timestamp: time::now(),
        });

        let playing = self.state.get_playback_state().await == PlaybackState::Playing;
        if *self.mode.lock().unwrap() == ScheduleMode::Buffered {
            self.buffers.stop();
        }

        let target = track.clamp_seconds(position);
        let new_session = self.sessions.begin(track, target, Some(lp));
        *self.mode.lock().unwrap() = ScheduleMode::Segment;
        self.segments.seek_to_time(&new_session, target, playing);
        Ok(())
    }

    /// Clear the loop; playback resumes single-shot from the old end point
    pub async fn loop_clear(&self) -> Result<()> {
        let cleared = self.loops.lock().unwrap().clear();
        let Some(lp) = cleared else {
            // Nothing was bounding playback
            return Ok(());
        };
        let Some(session) = self.sessions.current() else {
            return Ok(());
        };
        let track = Arc::clone(session.track());

        self.state.emit_event(PlayerEvent::LoopDisengaged {
            track_id: track.track_id(),
            timestamp: time::now(),
        });

        let end = track.clamp_seconds(lp.end_time.unwrap_or(lp.start_time));
        let new_session = self.sessions.begin(track, end, None);
        *self.mode.lock().unwrap() = ScheduleMode::Segment;
        self.segments.end_loop(&new_session, end);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn current_track_id(&self) -> Option<Uuid> {
        self.state.get_current_track().await.map(|c| c.track_id)
    }

    fn position_for(&self, session: &PlaybackSession) -> f64 {
        match *self.mode.lock().unwrap() {
            ScheduleMode::Buffered => self.buffers.seek_position(session),
            ScheduleMode::Segment => self.segments.seek_position(session),
        }
    }

    fn stop_schedulers(&self) {
        self.buffers.stop();
        self.segments.stop();
    }

    async fn set_playback_state(&self, new_state: PlaybackState) {
        let old_state = self.state.set_playback_state(new_state).await;
        if old_state != new_state {
            self.state.emit_event(PlayerEvent::PlaybackStateChanged {
                old_state,
                new_state,
                timestamp: time::now(),
            });
        }
    }

    /// Announce the transition and start the candidate, skipping over
    /// unplayable tracks
    async fn advance(&self, candidate: Option<SequencedTrack>, previous: Option<Uuid>) {
        self.state.emit_event(PlayerEvent::TrackChanged {
            previous_track_id: previous,
            next_track_id: candidate.map(|c| c.track_id),
            timestamp: time::now(),
        });

        // Bounded so a sequence of entirely unplayable tracks (which a
        // wrapping repeat mode would revisit forever) still halts
        let max_attempts = { self.sequencer.lock().unwrap().size() } + 1;
        let mut attempts = 0usize;

        let mut candidate = candidate;
        loop {
            let Some(st) = candidate else {
                self.halt_sequence().await;
                return;
            };
            match self.try_start(st).await {
                Ok(()) => return,
                Err(e) => {
                    warn!("Track {} unplayable: {}", st.track_id, e);
                    self.state.emit_event(PlayerEvent::TrackUnplayable {
                        track_id: st.track_id,
                        reason: e.to_string(),
                        timestamp: time::now(),
                    });
                    attempts += 1;
                    if attempts >= max_attempts {
                        warn!("No playable track found after {} attempts", attempts);
                        self.halt_sequence().await;
                        return;
                    }
                    candidate = { self.sequencer.lock().unwrap().subsequent() };
                }
            }
        }
    }

    /// Open, prepare and start one track through the buffer scheduler
    async fn try_start(&self, st: SequencedTrack) -> Result<()> {
        let prepared = Arc::new(self.opener.open(st.track_id)?);
        let duration = prepared.duration();

        self.loops.lock().unwrap().reset();

        // Flush whatever the previous session left queued (a mid-track
        // skip leaves audio on the node) and discard any active segment
        self.stop_schedulers();

        let session = self.sessions.begin(prepared, 0.0, None);
        *self.mode.lock().unwrap() = ScheduleMode::Buffered;
        self.buffers.play(&session)?;

        self.state
            .set_current_track(Some(CurrentTrack {
                track_id: st.track_id,
                duration,
            }))
            .await;
        self.set_playback_state(PlaybackState::Playing).await;
        self.state.emit_event(PlayerEvent::TrackStarted {
            track_id: st.track_id,
            sequence_index: Some(st.index),
            timestamp: time::now(),
        });
        Ok(())
    }

    /// The sequence yielded nothing further: stop cleanly
    async fn halt_sequence(&self) {
        debug!("Sequence exhausted; halting playback");
        self.stop_schedulers();
        self.sessions.clear();
        self.loops.lock().unwrap().reset();
        self.state.set_current_track(None).await;
        self.set_playback_state(PlaybackState::Stopped).await;
    }

    /// Scheduler outcome dispatch
    ///
    /// Every outcome is tagged with its session generation; outcomes from
    /// superseded sessions are dropped here, the engine-level half of the
    /// staleness contract.
    async fn handle_outcome(self: &Arc<Self>, outcome: PlaybackOutcome) {
        match outcome {
            PlaybackOutcome::TrackCompleted {
                generation,
                track_id,
            } => {
                if self.sessions.current_generation() != Some(generation) {
                    debug!("Dropping stale completion (generation {})", generation);
                    return;
                }
                info!("Track {} completed", track_id);
                self.state.emit_event(PlayerEvent::TrackCompleted {
                    track_id,
                    timestamp: time::now(),
                });

                let candidate = { self.sequencer.lock().unwrap().subsequent() };
                self.advance(candidate, Some(track_id)).await;
            }

            PlaybackOutcome::LoopRestarted {
                generation,
                track_id,
                start_time,
            } => {
                if self.sessions.current_generation() != Some(generation) {
                    debug!("Dropping stale loop restart (generation {})", generation);
                    return;
                }
                self.state.emit_event(PlayerEvent::LoopRestarted {
                    track_id,
                    start_time,
                    timestamp: time::now(),
                });
            }

            PlaybackOutcome::TrackUnplayable {
                generation,
                track_id,
                reason,
            } => {
                if self.sessions.current_generation() != Some(generation) {
                    debug!("Dropping stale failure (generation {})", generation);
                    return;
                }
                warn!("Track {} became unplayable: {}", track_id, reason);
                self.state.emit_event(PlayerEvent::TrackUnplayable {
                    track_id,
                    reason,
                    timestamp: time::now(),
                });

                let candidate = { self.sequencer.lock().unwrap().subsequent() };
                self.advance(candidate, Some(track_id)).await;
            }
        }
    }
}
