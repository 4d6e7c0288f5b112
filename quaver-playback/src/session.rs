//! Playback sessions and the staleness contract
//!
//! A session identifies one attempt to play something: starting a track,
//! seeking, or re-bounding playback for a loop each begin a new session and
//! silently supersede the previous one. Identity is a monotonically
//! assigned generation from the registry's counter, so "is this callback
//! still relevant" is a single integer comparison.
//!
//! `SessionRegistry::is_current` is the single source of truth consulted by
//! every asynchronous callback (worker task, render completion, poll tick)
//! before it mutates shared state or enqueues further work. This is the
//! core defense against races between the render thread, the scheduling
//! worker, and user-initiated seeks.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::scheduler::looping::PlaybackLoop;
use crate::track::PreparedTrack;

/// One attempt to play a track (or a span of it)
///
/// Sessions are cheap and immutable apart from scheduling bookkeeping;
/// superseded sessions are simply dropped once their last callback clears.
pub struct PlaybackSession {
    generation: u64,
    track: Arc<PreparedTrack>,
    loop_span: Option<PlaybackLoop>,

    /// Frame offset where this session began rendering. Updated only by a
    /// loop restart, which re-anchors the render clock.
    start_frame: AtomicU64,

    /// No more audio left to enqueue for this session
    scheduling_completed: AtomicBool,

    /// Render engine has consumed the last enqueued sample
    playback_completed: AtomicBool,

    /// A final (EOF-tagged) buffer has been handed to the render node
    scheduled_final: AtomicBool,

    /// Buffers handed to the render node but not yet consumed
    outstanding: AtomicU64,

    /// Last computed seek position (f64 seconds, stored as bits), used when
    /// the render clock is unavailable
    cached_position: AtomicU64,
}

impl PlaybackSession {
    fn new(
        generation: u64,
        track: Arc<PreparedTrack>,
        start_seconds: f64,
        loop_span: Option<PlaybackLoop>,
    ) -> Self {
        let start_seconds = track.clamp_seconds(start_seconds);
        let start_frame = track.frame_for_time(start_seconds);
        Self {
            generation,
            track,
            loop_span,
            start_frame: AtomicU64::new(start_frame),
            scheduling_completed: AtomicBool::new(false),
            playback_completed: AtomicBool::new(false),
            scheduled_final: AtomicBool::new(false),
            outstanding: AtomicU64::new(0),
            cached_position: AtomicU64::new(start_seconds.to_bits()),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn track(&self) -> &Arc<PreparedTrack> {
        &self.track
    }

    /// The loop bounding this session, if one was active when it began
    pub fn loop_span(&self) -> Option<PlaybackLoop> {
        self.loop_span
    }

    /// The complete loop bounding this session, if any
    pub fn complete_loop(&self) -> Option<PlaybackLoop> {
        self.loop_span.filter(|lp| lp.is_complete())
    }

    pub fn start_frame(&self) -> u64 {
        self.start_frame.load(Ordering::Acquire)
    }

    pub(crate) fn set_start_frame(&self, frame: u64) {
        self.start_frame.store(frame, Ordering::Release);
    }

    pub fn scheduling_completed(&self) -> bool {
        self.scheduling_completed.load(Ordering::Acquire)
    }

    pub(crate) fn mark_scheduling_completed(&self) {
        self.scheduling_completed.store(true, Ordering::Release);
    }

    pub fn playback_completed(&self) -> bool {
        self.playback_completed.load(Ordering::Acquire)
    }

    /// Mark playback completed; returns false if it already was
    /// (so completion is announced exactly once per cycle)
    pub(crate) fn mark_playback_completed(&self) -> bool {
        !self.playback_completed.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn scheduled_final(&self) -> bool {
        self.scheduled_final.load(Ordering::Acquire)
    }

    pub(crate) fn mark_scheduled_final(&self) {
        self.scheduled_final.store(true, Ordering::Release);
    }

    pub(crate) fn outstanding(&self) -> u64 {
        self.outstanding.load(Ordering::Acquire)
    }

    pub(crate) fn increment_outstanding(&self) {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
    }

    /// Decrement the outstanding-buffer count, returning what remains
    pub(crate) fn decrement_outstanding(&self) -> u64 {
        let previous = self.outstanding.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "outstanding buffer count underflow");
        previous.saturating_sub(1)
    }

    /// Reset completion bookkeeping for a loop restart cycle
    pub(crate) fn reset_completion(&self) {
        self.scheduling_completed.store(false, Ordering::Release);
        self.playback_completed.store(false, Ordering::Release);
        self.scheduled_final.store(false, Ordering::Release);
    }

    /// Last computed seek position in seconds
    pub fn cached_position(&self) -> f64 {
        f64::from_bits(self.cached_position.load(Ordering::Acquire))
    }

    pub(crate) fn set_cached_position(&self, seconds: f64) {
        self.cached_position
            .store(seconds.to_bits(), Ordering::Release);
    }
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("generation", &self.generation)
            .field("track_id", &self.track.track_id())
            .field("loop_span", &self.loop_span)
            .field("start_frame", &self.start_frame())
            .finish()
    }
}

/// Process-wide registry of the single current session
///
/// Beginning a session supersedes the previous one atomically; stale
/// sessions are never explicitly torn down, they just fail the currency
/// check from then on.
pub struct SessionRegistry {
    next_generation: AtomicU64,
    current: RwLock<Option<Arc<PlaybackSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            next_generation: AtomicU64::new(1),
            current: RwLock::new(None),
        }
    }

    /// Begin a new session, superseding the current one
    pub fn begin(
        &self,
        track: Arc<PreparedTrack>,
        start_seconds: f64,
        loop_span: Option<PlaybackLoop>,
    ) -> Arc<PlaybackSession> {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let session = Arc::new(PlaybackSession::new(
            generation,
            track,
            start_seconds,
            loop_span,
        ));

        let mut current = self.current.write().unwrap();
        if let Some(old) = current.as_ref() {
            debug!(
                "Session {} supersedes session {}",
                generation,
                old.generation()
            );
        }
        *current = Some(Arc::clone(&session));
        session
    }

    /// Single source of truth for session currency
    pub fn is_current(&self, session: &PlaybackSession) -> bool {
        self.current
            .read()
            .unwrap()
            .as_ref()
            .map(|s| s.generation() == session.generation())
            .unwrap_or(false)
    }

    pub fn current(&self) -> Option<Arc<PlaybackSession>> {
        self.current.read().unwrap().clone()
    }

    pub fn current_generation(&self) -> Option<u64> {
        self.current.read().unwrap().as_ref().map(|s| s.generation())
    }

    /// Drop the current session (stop of all playback)
    pub fn clear(&self) {
        *self.current.write().unwrap() = None;
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::track::{AudioReader, PcmBuffer, ReadChunk};
    use uuid::Uuid;

    struct NullReader;

    impl AudioReader for NullReader {
        fn read(&mut self, frames: u64, _frame_bound: Option<u64>) -> Result<ReadChunk> {
            Ok(ReadChunk {
                pcm: PcmBuffer::new(vec![0.0; frames as usize * 2], 2),
                reached_end: false,
            })
        }

        fn seek_to_frame(&mut self, _frame: u64) -> Result<()> {
            Ok(())
        }
    }

    fn test_track() -> Arc<PreparedTrack> {
        Arc::new(
            PreparedTrack::new(Uuid::new_v4(), 100.0, 44100, 4_410_000, Box::new(NullReader))
                .unwrap(),
        )
    }

    #[test]
    fn test_sessions_get_monotonic_generations() {
        let registry = SessionRegistry::new();
        let track = test_track();

        let a = registry.begin(Arc::clone(&track), 0.0, None);
        let b = registry.begin(Arc::clone(&track), 0.0, None);
        assert!(b.generation() > a.generation());
    }

    #[test]
    fn test_new_session_supersedes_old() {
        let registry = SessionRegistry::new();
        let track = test_track();

        let a = registry.begin(Arc::clone(&track), 0.0, None);
        assert!(registry.is_current(&a));

        let b = registry.begin(Arc::clone(&track), 10.0, None);
        assert!(!registry.is_current(&a));
        assert!(registry.is_current(&b));
    }

    #[test]
    fn test_clear_leaves_no_current_session() {
        let registry = SessionRegistry::new();
        let track = test_track();

        let a = registry.begin(track, 0.0, None);
        registry.clear();
        assert!(!registry.is_current(&a));
        assert!(registry.current().is_none());
        assert!(registry.current_generation().is_none());
    }

    #[test]
    fn test_session_start_frame_from_seconds() {
        let registry = SessionRegistry::new();
        let track = test_track();

        let s = registry.begin(Arc::clone(&track), 10.0, None);
        assert_eq!(s.start_frame(), 441_000);
        assert_eq!(s.cached_position(), 10.0);

        // Seek beyond duration clamps to track end
        let s = registry.begin(track, 500.0, None);
        assert_eq!(s.start_frame(), 4_410_000);
        assert_eq!(s.cached_position(), 100.0);
    }

    #[test]
    fn test_completion_flags_and_reset() {
        let registry = SessionRegistry::new();
        let s = registry.begin(test_track(), 0.0, None);

        assert!(!s.scheduling_completed());
        s.mark_scheduling_completed();
        assert!(s.scheduling_completed());

        // First announcement wins, second is suppressed
        assert!(s.mark_playback_completed());
        assert!(!s.mark_playback_completed());

        s.reset_completion();
        assert!(!s.scheduling_completed());
        assert!(!s.playback_completed());
    }
}
