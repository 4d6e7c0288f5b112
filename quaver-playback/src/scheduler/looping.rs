//! A–B loop state machine
//!
//! A loop is marked in two steps: the user sets a start point, then an end
//! point. Only a *complete* loop (both points, end after start) bounds
//! scheduling and auto-restarts; a started-but-open loop changes nothing
//! until its end point lands.

use quaver_common::time;
use tracing::debug;

use crate::error::{Error, Result};

/// A bounded span within a track
///
/// `end_time` is None while the loop is still being marked. Completion is
/// validated at construction: an end at or before the start is rejected,
/// never silently producing a negative frame span.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackLoop {
    /// Loop start position in seconds
    pub start_time: f64,
    /// Loop end position in seconds (None until marked)
    pub end_time: Option<f64>,
}

impl PlaybackLoop {
    /// A loop with only its start point marked
    pub fn started(start_time: f64) -> Self {
        Self {
            start_time,
            end_time: None,
        }
    }

    /// A complete loop; rejects `end_time <= start_time`
    pub fn complete(start_time: f64, end_time: f64) -> Result<Self> {
        if !(end_time > start_time) {
            return Err(Error::InvalidLoop(format!(
                "loop end {:.3}s must be after start {:.3}s",
                end_time, start_time
            )));
        }
        Ok(Self {
            start_time,
            end_time: Some(end_time),
        })
    }

    /// True once both points are marked
    pub fn is_complete(&self) -> bool {
        self.end_time.is_some()
    }

    /// Loop start as a frame offset
    pub fn start_frame(&self, sample_rate: u32) -> u64 {
        time::seconds_to_frames(self.start_time, sample_rate)
    }

    /// Loop end as a frame offset, once complete
    pub fn end_frame(&self, sample_rate: u32) -> Option<u64> {
        self.end_time
            .map(|end| time::seconds_to_frames(end, sample_rate))
    }
}

/// Loop marking state: None → Started → Complete → None
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoopState {
    /// No loop marked
    None,
    /// Start point marked; scheduling unchanged
    Started { start_time: f64 },
    /// Both points marked; scheduling is bounded by the loop
    Complete(PlaybackLoop),
}

/// State machine driving A–B loop marking for the current track
///
/// The controller is pure state: the engine checks session currency and
/// invokes the segment scheduler on transitions. Reset on track change.
#[derive(Debug)]
pub struct LoopController {
    state: LoopState,
}

impl LoopController {
    pub fn new() -> Self {
        Self {
            state: LoopState::None,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// The loop currently bounding scheduling, if complete
    pub fn active_loop(&self) -> Option<PlaybackLoop> {
        match self.state {
            LoopState::Complete(lp) => Some(lp),
            _ => None,
        }
    }

    /// Mark (or re-mark) the loop start point
    ///
    /// Allowed from any state; re-marking discards a previous span. No
    /// scheduling change occurs until the end point lands.
    pub fn mark_start(&mut self, at: f64) -> Result<()> {
        if !(at >= 0.0) || !at.is_finite() {
            return Err(Error::InvalidLoop(format!(
                "loop start {:?}s out of range",
                at
            )));
        }
        debug!("Loop start marked at {:.3}s", at);
        self.state = LoopState::Started { start_time: at };
        Ok(())
    }

    /// Mark the loop end point, completing the loop
    ///
    /// Requires a previously marked start and `at > start`.
    pub fn mark_end(&mut self, at: f64) -> Result<PlaybackLoop> {
        let start_time = match self.state {
            LoopState::Started { start_time } => start_time,
            LoopState::None => {
                return Err(Error::InvalidLoop(
                    "cannot mark loop end: no start point marked".to_string(),
                ))
            }
            LoopState::Complete(_) => {
                return Err(Error::InvalidLoop(
                    "cannot mark loop end: loop already complete".to_string(),
                ))
            }
        };

        let lp = PlaybackLoop::complete(start_time, at)?;
        debug!("Loop completed: [{:.3}s, {:.3}s]", start_time, at);
        self.state = LoopState::Complete(lp);
        Ok(lp)
    }

    /// Clear the loop
    ///
    /// Returns the span that was bounding playback, if the loop was
    /// complete, so the caller can resume single-shot scheduling from its
    /// end point.
    pub fn clear(&mut self) -> Option<PlaybackLoop> {
        let cleared = self.active_loop();
        if !matches!(self.state, LoopState::None) {
            debug!("Loop cleared");
        }
        self.state = LoopState::None;
        cleared
    }

    /// Discard all loop state (track change)
    pub fn reset(&mut self) {
        self.state = LoopState::None;
    }
}

impl Default for LoopController {
    fn default() -> Self {
        Self::new()
    }
}
