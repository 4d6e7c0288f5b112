//! Playback schedulers
//!
//! Two schedulers feed the render node, sharing the session registry and
//! clock math:
//!
//! - `BufferScheduler` chains small PCM buffers through a single-worker
//!   queue for continuous forward playback.
//! - `SegmentScheduler` schedules one atomic frame span and detects its end
//!   by polling, for exact seek/loop boundaries.
//!
//! Both report through `PlaybackOutcome` so the engine handles completion,
//! loop restarts and failures in one place regardless of which signal
//! source (render callback or poll) fired first.

pub mod buffer;
pub mod looping;
pub mod segment;
mod worker;

pub use buffer::BufferScheduler;
pub use looping::{LoopController, LoopState, PlaybackLoop};
pub use segment::SegmentScheduler;

use tokio::sync::mpsc;
use uuid::Uuid;

/// Internal scheduler → engine notifications
///
/// Tagged with the originating session generation so the engine can drop
/// outcomes from superseded sessions.
#[derive(Debug, Clone)]
pub enum PlaybackOutcome {
    /// The session rendered its last frame (track end or segment end)
    TrackCompleted { generation: u64, track_id: Uuid },

    /// The active loop reached its end and restarted from its start point
    LoopRestarted {
        generation: u64,
        track_id: Uuid,
        start_time: f64,
    },

    /// Scheduling failed mid-track (disk read error); recoverable
    TrackUnplayable {
        generation: u64,
        track_id: Uuid,
        reason: String,
    },
}

/// Sender half used by schedulers to report outcomes
pub type OutcomeSender = mpsc::UnboundedSender<PlaybackOutcome>;

/// Receiver half consumed by the engine
pub type OutcomeReceiver = mpsc::UnboundedReceiver<PlaybackOutcome>;

/// Create the scheduler → engine outcome channel
pub fn outcome_channel() -> (OutcomeSender, OutcomeReceiver) {
    mpsc::unbounded_channel()
}
