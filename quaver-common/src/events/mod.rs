//! Event types for the Quaver event system
//!
//! Provides the outward-facing PlayerEvent enum and the EventBus used to
//! notify the UI layer. Events are fire-and-forget: publishers never wait
//! for acknowledgment, and a missing subscriber is not an error.

mod playback_types;

pub use playback_types::{PlaybackState, PositionInfo};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Quaver player events
///
/// Broadcast by the playback core and consumed by the UI layer. All
/// variants are serializable so the UI glue can forward them over its
/// message bus unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// Playback state changed (Playing / Paused / Stopped)
    PlaybackStateChanged {
        old_state: PlaybackState,
        new_state: PlaybackState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A track started playing
    ///
    /// Fires for user-initiated playback and for auto-advance alike.
    TrackStarted {
        track_id: Uuid,
        /// Sequence position within the active scope, if sequenced
        sequence_index: Option<usize>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The current track finished rendering to the end
    TrackCompleted {
        track_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Auto-advance moved from one track to another (or into a gap)
    ///
    /// `next_track_id` is None when the sequence is exhausted.
    TrackChanged {
        previous_track_id: Option<Uuid>,
        next_track_id: Option<Uuid>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback progress update
    ///
    /// Emitted periodically while playing (configurable interval).
    /// Not persisted; transmitted to the UI only.
    PositionUpdate {
        track_id: Uuid,
        position: PositionInfo,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An A–B loop became complete and is now bounding playback
    LoopEngaged {
        track_id: Uuid,
        start_time: f64,
        end_time: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The active A–B loop was cleared
    LoopDisengaged {
        track_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The active loop reached its end and restarted from its start point
    LoopRestarted {
        track_id: Uuid,
        start_time: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A track could not be scheduled (disk read failure or similar)
    ///
    /// Recoverable: the player moves on to the next track.
    TrackUnplayable {
        track_id: Uuid,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

/// Central event distribution bus
///
/// Wraps tokio::broadcast, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlayerEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// All player events are fire-and-forget; a UI that isn't connected
    /// yet simply misses them.
    pub fn emit_lossy(&self, event: PlayerEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers (debugging/monitoring)
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
