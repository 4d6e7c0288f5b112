//! Shared playback state
//!
//! Thread-safe shared state for coordination between the playback engine
//! and whatever drives it (UI glue). Uses RwLock for concurrent read
//! access with rare writes; events go out through the common EventBus.

use tokio::sync::RwLock;
use uuid::Uuid;

use quaver_common::events::{EventBus, PlaybackState, PlayerEvent};

/// Current track information
#[derive(Debug, Clone)]
pub struct CurrentTrack {
    /// Track id
    pub track_id: Uuid,
    /// Total duration in seconds
    pub duration: f64,
}

/// Shared state accessible by all components
pub struct SharedState {
    /// Current playback state (Playing / Paused / Stopped)
    playback_state: RwLock<PlaybackState>,

    /// Currently playing track (None when stopped)
    current_track: RwLock<Option<CurrentTrack>>,

    /// Master volume (0.0-1.0)
    volume: RwLock<f32>,

    /// Event broadcaster toward the UI layer
    events: EventBus,
}

impl SharedState {
    /// Create new shared state with default values
    pub fn new(event_capacity: usize) -> Self {
        Self {
            playback_state: RwLock::new(PlaybackState::Stopped),
            current_track: RwLock::new(None),
            volume: RwLock::new(0.75), // Default 75% volume
            events: EventBus::new(event_capacity),
        }
    }

    /// Broadcast an event to all listeners (no receivers is OK)
    pub fn emit_event(&self, event: PlayerEvent) {
        self.events.emit_lossy(event);
    }

    /// Subscribe to the event stream
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub async fn get_playback_state(&self) -> PlaybackState {
        *self.playback_state.read().await
    }

    /// Set playback state, returning the previous value
    pub async fn set_playback_state(&self, state: PlaybackState) -> PlaybackState {
        let mut guard = self.playback_state.write().await;
        std::mem::replace(&mut *guard, state)
    }

    pub async fn get_current_track(&self) -> Option<CurrentTrack> {
        self.current_track.read().await.clone()
    }

    pub async fn set_current_track(&self, track: Option<CurrentTrack>) {
        *self.current_track.write().await = track;
    }

    /// Get master volume (0.0-1.0)
    pub async fn get_volume(&self) -> f32 {
        *self.volume.read().await
    }

    /// Set master volume (clamped to 0.0-1.0)
    pub async fn set_volume(&self, volume: f32) {
        *self.volume.write().await = volume.clamp(0.0, 1.0);
    }
}
