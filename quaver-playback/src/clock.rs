//! Seek clock: render-engine ticks to elapsed seconds
//!
//! The render clock counts frames rendered since the node last started.
//! Adding the session's start frame re-anchors that to a position within
//! the track. When the clock is unavailable (engine not yet started, or
//! stopped), the last cached position stands in.

use std::sync::Arc;

use quaver_common::time;

use crate::render::RenderNode;
use crate::session::PlaybackSession;

/// Converts render-engine clock ticks into elapsed seconds for a session
#[derive(Clone)]
pub struct SeekClock {
    node: Arc<dyn RenderNode>,
}

impl SeekClock {
    pub fn new(node: Arc<dyn RenderNode>) -> Self {
        Self { node }
    }

    /// Current playback position of the session, in seconds
    ///
    /// Computed as `(session_start_frame / track_rate) + elapsed`, bounded
    /// by the loop end while a complete loop is active and by the track
    /// duration otherwise. The bounded value is cached on the session and
    /// returned whenever the render clock is unavailable.
    pub fn position_seconds(&self, session: &PlaybackSession) -> f64 {
        let track = session.track();

        let elapsed = match self.node.render_clock() {
            Some(ts) if ts.sample_rate > 0.0 => ts.sample_time as f64 / ts.sample_rate,
            _ => return session.cached_position(),
        };

        let raw =
            time::frames_to_seconds(session.start_frame(), track.sample_rate()) + elapsed;

        let bound = session
            .complete_loop()
            .and_then(|lp| lp.end_time)
            .unwrap_or_else(|| track.duration());
        let bounded = raw.min(bound);

        session.set_cached_position(bounded);
        bounded
    }
}
