//! Render engine boundary
//!
//! The real-time render pipeline lives outside this core. The core hands it
//! PCM buffers or whole file segments and receives completion callbacks on
//! the render thread, asynchronously and without ordering guarantees
//! relative to the scheduling worker.

use std::sync::Arc;

use crate::track::{PcmBuffer, PreparedTrack};

/// Completion callback invoked by the render engine on its own thread
pub type CompletionFn = Box<dyn FnOnce() + Send + 'static>;

/// A sample of the render engine's clock
#[derive(Debug, Clone, Copy)]
pub struct RenderTimestamp {
    /// Frames rendered since the node last transitioned from stopped to
    /// playing (a `stop` resets this; a `pause` holds it)
    pub sample_time: u64,
    /// Sample rate of the render clock
    pub sample_rate: f64,
}

/// External render engine / player node
///
/// Contract notes:
/// - `stop` flushes all scheduled audio and resets the render clock;
///   `pause` holds position and keeps scheduled audio queued.
/// - Completion callbacks fire on the render thread once the engine has
///   consumed the last frame of the scheduled unit. A flushed (stopped)
///   unit may or may not receive its callback; callers must tolerate both.
/// - `render_clock` returns None when the engine is not running (e.g. not
///   yet started); callers fall back to cached positions.
/// - Scheduling calls are safe to invoke from completion callbacks.
pub trait RenderNode: Send + Sync {
    /// Begin or resume rendering
    fn play(&self);

    /// Suspend rendering, holding position and queued audio
    fn pause(&self);

    /// Stop rendering and flush everything scheduled
    fn stop(&self);

    /// Enqueue a PCM buffer after any already-scheduled audio
    fn schedule_buffer(&self, pcm: PcmBuffer, on_complete: CompletionFn);

    /// Schedule one contiguous frame range of the track's file as a single
    /// atomic unit
    fn schedule_segment(
        &self,
        track: Arc<PreparedTrack>,
        start_frame: u64,
        frame_count: u64,
        on_complete: CompletionFn,
    );

    /// Sample the render clock, if running
    fn render_clock(&self) -> Option<RenderTimestamp>;
}
