//! Prepared tracks and the decoder boundary
//!
//! The decoder lives outside this core: an `AudioReader` yields PCM chunks
//! from an already-opened audio file, positioned by frame offset. The core
//! only schedules what the reader produces.
//!
//! `PreparedTrack` is the typed "preparation happened" proof: it can only be
//! constructed after its audio metadata validates, so scheduler entry points
//! taking `&PreparedTrack` never see missing duration/sample-rate/frame
//! counts. An unprepared track reaching a scheduler is unrepresentable.

use std::sync::Mutex;

use uuid::Uuid;

use crate::error::{Error, Result};
use quaver_common::time;

/// A chunk of interleaved f32 PCM audio
#[derive(Debug, Clone)]
pub struct PcmBuffer {
    /// Interleaved samples (frame-major)
    pub samples: Vec<f32>,
    /// Channel count (1 = mono, 2 = stereo)
    pub channels: u16,
}

impl PcmBuffer {
    pub fn new(samples: Vec<f32>, channels: u16) -> Self {
        debug_assert!(channels > 0, "PcmBuffer requires at least one channel");
        Self { samples, channels }
    }

    /// Number of frames (samples per channel) in this buffer
    pub fn frames(&self) -> u64 {
        if self.channels == 0 {
            return 0;
        }
        (self.samples.len() / self.channels as usize) as u64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Result of one decoder read
#[derive(Debug)]
pub struct ReadChunk {
    /// Decoded PCM audio (may be shorter than requested near EOF)
    pub pcm: PcmBuffer,
    /// True when the read consumed the last frame of the file (or bound)
    pub reached_end: bool,
}

/// External decoder boundary: yields PCM from an opened audio file
///
/// Implementations are stateful: reads advance the file position, and
/// `seek_to_frame` repositions it. Reads may block on disk I/O; the core
/// only calls them from its scheduling worker, never from the render thread.
pub trait AudioReader: Send {
    /// Read up to `frames` frames from the current position.
    ///
    /// `frame_bound`, when set, is an absolute frame offset the read must
    /// not cross (used to stop a read exactly at a span boundary).
    fn read(&mut self, frames: u64, frame_bound: Option<u64>) -> Result<ReadChunk>;

    /// Reposition the reader to an absolute frame offset
    fn seek_to_frame(&mut self, frame: u64) -> Result<()>;
}

/// External factory resolving a track id to a prepared, opened track
pub trait TrackOpener: Send + Sync {
    fn open(&self, track_id: Uuid) -> Result<PreparedTrack>;
}

/// A track whose audio file has been opened and whose metadata validated
///
/// Construction is the validation point: `duration`, `sample_rate` and
/// `total_frames` are all checked positive, so downstream frame math never
/// divides by zero or produces negative spans.
pub struct PreparedTrack {
    track_id: Uuid,
    duration: f64,
    sample_rate: u32,
    total_frames: u64,
    reader: Mutex<Box<dyn AudioReader>>,
}

impl PreparedTrack {
    /// Validate audio metadata and wrap the opened reader
    pub fn new(
        track_id: Uuid,
        duration: f64,
        sample_rate: u32,
        total_frames: u64,
        reader: Box<dyn AudioReader>,
    ) -> Result<Self> {
        if !(duration > 0.0) || !duration.is_finite() {
            return Err(Error::NotPrepared(format!(
                "track {} has invalid duration {}",
                track_id, duration
            )));
        }
        if sample_rate == 0 {
            return Err(Error::NotPrepared(format!(
                "track {} has zero sample rate",
                track_id
            )));
        }
        if total_frames == 0 {
            return Err(Error::NotPrepared(format!(
                "track {} has zero frames",
                track_id
            )));
        }

        Ok(Self {
            track_id,
            duration,
            sample_rate,
            total_frames,
            reader: Mutex::new(reader),
        })
    }

    pub fn track_id(&self) -> Uuid {
        self.track_id
    }

    /// Track duration in seconds
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Convert a position in seconds to a frame offset, clamped to the track
    pub fn frame_for_time(&self, seconds: f64) -> u64 {
        time::seconds_to_frames(seconds.clamp(0.0, self.duration), self.sample_rate)
            .min(self.total_frames)
    }

    /// Clamp a position in seconds to `[0, duration]`
    pub fn clamp_seconds(&self, seconds: f64) -> f64 {
        seconds.clamp(0.0, self.duration)
    }

    /// Run a closure against the exclusive reader handle
    ///
    /// Blocks if another reader operation is in flight. Only the scheduling
    /// worker and render-node segment reads contend here.
    pub fn with_reader<T>(&self, f: impl FnOnce(&mut dyn AudioReader) -> T) -> T {
        let mut reader = self.reader.lock().unwrap();
        f(reader.as_mut())
    }
}

impl std::fmt::Debug for PreparedTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedTrack")
            .field("track_id", &self.track_id)
            .field("duration", &self.duration)
            .field("sample_rate", &self.sample_rate)
            .field("total_frames", &self.total_frames)
            .finish()
    }
}
