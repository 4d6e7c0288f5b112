//! Test helpers for quaver-playback integration tests
//!
//! Provides mock implementations of the external collaborators:
//! - MockNode: render engine recording operations, firing completions on demand
//! - MockReader: decoder over a virtual track, with failure/delay injection
//! - MockOpener: track opener backed by MockReader
//! - MockLibrary: flat and grouped track lists

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use uuid::Uuid;

use quaver_playback::error::{Error, Result};
use quaver_playback::library::{GroupKind, Library};
use quaver_playback::render::{CompletionFn, RenderNode, RenderTimestamp};
use quaver_playback::track::{AudioReader, PcmBuffer, PreparedTrack, ReadChunk, TrackOpener};

pub const TEST_RATE: u32 = 44100;

/// Operations observed on the mock render node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeOp {
    Play,
    Pause,
    Stop,
    ScheduleBuffer { frames: u64 },
    ScheduleSegment { start_frame: u64, frame_count: u64 },
}

struct NodeInner {
    ops: Vec<NodeOp>,
    pending: VecDeque<CompletionFn>,
    playing: bool,
    started: bool,
    sample_time: u64,
    flushed: usize,
}

/// Mock render node
///
/// Records every call, queues completion callbacks for the test to fire
/// (standing in for the render thread), and exposes a manually-advanced
/// render clock.
pub struct MockNode {
    inner: Mutex<NodeInner>,
}

impl MockNode {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(NodeInner {
                ops: Vec::new(),
                pending: VecDeque::new(),
                playing: false,
                started: false,
                sample_time: 0,
                flushed: 0,
            }),
        })
    }

    pub fn ops(&self) -> Vec<NodeOp> {
        self.inner.lock().unwrap().ops.clone()
    }

    pub fn is_playing(&self) -> bool {
        self.inner.lock().unwrap().playing
    }

    /// Completion callbacks not yet fired
    pub fn pending_completions(&self) -> usize {
        self.inner.lock().unwrap().pending.len()
    }

    /// Units flushed by stop() without completing
    pub fn flushed_count(&self) -> usize {
        self.inner.lock().unwrap().flushed
    }

    pub fn scheduled_buffers(&self) -> Vec<u64> {
        self.inner
            .lock()
            .unwrap()
            .ops
            .iter()
            .filter_map(|op| match op {
                NodeOp::ScheduleBuffer { frames } => Some(*frames),
                _ => None,
            })
            .collect()
    }

    pub fn scheduled_segments(&self) -> Vec<(u64, u64)> {
        self.inner
            .lock()
            .unwrap()
            .ops
            .iter()
            .filter_map(|op| match op {
                NodeOp::ScheduleSegment {
                    start_frame,
                    frame_count,
                } => Some((*start_frame, *frame_count)),
                _ => None,
            })
            .collect()
    }

    /// Fire the oldest pending completion, as the render thread would.
    /// Returns false when nothing is pending.
    pub fn complete_oldest(&self) -> bool {
        let callback = self.inner.lock().unwrap().pending.pop_front();
        match callback {
            // Invoked outside the lock: completions may re-enter the node
            Some(cb) => {
                cb();
                true
            }
            None => false,
        }
    }

    /// Advance the render clock by whole seconds' worth of frames
    pub fn advance_clock_seconds(&self, seconds: f64) {
        let mut inner = self.inner.lock().unwrap();
        inner.sample_time += (seconds * TEST_RATE as f64) as u64;
    }

    pub fn set_sample_time(&self, frames: u64) {
        self.inner.lock().unwrap().sample_time = frames;
    }
}

impl RenderNode for MockNode {
    fn play(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.playing = true;
        inner.started = true;
        inner.ops.push(NodeOp::Play);
    }

    fn pause(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.playing = false;
        inner.ops.push(NodeOp::Pause);
    }

    fn stop(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.playing = false;
        inner.started = false;
        inner.sample_time = 0;
        inner.flushed += inner.pending.len();
        inner.pending.clear();
        inner.ops.push(NodeOp::Stop);
    }

    fn schedule_buffer(&self, pcm: PcmBuffer, on_complete: CompletionFn) {
        let mut inner = self.inner.lock().unwrap();
        inner.ops.push(NodeOp::ScheduleBuffer {
            frames: pcm.frames(),
        });
        inner.pending.push_back(on_complete);
    }

    fn schedule_segment(
        &self,
        _track: Arc<PreparedTrack>,
        start_frame: u64,
        frame_count: u64,
        on_complete: CompletionFn,
    ) {
        let mut inner = self.inner.lock().unwrap();
        inner.ops.push(NodeOp::ScheduleSegment {
            start_frame,
            frame_count,
        });
        inner.pending.push_back(on_complete);
    }

    fn render_clock(&self) -> Option<RenderTimestamp> {
        let inner = self.inner.lock().unwrap();
        if !inner.started {
            return None;
        }
        Some(RenderTimestamp {
            sample_time: inner.sample_time,
            sample_rate: TEST_RATE as f64,
        })
    }
}

/// Decoder mock over a virtual track of `total_frames` frames
pub struct MockReader {
    total_frames: u64,
    position: u64,
    /// Fail every read after this many successful ones
    fail_after_reads: Option<usize>,
    reads: usize,
    /// Simulated disk latency per read
    read_delay: Option<Duration>,
    /// (position, frames requested) per read, shared with the test
    read_log: Arc<Mutex<Vec<(u64, u64)>>>,
}

impl MockReader {
    pub fn new(total_frames: u64) -> Self {
        Self {
            total_frames,
            position: 0,
            fail_after_reads: None,
            reads: 0,
            read_delay: None,
            read_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing_after(total_frames: u64, successful_reads: usize) -> Self {
        Self {
            fail_after_reads: Some(successful_reads),
            ..Self::new(total_frames)
        }
    }

    pub fn with_delay(total_frames: u64, delay: Duration) -> Self {
        Self {
            read_delay: Some(delay),
            ..Self::new(total_frames)
        }
    }

    pub fn log_handle(&self) -> Arc<Mutex<Vec<(u64, u64)>>> {
        Arc::clone(&self.read_log)
    }
}

impl AudioReader for MockReader {
    fn read(&mut self, frames: u64, frame_bound: Option<u64>) -> Result<ReadChunk> {
        if let Some(delay) = self.read_delay {
            std::thread::sleep(delay);
        }

        if let Some(limit) = self.fail_after_reads {
            if self.reads >= limit {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "simulated disk failure",
                )));
            }
        }
        self.reads += 1;

        let end = frame_bound
            .map(|b| b.min(self.total_frames))
            .unwrap_or(self.total_frames);
        let available = end.saturating_sub(self.position);
        let n = frames.min(available);

        self.read_log.lock().unwrap().push((self.position, frames));
        self.position += n;

        Ok(ReadChunk {
            pcm: PcmBuffer::new(vec![0.0; (n * 2) as usize], 2),
            reached_end: self.position >= end,
        })
    }

    fn seek_to_frame(&mut self, frame: u64) -> Result<()> {
        self.position = frame.min(self.total_frames);
        Ok(())
    }
}

/// Track opener producing MockReader-backed prepared tracks
pub struct MockOpener {
    duration: f64,
    failing: Mutex<HashSet<Uuid>>,
}

impl MockOpener {
    pub fn new(duration: f64) -> Arc<Self> {
        Arc::new(Self {
            duration,
            failing: Mutex::new(HashSet::new()),
        })
    }

    /// Make `open` fail for this track id
    pub fn fail_for(&self, track_id: Uuid) {
        self.failing.lock().unwrap().insert(track_id);
    }
}

impl TrackOpener for MockOpener {
    fn open(&self, track_id: Uuid) -> Result<PreparedTrack> {
        if self.failing.lock().unwrap().contains(&track_id) {
            return Err(Error::TrackUnplayable(format!(
                "track {} cannot be opened",
                track_id
            )));
        }
        let total_frames = (self.duration * TEST_RATE as f64) as u64;
        PreparedTrack::new(
            track_id,
            self.duration,
            TEST_RATE,
            total_frames,
            Box::new(MockReader::new(total_frames)),
        )
    }
}

/// Library fixture with one grouping shared by every kind
pub struct MockLibrary {
    inner: Mutex<LibraryData>,
}

struct LibraryData {
    tracks: Vec<Uuid>,
    groups: Vec<Vec<Uuid>>,
}

impl MockLibrary {
    pub fn flat(count: usize) -> (Arc<Self>, Vec<Uuid>) {
        let tracks: Vec<Uuid> = (0..count).map(|_| Uuid::new_v4()).collect();
        let lib = Arc::new(Self {
            inner: Mutex::new(LibraryData {
                tracks: tracks.clone(),
                groups: vec![tracks.clone()],
            }),
        });
        (lib, tracks)
    }

    pub fn grouped(sizes: &[usize]) -> (Arc<Self>, Vec<Vec<Uuid>>) {
        let groups: Vec<Vec<Uuid>> = sizes
            .iter()
            .map(|&n| (0..n).map(|_| Uuid::new_v4()).collect())
            .collect();
        let tracks: Vec<Uuid> = groups.iter().flatten().copied().collect();
        let lib = Arc::new(Self {
            inner: Mutex::new(LibraryData {
                tracks,
                groups: groups.clone(),
            }),
        });
        (lib, groups)
    }

    pub fn remove_track(&self, track_id: Uuid) {
        let mut inner = self.inner.lock().unwrap();
        inner.tracks.retain(|&t| t != track_id);
        for group in &mut inner.groups {
            group.retain(|&t| t != track_id);
        }
    }

    fn positions(&self) -> HashMap<Uuid, (usize, usize)> {
        let inner = self.inner.lock().unwrap();
        let mut map = HashMap::new();
        for (g, group) in inner.groups.iter().enumerate() {
            for (i, &t) in group.iter().enumerate() {
                map.insert(t, (g, i));
            }
        }
        map
    }
}

impl Library for MockLibrary {
    fn track_count(&self) -> usize {
        self.inner.lock().unwrap().tracks.len()
    }

    fn track_at(&self, index: usize) -> Option<Uuid> {
        self.inner.lock().unwrap().tracks.get(index).copied()
    }

    fn index_of_track(&self, track_id: Uuid) -> Option<usize> {
        self.inner
            .lock()
            .unwrap()
            .tracks
            .iter()
            .position(|&t| t == track_id)
    }

    fn group_count(&self, _kind: GroupKind) -> usize {
        self.inner.lock().unwrap().groups.len()
    }

    fn group_track_count(&self, _kind: GroupKind, group: usize) -> usize {
        self.inner
            .lock()
            .unwrap()
            .groups
            .get(group)
            .map(|g| g.len())
            .unwrap_or(0)
    }

    fn group_track_at(&self, _kind: GroupKind, group: usize, index: usize) -> Option<Uuid> {
        self.inner
            .lock()
            .unwrap()
            .groups
            .get(group)?
            .get(index)
            .copied()
    }

    fn locate_in_group(&self, _kind: GroupKind, track_id: Uuid) -> Option<(usize, usize)> {
        self.positions().get(&track_id).copied()
    }
}

/// Build a prepared track over a MockReader
pub fn prepared_track(duration: f64) -> Arc<PreparedTrack> {
    let total_frames = (duration * TEST_RATE as f64) as u64;
    Arc::new(
        PreparedTrack::new(
            Uuid::new_v4(),
            duration,
            TEST_RATE,
            total_frames,
            Box::new(MockReader::new(total_frames)),
        )
        .unwrap(),
    )
}

/// Build a prepared track around a specific reader
pub fn prepared_track_with_reader(duration: f64, reader: Box<dyn AudioReader>) -> Arc<PreparedTrack> {
    let total_frames = (duration * TEST_RATE as f64) as u64;
    Arc::new(PreparedTrack::new(Uuid::new_v4(), duration, TEST_RATE, total_frames, reader).unwrap())
}

/// Install a fmt subscriber for debugging test runs
///
/// Honors RUST_LOG; repeated calls are no-ops.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .try_init();
}

/// Spin-wait (blocking) until the condition holds or the timeout passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Async wait (non-blocking) until the condition holds or the timeout passes
pub async fn wait_until_async(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
