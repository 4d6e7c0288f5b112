//! Cursor state machine for one sequence of tracks
//!
//! Pure index computation over `(repeat, shuffle)`; scope resolution and
//! track lookup live a level up in the sequencer. Shuffle draws are
//! reject-and-retry against a played set consumed without repetition until
//! exhausted; the played set is cleared whenever the size changes or
//! shuffle toggles.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use quaver_common::{RepeatMode, ShuffleMode};

/// Sequence cursor over `[0, size)` under repeat/shuffle policy
#[derive(Debug)]
pub struct PlaybackSequence {
    cursor: Option<usize>,
    size: usize,
    repeat: RepeatMode,
    shuffle: ShuffleMode,
    /// Indices already drawn this shuffle cycle
    played: HashSet<usize>,
    rng: StdRng,
}

impl PlaybackSequence {
    pub fn new(size: usize) -> Self {
        Self {
            cursor: None,
            size,
            repeat: RepeatMode::Off,
            shuffle: ShuffleMode::Off,
            played: HashSet::new(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic shuffle draws for tests
    pub fn with_seed(size: usize, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            ..Self::new(size)
        }
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn repeat(&self) -> RepeatMode {
        self.repeat
    }

    pub fn shuffle(&self) -> ShuffleMode {
        self.shuffle
    }

    pub fn set_repeat(&mut self, repeat: RepeatMode) {
        self.repeat = repeat;
    }

    /// Toggle shuffle; any in-progress shuffle cycle is discarded
    pub fn set_shuffle(&mut self, shuffle: ShuffleMode) {
        if shuffle != self.shuffle {
            self.played.clear();
            if shuffle.is_on() {
                // The current track has already played this cycle
                if let Some(i) = self.cursor {
                    self.played.insert(i);
                }
            }
        }
        self.shuffle = shuffle;
    }

    /// Reset to a fresh, un-started sequence of `size` items
    pub fn reset(&mut self, size: usize) {
        self.cursor = None;
        self.size = size;
        self.played.clear();
    }

    /// Adopt a new size after a library mutation
    ///
    /// Clears the cursor and shuffle state; the caller re-derives the
    /// cursor from the playing track's new position.
    pub fn resize(&mut self, size: usize) {
        if size != self.size {
            debug!("Sequence resized {} -> {}", self.size, size);
        }
        self.size = size;
        self.cursor = None;
        self.played.clear();
    }

    /// Place the cursor at a known index (direct selection, re-derivation)
    pub fn set_cursor(&mut self, cursor: Option<usize>) {
        debug_assert!(
            cursor.map(|i| i < self.size).unwrap_or(true),
            "cursor out of range"
        );
        self.cursor = cursor;
        if self.shuffle.is_on() {
            if let Some(i) = cursor {
                self.played.insert(i);
            }
        }
    }

    /// The index to start (or auto-advance) playback with
    ///
    /// Unlike `next`, honors repeat-one by staying on the current index,
    /// so a completed track replays instead of advancing.
    pub fn subsequent(&mut self) -> Option<usize> {
        if self.size == 0 {
            return None;
        }

        if self.repeat == RepeatMode::One {
            // Repeat-one ignores shuffle and repeats the current index
            let index = self.cursor.unwrap_or(0);
            self.cursor = Some(index);
            return Some(index);
        }

        self.advance_forward()
    }

    /// User-initiated advance to the following track
    ///
    /// Under repeat-one this still moves sequentially, but sticks at the
    /// last index instead of stopping on wraparound.
    pub fn next(&mut self) -> Option<usize> {
        if self.size == 0 {
            return None;
        }

        if self.repeat == RepeatMode::One {
            let index = match self.cursor {
                None => 0,
                Some(i) if i + 1 < self.size => i + 1,
                Some(i) => i,
            };
            self.cursor = Some(index);
            return Some(index);
        }

        self.advance_forward()
    }

    /// User-initiated step back to the preceding track
    pub fn previous(&mut self) -> Option<usize> {
        if self.size == 0 {
            return None;
        }
        let Some(current) = self.cursor else {
            // No current track to step back from
            return None;
        };

        match (self.repeat, self.shuffle) {
            (RepeatMode::One, _) => {
                let index = current.saturating_sub(1);
                self.cursor = Some(index);
                Some(index)
            }
            (_, ShuffleMode::On) => match self.repeat {
                RepeatMode::All => self.draw_excluding_current(),
                _ => self.draw_unplayed(),
            },
            (RepeatMode::All, ShuffleMode::Off) => {
                let index = if current == 0 {
                    self.size - 1
                } else {
                    current - 1
                };
                self.cursor = Some(index);
                Some(index)
            }
            (_, ShuffleMode::Off) => {
                if current == 0 {
                    return None;
                }
                self.cursor = Some(current - 1);
                Some(current - 1)
            }
        }
    }

    /// Forward movement shared by `subsequent` and `next` (repeat ≠ one)
    fn advance_forward(&mut self) -> Option<usize> {
        match (self.repeat, self.shuffle) {
            (RepeatMode::All, ShuffleMode::On) => self.draw_excluding_current(),
            (_, ShuffleMode::On) => self.draw_unplayed(),
            (RepeatMode::All, ShuffleMode::Off) => {
                let index = match self.cursor {
                    None => 0,
                    Some(i) => (i + 1) % self.size,
                };
                self.cursor = Some(index);
                Some(index)
            }
            (_, ShuffleMode::Off) => {
                let index = match self.cursor {
                    None => 0,
                    Some(i) if i + 1 < self.size => i + 1,
                    // Past the last index the sequence is exhausted; the
                    // cursor stays put so repeated calls keep yielding None
                    Some(_) => return None,
                };
                self.cursor = Some(index);
                Some(index)
            }
        }
    }

    /// Draw a not-yet-played random index (reject-and-retry); None once
    /// every index has been drawn
    fn draw_unplayed(&mut self) -> Option<usize> {
        if self.played.len() >= self.size {
            return None;
        }
        loop {
            let candidate = self.rng.gen_range(0..self.size);
            if self.played.insert(candidate) {
                self.cursor = Some(candidate);
                return Some(candidate);
            }
        }
    }

    /// Draw uniformly at random excluding the current index; never exhausts
    fn draw_excluding_current(&mut self) -> Option<usize> {
        if self.size == 1 {
            self.cursor = Some(0);
            return Some(0);
        }
        loop {
            let candidate = self.rng.gen_range(0..self.size);
            if Some(candidate) != self.cursor {
                self.cursor = Some(candidate);
                return Some(candidate);
            }
        }
    }
}
