//! Track sequencing under repeat/shuffle policy and hierarchical scopes
//!
//! The sequencer is pure computation over `(scope, mode)`: given the
//! library accessor it decides which track index plays next, previous, or
//! first. It never touches the schedulers — the engine resolves its
//! answers into actual playback.

pub mod scope;
pub mod sequence;

pub use scope::{absolute_index, grouped_index_of, SequenceScope};
pub use sequence::PlaybackSequence;

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use quaver_common::{PlaybackModes, RepeatMode, ShuffleMode};

use crate::library::{GroupKind, Library};

/// A sequencer answer: which track, and where it sits in the scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencedTrack {
    pub index: usize,
    pub track_id: Uuid,
}

/// Computes next/previous/current track under the active scope and modes
pub struct PlaybackSequencer {
    library: Arc<dyn Library>,
    scope: SequenceScope,
    sequence: PlaybackSequence,
    /// Track the cursor last resolved to; used to re-derive the cursor
    /// after library mutations
    current_track: Option<Uuid>,
}

impl PlaybackSequencer {
    pub fn new(library: Arc<dyn Library>) -> Self {
        Self {
            library,
            scope: SequenceScope::AllTracks,
            sequence: PlaybackSequence::new(0),
            current_track: None,
        }
    }

    /// Deterministic shuffle draws for tests
    pub fn with_seed(library: Arc<dyn Library>, seed: u64) -> Self {
        Self {
            sequence: PlaybackSequence::with_seed(0, seed),
            ..Self::new(library)
        }
    }

    pub fn scope(&self) -> SequenceScope {
        self.scope
    }

    /// Number of tracks in the active sequence
    pub fn size(&self) -> usize {
        self.sequence.size()
    }

    pub fn modes(&self) -> PlaybackModes {
        PlaybackModes::new(self.sequence.repeat(), self.sequence.shuffle())
    }

    pub fn set_modes(&mut self, modes: PlaybackModes) {
        self.sequence.set_repeat(modes.repeat);
        self.sequence.set_shuffle(modes.shuffle);
    }

    pub fn set_repeat(&mut self, repeat: RepeatMode) {
        self.sequence.set_repeat(repeat);
    }

    pub fn set_shuffle(&mut self, shuffle: ShuffleMode) {
        self.sequence.set_shuffle(shuffle);
    }

    /// Re-scope to the given view and start the sequence from scratch
    pub fn begin(&mut self, scope: SequenceScope) -> Option<SequencedTrack> {
        debug!("Sequence begins over {}", scope);
        self.scope = scope;
        self.sequence.reset(scope.size(self.library.as_ref()));
        self.current_track = None;
        self.subsequent()
    }

    /// The track to start (or auto-advance) playback with
    pub fn subsequent(&mut self) -> Option<SequencedTrack> {
        let index = self.sequence.subsequent();
        self.resolve(index)
    }

    /// User-initiated advance
    pub fn next(&mut self) -> Option<SequencedTrack> {
        let index = self.sequence.next();
        self.resolve(index)
    }

    /// User-initiated step back
    pub fn previous(&mut self) -> Option<SequencedTrack> {
        let index = self.sequence.previous();
        self.resolve(index)
    }

    /// The track the cursor currently points at
    pub fn current(&self) -> Option<SequencedTrack> {
        let index = self.sequence.cursor()?;
        let track_id = self.current_track?;
        Some(SequencedTrack { index, track_id })
    }

    /// Direct selection of a track within a scope
    ///
    /// Re-scopes and resets the sequence first, so the selection always
    /// supersedes the previous scope: selecting a track inside one album
    /// scopes subsequent auto-advance to that album only.
    pub fn select_track(
        &mut self,
        scope: SequenceScope,
        track_id: Uuid,
    ) -> Option<SequencedTrack> {
        debug!("Selecting track {} within {}", track_id, scope);
        self.scope = scope;
        self.sequence.reset(scope.size(self.library.as_ref()));
        self.current_track = None;

        let position = scope.position_of(self.library.as_ref(), track_id)?;
        self.sequence.set_cursor(Some(position));
        self.current_track = Some(track_id);
        Some(SequencedTrack {
            index: position,
            track_id,
        })
    }

    /// Direct selection of a group: scope to it and start its sequence
    pub fn select_group(&mut self, kind: GroupKind, group: usize) -> Option<SequencedTrack> {
        self.begin(SequenceScope::Group(kind, group))
    }

    /// Library mutation hooks: recompute size and re-derive the cursor
    /// from the playing track's new position. If the playing track itself
    /// is gone, the sequence ends.
    pub fn tracks_added(&mut self) {
        debug!("Tracks added; refreshing sequence");
        self.refresh_after_mutation();
    }

    pub fn tracks_removed(&mut self) {
        debug!("Tracks removed; refreshing sequence");
        self.refresh_after_mutation();
    }

    pub fn reordered(&mut self) {
        debug!("Tracks reordered; refreshing sequence");
        self.refresh_after_mutation();
    }

    pub fn cleared(&mut self) {
        debug!("Track list cleared; refreshing sequence");
        self.refresh_after_mutation();
    }

    fn refresh_after_mutation(&mut self) {
        let size = self.scope.size(self.library.as_ref());
        self.sequence.resize(size);

        if let Some(track_id) = self.current_track {
            match self.scope.position_of(self.library.as_ref(), track_id) {
                Some(position) => self.sequence.set_cursor(Some(position)),
                None => {
                    debug!("Playing track {} no longer in scope; sequence ends", track_id);
                    self.current_track = None;
                }
            }
        }
    }

    fn resolve(&mut self, index: Option<usize>) -> Option<SequencedTrack> {
        let Some(index) = index else {
            self.current_track = None;
            return None;
        };

        match self.scope.track_at(self.library.as_ref(), index) {
            Some(track_id) => {
                self.current_track = Some(track_id);
                Some(SequencedTrack { index, track_id })
            }
            None => {
                // Scope shrank underneath the cursor between calls
                debug!("Sequence index {} no longer resolves; ending", index);
                self.current_track = None;
                None
            }
        }
    }
}
