//! Sequence scopes and group-flattening arithmetic
//!
//! A scope is the set and ordering of tracks eligible for auto-advance:
//! the whole library, every group of one kind flattened track-major, or a
//! single group. Flattened scopes address tracks by an absolute sequence
//! index, which must translate exactly to `(group, track_within_group)`
//! and back — including at group boundaries and around size-1 and empty
//! groups.

use uuid::Uuid;

use crate::library::{GroupKind, Library};

/// The set and ordering of tracks eligible for auto-advance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceScope {
    /// The whole library in flat-list order
    AllTracks,
    /// All groups of one kind, flattened track-major within each group
    AllGroups(GroupKind),
    /// One specific group
    Group(GroupKind, usize),
}

impl SequenceScope {
    /// Number of tracks reachable in this scope
    pub fn size(&self, library: &dyn Library) -> usize {
        match *self {
            SequenceScope::AllTracks => library.track_count(),
            SequenceScope::AllGroups(kind) => (0..library.group_count(kind))
                .map(|g| library.group_track_count(kind, g))
                .sum(),
            SequenceScope::Group(kind, group) => library.group_track_count(kind, group),
        }
    }

    /// Resolve a sequence index to a track
    pub fn track_at(&self, library: &dyn Library, index: usize) -> Option<Uuid> {
        match *self {
            SequenceScope::AllTracks => library.track_at(index),
            SequenceScope::AllGroups(kind) => {
                let (group, offset) = grouped_index_of(library, kind, index)?;
                library.group_track_at(kind, group, offset)
            }
            SequenceScope::Group(kind, group) => library.group_track_at(kind, group, index),
        }
    }

    /// Locate a track's sequence index within this scope
    pub fn position_of(&self, library: &dyn Library, track_id: Uuid) -> Option<usize> {
        match *self {
            SequenceScope::AllTracks => library.index_of_track(track_id),
            SequenceScope::AllGroups(kind) => {
                let (group, offset) = library.locate_in_group(kind, track_id)?;
                absolute_index(library, kind, group, offset)
            }
            SequenceScope::Group(kind, group) => {
                let (found_group, offset) = library.locate_in_group(kind, track_id)?;
                (found_group == group).then_some(offset)
            }
        }
    }
}

impl std::fmt::Display for SequenceScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SequenceScope::AllTracks => write!(f, "all tracks"),
            SequenceScope::AllGroups(kind) => write!(f, "all {}s", kind),
            SequenceScope::Group(kind, group) => write!(f, "{} {}", kind, group),
        }
    }
}

/// Flatten `(group, track_within_group)` to an absolute sequence index
///
/// Returns None when the coordinates fall outside the grouping.
pub fn absolute_index(
    library: &dyn Library,
    kind: GroupKind,
    group: usize,
    track_in_group: usize,
) -> Option<usize> {
    if group >= library.group_count(kind) {
        return None;
    }
    if track_in_group >= library.group_track_count(kind, group) {
        return None;
    }

    let preceding: usize = (0..group)
        .map(|g| library.group_track_count(kind, g))
        .sum();
    Some(preceding + track_in_group)
}

/// Translate an absolute sequence index back to `(group, track_within_group)`
///
/// Walks groups in order accumulating track counts until the cumulative
/// count passes the target, then back-computes the offset into the group
/// that was overshot. Empty groups contribute nothing and are skipped
/// naturally.
pub fn grouped_index_of(
    library: &dyn Library,
    kind: GroupKind,
    index: usize,
) -> Option<(usize, usize)> {
    let mut cumulative = 0usize;
    for group in 0..library.group_count(kind) {
        let count = library.group_track_count(kind, group);
        if cumulative + count > index {
            return Some((group, index - cumulative));
        }
        cumulative += count;
    }
    None
}
