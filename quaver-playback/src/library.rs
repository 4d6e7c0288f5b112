//! Playlist/library accessor boundary
//!
//! The track list and its artist/album/genre groupings live outside this
//! core. The sequencer only needs ordered, indexed access: it never holds
//! track data, just indices and ids.

use uuid::Uuid;

/// Grouping dimension for hierarchical scopes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKind {
    Artist,
    Album,
    Genre,
}

impl std::fmt::Display for GroupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupKind::Artist => write!(f, "artist"),
            GroupKind::Album => write!(f, "album"),
            GroupKind::Genre => write!(f, "genre"),
        }
    }
}

/// Ordered, read-only access to the track list and its groupings
///
/// Group order and track-within-group order are the accessor's; the
/// sequencer flattens them track-major without reordering anything.
pub trait Library: Send + Sync {
    /// Number of tracks in the flat (ungrouped) list
    fn track_count(&self) -> usize;

    /// Track at a flat-list index
    fn track_at(&self, index: usize) -> Option<Uuid>;

    /// Flat-list index of a track
    fn index_of_track(&self, track_id: Uuid) -> Option<usize>;

    /// Number of groups of a kind
    fn group_count(&self, kind: GroupKind) -> usize;

    /// Number of tracks within one group
    fn group_track_count(&self, kind: GroupKind, group: usize) -> usize;

    /// Track at an index within one group
    fn group_track_at(&self, kind: GroupKind, group: usize, index: usize) -> Option<Uuid>;

    /// Locate a track as `(group_index, track_index_within_group)`
    fn locate_in_group(&self, kind: GroupKind, track_id: Uuid) -> Option<(usize, usize)>;
}
