//! Track representation.
//!
//! Only the properties the transport needs are modelled here: kind, sample
//! rate, channel layout, selection and lock state. Clip and sample storage
//! belong to the engine and are not visible to this crate.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for generating unique track IDs.
static TRACK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a track within a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackId(u64);

impl TrackId {
    /// Generates a new unique track ID.
    pub fn new() -> Self {
        Self(TRACK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

/// Category of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackKind {
    /// Sampled audio. The only kind that can receive recorded audio.
    Wave,
    /// Note data rendered by a synthesizer.
    Note,
    /// Text labels on the timeline.
    Label,
    /// Time-warp envelope.
    Time,
}

impl TrackKind {
    /// Whether tracks of this kind produce sound during playback.
    pub fn is_playable(self) -> bool {
        matches!(self, TrackKind::Wave | TrackKind::Note)
    }
}

/// A single track in a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    /// Unique identifier for this track.
    pub id: TrackId,

    /// Human-readable name for the track.
    pub name: String,

    /// What the track holds.
    pub kind: TrackKind,

    /// Sample rate in Hz.
    pub rate: u32,

    /// Number of audio channels (1 = mono, 2 = stereo).
    pub channels: u16,

    /// Whether the track is part of the current selection.
    pub selected: bool,

    /// Locked tracks refuse new recorded audio.
    pub locked: bool,

    /// End of the last clip on the track, in seconds.
    pub end_time: f64,

    /// Set while the track was created for a recording that has not been
    /// committed yet.
    #[serde(skip)]
    pub pending: bool,
}

impl Track {
    /// Creates a new track of the given kind.
    ///
    /// # Arguments
    ///
    /// * `name` - Display name for the track
    /// * `kind` - Track category
    /// * `rate` - Sample rate in Hz
    pub fn new(name: impl Into<String>, kind: TrackKind, rate: u32) -> Self {
        Self {
            id: TrackId::new(),
            name: name.into(),
            kind,
            rate,
            channels: 1,
            selected: false,
            locked: false,
            end_time: 0.0,
            pending: false,
        }
    }

    /// Creates a wave track with the given rate and channel count.
    pub fn new_wave(name: impl Into<String>, rate: u32, channels: u16) -> Self {
        Self {
            channels: channels.max(1),
            ..Self::new(name, TrackKind::Wave, rate)
        }
    }

    /// Whether new recorded audio may be written into this track.
    pub fn is_writable(&self) -> bool {
        self.kind == TrackKind::Wave && !self.locked
    }

    /// Whether this track takes part in playback.
    pub fn is_playable(&self) -> bool {
        self.kind.is_playable()
    }

    /// Builder-style helper that marks the track as selected.
    pub fn with_selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    /// Builder-style helper that sets the end time of the track content.
    pub fn with_end_time(mut self, end_time: f64) -> Self {
        self.end_time = end_time.max(0.0);
        self
    }
}
