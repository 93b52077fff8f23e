//! Project container.
//!
//! A project owns its track list, the current time selection, and the
//! optional loop region used by looped playback.

use super::region::SelectedRegion;
use super::track::{Track, TrackId};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Default project sample rate in Hz.
pub const DEFAULT_RATE: u32 = 44100;

/// Unique identifier for a project.
///
/// Used by the stream arbiter to tell which project owns the audio stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(Uuid);

impl ProjectId {
    /// Generates a new random project ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A multi-track project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    id: ProjectId,

    /// Project name.
    pub name: String,

    /// Project sample rate in Hz. New recordings default to this rate.
    pub rate: u32,

    /// Collection of tracks in the project.
    tracks: Vec<Track>,

    /// Current time selection (a point when nothing is selected).
    selection: SelectedRegion,

    /// Loop region, if one is active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    loop_region: Option<SelectedRegion>,
}

impl Project {
    /// Creates a new empty project at the default rate.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_rate(name, DEFAULT_RATE)
    }

    /// Creates a new empty project at the given rate.
    pub fn with_rate(name: impl Into<String>, rate: u32) -> Self {
        Self {
            id: ProjectId::new(),
            name: name.into(),
            rate,
            tracks: Vec::new(),
            selection: SelectedRegion::default(),
            loop_region: None,
        }
    }

    pub fn id(&self) -> ProjectId {
        self.id
    }

    /// Adds a track to the project.
    ///
    /// # Returns
    ///
    /// The TrackId of the added track
    pub fn add_track(&mut self, track: Track) -> TrackId {
        let id = track.id;
        self.tracks.push(track);
        id
    }

    /// Creates and adds a new wave track.
    pub fn create_wave_track(
        &mut self,
        name: impl Into<String>,
        rate: u32,
        channels: u16,
    ) -> TrackId {
        self.add_track(Track::new_wave(name, rate, channels))
    }

    /// Removes a track by its ID.
    ///
    /// # Returns
    ///
    /// The removed track, or None if not found
    pub fn remove_track(&mut self, id: TrackId) -> Option<Track> {
        let pos = self.tracks.iter().position(|t| t.id == id)?;
        Some(self.tracks.remove(pos))
    }

    /// Returns a reference to a track by its ID.
    pub fn get_track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    /// Returns a mutable reference to a track by its ID.
    pub fn get_track_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.id == id)
    }

    /// Returns all tracks in the project.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Returns an iterator over mutable track references.
    pub fn tracks_mut(&mut self) -> impl Iterator<Item = &mut Track> {
        self.tracks.iter_mut()
    }

    /// Returns the selected tracks in project order.
    pub fn selected_tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter().filter(|t| t.selected)
    }

    /// Returns the number of tracks in the project.
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn selection(&self) -> SelectedRegion {
        self.selection
    }

    pub fn selection_mut(&mut self) -> &mut SelectedRegion {
        &mut self.selection
    }

    pub fn set_selection(&mut self, selection: SelectedRegion) {
        self.selection = selection;
    }

    /// The active loop region, if any.
    pub fn loop_region(&self) -> Option<SelectedRegion> {
        self.loop_region
    }

    pub fn set_loop_region(&mut self, region: Option<SelectedRegion>) {
        self.loop_region = region;
    }

    /// Latest end time across all tracks, in seconds.
    pub fn end_time(&self) -> f64 {
        self.tracks.iter().map(|t| t.end_time).fold(0.0, f64::max)
    }

    /// Picks a name for the next track created by a recording.
    ///
    /// Returns `base` when no track uses it yet, otherwise `base N` with the
    /// first free number starting at 2.
    pub fn next_recording_name(&self, base: &str) -> String {
        let taken = |name: &str| self.tracks.iter().any(|t| t.name == name);
        if !taken(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{} {}", base, n))
            .find(|name| !taken(name))
            .unwrap_or_else(|| base.to_string())
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new("Untitled Project")
    }
}
