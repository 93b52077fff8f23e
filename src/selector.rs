//! Track resolution for transport operations.
//!
//! Pure functions over a [`Project`]. None of them fail: when nothing
//! qualifies they return an empty result and the caller decides what to do
//! (for recording, an empty result means new tracks must be created).

use crate::config::TransportPreferences;
use crate::model::{Project, Track, TrackId, TrackKind};

/// Tracks taking part in one transport operation.
///
/// Built fresh for every play or record request and handed to the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportTracks {
    /// Wave tracks to play back.
    pub playback: Vec<TrackId>,
    /// Other playable tracks (note tracks) to play back.
    pub other_playable: Vec<TrackId>,
    /// Wave tracks receiving recorded audio.
    pub capture: Vec<TrackId>,
}

impl TransportTracks {
    /// Whether no track would produce sound.
    pub fn has_no_playback(&self) -> bool {
        self.playback.is_empty() && self.other_playable.is_empty()
    }

    /// Drops capture tracks from the playback list so that a track is never
    /// played and recorded at once.
    pub fn exclude_capture_from_playback(&mut self) {
        let capture = &self.capture;
        self.playback.retain(|id| !capture.contains(id));
    }
}

/// Snapshot of the current track selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PropertiesOfSelected {
    /// True when at least one wave track is selected and all share one rate.
    pub all_same_rate: bool,
    /// The shared rate, or None when mixed or empty.
    pub rate_of_selected: Option<u32>,
    /// Number of selected wave tracks.
    pub number_of_selected: usize,
}

/// Finds existing tracks that can receive new recorded audio.
///
/// # Arguments
///
/// * `project` - Project to search
/// * `selected_only` - Restrict the search to selected tracks
/// * `target_rate` - Required sample rate, or None to accept any rate
///
/// # Returns
///
/// Writable tracks in project order; empty when none qualify
pub fn choose_existing_recording_tracks(
    project: &Project,
    selected_only: bool,
    target_rate: Option<u32>,
) -> Vec<TrackId> {
    project
        .tracks()
        .iter()
        .filter(|t| !selected_only || t.selected)
        .filter(|t| t.is_writable())
        .filter(|t| target_rate.is_none_or(|rate| t.rate == rate))
        .map(|t| t.id)
        .collect()
}

/// Collects the tracks to play back.
///
/// # Arguments
///
/// * `project` - Project to search
/// * `selected_only` - Restrict the search to selected tracks
/// * `non_wave_too` - Also collect playable tracks that are not wave tracks
pub fn get_all_playback_tracks(
    project: &Project,
    selected_only: bool,
    non_wave_too: bool,
) -> TransportTracks {
    let candidates = || {
        project
            .tracks()
            .iter()
            .filter(move |t| !selected_only || t.selected)
    };

    let playback = candidates()
        .filter(|t| t.kind == TrackKind::Wave)
        .map(|t| t.id)
        .collect();

    let other_playable = if non_wave_too {
        candidates()
            .filter(|t| t.kind != TrackKind::Wave && t.is_playable())
            .map(|t| t.id)
            .collect()
    } else {
        Vec::new()
    };

    TransportTracks {
        playback,
        other_playable,
        capture: Vec::new(),
    }
}

/// Scans the selected wave tracks once and reports whether they share a
/// sample rate.
pub fn get_properties_of_selected(project: &Project) -> PropertiesOfSelected {
    let mut rates = project
        .selected_tracks()
        .filter(|t| t.kind == TrackKind::Wave)
        .map(|t: &Track| t.rate);

    let Some(first) = rates.next() else {
        return PropertiesOfSelected::default();
    };

    let mut count = 1;
    let mut all_same_rate = true;
    for rate in rates {
        count += 1;
        if rate != first {
            all_same_rate = false;
        }
    }

    PropertiesOfSelected {
        all_same_rate,
        rate_of_selected: all_same_rate.then_some(first),
        number_of_selected: count,
    }
}

/// Whether playback continues during recording.
pub fn use_duplex(prefs: &TransportPreferences) -> bool {
    prefs.use_duplex()
}
