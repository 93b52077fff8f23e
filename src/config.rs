//! Persisted transport preferences.
//!
//! Stored as JSON. Missing fields fall back to their defaults so older
//! preference files keep loading.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// User preferences that shape transport behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportPreferences {
    /// Play existing tracks while recording.
    pub duplex: bool,

    /// Create new tracks for recording unless the alternate gesture is used.
    pub prefer_new_track: bool,

    /// Channel count for new recording tracks when none can be derived.
    pub record_channels: u16,

    /// Pause recording while input stays below the activation level.
    pub sound_activated_recording: bool,

    /// Input level in dB that resumes a sound-activated recording.
    pub sound_activation_level_db: f64,

    /// Seconds played before the cut during cut preview.
    pub cut_preview_before_secs: f64,

    /// Seconds played after the cut during cut preview.
    pub cut_preview_after_secs: f64,

    /// Playback speed used by play-at-speed.
    pub play_at_speed: f64,

    /// Base name for tracks created by a recording.
    pub recording_track_name: String,
}

impl Default for TransportPreferences {
    fn default() -> Self {
        Self {
            duplex: true,
            prefer_new_track: false,
            record_channels: 2,
            sound_activated_recording: false,
            sound_activation_level_db: -50.0,
            cut_preview_before_secs: 2.0,
            cut_preview_after_secs: 1.0,
            play_at_speed: 1.0,
            recording_track_name: "Recorded Audio".to_string(),
        }
    }
}

impl TransportPreferences {
    /// Whether playback continues while recording.
    pub fn use_duplex(&self) -> bool {
        self.duplex
    }

    /// Loads preferences from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read preferences: {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse preferences: {}", path.display()))
    }

    /// Loads preferences, falling back to defaults when the file is missing
    /// or unreadable.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from_file(path) {
            Ok(prefs) => prefs,
            Err(e) => {
                tracing::warn!("Using default preferences: {:#}", e);
                Self::default()
            }
        }
    }

    /// Saves preferences to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or file writing fails
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).context("Failed to serialize preferences")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write preferences: {}", path.display()))
    }
}
