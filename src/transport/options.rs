//! Default stream options for a project.

use crate::audio::{PlaybackPolicy, StreamOptions};
use crate::config::TransportPreferences;
use crate::model::Project;

/// Options for an ordinary play or record request.
///
/// # Arguments
///
/// * `project` - Project supplying the rate and loop region
/// * `prefs` - Recording preferences
/// * `new_default` - Use the looping policy when a loop region is active
pub fn default_play_options(
    project: &Project,
    prefs: &TransportPreferences,
    new_default: bool,
) -> StreamOptions {
    let mut options = StreamOptions::new(project.rate);
    if new_default && project.loop_region().is_some() {
        options.policy = PlaybackPolicy::Looping;
    }
    options.capture_channels = prefs.record_channels.max(1);
    if prefs.sound_activated_recording {
        options.sound_activation_level_db = Some(prefs.sound_activation_level_db);
    }
    options
}

/// Options for play-at-speed. Invalid speeds fall back to normal speed.
pub fn default_speed_play_options(
    project: &Project,
    prefs: &TransportPreferences,
) -> StreamOptions {
    let mut options = default_play_options(project, prefs, false);
    if prefs.play_at_speed.is_finite() && prefs.play_at_speed > 0.0 {
        options.play_speed = prefs.play_at_speed;
    }
    options
}
