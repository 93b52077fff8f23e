//! Transport status record.
//!
//! The status is a tagged phase rather than a set of independent booleans,
//! so combinations like "looping while recording" or "cutting after stop"
//! cannot be represented. The boolean views (`paused()`, `looping()`, ...)
//! are derived from the phase.

use std::fmt;

/// Kind of playback requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayMode {
    #[default]
    NormalPlay,
    /// Short audition; the view does not follow the play head.
    OneSecondPlay,
    /// Possibly looping play; the view does not follow the play head.
    LoopedPlay,
    /// Plays around the selection as if it had been cut.
    CutPreviewPlay,
}

impl PlayMode {
    /// Whether the view should scroll along with the play head.
    pub fn follows_play_head(self) -> bool {
        matches!(self, PlayMode::NormalPlay | PlayMode::CutPreviewPlay)
    }
}

/// What the transport is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Activity {
    #[default]
    Idle,
    Playing(PlayMode),
    /// `appending` is true when recording into existing tracks.
    Recording { appending: bool },
}

/// Activity plus pause and stop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportPhase {
    Active(Activity),
    /// Pause may be armed while idle; the next stream then starts paused.
    Paused(Activity),
    /// A stop sequence is in flight.
    Stopping,
}

impl Default for TransportPhase {
    fn default() -> Self {
        TransportPhase::Active(Activity::Idle)
    }
}

impl fmt::Display for TransportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let activity = match self {
            TransportPhase::Stopping => return write!(f, "Stopping"),
            TransportPhase::Active(a) | TransportPhase::Paused(a) => a,
        };
        let label = match activity {
            Activity::Idle => "Idle",
            Activity::Playing(PlayMode::LoopedPlay) => "Looping",
            Activity::Playing(PlayMode::CutPreviewPlay) => "Cut Preview",
            Activity::Playing(_) => "Playing",
            Activity::Recording { appending: true } => "Recording (append)",
            Activity::Recording { appending: false } => "Recording",
        };
        if matches!(self, TransportPhase::Paused(_)) {
            write!(f, "{} (paused)", label)
        } else {
            write!(f, "{}", label)
        }
    }
}

/// Status owned by one project's transport.
#[derive(Debug, Clone, Default)]
pub struct TransportState {
    phase: TransportPhase,
    last_play_mode: PlayMode,
    /// Rate last reported by the engine; used for status text only.
    displayed_rate: u32,
}

impl TransportState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> TransportPhase {
        self.phase
    }

    /// Current activity, or None while stopping.
    pub fn activity(&self) -> Option<Activity> {
        match self.phase {
            TransportPhase::Active(a) | TransportPhase::Paused(a) => Some(a),
            TransportPhase::Stopping => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.activity() == Some(Activity::Idle)
    }

    pub fn paused(&self) -> bool {
        matches!(self.phase, TransportPhase::Paused(_))
    }

    pub fn stopping(&self) -> bool {
        self.phase == TransportPhase::Stopping
    }

    pub fn appending(&self) -> bool {
        self.activity() == Some(Activity::Recording { appending: true })
    }

    pub fn looping(&self) -> bool {
        self.activity() == Some(Activity::Playing(PlayMode::LoopedPlay))
    }

    pub fn cutting(&self) -> bool {
        self.activity() == Some(Activity::Playing(PlayMode::CutPreviewPlay))
    }

    pub fn last_play_mode(&self) -> PlayMode {
        self.last_play_mode
    }

    pub fn set_last_play_mode(&mut self, mode: PlayMode) {
        self.last_play_mode = mode;
    }

    pub fn displayed_rate(&self) -> u32 {
        self.displayed_rate
    }

    pub fn set_displayed_rate(&mut self, rate: u32) {
        self.displayed_rate = rate;
    }

    /// Enters a new activity, keeping an armed pause.
    pub fn begin_activity(&mut self, activity: Activity) {
        self.phase = if self.paused() {
            TransportPhase::Paused(activity)
        } else {
            TransportPhase::Active(activity)
        };
    }

    /// Sets or clears pause.
    ///
    /// # Returns
    ///
    /// false while stopping, when pause cannot change
    pub fn set_paused(&mut self, paused: bool) -> bool {
        self.phase = match (self.phase, paused) {
            (TransportPhase::Stopping, _) => return false,
            (TransportPhase::Active(a) | TransportPhase::Paused(a), true) => {
                TransportPhase::Paused(a)
            }
            (TransportPhase::Active(a) | TransportPhase::Paused(a), false) => {
                TransportPhase::Active(a)
            }
        };
        true
    }

    /// Enters the stopping phase.
    ///
    /// # Returns
    ///
    /// false when a stop sequence is already in flight
    pub fn begin_stop(&mut self) -> bool {
        if self.stopping() {
            return false;
        }
        self.phase = TransportPhase::Stopping;
        true
    }

    /// Leaves the stopping phase with every flag cleared.
    pub fn finish_stop(&mut self) {
        self.phase = TransportPhase::Active(Activity::Idle);
    }
}
