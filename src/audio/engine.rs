//! Contract between the transport and the audio I/O engine.
//!
//! The engine runs on its own threads. The transport hands it a
//! [`StreamRequest`] through [`AudioIo::start_stream`] and learns about
//! progress only through the [`IoEngineListener`] callbacks carried in that
//! request. Every start request is answered synchronously: either a token or
//! an [`EngineError`]. A started recording is always closed by exactly one
//! `on_audio_io_stop_recording` call, whether it ends on request or on its own.

use crate::error::EngineError;
use crate::model::TrackId;
use crate::notify::DropoutInterval;
use crate::selector::TransportTracks;
use std::fmt;
use std::num::NonZeroU64;
use std::sync::Weak;

/// Identifies one stream started by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamToken(NonZeroU64);

impl StreamToken {
    /// Wraps a raw token. Zero is never a valid token.
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    pub fn get(&self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for StreamToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How playback behaves when it reaches the end of the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackPolicy {
    /// Play the region once and stop.
    #[default]
    Once,
    /// Return to the start of the region and keep playing.
    Looping,
}

/// A region skipped during cut preview.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CutPreview {
    pub start: f64,
    pub end: f64,
}

/// Parameters for one stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamOptions {
    /// Sample rate requested from the device, in Hz.
    pub rate: u32,
    /// Playback speed multiplier.
    pub play_speed: f64,
    pub policy: PlaybackPolicy,
    /// Region removed from playback during cut preview.
    pub cut_preview: Option<CutPreview>,
    /// Input channels to open when recording.
    pub capture_channels: u16,
    /// Input level that resumes a sound-activated recording.
    pub sound_activation_level_db: Option<f64>,
}

impl StreamOptions {
    /// Plain options at the given rate: normal speed, played once.
    pub fn new(rate: u32) -> Self {
        Self {
            rate,
            play_speed: 1.0,
            policy: PlaybackPolicy::Once,
            cut_preview: None,
            capture_channels: 0,
            sound_activation_level_db: None,
        }
    }
}

/// What a stream does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamRole {
    Playback,
    /// Capture into the request's capture tracks; `duplex` also plays the
    /// request's playback tracks.
    Record { duplex: bool },
}

impl StreamRole {
    pub fn captures(&self) -> bool {
        matches!(self, StreamRole::Record { .. })
    }
}

/// Everything the engine needs to start a stream.
#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub tracks: TransportTracks,
    /// Start time in seconds. Greater than `t1` for backwards play.
    pub t0: f64,
    /// End time in seconds; infinite for open-ended recording.
    pub t1: f64,
    pub role: StreamRole,
    pub options: StreamOptions,
    /// Receiver for this stream's callbacks.
    pub listener: Weak<dyn IoEngineListener>,
}

/// One delivery of captured audio.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapturedBlocks {
    /// Tracks the engine appended audio to.
    pub tracks: Vec<TrackId>,
    /// Gap the engine detected before this delivery, if any.
    pub gap: Option<DropoutInterval>,
}

/// Callbacks the engine invokes, from its own threads.
pub trait IoEngineListener: Send + Sync {
    /// The device is running at `rate` Hz.
    fn on_audio_io_rate(&self, rate: u32);

    /// Capture has actually begun.
    fn on_audio_io_start_recording(&self);

    /// Capture has ended.
    fn on_audio_io_stop_recording(&self);

    /// Captured audio was appended to tracks.
    fn on_audio_io_new_blocks(&self, blocks: &CapturedBlocks);

    /// Recorded audio is durable in the track model.
    fn on_commit_recording(&self);

    /// Input crossed the sound-activation threshold.
    fn on_sound_activation_threshold(&self);

    /// A stream ended on its own (end of region reached or device lost).
    fn on_audio_io_stream_finished(&self, token: StreamToken);
}

/// The audio I/O engine as seen by the transport.
pub trait AudioIo: Send + Sync {
    /// Starts a stream. Never blocks until playback or recording ends.
    fn start_stream(&self, request: StreamRequest) -> Result<StreamToken, EngineError>;

    /// Stops the stream if it is still running.
    fn stop_stream(&self, token: StreamToken);

    /// Pauses or resumes the running stream.
    ///
    /// # Returns
    ///
    /// false when the device cannot change pause state right now
    fn set_paused(&self, paused: bool) -> bool;

    fn is_paused(&self) -> bool;

    /// Whether any stream is running.
    fn is_busy(&self) -> bool;

    fn is_stream_active(&self, token: StreamToken) -> bool;

    /// Whether the stream is running and capturing input.
    fn is_capturing(&self, token: StreamToken) -> bool;

    /// Whether the engine is only monitoring input, without a stream that
    /// belongs to any project.
    fn is_monitoring(&self) -> bool {
        false
    }

    /// Current play head of the running stream, in seconds.
    fn stream_time(&self) -> Option<f64>;
}
