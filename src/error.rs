//! Error types for transport operations.
//!
//! Track resolution never fails: selectors return empty collections and the
//! caller decides what an empty result means. The errors here cover the
//! cases where a stream could not be started or was refused.

use crate::model::ProjectId;
use thiserror::Error;

/// Result type for transport commands.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Reasons the audio I/O engine may refuse a start request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The device is already running a stream.
    #[error("audio device is busy")]
    DeviceBusy,

    /// The device could not be opened.
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The engine rejected the request parameters.
    #[error("invalid stream request: {0}")]
    InvalidRequest(String),
}

/// Errors returned by transport commands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Another project owns the process-wide audio stream.
    #[error("audio stream is owned by project {owner}")]
    StreamBusy { owner: ProjectId },

    /// This project already has a stream running or starting.
    #[error("transport is already active")]
    AlreadyActive,

    /// No tracks qualified for the operation.
    #[error("no tracks to play or record")]
    NoTracks,

    /// The requested region has nothing to play.
    #[error("region is empty")]
    EmptyRegion,

    /// Tracks taking part in the stream disagree on sample rate.
    #[error("sample rate mismatch: expected {expected} Hz, found {found} Hz")]
    RateMismatch { expected: u32, found: u32 },

    /// A stop or cancellation arrived while the start request was in flight.
    #[error("start request was aborted")]
    StartAborted,

    /// The engine refused the start request.
    #[error(transparent)]
    Engine(#[from] EngineError),
}
