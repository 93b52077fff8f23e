//! Audio I/O engine boundary.
//!
//! This module defines what the transport expects from the engine and how
//! the single process-wide stream is shared between projects:
//! - `engine`: the `AudioIo` contract and the `IoEngineListener` callbacks
//! - `ownership`: the arbiter deciding which project owns the stream
//! - `simulated`: a device-free engine for tests and demos

pub mod engine;
pub mod ownership;
pub mod simulated;

pub use engine::{
    AudioIo, CapturedBlocks, CutPreview, IoEngineListener, PlaybackPolicy, StreamOptions,
    StreamRequest, StreamRole, StreamToken,
};
pub use ownership::{StreamOwnership, StreamReservation};
pub use simulated::SimulatedEngine;
