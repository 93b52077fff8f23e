//! trackdeck - Transport control for a multi-track audio editor.
//!
//! This library owns the play/record/pause/stop state of each project and
//! mediates between user commands and an asynchronous audio I/O engine.
//! The engine itself is an external collaborator behind the
//! [`audio::AudioIo`] trait; [`audio::SimulatedEngine`] stands in for it in
//! tests and in the demo binary.

pub mod audio;
pub mod config;
pub mod error;
pub mod model;
pub mod notify;
pub mod selector;
pub mod transport;

// Re-export commonly used types
pub use audio::{AudioIo, IoEngineListener, SimulatedEngine, StreamOwnership, StreamToken};
pub use config::TransportPreferences;
pub use error::{EngineError, Result, TransportError};
pub use model::{Project, ProjectId, SelectedRegion, Track, TrackId, TrackKind};
pub use notify::{NotificationBus, RecordingDropoutEvent, TransportEvent};
pub use selector::{PropertiesOfSelected, TransportTracks};
pub use transport::{PlayMode, TransportController};
