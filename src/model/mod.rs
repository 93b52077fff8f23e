//! Track model consumed by the transport.
//!
//! This is the slice of a project the transport needs to resolve tracks and
//! regions: track identity, kind, rate and channel layout, selection, and the
//! loop region. Waveform storage lives with the audio engine.

mod project;
mod region;
mod track;

pub use project::{Project, ProjectId, DEFAULT_RATE};
pub use region::SelectedRegion;
pub use track::{Track, TrackId, TrackKind};
