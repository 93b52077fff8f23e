//! Transport control for a project.
//!
//! - `state`: the status record and its legal transitions
//! - `options`: default stream options derived from a project
//! - `controller`: play, record, pause and stop commands
//! - `listener`: engine callbacks and checkpoint failures

mod controller;
mod listener;
pub mod options;
pub mod state;

pub use controller::TransportController;
pub use options::{default_play_options, default_speed_play_options};
pub use state::{Activity, PlayMode, TransportPhase, TransportState};
