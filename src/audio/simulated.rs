//! In-process stand-in for the audio I/O engine.
//!
//! `SimulatedEngine` implements [`AudioIo`] without touching a device. It
//! keeps the single-stream rule of a real engine, calls back on the stream's
//! listener the way a real engine does, and lets the caller decide when
//! capture starts, when blocks arrive and when the stream ends. The tests and
//! the demo binary drive transport sessions through it.

use super::engine::{
    AudioIo, CapturedBlocks, IoEngineListener, StreamRequest, StreamRole, StreamToken,
};
use crate::error::EngineError;
use crate::notify::DropoutInterval;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Seconds of audio carried by one simulated block delivery.
pub const BLOCK_SECS: f64 = 0.5;

/// The stream currently running on the simulated device.
struct ActiveStream {
    token: StreamToken,
    request: StreamRequest,
    /// Play head, in seconds.
    position: f64,
    recording_started: bool,
}

struct SimState {
    stream: Option<ActiveStream>,
    /// Error returned for every start request while set.
    device_error: Option<EngineError>,
    can_pause: bool,
    paused: bool,
    monitoring: bool,
    requests: Vec<StreamRequest>,
}

/// A device-free engine with one stream slot.
pub struct SimulatedEngine {
    state: Mutex<SimState>,
    next_token: AtomicU64,
}

impl SimulatedEngine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState {
                stream: None,
                device_error: None,
                can_pause: true,
                paused: false,
                monitoring: false,
                requests: Vec::new(),
            }),
            next_token: AtomicU64::new(1),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every start request fail with `error` until cleared with None.
    pub fn set_device_error(&self, error: Option<EngineError>) {
        self.state().device_error = error;
    }

    /// Whether the device accepts pause requests.
    pub fn set_can_pause(&self, can_pause: bool) {
        self.state().can_pause = can_pause;
    }

    pub fn set_monitoring(&self, monitoring: bool) {
        self.state().monitoring = monitoring;
    }

    /// Moves the play head of the running stream.
    pub fn set_stream_time(&self, time: f64) {
        if let Some(stream) = self.state().stream.as_mut() {
            stream.position = time;
        }
    }

    /// Every start request received, including refused ones.
    pub fn requests(&self) -> Vec<StreamRequest> {
        self.state().requests.clone()
    }

    /// Token of the running stream.
    pub fn active_token(&self) -> Option<StreamToken> {
        self.state().stream.as_ref().map(|s| s.token)
    }

    /// Listener of the running stream, if it is still alive.
    fn active_listener(&self) -> Option<(StreamToken, Arc<dyn IoEngineListener>)> {
        let state = self.state();
        let stream = state.stream.as_ref()?;
        let listener = stream.request.listener.upgrade()?;
        Some((stream.token, listener))
    }

    /// Reports that capture began on the running recording stream.
    ///
    /// # Returns
    ///
    /// false when no recording stream is running
    pub fn confirm_recording_started(&self) -> bool {
        let listener = {
            let mut state = self.state();
            let Some(stream) = state.stream.as_mut() else {
                return false;
            };
            if !stream.request.role.captures() || stream.recording_started {
                return false;
            }
            stream.recording_started = true;
            stream.request.listener.clone()
        };
        if let Some(listener) = listener.upgrade() {
            listener.on_audio_io_start_recording();
        }
        true
    }

    /// Appends one block to every capture track of the running recording.
    ///
    /// # Arguments
    ///
    /// * `gap` - Dropout detected before this block, if any
    ///
    /// # Returns
    ///
    /// false when no started recording is running
    pub fn deliver_blocks(&self, gap: Option<DropoutInterval>) -> bool {
        let (blocks, listener) = {
            let mut state = self.state();
            if state.paused {
                return false;
            }
            let Some(stream) = state.stream.as_mut() else {
                return false;
            };
            if !stream.recording_started {
                return false;
            }
            stream.position += BLOCK_SECS;
            let blocks = CapturedBlocks {
                tracks: stream.request.tracks.capture.clone(),
                gap,
            };
            (blocks, stream.request.listener.clone())
        };
        if let Some(listener) = listener.upgrade() {
            listener.on_audio_io_new_blocks(&blocks);
        }
        true
    }

    /// Signals that input crossed the sound-activation threshold.
    pub fn trigger_sound_activation(&self) {
        if let Some((_, listener)) = self.active_listener() {
            listener.on_sound_activation_threshold();
        }
    }

    /// Ends the running stream as if it reached the end of its region.
    pub fn finish(&self) {
        let Some(stream) = self.state().stream.take() else {
            return;
        };
        self.state().paused = false;
        tracing::debug!(token = %stream.token, "simulated stream finished");
        if let Some(listener) = stream.request.listener.upgrade() {
            Self::close_recording(&stream, listener.as_ref());
            listener.on_audio_io_stream_finished(stream.token);
        }
    }

    fn close_recording(stream: &ActiveStream, listener: &dyn IoEngineListener) {
        if stream.request.role.captures() {
            listener.on_audio_io_stop_recording();
            if stream.recording_started {
                listener.on_commit_recording();
            }
        }
    }

    /// Starts a bare playback stream with no listener.
    #[cfg(test)]
    pub(crate) fn start_simple_stream(&self) -> StreamToken {
        use super::engine::StreamOptions;
        use crate::model::TrackId;
        use crate::selector::TransportTracks;
        use std::sync::Weak;

        struct Detached;
        impl IoEngineListener for Detached {
            fn on_audio_io_rate(&self, _: u32) {}
            fn on_audio_io_start_recording(&self) {}
            fn on_audio_io_stop_recording(&self) {}
            fn on_audio_io_new_blocks(&self, _: &CapturedBlocks) {}
            fn on_commit_recording(&self) {}
            fn on_sound_activation_threshold(&self) {}
            fn on_audio_io_stream_finished(&self, _: StreamToken) {}
        }

        let listener: Weak<dyn IoEngineListener> = Weak::<Detached>::new();
        let request = StreamRequest {
            tracks: TransportTracks {
                playback: vec![TrackId::new()],
                ..Default::default()
            },
            t0: 0.0,
            t1: 1.0,
            role: StreamRole::Playback,
            options: StreamOptions::new(44100),
            listener,
        };
        match self.start_stream(request) {
            Ok(token) => token,
            Err(e) => panic!("simulated stream refused: {}", e),
        }
    }
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioIo for SimulatedEngine {
    fn start_stream(&self, request: StreamRequest) -> Result<StreamToken, EngineError> {
        let (token, rate, listener) = {
            let mut state = self.state();
            state.requests.push(request.clone());

            if let Some(error) = state.device_error.clone() {
                return Err(error);
            }
            if state.stream.is_some() {
                return Err(EngineError::DeviceBusy);
            }
            let tracks = &request.tracks;
            match request.role {
                StreamRole::Playback if tracks.has_no_playback() => {
                    return Err(EngineError::InvalidRequest(
                        "no tracks to play".to_string(),
                    ));
                }
                StreamRole::Record { .. } if tracks.capture.is_empty() => {
                    return Err(EngineError::InvalidRequest(
                        "no tracks to record into".to_string(),
                    ));
                }
                _ => {}
            }

            let raw = self.next_token.fetch_add(1, Ordering::Relaxed);
            let token = StreamToken::new(raw).ok_or_else(|| {
                EngineError::DeviceUnavailable("token counter exhausted".to_string())
            })?;
            let rate = request.options.rate;
            let listener = request.listener.clone();
            let position = request.t0.min(request.t1).max(0.0);
            state.stream = Some(ActiveStream {
                token,
                request,
                position,
                recording_started: false,
            });
            (token, rate, listener)
        };

        tracing::debug!(%token, rate, "simulated stream started");
        if let Some(listener) = listener.upgrade() {
            listener.on_audio_io_rate(rate);
        }
        Ok(token)
    }

    fn stop_stream(&self, token: StreamToken) {
        let stream = {
            let mut state = self.state();
            if state.stream.as_ref().is_none_or(|s| s.token != token) {
                return;
            }
            state.paused = false;
            state.stream.take()
        };
        if let Some(stream) = stream {
            tracing::debug!(%token, "simulated stream stopped");
            if let Some(listener) = stream.request.listener.upgrade() {
                Self::close_recording(&stream, listener.as_ref());
            }
        }
    }

    fn set_paused(&self, paused: bool) -> bool {
        let mut state = self.state();
        if !state.can_pause {
            return false;
        }
        state.paused = paused;
        true
    }

    fn is_paused(&self) -> bool {
        self.state().paused
    }

    fn is_busy(&self) -> bool {
        self.state().stream.is_some()
    }

    fn is_stream_active(&self, token: StreamToken) -> bool {
        self.state().stream.as_ref().is_some_and(|s| s.token == token)
    }

    fn is_capturing(&self, token: StreamToken) -> bool {
        self.state()
            .stream
            .as_ref()
            .is_some_and(|s| s.token == token && s.request.role.captures())
    }

    fn is_monitoring(&self) -> bool {
        self.state().monitoring
    }

    fn stream_time(&self) -> Option<f64> {
        self.state().stream.as_ref().map(|s| s.position)
    }
}
