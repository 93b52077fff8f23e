//! Per-project transport controller.
//!
//! `TransportController` turns play, record, pause and stop commands into
//! stream requests for the audio engine and folds the engine's callbacks
//! back into its [`TransportState`]. Commands and callbacks serialize on one
//! mutex; the engine is always called with that mutex released, so an
//! engine that calls back from inside `start_stream` or `stop_stream` does
//! not deadlock.

use super::options::default_play_options;
use super::state::{Activity, PlayMode, TransportPhase, TransportState};
use crate::audio::{
    AudioIo, CutPreview, IoEngineListener, PlaybackPolicy, StreamOptions, StreamOwnership,
    StreamRequest, StreamReservation, StreamRole, StreamToken,
};
use crate::config::TransportPreferences;
use crate::error::{EngineError, Result, TransportError};
use crate::model::{Project, ProjectId, SelectedRegion, TrackId, TrackKind};
use crate::notify::{DropoutInterval, NotificationBus, TransportEvent};
use crate::selector::{
    choose_existing_recording_tracks, get_all_playback_tracks, get_properties_of_selected,
    use_duplex, TransportTracks,
};
use crossbeam_channel::Receiver;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Bookkeeping for the current recording.
#[derive(Debug, Default)]
pub(super) struct RecordingSession {
    /// Tracks created for this recording whose capture has not started.
    /// Removed from the project if the recording is cancelled.
    pub(super) provisional: Vec<TrackId>,
    /// Created tracks still carrying their pending mark.
    pub(super) uncommitted: Vec<TrackId>,
    /// Every track receiving audio, created or appended to.
    pub(super) capture: Vec<TrackId>,
    /// Gaps reported by the engine since the recording started.
    pub(super) gaps: Vec<DropoutInterval>,
    pub(super) blocks_received: usize,
}

/// State guarded by the controller's lock.
#[derive(Debug, Default)]
pub(super) struct Core {
    pub(super) state: TransportState,
    /// Token of the stream this project started, until it is stopped.
    pub(super) stream: Option<StreamToken>,
    pub(super) session: RecordingSession,
    pub(super) start_in_flight: bool,
    /// Set by stop or cancel while a start request is in flight.
    pub(super) start_aborted: bool,
    /// A stream that ended before its start request returned.
    pub(super) finished_during_start: Option<StreamToken>,
}

/// Transport for one project.
pub struct TransportController {
    me: Weak<TransportController>,
    project: Arc<Mutex<Project>>,
    project_id: ProjectId,
    ownership: Arc<StreamOwnership>,
    prefs: TransportPreferences,
    core: Mutex<Core>,
    /// Read and reset by timer recording; lives outside `core`.
    timer_record_cancelled: AtomicBool,
    bus: NotificationBus<TransportEvent>,
}

impl TransportController {
    /// Creates the transport for `project`.
    ///
    /// # Arguments
    ///
    /// * `project` - The project this transport plays and records
    /// * `ownership` - Arbiter shared by every project's transport
    /// * `prefs` - Recording and playback preferences
    pub fn new(
        project: Arc<Mutex<Project>>,
        ownership: Arc<StreamOwnership>,
        prefs: TransportPreferences,
    ) -> Arc<Self> {
        let project_id = project
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .id();
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            project,
            project_id,
            ownership,
            prefs,
            core: Mutex::new(Core::default()),
            timer_record_cancelled: AtomicBool::new(false),
            bus: NotificationBus::new(),
        })
    }

    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    pub fn preferences(&self) -> &TransportPreferences {
        &self.prefs
    }

    /// Registers an observer for this project's transport events.
    pub fn subscribe(&self) -> Receiver<TransportEvent> {
        self.bus.subscribe()
    }

    pub(super) fn core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn project(&self) -> MutexGuard<'_, Project> {
        self.project.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn ownership(&self) -> &StreamOwnership {
        &self.ownership
    }

    pub(super) fn engine(&self) -> &dyn AudioIo {
        self.ownership.engine()
    }

    pub(super) fn publish(&self, event: TransportEvent) {
        let reached = self.bus.publish(event);
        tracing::debug!("Transport event delivered to {} observers", reached);
    }

    fn listener(&self) -> Weak<dyn IoEngineListener> {
        self.me.clone()
    }

    fn current_stream(&self) -> Option<StreamToken> {
        self.core().stream
    }

    // ==================== Stream start ====================

    /// Claims the shared stream and marks a start request as in flight.
    fn begin_start(&self) -> Result<StreamReservation<'_>> {
        {
            let core = self.core();
            if core.start_in_flight || core.state.stopping() {
                return Err(TransportError::AlreadyActive);
            }
        }
        let reservation = self.ownership.reserve(self.project_id)?;
        let mut core = self.core();
        core.start_in_flight = true;
        core.start_aborted = false;
        core.finished_during_start = None;
        Ok(reservation)
    }

    /// Settles a start request once the engine has answered.
    ///
    /// On success the lease is committed and the state enters `activity`.
    /// If a stop or cancel arrived meanwhile, the new stream is stopped
    /// again and `StartAborted` is returned. A stream that already ended
    /// leaves the state idle and its lease released.
    fn finish_start(
        &self,
        reservation: StreamReservation<'_>,
        result: std::result::Result<StreamToken, EngineError>,
        activity: Activity,
    ) -> Result<StreamToken> {
        let token = match result {
            Ok(token) => token,
            Err(e) => {
                let mut core = self.core();
                core.start_in_flight = false;
                core.start_aborted = false;
                core.finished_during_start = None;
                drop(core);
                tracing::warn!("Audio engine refused to start a stream: {}", e);
                return Err(e.into());
            }
        };

        // Still in flight here, so a finish callback racing this check is
        // recorded rather than ignored.
        let alive = self.engine().is_stream_active(token);

        let mut core = self.core();
        core.start_in_flight = false;
        let aborted = std::mem::take(&mut core.start_aborted);
        let finished = core.finished_during_start.take() == Some(token);

        if aborted {
            drop(core);
            tracing::info!("Start of stream {} aborted, stopping it again", token);
            self.engine().stop_stream(token);
            return Err(TransportError::StartAborted);
        }

        if finished || !alive {
            drop(core);
            drop(reservation);
            self.rollback_provisional();
            tracing::info!("Stream {} ended before its start completed", token);
            return Ok(token);
        }

        reservation.commit(token);
        core.stream = Some(token);
        core.state.begin_activity(activity);
        let start_paused = core.state.paused();
        drop(core);

        tracing::info!("Stream {} started: {}", token, TransportPhase::Active(activity));
        if start_paused {
            self.engine().set_paused(true);
        }
        Ok(token)
    }

    // ==================== Play ====================

    /// Starts playback of a region.
    ///
    /// A point region plays to the end of the project, or the whole project
    /// when looping. Cut preview plays around the region as if it had been
    /// removed.
    ///
    /// # Arguments
    ///
    /// * `selection` - Region to play
    /// * `options` - Stream options, usually from `default_play_options`
    /// * `mode` - Kind of playback
    /// * `backwards` - Play from the end of the region towards its start
    ///
    /// # Errors
    ///
    /// `StreamBusy` when another project owns the stream, `NoTracks` when
    /// nothing would sound, `EmptyRegion` when the region has no length, or
    /// the engine's refusal.
    pub fn play_play_region(
        &self,
        selection: SelectedRegion,
        mut options: StreamOptions,
        mode: PlayMode,
        backwards: bool,
    ) -> Result<StreamToken> {
        let (tracks, end_time) = {
            let project = self.project();
            (get_all_playback_tracks(&project, false, true), project.end_time())
        };

        if mode == PlayMode::LoopedPlay {
            options.policy = PlaybackPolicy::Looping;
        }
        let looped = options.policy == PlaybackPolicy::Looping;

        let (mut t0, mut t1) = if mode == PlayMode::CutPreviewPlay {
            if selection.is_point() {
                return Err(TransportError::EmptyRegion);
            }
            options.cut_preview = Some(CutPreview {
                start: selection.t0(),
                end: selection.t1(),
            });
            (
                (selection.t0() - self.prefs.cut_preview_before_secs).max(0.0),
                selection.t1() + self.prefs.cut_preview_after_secs,
            )
        } else if selection.is_point() {
            if looped {
                (0.0, end_time)
            } else {
                (selection.t0(), end_time)
            }
        } else {
            (selection.t0(), selection.t1())
        };

        if t0.is_nan() || t1.is_nan() || t1 <= t0 {
            return Err(TransportError::EmptyRegion);
        }
        if tracks.has_no_playback() {
            return Err(TransportError::NoTracks);
        }
        if backwards {
            std::mem::swap(&mut t0, &mut t1);
        }

        let reservation = self.begin_start()?;
        self.core().state.set_last_play_mode(mode);

        let request = StreamRequest {
            tracks,
            t0,
            t1,
            role: StreamRole::Playback,
            options,
            listener: self.listener(),
        };
        tracing::debug!("Requesting playback from {:.3}s to {:.3}s ({:?})", t0, t1, mode);
        let result = self.engine().start_stream(request);
        self.finish_start(reservation, result, Activity::Playing(mode))
    }

    /// Plays the selection, or the loop region for the new default policy.
    ///
    /// # Arguments
    ///
    /// * `new_default` - Use the loop region and looping policy when a loop
    ///   region is active; overrides `cut_preview`
    /// * `cut_preview` - Play around the selection as if it were cut
    pub fn play_current_region(&self, new_default: bool, cut_preview: bool) -> Result<StreamToken> {
        if !self.can_stop_audio_stream() {
            return Err(self.busy_error());
        }
        let cut_preview = cut_preview && !new_default;

        let (region, options) = {
            let project = self.project();
            let region = project
                .loop_region()
                .filter(|_| new_default)
                .unwrap_or_else(|| project.selection());
            (region, default_play_options(&project, &self.prefs, new_default))
        };

        let mode = if cut_preview {
            PlayMode::CutPreviewPlay
        } else if options.policy == PlaybackPolicy::Looping {
            PlayMode::LoopedPlay
        } else {
            PlayMode::NormalPlay
        };
        self.play_play_region(region, options, mode, false)
    }

    fn busy_error(&self) -> TransportError {
        match self.ownership.owner() {
            Some(owner) => TransportError::StreamBusy { owner },
            None => TransportError::AlreadyActive,
        }
    }

    // ==================== Record ====================

    /// Starts recording.
    ///
    /// When `tracks` carries no capture tracks, new wave tracks are created
    /// first and the recording does not append. New tracks stay provisional
    /// until the engine confirms capture began; any failure before that
    /// removes them again and leaves the transport state untouched.
    ///
    /// # Arguments
    ///
    /// * `tracks` - Capture tracks to append to, plus playback tracks for
    ///   duplex recording
    /// * `t0` - Recording start time, in seconds
    /// * `t1` - Recording end time; `f64::INFINITY` for open-ended
    /// * `alt_appearance` - The alternate record gesture was used
    /// * `options` - Stream options; `rate` is the recording rate
    pub fn do_record(
        &self,
        mut tracks: TransportTracks,
        t0: f64,
        t1: f64,
        alt_appearance: bool,
        options: StreamOptions,
    ) -> Result<StreamToken> {
        if t0.is_nan() || t1.is_nan() || t1 <= t0 {
            return Err(TransportError::EmptyRegion);
        }
        let reservation = self.begin_start()?;

        let mut options = options;
        let appending = !tracks.capture.is_empty();
        let created = match self.prepare_capture_tracks(&mut tracks, &mut options) {
            Ok(created) => created,
            Err(e) => {
                self.core().start_in_flight = false;
                tracing::warn!("Recording not started: {}", e);
                return Err(e);
            }
        };

        {
            let mut core = self.core();
            core.session = RecordingSession {
                provisional: created.clone(),
                uncommitted: created,
                capture: tracks.capture.clone(),
                gaps: Vec::new(),
                blocks_received: 0,
            };
        }

        let duplex = !tracks.has_no_playback();
        tracing::debug!(
            "Requesting recording into {} tracks from {:.3}s (append: {}, duplex: {}, alt: {})",
            tracks.capture.len(),
            t0,
            appending,
            duplex,
            alt_appearance
        );
        let request = StreamRequest {
            tracks,
            t0,
            t1,
            role: StreamRole::Record { duplex },
            options,
            listener: self.listener(),
        };
        let result = self.engine().start_stream(request);
        let outcome = self.finish_start(reservation, result, Activity::Recording { appending });
        if outcome.is_err() {
            self.rollback_provisional();
        }
        outcome
    }

    /// Validates the capture set and creates new tracks when it is empty.
    ///
    /// A new track takes its rate and channel count from the first duplex
    /// playback wave track, else from the first wave track of the project,
    /// else from `options`. `options.rate` is updated to the recording rate.
    ///
    /// # Returns
    ///
    /// IDs of the tracks created; the project is unchanged on error
    fn prepare_capture_tracks(
        &self,
        tracks: &mut TransportTracks,
        options: &mut StreamOptions,
    ) -> Result<Vec<TrackId>> {
        let mut project = self.project();

        for id in &tracks.capture {
            let track = project.get_track(*id).ok_or(TransportError::NoTracks)?;
            if !track.is_writable() {
                return Err(TransportError::NoTracks);
            }
            if track.rate != options.rate {
                return Err(TransportError::RateMismatch {
                    expected: options.rate,
                    found: track.rate,
                });
            }
        }

        tracks.exclude_capture_from_playback();
        let layout = tracks
            .capture
            .is_empty()
            .then(|| new_track_layout(&project, tracks, options));
        if let Some((rate, _)) = layout {
            options.rate = rate;
        }
        let rate = options.rate;

        for id in &tracks.playback {
            if let Some(track) = project.get_track(*id) {
                if track.kind == TrackKind::Wave && track.rate != rate {
                    return Err(TransportError::RateMismatch {
                        expected: rate,
                        found: track.rate,
                    });
                }
            }
        }

        let Some((_, channels)) = layout else {
            return Ok(Vec::new());
        };

        let name = project.next_recording_name(&self.prefs.recording_track_name);
        let id = project.create_wave_track(name, rate, channels);
        if let Some(track) = project.get_track_mut(id) {
            track.pending = true;
        }
        tracks.capture.push(id);
        tracing::info!("Created provisional recording track {}", id.as_u64());
        Ok(vec![id])
    }

    /// Removes tracks created for a recording that never started.
    ///
    /// # Returns
    ///
    /// true if any track was removed
    pub(super) fn rollback_provisional(&self) -> bool {
        let provisional = {
            let mut core = self.core();
            let session = &mut core.session;
            let provisional = std::mem::take(&mut session.provisional);
            session.uncommitted.retain(|id| !provisional.contains(id));
            session.capture.retain(|id| !provisional.contains(id));
            provisional
        };
        if provisional.is_empty() {
            return false;
        }
        let mut project = self.project();
        for id in &provisional {
            project.remove_track(*id);
        }
        tracing::info!("Discarded {} provisional recording tracks", provisional.len());
        true
    }

    /// Starts recording with tracks and times taken from the project.
    ///
    /// Appends when `alt_appearance` equals the prefer-new-track preference,
    /// otherwise records into new tracks. Appending picks writable tracks
    /// among the selection, or among all tracks when nothing suitable is
    /// selected; a range selection punches in at its start, a point appends
    /// after the latest end of those tracks.
    pub fn on_record(&self, alt_appearance: bool) -> Result<StreamToken> {
        let append = alt_appearance == self.prefs.prefer_new_track;

        let (tracks, t0, t1, options) = {
            let project = self.project();
            let selection = project.selection();
            let mut options = default_play_options(&project, &self.prefs, false);
            let mut t0 = selection.t0();
            let t1 = if selection.is_point() {
                f64::INFINITY
            } else {
                selection.t1()
            };

            let mut capture = Vec::new();
            if append {
                let selected = get_properties_of_selected(&project);
                if selected.number_of_selected > 0 && !selected.all_same_rate {
                    return Err(self.selected_rate_conflict(&project));
                }
                capture =
                    choose_existing_recording_tracks(&project, true, selected.rate_of_selected);
                if capture.is_empty() {
                    if selected.number_of_selected > 0
                        && selected.rate_of_selected != Some(options.rate)
                    {
                        return Err(TransportError::RateMismatch {
                            expected: options.rate,
                            found: selected.rate_of_selected.unwrap_or(options.rate),
                        });
                    }
                    capture =
                        choose_existing_recording_tracks(&project, false, Some(options.rate));
                }
                if let Some(rate) = capture
                    .first()
                    .and_then(|id| project.get_track(*id))
                    .map(|t| t.rate)
                {
                    options.rate = rate;
                }
                if !capture.is_empty() && selection.is_point() {
                    t0 = capture
                        .iter()
                        .filter_map(|id| project.get_track(*id))
                        .map(|t| t.end_time)
                        .fold(t0, f64::max);
                }
            }

            let mut tracks = if use_duplex(&self.prefs) {
                get_all_playback_tracks(&project, false, true)
            } else {
                TransportTracks::default()
            };
            tracks.capture = capture;
            (tracks, t0, t1, options)
        };

        self.do_record(tracks, t0, t1, alt_appearance, options)
    }

    fn selected_rate_conflict(&self, project: &Project) -> TransportError {
        let mut rates = project
            .selected_tracks()
            .filter(|t| t.kind == TrackKind::Wave)
            .map(|t| t.rate);
        let expected = rates.next().unwrap_or(project.rate);
        let found = rates.find(|r| *r != expected).unwrap_or(expected);
        TransportError::RateMismatch { expected, found }
    }

    /// Discards tracks created for a recording that has not started
    /// capturing. Safe to call at any time.
    ///
    /// While a start request is in flight the start is aborted instead and
    /// the tracks are removed once the engine answers. If the stream is
    /// already running into provisional tracks it is stopped.
    pub fn cancel_recording(&self) {
        let (in_flight, has_stream, has_provisional) = {
            let mut core = self.core();
            if core.start_in_flight {
                core.start_aborted = true;
            }
            (
                core.start_in_flight,
                core.stream.is_some(),
                !core.session.provisional.is_empty(),
            )
        };
        if in_flight || !has_provisional {
            return;
        }
        if has_stream {
            self.stop(true);
        } else {
            self.rollback_provisional();
        }
    }

    // ==================== Pause and stop ====================

    /// Toggles pause. The engine decides; when it refuses, nothing changes.
    pub fn on_pause(&self) {
        if !self.can_stop_audio_stream() {
            return;
        }
        let paused = !self.core().state.paused();
        if !self.engine().set_paused(paused) {
            tracing::debug!("Audio engine cannot change pause state now");
            return;
        }
        if !self.core().state.set_paused(paused) {
            // Stopping took over; keep the engine consistent with it.
            self.engine().set_paused(!paused);
        }
    }

    /// Pause as requested by the engine side.
    ///
    /// A project that does not own the stream only flips the engine's pause.
    pub fn pause(&self) {
        if !self.can_stop_audio_stream() {
            let engine = self.engine();
            engine.set_paused(!engine.is_paused());
        } else {
            self.on_pause();
        }
    }

    /// Stops the transport and clears every status flag.
    ///
    /// Does nothing when another project owns the stream. Safe to call when
    /// nothing is running, and while a start request is in flight (the
    /// start is then aborted).
    ///
    /// # Arguments
    ///
    /// * `stop_stream` - Ask the engine to halt the stream; false when the
    ///   stream already ended on its own
    pub fn stop(&self, stop_stream: bool) {
        if !self.can_stop_audio_stream() {
            tracing::warn!(
                "Stop refused: project {} does not own the audio stream",
                self.project_id
            );
            return;
        }

        let (token, in_flight) = {
            let mut core = self.core();
            if core.start_in_flight {
                core.start_aborted = true;
            }
            if !core.state.begin_stop() {
                return;
            }
            (core.stream.take(), core.start_in_flight)
        };

        let engine = self.engine();
        if stop_stream {
            if let Some(token) = token {
                engine.stop_stream(token);
            }
        }
        engine.set_paused(false);

        if !in_flight {
            self.ownership.release(self.project_id);
        }
        self.rollback_provisional();

        self.core().state.finish_stop();
        match token {
            Some(token) => tracing::info!("Transport stopped (stream {})", token),
            None => tracing::debug!("Transport stopped with no stream running"),
        }
    }

    /// Stops only when paused.
    pub fn stop_if_paused(&self) {
        if self.paused() {
            self.stop(true);
        }
    }

    /// Moves the selection to the play head if this project's stream is
    /// running.
    ///
    /// # Arguments
    ///
    /// * `click` - Triggered by a click rather than a command
    /// * `shift` - Extend the selection instead of replacing it
    ///
    /// # Returns
    ///
    /// true if the stream was running and the selection changed
    pub fn do_play_stop_select_at(&self, click: bool, shift: bool) -> bool {
        let Some(token) = self.current_stream() else {
            return false;
        };
        let engine = self.engine();
        if !engine.is_stream_active(token) {
            return false;
        }

        let mut project = self.project();
        let selection = project.selection_mut();
        let time = engine.stream_time().unwrap_or(selection.t0());

        if shift && click {
            let (mut t0, mut t1) = (selection.t0(), selection.t1());
            if time < t0 {
                t0 = time;
            } else if time > t1 {
                t1 = time;
            } else if (t0 - time).abs() < (t1 - time).abs() {
                t0 = time;
            } else {
                t1 = time;
            }
            selection.set_times(t0, t1);
        } else if click {
            let time = time.max(0.0);
            selection.set_times(time, time);
        } else {
            selection.set_t0(time);
        }
        true
    }

    /// Stops and selects at the play head when running, otherwise plays
    /// the current region if the engine is free.
    pub fn do_play_stop_select(&self) -> Result<()> {
        if self.do_play_stop_select_at(false, false) {
            self.stop(true);
        } else if !self.engine().is_busy() {
            self.play_current_region(false, false)?;
        }
        Ok(())
    }

    // ==================== Status ====================

    /// Whether this project may stop the shared stream: nothing runs, the
    /// engine is only monitoring, or this project owns the stream.
    pub fn can_stop_audio_stream(&self) -> bool {
        self.ownership.can_stop(self.project_id)
    }

    /// Whether this project's stream is playing without capturing.
    pub fn playing(&self) -> bool {
        let Some(token) = self.current_stream() else {
            return false;
        };
        let engine = self.engine();
        engine.is_stream_active(token) && !engine.is_capturing(token) && !engine.is_monitoring()
    }

    /// Whether this project's stream is capturing.
    pub fn recording(&self) -> bool {
        self.current_stream()
            .is_some_and(|token| self.engine().is_capturing(token))
    }

    pub fn phase(&self) -> TransportPhase {
        self.core().state.phase()
    }

    pub fn paused(&self) -> bool {
        self.core().state.paused()
    }

    pub fn stopping(&self) -> bool {
        self.core().state.stopping()
    }

    pub fn appending(&self) -> bool {
        self.core().state.appending()
    }

    pub fn looping(&self) -> bool {
        self.core().state.looping()
    }

    pub fn cutting(&self) -> bool {
        self.core().state.cutting()
    }

    pub fn last_play_mode(&self) -> PlayMode {
        self.core().state.last_play_mode()
    }

    /// Rate last reported by the engine; 0 before any stream started.
    pub fn displayed_rate(&self) -> u32 {
        self.core().state.displayed_rate()
    }

    /// Status bar text for the engine's rate.
    pub fn rate_status_text(&self) -> String {
        match self.displayed_rate() {
            0 => String::new(),
            rate => format!("Actual Rate: {}", rate),
        }
    }

    /// Capture blocks received during the current or last recording.
    pub fn blocks_received(&self) -> usize {
        self.core().session.blocks_received
    }

    pub fn timer_record_cancelled(&self) -> bool {
        self.timer_record_cancelled.load(Ordering::Acquire)
    }

    pub fn set_timer_record_cancelled(&self) {
        self.timer_record_cancelled.store(true, Ordering::Release);
    }

    pub fn reset_timer_record_cancelled(&self) {
        self.timer_record_cancelled.store(false, Ordering::Release);
    }
}

/// Rate and channel count for a track created by a recording.
fn new_track_layout(
    project: &Project,
    tracks: &TransportTracks,
    options: &StreamOptions,
) -> (u32, u16) {
    tracks
        .playback
        .iter()
        .filter_map(|id| project.get_track(*id))
        .chain(project.tracks())
        .find(|t| t.kind == TrackKind::Wave)
        .map(|t| (t.rate, t.channels))
        .unwrap_or((options.rate, options.capture_channels.max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SimulatedEngine;
    use crate::model::Track;
    use crate::notify::RecordingDropoutEvent;

    struct Rig {
        engine: Arc<SimulatedEngine>,
        ownership: Arc<StreamOwnership>,
    }

    impl Rig {
        fn new() -> Self {
            let engine = Arc::new(SimulatedEngine::new());
            let ownership = Arc::new(StreamOwnership::new(engine.clone()));
            Self { engine, ownership }
        }

        fn transport(&self, project: Project) -> (Arc<TransportController>, Arc<Mutex<Project>>) {
            self.transport_with(project, TransportPreferences::default())
        }

        fn transport_with(
            &self,
            project: Project,
            prefs: TransportPreferences,
        ) -> (Arc<TransportController>, Arc<Mutex<Project>>) {
            let project = Arc::new(Mutex::new(project));
            let transport = TransportController::new(project.clone(), self.ownership.clone(), prefs);
            (transport, project)
        }
    }

    fn project_with_audio() -> Project {
        let mut project = Project::new("Song");
        project.add_track(Track::new_wave("Drums", 44100, 2).with_end_time(10.0));
        project.add_track(Track::new_wave("Bass", 44100, 1).with_end_time(8.0));
        project
    }

    fn assert_flags_clear(transport: &TransportController) {
        assert!(!transport.paused());
        assert!(!transport.appending());
        assert!(!transport.looping());
        assert!(!transport.cutting());
        assert!(!transport.stopping());
    }

    fn drain(rx: &Receiver<TransportEvent>) -> Vec<TransportEvent> {
        rx.try_iter().collect()
    }

    fn dropouts(events: &[TransportEvent]) -> Vec<RecordingDropoutEvent> {
        events
            .iter()
            .filter_map(|e| match e {
                TransportEvent::RecordingDropout(d) => Some(d.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_stop_clears_flags_after_any_play() {
        let rig = Rig::new();
        let (transport, _) = rig.transport(project_with_audio());
        let region = SelectedRegion::new(1.0, 4.0);

        for mode in [
            PlayMode::NormalPlay,
            PlayMode::LoopedPlay,
            PlayMode::CutPreviewPlay,
            PlayMode::OneSecondPlay,
        ] {
            transport
                .play_play_region(region, StreamOptions::new(44100), mode, false)
                .unwrap();
            transport.on_pause();
            assert!(transport.paused());
            assert_eq!(transport.looping(), mode == PlayMode::LoopedPlay);
            assert_eq!(transport.cutting(), mode == PlayMode::CutPreviewPlay);

            transport.stop(true);
            assert_flags_clear(&transport);
            assert!(!rig.engine.is_busy());
            assert!(!rig.engine.is_paused());
            assert_eq!(transport.last_play_mode(), mode);
        }
    }

    #[test]
    fn test_stop_is_idempotent() {
        let rig = Rig::new();
        let (transport, _) = rig.transport(project_with_audio());

        transport.stop(true);
        let once = transport.phase();
        transport.stop(true);
        assert_eq!(transport.phase(), once);

        transport
            .play_play_region(
                SelectedRegion::new(0.0, 2.0),
                StreamOptions::new(44100),
                PlayMode::LoopedPlay,
                false,
            )
            .unwrap();
        transport.stop(true);
        let once = transport.phase();
        transport.stop(true);
        assert_eq!(transport.phase(), once);
        assert_eq!(once, TransportPhase::default());
    }

    #[test]
    fn test_failed_record_leaves_no_orphans() {
        let rig = Rig::new();
        let (transport, project) = rig.transport(project_with_audio());
        let before = project.lock().unwrap().track_count();

        transport.cancel_recording();
        rig.engine
            .set_device_error(Some(EngineError::DeviceUnavailable("no input".into())));
        let result = transport.do_record(
            TransportTracks::default(),
            0.0,
            f64::INFINITY,
            false,
            StreamOptions::new(44100),
        );

        assert!(matches!(result, Err(TransportError::Engine(_))));
        assert_eq!(project.lock().unwrap().track_count(), before);
        assert_eq!(transport.phase(), TransportPhase::default());
        assert_eq!(rig.ownership.owner(), None);

        // The engine tried to record into a new track before refusing.
        let request = rig.engine.requests().pop().unwrap();
        assert_eq!(request.tracks.capture.len(), 1);
    }

    #[test]
    fn test_record_into_new_tracks_reports_one_dropout() {
        let rig = Rig::new();
        let (transport, project) = rig.transport(Project::new("Empty"));
        let events = transport.subscribe();

        transport.on_record(false).unwrap();
        assert!(transport.recording());
        assert!(!transport.appending());

        let created = project.lock().unwrap().tracks()[0].id;
        assert!(project.lock().unwrap().tracks()[0].pending);

        assert!(rig.engine.confirm_recording_started());
        assert!(rig.engine.deliver_blocks(None));
        assert!(!transport.appending());
        assert!(rig.engine.deliver_blocks(Some(DropoutInterval::new(2.0, 0.05))));
        assert_eq!(transport.blocks_received(), 2);

        transport.stop(true);

        let events = drain(&events);
        let dropouts = dropouts(&events);
        assert_eq!(dropouts.len(), 1);
        assert_eq!(dropouts[0].intervals(), &[DropoutInterval::new(2.0, 0.05)]);
        assert!(events.contains(&TransportEvent::RecordingCommitted {
            tracks: vec![created]
        }));

        assert_flags_clear(&transport);
        assert!(!transport.recording());
        let project = project.lock().unwrap();
        assert_eq!(project.track_count(), 1);
        assert!(!project.tracks()[0].pending);
    }

    #[test]
    fn test_dropouts_sorted_and_only_when_present() {
        let rig = Rig::new();
        let (transport, _) = rig.transport(Project::new("Gaps"));
        let events = transport.subscribe();

        transport.on_record(false).unwrap();
        rig.engine.confirm_recording_started();
        rig.engine.deliver_blocks(Some(DropoutInterval::new(3.0, 0.1)));
        rig.engine.deliver_blocks(Some(DropoutInterval::new(1.0, 0.2)));
        transport.stop(true);

        let found = dropouts(&drain(&events));
        assert_eq!(found.len(), 1);
        assert_eq!(
            found[0].intervals(),
            &[DropoutInterval::new(1.0, 0.2), DropoutInterval::new(3.0, 0.1)]
        );

        // A fresh session without gaps reports nothing.
        transport.on_record(false).unwrap();
        rig.engine.confirm_recording_started();
        rig.engine.deliver_blocks(None);
        transport.stop(true);
        assert!(dropouts(&drain(&events)).is_empty());
    }

    #[test]
    fn test_play_refused_while_another_project_owns_stream() {
        let rig = Rig::new();
        let (a, _) = rig.transport(project_with_audio());
        let (b, _) = rig.transport(project_with_audio());
        let (c, _) = rig.transport(project_with_audio());

        a.play_current_region(false, false).unwrap();
        assert!(!b.can_stop_audio_stream());

        let refused = b.play_play_region(
            SelectedRegion::new(0.0, 1.0),
            StreamOptions::new(44100),
            PlayMode::LoopedPlay,
            false,
        );
        assert_eq!(
            refused,
            Err(TransportError::StreamBusy {
                owner: a.project_id()
            })
        );
        assert_eq!(b.phase(), TransportPhase::default());
        assert_eq!(b.last_play_mode(), PlayMode::NormalPlay);

        assert!(!c.can_stop_audio_stream());
        c.stop(true);
        assert!(a.playing());
        assert!(rig.engine.is_busy());

        a.stop(true);
        assert!(c.can_stop_audio_stream());
        assert!(b.play_current_region(false, false).is_ok());
    }

    #[test]
    fn test_engine_refusing_pause_changes_nothing() {
        let rig = Rig::new();
        let (transport, _) = rig.transport(project_with_audio());
        transport.play_current_region(false, false).unwrap();

        rig.engine.set_can_pause(false);
        transport.on_pause();
        assert!(!transport.paused());

        rig.engine.set_can_pause(true);
        transport.on_pause();
        assert!(transport.paused());
        assert!(rig.engine.is_paused());
    }

    #[test]
    fn test_stop_if_paused() {
        let rig = Rig::new();
        let (transport, _) = rig.transport(project_with_audio());
        transport.play_current_region(false, false).unwrap();

        transport.stop_if_paused();
        assert!(transport.playing());

        transport.on_pause();
        transport.stop_if_paused();
        assert!(!transport.playing());
        assert_flags_clear(&transport);
    }

    #[test]
    fn test_armed_pause_starts_stream_paused() {
        let rig = Rig::new();
        let (transport, _) = rig.transport(project_with_audio());
        transport.on_pause();
        assert!(transport.paused());

        transport.play_current_region(false, false).unwrap();
        assert!(transport.paused());
        assert!(rig.engine.is_paused());
    }

    #[test]
    fn test_play_region_resolution() {
        let rig = Rig::new();
        let (transport, _) = rig.transport(project_with_audio());

        transport
            .play_play_region(
                SelectedRegion::point(3.0),
                StreamOptions::new(44100),
                PlayMode::NormalPlay,
                false,
            )
            .unwrap();
        let request = rig.engine.requests().pop().unwrap();
        assert_eq!((request.t0, request.t1), (3.0, 10.0));
        assert_eq!(request.tracks.playback.len(), 2);
        transport.stop(true);

        transport
            .play_play_region(
                SelectedRegion::point(3.0),
                StreamOptions::new(44100),
                PlayMode::LoopedPlay,
                false,
            )
            .unwrap();
        let request = rig.engine.requests().pop().unwrap();
        assert_eq!((request.t0, request.t1), (0.0, 10.0));
        assert_eq!(request.options.policy, PlaybackPolicy::Looping);
        transport.stop(true);

        transport
            .play_play_region(
                SelectedRegion::new(2.0, 5.0),
                StreamOptions::new(44100),
                PlayMode::NormalPlay,
                true,
            )
            .unwrap();
        let request = rig.engine.requests().pop().unwrap();
        assert_eq!((request.t0, request.t1), (5.0, 2.0));
        transport.stop(true);
    }

    #[test]
    fn test_cut_preview_plays_around_selection() {
        let rig = Rig::new();
        let (transport, project) = rig.transport(project_with_audio());
        project
            .lock()
            .unwrap()
            .set_selection(SelectedRegion::new(4.0, 6.0));

        transport.play_current_region(false, true).unwrap();
        assert!(transport.cutting());
        let request = rig.engine.requests().pop().unwrap();
        assert_eq!((request.t0, request.t1), (2.0, 7.0));
        assert_eq!(
            request.options.cut_preview,
            Some(CutPreview {
                start: 4.0,
                end: 6.0
            })
        );
        transport.stop(true);

        project
            .lock()
            .unwrap()
            .set_selection(SelectedRegion::point(4.0));
        assert_eq!(
            transport.play_current_region(false, true),
            Err(TransportError::EmptyRegion)
        );
        assert!(!transport.cutting());
    }

    #[test]
    fn test_new_default_plays_loop_region() {
        let rig = Rig::new();
        let (transport, project) = rig.transport(project_with_audio());
        project
            .lock()
            .unwrap()
            .set_loop_region(Some(SelectedRegion::new(1.0, 2.0)));

        transport.play_current_region(true, true).unwrap();
        assert!(transport.looping());
        assert!(!transport.cutting());
        assert_eq!(transport.last_play_mode(), PlayMode::LoopedPlay);
        let request = rig.engine.requests().pop().unwrap();
        assert_eq!((request.t0, request.t1), (1.0, 2.0));
    }

    #[test]
    fn test_play_rejects_nan_bounds() {
        let rig = Rig::new();
        let (transport, _) = rig.transport(project_with_audio());

        for region in [SelectedRegion::new(1.0, f64::NAN), SelectedRegion::point(f64::NAN)] {
            assert_eq!(
                transport.play_play_region(
                    region,
                    StreamOptions::new(44100),
                    PlayMode::NormalPlay,
                    false
                ),
                Err(TransportError::EmptyRegion)
            );
        }
        assert!(rig.engine.requests().is_empty());
        assert_eq!(transport.phase(), TransportPhase::default());
    }

    #[test]
    fn test_play_without_tracks() {
        let rig = Rig::new();
        let mut project = Project::new("Labels only");
        project.add_track(Track::new("Labels", TrackKind::Label, 44100).with_end_time(3.0));
        let (transport, _) = rig.transport(project);
        assert_eq!(
            transport.play_play_region(
                SelectedRegion::new(0.0, 1.0),
                StreamOptions::new(44100),
                PlayMode::NormalPlay,
                false
            ),
            Err(TransportError::NoTracks)
        );
        assert!(rig.engine.requests().is_empty());
    }

    #[test]
    fn test_new_track_matches_existing_layout() {
        let rig = Rig::new();
        let mut project = Project::with_rate("Mixed", 44100);
        let old = project.add_track(Track::new_wave("Old take", 48000, 1).with_end_time(5.0));
        let (transport, project) = rig.transport(project);

        transport.on_record(true).unwrap();
        assert!(!transport.appending());

        let request = rig.engine.requests().pop().unwrap();
        assert_eq!(request.options.rate, 48000);
        assert_eq!(request.tracks.playback, vec![old]);
        assert_eq!(request.role, StreamRole::Record { duplex: true });
        assert_eq!(transport.displayed_rate(), 48000);

        let project = project.lock().unwrap();
        assert_eq!(project.track_count(), 2);
        let created = &project.tracks()[1];
        assert_eq!((created.rate, created.channels), (48000, 1));
    }

    #[test]
    fn test_duplex_rate_mismatch_rolls_back() {
        let rig = Rig::new();
        let mut project = Project::with_rate("Mixed", 44100);
        project.add_track(Track::new_wave("Guitar", 44100, 2).with_end_time(5.0));
        project.add_track(Track::new_wave("Old take", 48000, 2).with_end_time(5.0));
        let (transport, project) = rig.transport(project);

        let result = transport.on_record(true);
        assert_eq!(
            result,
            Err(TransportError::RateMismatch {
                expected: 44100,
                found: 48000
            })
        );
        assert_eq!(project.lock().unwrap().track_count(), 2);
        assert_eq!(transport.phase(), TransportPhase::default());
        assert!(rig.engine.requests().is_empty());
        assert_eq!(rig.ownership.owner(), None);
    }

    #[test]
    fn test_append_record_starts_after_existing_audio() {
        let rig = Rig::new();
        let mut project = Project::new("Takes");
        let take = project.add_track(Track::new_wave("Take", 44100, 2).with_end_time(4.0));
        project.set_selection(SelectedRegion::point(1.0));
        let (transport, project) = rig.transport(project);

        transport.on_record(false).unwrap();
        assert!(transport.appending());
        assert_eq!(project.lock().unwrap().track_count(), 1);

        let request = rig.engine.requests().pop().unwrap();
        assert_eq!(request.tracks.capture, vec![take]);
        assert!(request.tracks.playback.is_empty());
        assert_eq!(request.t0, 4.0);
        assert!(request.t1.is_infinite());
        assert_eq!(request.role, StreamRole::Record { duplex: false });
        transport.stop(true);
        assert!(!transport.appending());
    }

    #[test]
    fn test_punch_in_uses_selection_range() {
        let rig = Rig::new();
        let mut project = Project::new("Punch");
        project.add_track(
            Track::new_wave("Vocal", 44100, 1)
                .with_end_time(9.0)
                .with_selected(true),
        );
        project.add_track(Track::new_wave("Guitar", 44100, 2).with_end_time(9.0));
        project.set_selection(SelectedRegion::new(2.0, 3.0));
        let (transport, _) = rig.transport(project);

        transport.on_record(false).unwrap();
        let request = rig.engine.requests().pop().unwrap();
        assert_eq!((request.t0, request.t1), (2.0, 3.0));
        assert_eq!(request.tracks.capture.len(), 1);
        assert_eq!(request.tracks.playback.len(), 1);
        assert_eq!(request.role, StreamRole::Record { duplex: true });
    }

    #[test]
    fn test_alternate_gesture_creates_new_track() {
        let rig = Rig::new();
        let mut prefs = TransportPreferences::default();
        prefs.duplex = false;
        let (transport, project) = rig.transport_with(project_with_audio(), prefs);

        transport.on_record(true).unwrap();
        assert!(!transport.appending());
        let project = project.lock().unwrap();
        assert_eq!(project.track_count(), 3);
        assert_eq!(project.tracks()[2].name, "Recorded Audio");
        assert_eq!(project.tracks()[2].channels, 2);
    }

    #[test]
    fn test_cancel_before_capture_discards_tracks() {
        let rig = Rig::new();
        let (transport, project) = rig.transport(Project::new("Cancel"));

        transport.on_record(false).unwrap();
        assert_eq!(project.lock().unwrap().track_count(), 1);

        transport.cancel_recording();
        assert_eq!(project.lock().unwrap().track_count(), 0);
        assert!(!rig.engine.is_busy());
        assert_flags_clear(&transport);

        // Nothing left to cancel.
        transport.cancel_recording();
        assert_eq!(project.lock().unwrap().track_count(), 0);
    }

    #[test]
    fn test_cancel_after_capture_keeps_tracks() {
        let rig = Rig::new();
        let (transport, project) = rig.transport(Project::new("Keep"));

        transport.on_record(false).unwrap();
        rig.engine.confirm_recording_started();
        transport.cancel_recording();
        assert!(transport.recording());
        transport.stop(true);
        assert_eq!(project.lock().unwrap().track_count(), 1);
    }

    /// What happens between the engine starting a stream and returning.
    #[derive(Clone, Copy)]
    enum Interruption {
        Stop,
        Cancel,
        /// The stream reaches its end on the engine's side.
        Finish,
    }

    /// Engine wrapper that interrupts every start while it is in flight.
    struct InterruptingEngine {
        inner: SimulatedEngine,
        transport: Mutex<Weak<TransportController>>,
        interruption: Interruption,
    }

    impl AudioIo for InterruptingEngine {
        fn start_stream(
            &self,
            request: StreamRequest,
        ) -> std::result::Result<StreamToken, EngineError> {
            let token = self.inner.start_stream(request)?;
            let transport = self.transport.lock().unwrap().upgrade();
            match (self.interruption, transport) {
                (Interruption::Stop, Some(transport)) => transport.stop(true),
                (Interruption::Cancel, Some(transport)) => transport.cancel_recording(),
                (Interruption::Finish, _) => self.inner.finish(),
                _ => {}
            }
            Ok(token)
        }
        fn stop_stream(&self, token: StreamToken) {
            self.inner.stop_stream(token)
        }
        fn set_paused(&self, paused: bool) -> bool {
            self.inner.set_paused(paused)
        }
        fn is_paused(&self) -> bool {
            self.inner.is_paused()
        }
        fn is_busy(&self) -> bool {
            self.inner.is_busy()
        }
        fn is_stream_active(&self, token: StreamToken) -> bool {
            self.inner.is_stream_active(token)
        }
        fn is_capturing(&self, token: StreamToken) -> bool {
            self.inner.is_capturing(token)
        }
        fn stream_time(&self) -> Option<f64> {
            self.inner.stream_time()
        }
    }

    fn interrupted_rig(
        interruption: Interruption,
        project: Project,
    ) -> (
        Arc<InterruptingEngine>,
        Arc<StreamOwnership>,
        Arc<TransportController>,
        Arc<Mutex<Project>>,
    ) {
        let engine = Arc::new(InterruptingEngine {
            inner: SimulatedEngine::new(),
            transport: Mutex::new(Weak::new()),
            interruption,
        });
        let ownership = Arc::new(StreamOwnership::new(engine.clone()));
        let project = Arc::new(Mutex::new(project));
        let transport = TransportController::new(
            project.clone(),
            ownership.clone(),
            TransportPreferences::default(),
        );
        *engine.transport.lock().unwrap() = Arc::downgrade(&transport);
        (engine, ownership, transport, project)
    }

    #[test]
    fn test_stop_during_start_aborts_it() {
        let (engine, ownership, transport, _) =
            interrupted_rig(Interruption::Stop, project_with_audio());

        let result = transport.play_current_region(false, false);
        assert_eq!(result, Err(TransportError::StartAborted));
        assert!(!engine.is_busy());
        assert_eq!(ownership.owner(), None);
        assert_eq!(transport.phase(), TransportPhase::default());
        assert!(!transport.playing());
    }

    #[test]
    fn test_cancel_during_record_start_removes_tracks() {
        let (engine, ownership, transport, project) =
            interrupted_rig(Interruption::Cancel, Project::new("Abort"));

        assert_eq!(transport.on_record(false), Err(TransportError::StartAborted));
        assert_eq!(project.lock().unwrap().track_count(), 0);
        assert!(!engine.is_busy());
        assert_eq!(ownership.owner(), None);
        assert_eq!(transport.phase(), TransportPhase::default());
    }

    #[test]
    fn test_stream_ending_during_start_leaves_transport_idle() {
        let (engine, ownership, transport, _) =
            interrupted_rig(Interruption::Finish, project_with_audio());

        let result = transport.play_play_region(
            SelectedRegion::new(0.0, 0.5),
            StreamOptions::new(44100),
            PlayMode::LoopedPlay,
            false,
        );
        assert!(result.is_ok());
        assert!(!engine.is_busy());
        assert!(!transport.playing());
        assert!(!transport.looping());
        assert_flags_clear(&transport);
        assert_eq!(transport.phase(), TransportPhase::default());
        assert_eq!(ownership.owner(), None);

        // The transport is free for the next command.
        transport.stop(true);
        assert!(transport.play_current_region(false, false).is_ok());
        assert_eq!(transport.phase(), TransportPhase::default());
    }

    #[test]
    fn test_recording_ending_during_start_removes_new_tracks() {
        let (engine, ownership, transport, project) =
            interrupted_rig(Interruption::Finish, Project::new("Short"));

        assert!(transport.on_record(false).is_ok());
        assert!(!engine.is_busy());
        assert!(!transport.recording());
        assert!(!transport.appending());
        assert_eq!(transport.phase(), TransportPhase::default());
        assert_eq!(project.lock().unwrap().track_count(), 0);
        assert_eq!(ownership.owner(), None);
    }

    #[test]
    fn test_play_stop_select_moves_selection() {
        let rig = Rig::new();
        let (transport, project) = rig.transport(project_with_audio());
        assert!(!transport.do_play_stop_select_at(true, false));

        project
            .lock()
            .unwrap()
            .set_selection(SelectedRegion::new(2.0, 6.0));
        transport.play_current_region(false, false).unwrap();

        rig.engine.set_stream_time(5.0);
        assert!(transport.do_play_stop_select_at(true, true));
        assert_eq!(
            project.lock().unwrap().selection(),
            SelectedRegion::new(2.0, 5.0)
        );

        rig.engine.set_stream_time(-0.5);
        assert!(transport.do_play_stop_select_at(true, false));
        assert_eq!(project.lock().unwrap().selection(), SelectedRegion::point(0.0));

        project
            .lock()
            .unwrap()
            .set_selection(SelectedRegion::new(1.0, 3.0));
        rig.engine.set_stream_time(2.0);
        assert!(transport.do_play_stop_select_at(false, false));
        assert_eq!(
            project.lock().unwrap().selection(),
            SelectedRegion::new(2.0, 3.0)
        );
    }

    #[test]
    fn test_play_stop_select_toggles() {
        let rig = Rig::new();
        let (transport, project) = rig.transport(project_with_audio());
        project
            .lock()
            .unwrap()
            .set_selection(SelectedRegion::new(1.0, 5.0));

        transport.do_play_stop_select().unwrap();
        assert!(transport.playing());

        rig.engine.set_stream_time(3.5);
        transport.do_play_stop_select().unwrap();
        assert!(!transport.playing());
        assert_eq!(
            project.lock().unwrap().selection(),
            SelectedRegion::new(3.5, 5.0)
        );
    }

    #[test]
    fn test_natural_end_resets_state() {
        let rig = Rig::new();
        let (transport, _) = rig.transport(project_with_audio());
        transport
            .play_play_region(
                SelectedRegion::new(0.0, 2.0),
                StreamOptions::new(44100),
                PlayMode::LoopedPlay,
                false,
            )
            .unwrap();
        assert!(transport.looping());

        rig.engine.finish();
        assert!(!transport.playing());
        assert_flags_clear(&transport);
        assert_eq!(rig.ownership.owner(), None);
    }

    #[test]
    fn test_sound_activation_pauses_owner_only() {
        let rig = Rig::new();
        let mut prefs = TransportPreferences::default();
        prefs.sound_activated_recording = true;
        let (transport, _) = rig.transport_with(Project::new("Voice"), prefs);

        transport.on_record(false).unwrap();
        let request = rig.engine.requests().pop().unwrap();
        assert_eq!(request.options.sound_activation_level_db, Some(-50.0));

        rig.engine.trigger_sound_activation();
        assert!(transport.paused());
        rig.engine.trigger_sound_activation();
        assert!(!transport.paused());
    }

    #[test]
    fn test_pause_from_non_owner_flips_engine_only() {
        let rig = Rig::new();
        let (owner, _) = rig.transport(project_with_audio());
        let (other, _) = rig.transport(project_with_audio());
        owner.play_current_region(false, false).unwrap();

        other.pause();
        assert!(rig.engine.is_paused());
        assert!(!other.paused());
        assert!(!owner.paused());
    }

    #[test]
    fn test_rate_status_text() {
        let rig = Rig::new();
        let (transport, _) = rig.transport(Project::with_rate("Rate", 48000));
        let events = transport.subscribe();
        assert_eq!(transport.rate_status_text(), "");

        transport.on_record(false).unwrap();
        assert_eq!(transport.displayed_rate(), 48000);
        assert_eq!(transport.rate_status_text(), "Actual Rate: 48000");
        assert_eq!(events.try_recv().unwrap(), TransportEvent::RateChanged(48000));
    }

    #[test]
    fn test_timer_record_flag() {
        let rig = Rig::new();
        let (transport, _) = rig.transport(Project::new("Timer"));
        assert!(!transport.timer_record_cancelled());
        transport.set_timer_record_cancelled();
        assert!(transport.timer_record_cancelled());
        transport.reset_timer_record_cancelled();
        assert!(!transport.timer_record_cancelled());
    }

    #[test]
    fn test_second_start_is_already_active() {
        let rig = Rig::new();
        let (transport, _) = rig.transport(project_with_audio());
        transport.play_current_region(false, false).unwrap();
        assert_eq!(transport.on_record(true), Err(TransportError::AlreadyActive));
        assert!(transport.playing());
    }

    #[test]
    fn test_commands_and_engine_callbacks_on_separate_threads() {
        let rig = Rig::new();
        let (transport, _) = rig.transport(project_with_audio());

        let engine = rig.engine.clone();
        let callbacks = std::thread::spawn(move || {
            for _ in 0..200 {
                engine.confirm_recording_started();
                engine.deliver_blocks(Some(DropoutInterval::new(0.0, 0.01)));
                engine.trigger_sound_activation();
                engine.finish();
            }
        });

        for round in 0..200 {
            // Refusals are expected while the other thread is mid-stop.
            let _ = if round % 2 == 0 {
                transport.play_current_region(false, false)
            } else {
                transport.on_record(false)
            };
            transport.on_pause();
            transport.on_pause();
            transport.stop(true);
        }
        callbacks.join().unwrap();

        transport.stop(true);
        assert_flags_clear(&transport);
        assert_eq!(transport.phase(), TransportPhase::default());
        assert!(!transport.playing());
        assert!(!transport.recording());
        assert!(!rig.engine.is_busy());
        assert!(!rig.engine.is_paused());
        assert_eq!(rig.ownership.owner(), None);
    }
}
