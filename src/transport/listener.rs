//! Engine callbacks folded into the transport.
//!
//! The engine calls these from its own threads. Each callback takes the
//! controller's lock only for its own bookkeeping and publishes events after
//! releasing it.

use super::controller::TransportController;
use crate::audio::{CapturedBlocks, IoEngineListener, StreamToken};
use crate::notify::{CheckpointFailure, RecordingDropoutEvent, TransportEvent};

impl IoEngineListener for TransportController {
    fn on_audio_io_rate(&self, rate: u32) {
        self.core().state.set_displayed_rate(rate);
        self.publish(TransportEvent::RateChanged(rate));
    }

    fn on_audio_io_start_recording(&self) {
        let confirmed = std::mem::take(&mut self.core().session.provisional);
        tracing::info!(
            "Recording started; {} new tracks are no longer provisional",
            confirmed.len()
        );
    }

    fn on_audio_io_stop_recording(&self) {
        let (gaps, blocks) = {
            let mut core = self.core();
            (
                std::mem::take(&mut core.session.gaps),
                core.session.blocks_received,
            )
        };
        tracing::info!("Recording stopped after {} block deliveries", blocks);

        if let Some(event) = RecordingDropoutEvent::from_gaps(gaps) {
            tracing::warn!(
                "Recording dropped {:.3}s of audio in {} places",
                event.total_duration(),
                event.intervals().len()
            );
            self.publish(TransportEvent::RecordingDropout(event));
        }
    }

    fn on_audio_io_new_blocks(&self, blocks: &CapturedBlocks) {
        let mut core = self.core();
        core.session.blocks_received += 1;
        if let Some(gap) = blocks.gap {
            core.session.gaps.push(gap);
        }
    }

    fn on_commit_recording(&self) {
        let (uncommitted, tracks) = {
            let mut core = self.core();
            (
                std::mem::take(&mut core.session.uncommitted),
                std::mem::take(&mut core.session.capture),
            )
        };
        {
            let mut project = self.project();
            for id in &uncommitted {
                if let Some(track) = project.get_track_mut(*id) {
                    track.pending = false;
                }
            }
        }
        if !tracks.is_empty() {
            self.publish(TransportEvent::RecordingCommitted { tracks });
        }
    }

    fn on_sound_activation_threshold(&self) {
        if self.owns_stream() {
            self.pause();
        }
    }

    fn on_audio_io_stream_finished(&self, token: StreamToken) {
        let current = {
            let mut core = self.core();
            if core.start_in_flight {
                // Settled by `finish_start` once the engine returns.
                core.finished_during_start = Some(token);
            }
            core.stream == Some(token)
        };
        if current {
            tracing::debug!("Stream {} reached its end", token);
            self.stop(false);
        }
    }
}

impl TransportController {
    /// Stops recording after the persistence layer failed to write a
    /// checkpoint, then tells observers. Not retried.
    pub fn on_checkpoint_failure(&self, failure: CheckpointFailure) {
        tracing::error!("Checkpoint failed during recording: {}", failure.message);
        self.stop(true);
        self.publish(TransportEvent::CheckpointFailed(failure));
    }

    fn owns_stream(&self) -> bool {
        self.ownership().owner() == Some(self.project_id())
    }
}
