//! Project-scoped notifications.
//!
//! The transport publishes [`TransportEvent`]s on a [`NotificationBus`].
//! Any number of observers subscribe and receive their own copy of each
//! event over a channel, independent of any UI event loop.

use crate::model::TrackId;
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

/// Typed publish/subscribe channel.
///
/// Publishing clones the event into every live subscriber. Subscribers whose
/// receiver was dropped are pruned on the next publish.
pub struct NotificationBus<E> {
    subscribers: Mutex<Vec<Sender<E>>>,
}

impl<E: Clone> NotificationBus<E> {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Registers a new observer.
    pub fn subscribe(&self) -> Receiver<E> {
        let (tx, rx) = unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Delivers an event to every subscriber.
    ///
    /// # Returns
    ///
    /// Number of subscribers the event reached
    pub fn publish(&self, event: E) -> usize {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        subscribers.len()
    }

    /// Number of registered subscribers, including ones not yet pruned.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<E: Clone> Default for NotificationBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// A stretch of time where capture underran.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DropoutInterval {
    /// Start time in seconds.
    pub start: f64,
    /// Duration in seconds.
    pub duration: f64,
}

impl DropoutInterval {
    pub fn new(start: f64, duration: f64) -> Self {
        Self { start, duration }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Posted after recording stops when dropouts were detected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingDropoutEvent {
    intervals: Vec<DropoutInterval>,
}

impl RecordingDropoutEvent {
    /// Builds the event from the gaps reported during one session.
    ///
    /// Zero-length gaps are discarded, the rest are sorted by start time and
    /// overlapping or touching gaps are merged, so the resulting intervals
    /// are disjoint and increasing.
    ///
    /// # Returns
    ///
    /// None when no non-empty gap remains
    pub fn from_gaps(gaps: impl IntoIterator<Item = DropoutInterval>) -> Option<Self> {
        let mut gaps: Vec<_> = gaps
            .into_iter()
            .filter(|g| g.duration > 0.0 && g.start.is_finite() && g.duration.is_finite())
            .collect();
        if gaps.is_empty() {
            return None;
        }
        gaps.sort_by(|a, b| a.start.total_cmp(&b.start));

        let mut intervals: Vec<DropoutInterval> = Vec::with_capacity(gaps.len());
        for gap in gaps {
            match intervals.last_mut() {
                Some(last) if gap.start <= last.end() => {
                    let end = last.end().max(gap.end());
                    last.duration = end - last.start;
                }
                _ => intervals.push(gap),
            }
        }
        Some(Self { intervals })
    }

    /// Disjoint intervals, sorted increasingly.
    pub fn intervals(&self) -> &[DropoutInterval] {
        &self.intervals
    }

    /// Total time lost, in seconds.
    pub fn total_duration(&self) -> f64 {
        self.intervals.iter().map(|i| i.duration).sum()
    }
}

/// Reported by the persistence layer when a checkpoint write fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointFailure {
    pub message: String,
}

impl CheckpointFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Events published by a transport controller.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The engine reported the rate it is actually running at.
    RateChanged(u32),
    /// Recording stopped and capture dropped audio.
    RecordingDropout(RecordingDropoutEvent),
    /// Recorded tracks are durable and no longer provisional.
    RecordingCommitted { tracks: Vec<TrackId> },
    /// Storage failed during recording; the stream was stopped.
    CheckpointFailed(CheckpointFailure),
}
