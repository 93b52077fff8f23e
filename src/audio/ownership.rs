//! Exclusive ownership of the process-wide audio stream.
//!
//! There is one audio engine and at most one running stream. Every project's
//! transport holds an `Arc<StreamOwnership>`; the arbiter records which
//! project owns the stream so that one project cannot stop another's
//! playback.

use super::engine::{AudioIo, StreamToken};
use crate::error::{Result, TransportError};
use crate::model::ProjectId;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Who owns the stream. `token` is None while the start request is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Lease {
    owner: ProjectId,
    token: Option<StreamToken>,
}

/// Arbiter for the single shared audio stream.
pub struct StreamOwnership {
    engine: Arc<dyn AudioIo>,
    lease: Mutex<Option<Lease>>,
}

impl StreamOwnership {
    pub fn new(engine: Arc<dyn AudioIo>) -> Self {
        Self {
            engine,
            lease: Mutex::new(None),
        }
    }

    /// The engine behind the shared stream.
    pub fn engine(&self) -> &dyn AudioIo {
        self.engine.as_ref()
    }

    fn lease(&self) -> MutexGuard<'_, Option<Lease>> {
        self.lease.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A lease is stale once its stream has ended on its own.
    fn is_live(&self, lease: &Lease) -> bool {
        match lease.token {
            Some(token) => self.engine.is_stream_active(token),
            None => true,
        }
    }

    /// The project owning a live stream, if any.
    pub fn owner(&self) -> Option<ProjectId> {
        let lease = *self.lease();
        lease.filter(|l| self.is_live(l)).map(|l| l.owner)
    }

    /// Whether `project` may stop the current stream.
    ///
    /// True when nothing is running, when the engine is only monitoring, or
    /// when `project` owns the stream.
    pub fn can_stop(&self, project: ProjectId) -> bool {
        let lease = *self.lease();
        match lease {
            None => true,
            Some(l) if l.owner == project => true,
            Some(l) => !self.is_live(&l) || self.engine.is_monitoring(),
        }
    }

    /// Reserves the stream for a start request by `project`.
    ///
    /// The reservation is released when dropped unless it is committed with
    /// the token the engine returned.
    ///
    /// # Errors
    ///
    /// `StreamBusy` when another project owns a live stream, `AlreadyActive`
    /// when `project` itself does.
    pub fn reserve(&self, project: ProjectId) -> Result<StreamReservation<'_>> {
        let mut lease = self.lease();
        if let Some(current) = *lease {
            if self.is_live(&current) {
                return Err(if current.owner == project {
                    TransportError::AlreadyActive
                } else {
                    TransportError::StreamBusy {
                        owner: current.owner,
                    }
                });
            }
        }
        *lease = Some(Lease {
            owner: project,
            token: None,
        });
        Ok(StreamReservation {
            ownership: self,
            owner: project,
            committed: false,
        })
    }

    /// Drops `project`'s lease if it holds one.
    pub fn release(&self, project: ProjectId) {
        let mut lease = self.lease();
        if lease.is_some_and(|l| l.owner == project) {
            *lease = None;
        }
    }
}

/// A pending claim on the stream, held while a start request is in flight.
pub struct StreamReservation<'a> {
    ownership: &'a StreamOwnership,
    owner: ProjectId,
    committed: bool,
}

impl StreamReservation<'_> {
    /// Records the token of the stream the engine started.
    pub fn commit(mut self, token: StreamToken) {
        let mut lease = self.ownership.lease();
        *lease = Some(Lease {
            owner: self.owner,
            token: Some(token),
        });
        self.committed = true;
    }
}

impl Drop for StreamReservation<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let mut lease = self.ownership.lease();
        if lease.is_some_and(|l| l.owner == self.owner && l.token.is_none()) {
            *lease = None;
        }
    }
}
