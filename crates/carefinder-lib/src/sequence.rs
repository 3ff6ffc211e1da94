//! Latest-request-wins sequencing for overlapping lookups.
//!
//! Rapid user input (dragging the radius slider, repeated location fixes)
//! starts overlapping requests whose responses may arrive out of order. Each
//! request is tagged with a monotonically increasing sequence number; issuing
//! a new ticket cancels the previous one, and [`RequestSequencer::accept`]
//! discards responses whose ticket is no longer current.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Handle for one in-flight request.
#[derive(Debug, Clone)]
pub struct RequestTicket {
    seq: u64,
    cancel: CancellationToken,
}

impl RequestTicket {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Token cancelled once a newer ticket is issued.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Issues tickets and filters out stale responses.
#[derive(Debug, Default)]
pub struct RequestSequencer {
    latest: AtomicU64,
    in_flight: Mutex<Option<CancellationToken>>,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request, cancelling the previous one.
    pub fn issue(&self) -> RequestTicket {
        let cancel = CancellationToken::new();
        let (seq, previous) = {
            // Numbering and replacing the token under one lock keeps the
            // stored token in step with `latest`.
            let mut in_flight = self.lock_in_flight();
            let seq = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
            (seq, in_flight.replace(cancel.clone()))
        };
        if let Some(previous) = previous {
            previous.cancel();
        }
        RequestTicket { seq, cancel }
    }

    /// Sequence number of the most recently issued ticket.
    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, ticket: &RequestTicket) -> bool {
        ticket.seq == self.latest()
    }

    /// Return `value` if `ticket` is still current, otherwise drop it.
    pub fn accept<T>(&self, ticket: &RequestTicket, value: T) -> Option<T> {
        if self.is_current(ticket) {
            Some(value)
        } else {
            debug!(
                seq = ticket.seq,
                latest = self.latest(),
                "discarding stale response"
            );
            None
        }
    }

    /// Cancel whatever request is in flight without issuing a new one.
    pub fn cancel_in_flight(&self) {
        let previous = {
            let mut in_flight = self.lock_in_flight();
            // Bump the sequence so a response that races the cancellation is stale.
            self.latest.fetch_add(1, Ordering::SeqCst);
            in_flight.take()
        };
        if let Some(previous) = previous {
            previous.cancel();
        }
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
