//! Ordered request/response guard.
//!
//! A request number is taken when the response callback is wrapped (dispatch
//! time). When the callback later fires (arrival time) it only goes through if
//! no later request has already been answered.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Rejects responses that arrive after a response to a newer request.
#[derive(Debug, Clone, Default)]
pub struct OrderedResponseGuard {
    sent: Arc<AtomicU64>,
    accepted: Arc<Mutex<u64>>,
}

impl OrderedResponseGuard {
    /// Create a new guard with no requests sent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a response callback at request dispatch time.
    ///
    /// The returned callback forwards its argument to `callback` and returns
    /// `Some(result)` if its request is newer than every request answered so
    /// far, otherwise it returns `None`.
    ///
    /// The accept check and `callback` run under one lock, so `callback` must
    /// not invoke another callback from the same guard.
    pub fn wrap_response<F, A, T>(&self, mut callback: F) -> impl FnMut(A) -> Option<T> + use<F, A, T>
    where
        F: FnMut(A) -> T,
    {
        let request = self.sent.fetch_add(1, Ordering::SeqCst) + 1;
        let accepted = Arc::clone(&self.accepted);

        move |args| {
            let mut latest = accepted.lock().unwrap_or_else(PoisonError::into_inner);
            if request <= *latest {
                return None;
            }
            *latest = request;
            Some(callback(args))
        }
    }

    /// Number of the most recently dispatched request (0 if none).
    pub fn latest_sent(&self) -> u64 {
        self.sent.load(Ordering::SeqCst)
    }

    /// Number of the newest request whose response was accepted (0 if none).
    pub fn latest_accepted(&self) -> u64 {
        *self.accepted.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
