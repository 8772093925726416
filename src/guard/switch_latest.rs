//! Switch-latest guard for timed callbacks.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Wraps callbacks so that only the most recently wrapped one executes.
///
/// Each call to [`wrap`](Self::wrap) issues a new generation. A guarded
/// callback runs its body only while its generation is still the latest;
/// otherwise it returns `None` without side effects.
#[derive(Debug, Clone, Default)]
pub struct SwitchLatest {
    latest: Arc<AtomicU64>,
}

impl SwitchLatest {
    /// Create a new guard with no callbacks issued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap `callback`, superseding every callback wrapped before it.
    pub fn wrap<F, T>(&self, mut callback: F) -> impl FnMut() -> Option<T> + use<F, T>
    where
        F: FnMut() -> T,
    {
        let latest = Arc::clone(&self.latest);
        let generation = latest.fetch_add(1, Ordering::SeqCst) + 1;

        move || {
            if latest.load(Ordering::SeqCst) == generation {
                Some(callback())
            } else {
                None
            }
        }
    }

    /// Supersede every outstanding callback without issuing a new one.
    pub fn invalidate(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
    }

    /// The most recently issued generation (0 if none).
    pub fn generation(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }
}
