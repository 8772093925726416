//! Predicate-gated repeating tasks on the tokio timer.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// When a task first runs and how often it repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    /// Delay before the first tick
    pub initial_delay: Duration,
    /// Delay between ticks; `None` runs once
    pub interval: Option<Duration>,
}

impl Schedule {
    /// Run once after `delay`.
    pub fn once(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            interval: None,
        }
    }

    /// Run after `initial_delay`, then every `interval`.
    pub fn repeating(initial_delay: Duration, interval: Duration) -> Self {
        Self {
            initial_delay,
            interval: Some(interval),
        }
    }
}

/// Handle to a task started by [`spawn_repeating`].
///
/// Dropping the handle cancels the task at its next timer boundary.
#[derive(Debug)]
pub struct TaskHandle {
    name: &'static str,
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl TaskHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Stop the task; a tick already running finishes first.
    pub fn cancel(&self) {
        self.stop_tx.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task to end.
    pub async fn join(self) {
        let TaskHandle { name, stop_tx, handle } = self;
        // Keep the sender alive so waiting does not itself cancel the task
        let _stop_tx = stop_tx;
        if let Err(e) = handle.await {
            tracing::warn!(task = name, error = %e, "repeating task panicked");
        }
    }
}

/// Spawn `tick` on `runtime` following `schedule` while `keep_running` holds.
///
/// `keep_running` is checked right before every tick and again before
/// rescheduling; the first `false` ends the chain. Callable from any thread.
pub fn spawn_repeating<P, F>(
    runtime: &Handle,
    name: &'static str,
    schedule: Schedule,
    keep_running: P,
    mut tick: F,
) -> TaskHandle
where
    P: Fn() -> bool + Send + 'static,
    F: FnMut() + Send + 'static,
{
    let (stop_tx, mut stop_rx) = watch::channel(false);

    let handle = runtime.spawn(async move {
        let mut delay = schedule.initial_delay;
        let mut ticks: u64 = 0;

        loop {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = stop_rx.changed() => {
                    tracing::debug!(task = name, ticks, "repeating task cancelled");
                    return;
                }
            }

            if !keep_running() {
                tracing::debug!(task = name, ticks, "repeating task no longer wanted");
                return;
            }

            tick();
            ticks += 1;

            match schedule.interval {
                Some(interval) if keep_running() => delay = interval,
                Some(_) => {
                    tracing::debug!(task = name, ticks, "repeating task not rescheduled");
                    return;
                }
                None => return,
            }
        }
    });

    TaskHandle { name, stop_tx, handle }
}
