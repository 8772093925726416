//! Review state tracker.
//!
//! `ReviewTracker` owns the latest snapshot and the enable/disable lifecycle:
//!
//! 1. `enable_updates` announces the loading placeholder and starts a network
//!    poll chain plus (for the interval strategy) a local refresh chain
//! 2. Each poll dispatches one request; its response passes the ordered
//!    response guard, so an older request never overwrites a newer snapshot
//! 3. Every snapshot change or refresh tick recomputes the display and
//!    announces it
//! 4. `disable_updates` swaps the announcer for a no-op sink and cancels the
//!    chains; requests already in flight complete and are discarded
//!
//! Every enable starts a new session. Timers and in-flight requests carry the
//! session they were started in and do nothing once it is over.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::runtime::Handle;

use crate::clock::Clock;
use crate::display::{Announcement, Labels, ReviewStatus};
use crate::error::Result;
use crate::guard::{OrderedResponseGuard, SwitchLatest};
use crate::scheduler::{Schedule, TaskHandle, spawn_repeating};
use crate::snapshot::{EpochUnit, ParseError, ReviewSnapshot};
use crate::source::{FetchError, ReviewSource};

/// Receives announcements for the UI.
///
/// Called while the tracker state is locked; implementations must not call
/// back into the tracker.
pub trait Announce: Send + Sync {
    fn announce(&self, announcement: Announcement);
}

impl<F> Announce for F
where
    F: Fn(Announcement) + Send + Sync,
{
    fn announce(&self, announcement: Announcement) {
        self(announcement)
    }
}

fn discard() -> Arc<dyn Announce> {
    Arc::new(|_: Announcement| {})
}

/// How the displayed countdown is kept fresh between polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStrategy {
    /// Recompute on a fixed interval, independent of polls
    Interval(Duration),
    /// After each countdown announcement, wake once when the shown minute changes
    MinuteBoundary,
}

/// Runtime settings for a [`ReviewTracker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Delay before the first poll after enabling
    pub poll_initial_delay: Duration,
    /// Delay between polls
    pub poll_interval: Duration,
    pub refresh: RefreshStrategy,
    /// Unit of `next_review_date` in server payloads
    pub epoch_unit: EpochUnit,
    pub labels: Labels,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_initial_delay: Duration::from_secs(1),
            poll_interval: Duration::from_secs(10 * 60),
            refresh: RefreshStrategy::Interval(Duration::from_secs(30)),
            epoch_unit: EpochUnit::Seconds,
            labels: Labels::default(),
        }
    }
}

struct State {
    enabled: bool,
    session: u64,
    announcer: Arc<dyn Announce>,
    snapshot: Option<ReviewSnapshot>,
    /// Runtime captured by `enable_updates`; timers are spawned here
    runtime: Option<Handle>,
    tasks: Vec<TaskHandle>,
    wake: Option<TaskHandle>,
}

struct Inner {
    config: TrackerConfig,
    source: Arc<dyn ReviewSource>,
    clock: Arc<dyn Clock>,
    responses: OrderedResponseGuard,
    wakes: SwitchLatest,
    state: Mutex<State>,
}

/// Polls the review queue and announces display text.
///
/// Cheap to clone; clones share state. Dropping the last clone stops all
/// timers. `enable_updates` must run inside a tokio runtime; every other
/// method may be called from any thread.
#[derive(Clone)]
pub struct ReviewTracker {
    inner: Arc<Inner>,
}

impl ReviewTracker {
    pub fn new(config: TrackerConfig, source: Arc<dyn ReviewSource>, clock: Arc<dyn Clock>) -> Self {
        let state = State {
            enabled: false,
            session: 0,
            announcer: discard(),
            snapshot: None,
            runtime: None,
            tasks: Vec::new(),
            wake: None,
        };

        Self {
            inner: Arc::new(Inner {
                config,
                source,
                clock,
                responses: OrderedResponseGuard::new(),
                wakes: SwitchLatest::new(),
                state: Mutex::new(state),
            }),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.inner.config
    }

    pub fn is_enabled(&self) -> bool {
        self.state().enabled
    }

    /// The current snapshot, if any response has been applied this session.
    pub fn snapshot(&self) -> Option<ReviewSnapshot> {
        self.state().snapshot
    }

    /// Start a new session announcing to `announcer`.
    ///
    /// Announces the loading placeholder immediately, then schedules the
    /// poll chain and, for [`RefreshStrategy::Interval`], the refresh chain.
    /// Calling this while enabled restarts with the new announcer. Outside a
    /// tokio runtime nothing is enabled and an error is logged.
    pub fn enable_updates<A>(&self, announcer: A)
    where
        A: Announce + 'static,
    {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                log::error!("Cannot enable review updates outside a tokio runtime: {}", e);
                return;
            }
        };

        let config = &self.inner.config;
        let mut state = self.state();

        Self::stop_tasks(&mut state);
        state.session += 1;
        state.enabled = true;
        state.announcer = Arc::new(announcer);
        state.snapshot = None;
        state.runtime = Some(runtime.clone());
        let session = state.session;
        log::info!("Review updates enabled (session {})", session);

        self.announce_locked(&mut state);

        let weak = self.downgrade();
        let poll = spawn_repeating(
            &runtime,
            "review-poll",
            Schedule::repeating(config.poll_initial_delay, config.poll_interval),
            self.still_current(session),
            move || {
                if let Some(tracker) = Self::upgrade(&weak) {
                    tracker.spawn_poll(session);
                }
            },
        );
        state.tasks.push(poll);

        // The loading placeholder was just announced, so the first refresh waits a full period
        if let RefreshStrategy::Interval(every) = config.refresh {
            let weak = self.downgrade();
            let refresh = spawn_repeating(
                &runtime,
                "display-refresh",
                Schedule::repeating(every, every),
                self.still_current(session),
                move || {
                    if let Some(tracker) = Self::upgrade(&weak) {
                        tracker.recompute_display();
                    }
                },
            );
            state.tasks.push(refresh);
        }
    }

    /// End the session: no further announcements reach the old announcer.
    pub fn disable_updates(&self) {
        let mut state = self.state();
        state.enabled = false;
        state.announcer = discard();
        state.runtime = None;
        Self::stop_tasks(&mut state);
        self.inner.wakes.invalidate();
        log::info!("Review updates disabled (session {})", state.session);
    }

    /// Apply a raw server payload.
    ///
    /// On failure the previous snapshot is kept and nothing is announced.
    pub fn on_server_response(&self, raw: &str) -> std::result::Result<ReviewSnapshot, ParseError> {
        let snapshot = self.parse_response(raw)?;
        self.apply_snapshot(None, snapshot);
        Ok(snapshot)
    }

    /// Recompute the display from the current snapshot and announce it.
    pub fn recompute_display(&self) -> Announcement {
        let mut state = self.state();
        self.announce_locked(&mut state)
    }

    /// Fetch once in the current session and apply the response if it is
    /// still the newest and the session is still enabled.
    pub async fn poll_once(&self) {
        let session = self.state().session;
        self.poll(session).await;
    }

    fn spawn_poll(&self, session: u64) {
        let Some(runtime) = self.state().runtime.clone() else {
            return;
        };
        let tracker = self.clone();
        runtime.spawn(async move { tracker.poll(session).await });
    }

    async fn poll(&self, session: u64) {
        let tracker = self.clone();
        // Request number is taken here, at dispatch
        let mut deliver = self
            .inner
            .responses
            .wrap_response(move |body: String| tracker.apply_response(session, &body));

        match self.inner.source.fetch().await {
            Ok(body) => {
                if deliver(body).is_none() {
                    log::debug!("Discarding stale response: a newer request was already answered");
                }
            }
            Err(FetchError::MissingApiKey) => log::debug!("Skipping poll: no API key configured"),
            Err(e) if e.is_retryable() => log::warn!("Review queue request failed, retrying next poll: {}", e),
            Err(e) => log::error!("Review queue request failed: {}", e),
        }
    }

    fn apply_response(&self, session: u64, body: &str) {
        // Failures are logged by parse_response and leave state untouched
        if let Ok(snapshot) = self.parse_response(body) {
            self.apply_snapshot(Some(session), snapshot);
        }
    }

    fn parse_response(&self, raw: &str) -> std::result::Result<ReviewSnapshot, ParseError> {
        let snapshot = ReviewSnapshot::parse(raw, self.inner.config.epoch_unit).inspect_err(|e| {
            log::warn!("Failed to parse server response: {}", e);
            log::debug!("Unparseable response body: {}", raw);
        })?;

        log::debug!(
            "New snapshot: {} reviews available, next review at {:?}",
            snapshot.reviews_available(),
            snapshot.next_review_at()
        );
        Ok(snapshot)
    }

    /// Store `snapshot` and announce it. With `Some(session)` this only
    /// happens if that session is still the enabled one, checked under the
    /// same lock as the write.
    fn apply_snapshot(&self, session: Option<u64>, snapshot: ReviewSnapshot) {
        let mut state = self.state();
        if let Some(session) = session.filter(|&s| !(state.enabled && state.session == s)) {
            log::debug!("Discarding response for ended session {}", session);
            return;
        }

        state.snapshot = Some(snapshot);
        self.announce_locked(&mut state);
    }

    fn announce_locked(&self, state: &mut State) -> Announcement {
        let status = ReviewStatus::compute(state.snapshot.as_ref(), self.inner.clock.now());
        let announcement = Announcement::new(&status, &self.inner.config.labels);
        state.announcer.announce(announcement.clone());

        if state.enabled && self.inner.config.refresh == RefreshStrategy::MinuteBoundary {
            // Replacing the handle cancels the previous wake
            state.wake = match (status.remaining(), state.runtime.as_ref()) {
                (Some(remaining), Some(runtime)) => {
                    Some(self.schedule_wake(runtime, state.session, remaining.until_display_changes()))
                }
                _ => None,
            };
        }

        announcement
    }

    fn schedule_wake(&self, runtime: &Handle, session: u64, delay: Duration) -> TaskHandle {
        let weak = self.downgrade();
        let mut wake = self.inner.wakes.wrap(move || {
            if let Some(tracker) = Self::upgrade(&weak) {
                tracker.recompute_display();
            }
        });

        spawn_repeating(
            runtime,
            "minute-wake",
            Schedule::once(delay),
            self.still_current(session),
            move || {
                if wake().is_none() {
                    log::trace!("Superseded minute wake skipped");
                }
            },
        )
    }

    fn stop_tasks(state: &mut State) {
        for task in state.tasks.drain(..) {
            task.cancel();
        }
        if let Some(wake) = state.wake.take() {
            wake.cancel();
        }
    }

    fn is_current(&self, session: u64) -> bool {
        let state = self.state();
        state.enabled && state.session == session
    }

    fn still_current(&self, session: u64) -> impl Fn() -> bool + Send + use<> {
        let weak = self.downgrade();
        move || Self::upgrade(&weak).is_some_and(|tracker| tracker.is_current(session))
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn downgrade(&self) -> Weak<Inner> {
        Arc::downgrade(&self.inner)
    }

    fn upgrade(weak: &Weak<Inner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }
}

/// Fetch and parse the review queue once, outside any tracker session.
pub async fn fetch_announcement(
    source: &dyn ReviewSource,
    config: &TrackerConfig,
    clock: &dyn Clock,
) -> Result<Announcement> {
    let body = source.fetch().await?;
    let snapshot = ReviewSnapshot::parse(&body, config.epoch_unit)?;
    let status = ReviewStatus::compute(Some(&snapshot), clock.now());
    Ok(Announcement::new(&status, &config.labels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::WkbarError;
    use crate::source::{MockReviewSource, study_queue_body};
    use chrono::{DateTime, TimeDelta, Utc};

    fn epoch() -> DateTime<Utc> {
        DateTime::from_timestamp(1_738_300_800, 0).unwrap()
    }

    fn tracker_with(config: TrackerConfig) -> (ReviewTracker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(epoch()));
        let tracker = ReviewTracker::new(config, Arc::new(MockReviewSource::new()), clock.clone());
        (tracker, clock)
    }

    fn recorder() -> (Arc<Mutex<Vec<Announcement>>>, impl Fn(Announcement) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |a: Announcement| sink.lock().unwrap().push(a))
    }

    #[test]
    fn test_starts_disabled_without_snapshot() {
        let (tracker, _) = tracker_with(TrackerConfig::default());
        assert!(!tracker.is_enabled());
        assert!(tracker.snapshot().is_none());
    }

    #[test]
    fn test_recompute_without_snapshot_is_loading() {
        let (tracker, _) = tracker_with(TrackerConfig::default());
        let announcement = tracker.recompute_display();
        assert_eq!(announcement.text, "WK 待ってください");
        assert_eq!(announcement.reviews_available, None);
    }

    #[test]
    fn test_on_server_response_sets_snapshot() {
        let (tracker, _) = tracker_with(TrackerConfig::default());
        let next = epoch().timestamp() + 90 * 60;

        let snapshot = tracker.on_server_response(&study_queue_body(0, Some(next))).unwrap();
        assert_eq!(tracker.snapshot(), Some(snapshot));

        let announcement = tracker.recompute_display();
        assert_eq!(announcement.text, "WK 1h30m");
        assert_eq!(announcement.reviews_available, Some(0));
    }

    #[test]
    fn test_countdown_follows_clock() {
        let (tracker, clock) = tracker_with(TrackerConfig::default());
        let next = epoch().timestamp() + 90 * 60;
        tracker.on_server_response(&study_queue_body(5, Some(next))).unwrap();

        clock.advance(TimeDelta::minutes(45));
        assert_eq!(tracker.recompute_display().text, "WK 0h45m");

        clock.advance(TimeDelta::minutes(46));
        let announcement = tracker.recompute_display();
        assert_eq!(announcement.text, "WK 5枚");
        assert_eq!(announcement.reviews_available, Some(5));
    }

    #[test]
    fn test_malformed_response_keeps_snapshot() {
        let (tracker, _) = tracker_with(TrackerConfig::default());
        let good = tracker.on_server_response(&study_queue_body(3, Some(0))).unwrap();

        assert!(tracker.on_server_response("not json").is_err());
        assert!(tracker.on_server_response(r#"{"requested_information": {}}"#).is_err());
        assert!(
            tracker
                .on_server_response(r#"{"error": {"code": "user_not_found", "message": "nope"}}"#)
                .is_err()
        );
        assert_eq!(tracker.snapshot(), Some(good));
    }

    #[test]
    fn test_vacation_mode_pinned() {
        let (tracker, _) = tracker_with(TrackerConfig::default());
        tracker.on_server_response(&study_queue_body(0, None)).unwrap();
        let announcement = tracker.recompute_display();
        assert_eq!(announcement.text, "WK Vacation mode");
        assert_eq!(announcement.reviews_available, Some(0));
    }

    #[test]
    fn test_millisecond_epoch_unit() {
        let config = TrackerConfig {
            epoch_unit: EpochUnit::Milliseconds,
            ..Default::default()
        };
        let (tracker, _) = tracker_with(config);
        let next_ms = (epoch().timestamp() + 2 * 3600 + 5 * 60) * 1000;
        tracker.on_server_response(&study_queue_body(0, Some(next_ms))).unwrap();
        assert_eq!(tracker.recompute_display().text, "WK 2h05m");
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_tracker_announces_nothing() {
        let (tracker, _) = tracker_with(TrackerConfig::default());
        let (seen, sink) = recorder();
        tracker.enable_updates(sink);
        tracker.disable_updates();
        let before = seen.lock().unwrap().len();

        tracker.on_server_response(&study_queue_body(2, Some(0))).unwrap();
        tracker.recompute_display();
        assert_eq!(seen.lock().unwrap().len(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recompute_is_idempotent() {
        let config = TrackerConfig {
            refresh: RefreshStrategy::Interval(Duration::from_secs(3600)),
            ..Default::default()
        };
        let (tracker, _) = tracker_with(config);
        let (seen, sink) = recorder();

        tracker.enable_updates(sink);
        tracker.on_server_response(&study_queue_body(0, Some(epoch().timestamp() + 600))).unwrap();

        let first = tracker.recompute_display();
        let second = tracker.recompute_display();
        assert_eq!(first, second);

        let seen = seen.lock().unwrap();
        let n = seen.len();
        assert_eq!(seen[n - 1], seen[n - 2]);
        assert_eq!(seen[n - 1].text, "WK 0h10m");
        tracker.disable_updates();
    }

    #[tokio::test(start_paused = true)]
    async fn test_enable_announces_loading_immediately() {
        let (tracker, _) = tracker_with(TrackerConfig::default());
        let (seen, sink) = recorder();

        tracker.enable_updates(sink);
        assert!(tracker.is_enabled());
        assert_eq!(seen.lock().unwrap()[0].reviews_available, None);
        assert_eq!(seen.lock().unwrap()[0].text, "WK 待ってください");

        tracker.disable_updates();
        assert!(!tracker.is_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_minute_boundary_schedules_wake() {
        let config = TrackerConfig {
            refresh: RefreshStrategy::MinuteBoundary,
            ..Default::default()
        };
        let (tracker, clock) = tracker_with(config);
        let (seen, sink) = recorder();
        tracker.enable_updates(sink);

        // 1h29m45s left: next change in 46s
        let next = epoch().timestamp() + 89 * 60 + 45;
        tracker.on_server_response(&study_queue_body(0, Some(next))).unwrap();
        let before = seen.lock().unwrap().len();

        clock.advance(TimeDelta::seconds(46));
        tokio::time::sleep(Duration::from_secs(47)).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), before + 1);
        assert_eq!(seen.last().unwrap().text, "WK 1h28m");
        drop(seen);
        tracker.disable_updates();
    }

    #[tokio::test]
    async fn test_poll_once_requires_enabled_session() {
        let source = Arc::new(MockReviewSource::new());
        source.push_body(study_queue_body(4, Some(0)));
        let tracker = ReviewTracker::new(
            TrackerConfig::default(),
            source.clone(),
            Arc::new(ManualClock::new(epoch())),
        );

        tracker.poll_once().await;
        assert_eq!(source.requests(), 1);
        assert!(tracker.snapshot().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_enable_announces_loading_once() {
        let (tracker, _) = tracker_with(TrackerConfig::default());
        let (seen, sink) = recorder();
        tracker.enable_updates(sink);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(seen.lock().unwrap().len(), 1);

        // First refresh comes one full period later
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(seen.lock().unwrap().len(), 2);
        tracker.disable_updates();
    }

    #[test]
    fn test_enable_outside_runtime_is_refused() {
        let (tracker, _) = tracker_with(TrackerConfig::default());
        let (seen, sink) = recorder();

        tracker.enable_updates(sink);
        assert!(!tracker.is_enabled());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_calls_from_plain_thread_while_enabled() {
        let config = TrackerConfig {
            refresh: RefreshStrategy::MinuteBoundary,
            ..Default::default()
        };
        let (tracker, _) = tracker_with(config);
        let (seen, sink) = recorder();
        tracker.enable_updates(sink);

        let body = study_queue_body(0, Some(epoch().timestamp() + 3600));
        let remote = tracker.clone();
        let shown = std::thread::spawn(move || {
            remote.on_server_response(&body).unwrap();
            remote.recompute_display()
        })
        .join()
        .unwrap();

        assert_eq!(shown.text, "WK 1h00m");
        assert!(tracker.state().wake.is_some());
        assert_eq!(seen.lock().unwrap().last().unwrap().text, "WK 1h00m");
        tracker.disable_updates();
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_for_ended_session_discarded() {
        let (tracker, _) = tracker_with(TrackerConfig::default());
        let (_first_seen, first) = recorder();
        tracker.enable_updates(first);
        let old_session = tracker.state().session;
        tracker.disable_updates();

        let (seen, second) = recorder();
        tracker.enable_updates(second);

        tracker.apply_response(old_session, &study_queue_body(3, Some(0)));
        assert!(tracker.snapshot().is_none());
        assert_eq!(seen.lock().unwrap().len(), 1);

        tracker.apply_response(old_session + 1, &study_queue_body(3, Some(0)));
        assert_eq!(tracker.snapshot().unwrap().reviews_available(), 3);
        assert_eq!(seen.lock().unwrap().last().unwrap().text, "WK 3枚");
        tracker.disable_updates();
    }

    #[tokio::test]
    async fn test_fetch_announcement() {
        let source = MockReviewSource::new();
        source.push_body(study_queue_body(0, Some(epoch().timestamp() + 90 * 60)));
        source.push_body("oops");
        let clock = ManualClock::new(epoch());
        let config = TrackerConfig::default();

        let shown = fetch_announcement(&source, &config, &clock).await.unwrap();
        assert_eq!(shown.text, "WK 1h30m");
        assert_eq!(shown.reviews_available, Some(0));

        let err = fetch_announcement(&source, &config, &clock).await.unwrap_err();
        assert!(matches!(err, WkbarError::Parse(_)));

        let err = fetch_announcement(&source, &config, &clock).await.unwrap_err();
        assert!(matches!(err, WkbarError::Fetch(FetchError::Transport(_))));
    }
}
