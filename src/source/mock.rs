//! Scripted review source for tests and offline runs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::{FetchError, ReviewSource};

enum Outcome {
    Body(String),
    Failure(String),
}

struct Scripted {
    delay: Duration,
    outcome: Outcome,
}

/// A review source that replays scripted responses in order.
///
/// Each fetch pops the next scripted response, waits its delay on the tokio
/// clock, then returns it. An empty script yields a transport error.
#[derive(Default)]
pub struct MockReviewSource {
    script: Mutex<VecDeque<Scripted>>,
    requests: AtomicUsize,
}

impl MockReviewSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a body returned immediately.
    pub fn push_body(&self, body: impl Into<String>) -> &Self {
        self.push(Duration::ZERO, Outcome::Body(body.into()))
    }

    /// Queue a body returned after `delay`.
    pub fn push_body_after(&self, delay: Duration, body: impl Into<String>) -> &Self {
        self.push(delay, Outcome::Body(body.into()))
    }

    /// Queue a transport failure.
    pub fn push_failure(&self, message: impl Into<String>) -> &Self {
        self.push(Duration::ZERO, Outcome::Failure(message.into()))
    }

    /// Number of fetches issued so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Number of scripted responses not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn push(&self, delay: Duration, outcome: Outcome) -> &Self {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Scripted { delay, outcome });
        self
    }
}

/// Build a study-queue payload; `next_review_date` is seconds since epoch.
pub fn study_queue_body(reviews_available: u32, next_review_date: Option<i64>) -> String {
    serde_json::json!({
        "requested_information": {
            "reviews_available": reviews_available,
            "next_review_date": next_review_date,
        }
    })
    .to_string()
}

#[async_trait]
impl ReviewSource for MockReviewSource {
    async fn fetch(&self) -> Result<String, FetchError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap_or_else(PoisonError::into_inner).pop_front();

        let Some(Scripted { delay, outcome }) = next else {
            return Err(FetchError::Transport("no scripted response".to_string()));
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match outcome {
            Outcome::Body(body) => Ok(body),
            Outcome::Failure(message) => Err(FetchError::Transport(message)),
        }
    }
}
