//! Display text for the status surface.
//!
//! This module defines:
//! - `ReviewStatus`: what should be shown, computed from a snapshot and "now"
//! - `Remaining`: countdown arithmetic (rounded up to whole seconds)
//! - `Labels`: the configurable words around the numbers
//! - `Announcement`: one unit of UI-facing output

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::snapshot::ReviewSnapshot;

/// One unit of UI-facing output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub text: String,
    /// `None` until the first snapshot arrives
    pub reviews_available: Option<u32>,
}

impl Announcement {
    pub fn new(status: &ReviewStatus, labels: &Labels) -> Self {
        Self {
            text: labels.render(status),
            reviews_available: status.reviews_available(),
        }
    }

    /// Whether there is something to review right now.
    pub fn has_reviews(&self) -> bool {
        self.reviews_available.is_some_and(|n| n > 0)
    }
}

/// Time left until the next review, rounded up to whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Remaining {
    millis: i64,
}

impl Remaining {
    /// Remaining time from `now` until `at`; negative spans clamp to zero.
    pub fn until(at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            millis: (at - now).num_milliseconds().max(0),
        }
    }

    pub fn from_millis(millis: i64) -> Self {
        Self { millis: millis.max(0) }
    }

    pub fn is_zero(&self) -> bool {
        self.millis == 0
    }

    pub fn as_millis(&self) -> i64 {
        self.millis
    }

    fn total_secs(&self) -> i64 {
        (self.millis + 999) / 1000
    }

    pub fn hours(&self) -> i64 {
        self.total_secs() / 3600
    }

    pub fn minutes(&self) -> i64 {
        self.total_secs() % 3600 / 60
    }

    pub fn seconds(&self) -> i64 {
        self.total_secs() % 60
    }

    /// How long until the displayed hours/minutes value changes.
    ///
    /// The display drops to the previous minute once the rounded-up total
    /// falls by `seconds() + 1`, i.e. once `millis <= (total - seconds - 1) * 1000`.
    /// In the last minute the next change is the countdown reaching zero.
    pub fn until_display_changes(&self) -> Duration {
        let boundary = ((self.total_secs() - self.seconds() - 1) * 1000).max(0);
        Duration::from_millis((self.millis - boundary).max(0) as u64)
    }
}

/// What the status surface should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewStatus {
    /// No snapshot received yet
    Loading,
    /// Next review is still in the future
    Countdown {
        reviews_available: u32,
        remaining: Remaining,
    },
    /// Countdown elapsed; show the count (0 is valid)
    Available(u32),
    /// Nothing due and no next review scheduled
    Vacation,
}

impl ReviewStatus {
    /// Compute the status for `snapshot` at `now`.
    pub fn compute(snapshot: Option<&ReviewSnapshot>, now: DateTime<Utc>) -> Self {
        let Some(snapshot) = snapshot else {
            return ReviewStatus::Loading;
        };
        let count = snapshot.reviews_available();

        match snapshot.next_review_at() {
            Some(at) => {
                let remaining = Remaining::until(at, now);
                if remaining.is_zero() {
                    ReviewStatus::Available(count)
                } else {
                    ReviewStatus::Countdown {
                        reviews_available: count,
                        remaining,
                    }
                }
            }
            None if count == 0 => ReviewStatus::Vacation,
            None => ReviewStatus::Available(count),
        }
    }

    pub fn reviews_available(&self) -> Option<u32> {
        match self {
            ReviewStatus::Loading => None,
            ReviewStatus::Countdown { reviews_available, .. } => Some(*reviews_available),
            ReviewStatus::Available(count) => Some(*count),
            ReviewStatus::Vacation => Some(0),
        }
    }

    pub fn remaining(&self) -> Option<Remaining> {
        match self {
            ReviewStatus::Countdown { remaining, .. } => Some(*remaining),
            _ => None,
        }
    }
}

/// Words placed around the numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Labels {
    pub prefix: String,
    pub loading: String,
    pub reviews_suffix: String,
    pub vacation: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            prefix: "WK".to_string(),
            loading: "待ってください".to_string(),
            reviews_suffix: "枚".to_string(),
            vacation: "Vacation mode".to_string(),
        }
    }
}

impl Labels {
    /// Render the display text for `status`.
    pub fn render(&self, status: &ReviewStatus) -> String {
        let body = match status {
            ReviewStatus::Loading => self.loading.clone(),
            ReviewStatus::Countdown { remaining, .. } => format_countdown(remaining),
            ReviewStatus::Available(count) => format!("{}{}", count, self.reviews_suffix),
            ReviewStatus::Vacation => self.vacation.clone(),
        };

        if self.prefix.is_empty() {
            body
        } else {
            format!("{} {}", self.prefix, body)
        }
    }
}

/// Format as `{hours}h{minutes:02}m`, hours unpadded and unbounded.
pub fn format_countdown(remaining: &Remaining) -> String {
    format!("{}h{:02}m", remaining.hours(), remaining.minutes())
}
