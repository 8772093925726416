//! Review queue snapshots parsed from the study-queue payload.
//!
//! The server reports:
//!
//! ```json
//! {"requested_information": {"reviews_available": 5, "next_review_date": 1738300800}}
//! ```
//!
//! `next_review_date` is an epoch value whose unit is configurable (see
//! [`EpochUnit`]) and is `null` while the account is in vacation mode.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors turning a server payload into a snapshot.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Not JSON, or required fields missing or mistyped
    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The server answered with an error envelope
    #[error("server error {code}: {message}")]
    Server { code: String, message: String },

    /// `next_review_date` does not map to a representable instant
    #[error("next review timestamp out of range: {0}")]
    TimestampOutOfRange(i64),
}

/// Unit of the `next_review_date` epoch value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EpochUnit {
    #[default]
    Seconds,
    Milliseconds,
}

impl EpochUnit {
    /// Convert a raw epoch value to an instant.
    pub fn to_datetime(self, raw: i64) -> Option<DateTime<Utc>> {
        match self {
            EpochUnit::Seconds => DateTime::from_timestamp(raw, 0),
            EpochUnit::Milliseconds => DateTime::from_timestamp_millis(raw),
        }
    }
}

/// Last known server-reported review state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewSnapshot {
    reviews_available: u32,
    next_review_at: Option<DateTime<Utc>>,
}

impl ReviewSnapshot {
    pub fn new(reviews_available: u32, next_review_at: Option<DateTime<Utc>>) -> Self {
        Self {
            reviews_available,
            next_review_at,
        }
    }

    /// Parse a raw study-queue payload.
    pub fn parse(raw: &str, unit: EpochUnit) -> Result<Self, ParseError> {
        let value: serde_json::Value = serde_json::from_str(raw)?;

        if let Some(error) = value.get("error").filter(|error| !error.is_null()) {
            let body: ServerError = serde_json::from_value(error.clone())?;
            return Err(ParseError::Server {
                code: body.code,
                message: body.message,
            });
        }

        let queue: StudyQueue = serde_json::from_value(value)?;
        let info = queue.requested_information;

        let next_review_at = match info.next_review_date {
            Some(raw) => Some(unit.to_datetime(raw).ok_or(ParseError::TimestampOutOfRange(raw))?),
            None => None,
        };

        Ok(Self::new(info.reviews_available, next_review_at))
    }

    pub fn reviews_available(&self) -> u32 {
        self.reviews_available
    }

    /// When the next review unlocks; `None` in vacation mode.
    pub fn next_review_at(&self) -> Option<DateTime<Utc>> {
        self.next_review_at
    }
}

#[derive(Debug, Deserialize)]
struct StudyQueue {
    requested_information: RequestedInformation,
}

#[derive(Debug, Deserialize)]
struct RequestedInformation {
    reviews_available: u32,
    // deserialize_with keeps serde from defaulting a missing field to None
    #[serde(deserialize_with = "Option::deserialize")]
    next_review_date: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ServerError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}
