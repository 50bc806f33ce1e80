//! Session lifecycle state and status snapshots.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::IdentityId;

/// Lifecycle state of an attendance session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session is active
    #[default]
    Idle,
    /// A worker is pulling frames and confirming identities
    Running,
    /// Stop was requested; the worker has not exited yet
    Stopping,
}

impl SessionState {
    /// Get string representation of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Running => "running",
            SessionState::Stopping => "stopping",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when a session date is not `YYYY-MM-DD`.
#[derive(Debug, Error)]
#[error("Invalid session date '{input}': expected YYYY-MM-DD")]
pub struct SessionDateError {
    pub input: String,
}

/// Calendar date an attendance session belongs to.
///
/// Serialized as `YYYY-MM-DD`, which is also the attendance document key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SessionDate(pub NaiveDate);

impl SessionDate {
    /// Today's date in the local timezone.
    pub fn today() -> Self {
        Self(Local::now().date_naive())
    }

    /// Parse a `YYYY-MM-DD` string.
    pub fn parse(input: &str) -> Result<Self, SessionDateError> {
        NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
            .map(Self)
            .map_err(|_| SessionDateError {
                input: input.to_string(),
            })
    }

    /// Document key form (`YYYY-MM-DD`).
    pub fn as_key(&self) -> String {
        self.0.format("%Y-%m-%d").to_string()
    }
}

impl FromStr for SessionDate {
    type Err = SessionDateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SessionDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Point-in-time snapshot of the session controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    /// Current lifecycle state
    pub state: SessionState,
    /// Date of the current or most recent session
    pub session_date: Option<SessionDate>,
    /// Confirmed identities, in confirmation order
    pub confirmed: Vec<IdentityId>,
    /// Display name of each confirmed identity
    pub last_seen: BTreeMap<IdentityId, String>,
    /// When the session started
    pub started_at: Option<DateTime<Utc>>,
    /// When the worker exited
    pub stopped_at: Option<DateTime<Utc>>,
    /// Frames pulled from the camera this session
    pub frame_count: u64,
    /// Smoothed preview frame rate
    pub fps: f64,
    /// Most recent failure, if any
    pub error: Option<String>,
    /// Whether a gallery blob exists on disk
    pub embeddings_available: bool,
    /// Whether a presence store is configured
    pub store_available: bool,
}

impl SessionStatus {
    /// Check if `id` has been confirmed this session.
    pub fn is_confirmed(&self, id: &IdentityId) -> bool {
        self.confirmed.iter().any(|c| c == id)
    }
}

/// Result of a `start` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StartOutcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<SessionDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl StartOutcome {
    /// Session started for `date`.
    pub fn started(date: SessionDate) -> Self {
        Self {
            ok: true,
            date: Some(date),
            reason: None,
        }
    }

    /// Start was refused.
    pub fn refused(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            date: None,
            reason: Some(reason.into()),
        }
    }
}

/// Result of a `stop` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StopOutcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl StopOutcome {
    /// Stop was accepted.
    pub fn stopped() -> Self {
        Self {
            ok: true,
            reason: None,
        }
    }

    /// Stop was refused.
    pub fn refused(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
        }
    }
}
