//! Core types for task → calendar reconciliation.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::http::Method;

/// Length of a date-only value (`YYYY-MM-DD`).
pub const DATE_ONLY_LEN: usize = 10;

/// Edits this close to our own last write-back are treated as that write-back.
pub const ECHO_WINDOW_MS: i64 = 100;

/// A task date as stored in the record store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskTime {
    /// All-day value.
    Date(NaiveDate),
    /// Instant. `raw` keeps the record store's spelling so payloads echo it
    /// unchanged.
    DateTime {
        at: DateTime<FixedOffset>,
        raw: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid task date '{raw}': {message}")]
pub struct InvalidTaskTime {
    pub raw: String,
    pub message: String,
}

impl TaskTime {
    /// A value of exactly ten characters is a date, anything else an RFC3339
    /// instant.
    pub fn parse(raw: &str) -> Result<Self, InvalidTaskTime> {
        let invalid = |message: String| InvalidTaskTime {
            raw: raw.to_string(),
            message,
        };

        if raw.len() == DATE_ONLY_LEN {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(TaskTime::Date)
                .map_err(|e| invalid(e.to_string()))
        } else {
            DateTime::parse_from_rfc3339(raw)
                .map(|at| TaskTime::DateTime {
                    at,
                    raw: raw.to_string(),
                })
                .map_err(|e| invalid(e.to_string()))
        }
    }

    pub fn to_event_time(&self) -> EventTime {
        match self {
            TaskTime::Date(date) => EventTime::Date(*date),
            TaskTime::DateTime { raw, .. } => EventTime::DateTime(raw.clone()),
        }
    }
}

/// Snapshot of one task record. Never mutated during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub start: Option<TaskTime>,
    pub end: Option<TaskTime>,
    pub status: String,
    pub in_trash: bool,
    /// Id of the calendar event created for this task, if any.
    pub stored_event_id: Option<String>,
    /// When this system last wrote the record; `None` if it never did.
    pub last_update_at: Option<DateTime<Utc>>,
    /// When the record store last modified the record.
    pub last_edited_time: DateTime<Utc>,
    pub location: Option<String>,
}

impl Task {
    pub fn is_done(&self) -> bool {
        self.status.eq_ignore_ascii_case("done")
    }

    /// True when the only change since our last write-back is that write-back.
    pub fn is_own_write_echo(&self) -> bool {
        match self.last_update_at {
            Some(written) => {
                (self.last_edited_time - written).num_milliseconds().abs() < ECHO_WINDOW_MS
            }
            None => false,
        }
    }
}

/// Start or end of a calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventTime {
    #[serde(rename = "date")]
    Date(NaiveDate),
    #[serde(rename = "dateTime")]
    DateTime(String),
}

/// Body sent on event create/update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventPayload {
    pub summary: String,
    pub start: EventTime,
    pub end: EventTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// The subset of a Google Calendar event this system reads back.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl CalendarEvent {
    /// Stand-in result for DELETE, which returns no body.
    pub fn deleted() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Last edit is our own write-back.
    OwnWriteEcho,
    /// Task has no start date.
    NoStartDate,
}

/// What to do with one task.
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    Skip(SkipReason),
    Create(EventPayload),
    Update {
        event_id: String,
        payload: EventPayload,
    },
    Delete {
        event_id: String,
    },
}

impl Plan {
    /// HTTP method the plan issues, `None` for skips.
    pub fn method(&self) -> Option<Method> {
        match self {
            Plan::Skip(_) => None,
            Plan::Create(_) => Some(Method::Post),
            Plan::Update { .. } => Some(Method::Put),
            Plan::Delete { .. } => Some(Method::Delete),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Plan::Skip(_) => "skip",
            Plan::Create(_) => "create",
            Plan::Update { .. } => "update",
            Plan::Delete { .. } => "delete",
        }
    }
}
