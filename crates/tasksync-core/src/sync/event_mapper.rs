//! Task → calendar event mapping.
//!
//! A task with both dates is copied verbatim. A task with only a start date
//! (its due date) becomes a span that tracks the present:
//!
//! | state                    | start      | end        |
//! |--------------------------|------------|------------|
//! | done                     | due        | due        |
//! | due in the future        | now/today  | due        |
//! | due now or in the past   | due        | now/today  |
//!
//! Date-only values compare by UTC calendar day, date-time values by instant.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::sync::types::{EventPayload, EventTime, Plan, SkipReason, Task, TaskTime};

/// Derive the event payload for `task`, or `None` when it has no start date.
pub fn map_task_to_event(task: &Task, now: DateTime<Utc>) -> Option<EventPayload> {
    let start = task.start.as_ref()?;

    let (start, end) = match (start, task.end.as_ref()) {
        (start, Some(end)) => (start.to_event_time(), end.to_event_time()),
        (TaskTime::Date(due), None) => {
            let today = now.date_naive();
            if task.is_done() {
                (EventTime::Date(*due), EventTime::Date(*due))
            } else if *due > today {
                (EventTime::Date(today), EventTime::Date(*due))
            } else {
                (EventTime::Date(*due), EventTime::Date(today))
            }
        }
        (TaskTime::DateTime { at, raw }, None) => {
            let due = EventTime::DateTime(raw.clone());
            if task.is_done() {
                (due.clone(), due)
            } else if at.with_timezone(&Utc) > now {
                (EventTime::DateTime(render_instant(now)), due)
            } else {
                (due, EventTime::DateTime(render_instant(now)))
            }
        }
    };

    Some(EventPayload {
        summary: task.name.clone(),
        start,
        end,
        location: task.location.clone(),
    })
}

/// Decide what a run does with `task`.
///
/// Skip rules come first: an echo of our own write-back, then a missing
/// start date. Otherwise the stored event id and trash flag pick the call.
pub fn plan_task(task: &Task, now: DateTime<Utc>) -> Plan {
    if task.is_own_write_echo() {
        return Plan::Skip(SkipReason::OwnWriteEcho);
    }

    let Some(payload) = map_task_to_event(task, now) else {
        return Plan::Skip(SkipReason::NoStartDate);
    };

    match task.stored_event_id.as_deref().filter(|id| !id.is_empty()) {
        None => Plan::Create(payload),
        Some(event_id) if !task.in_trash => Plan::Update {
            event_id: event_id.to_string(),
            payload,
        },
        Some(event_id) => Plan::Delete {
            event_id: event_id.to_string(),
        },
    }
}

/// RFC3339 in UTC with millisecond precision, e.g. `2024-06-10T08:30:00.000Z`.
pub fn render_instant(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
