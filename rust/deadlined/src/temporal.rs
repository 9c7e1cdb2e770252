use crate::error::{DomainError, DomainResult};
use crate::model::{Assignment, AssignmentId};
use chrono::{DateTime, Duration, NaiveDateTime, SecondsFormat, Utc};
use std::collections::HashSet;

/// Form input format accepted besides RFC 3339; read as UTC.
const FORM_DUE_DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

pub fn default_urgent_window() -> Duration {
    Duration::days(2)
}

/// Ascending by due date, ties by id, independent of input order.
pub fn ordered_by_due_date(mut assignments: Vec<Assignment>) -> Vec<Assignment> {
    assignments.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.id.cmp(&b.id)));
    assignments
}

/// Inclusive at `now + window`. Anything already past due is still urgent.
/// A window reaching past the representable calendar covers everything.
pub fn is_urgent(assignment: &Assignment, now: DateTime<Utc>, window: Duration) -> bool {
    now.checked_add_signed(window)
        .map_or(true, |limit| assignment.due_date <= limit)
}

pub fn urgent(assignments: &[Assignment], now: DateTime<Utc>, window: Duration) -> Vec<Assignment> {
    assignments
        .iter()
        .filter(|a| is_urgent(a, now, window))
        .cloned()
        .collect()
}

#[derive(Debug, Clone)]
pub struct TimelineEntry {
    pub assignment: Assignment,
    pub urgent: bool,
    pub completed: bool,
}

pub fn timeline(
    assignments: Vec<Assignment>,
    completed: &HashSet<AssignmentId>,
    now: DateTime<Utc>,
    window: Duration,
) -> Vec<TimelineEntry> {
    ordered_by_due_date(assignments)
        .into_iter()
        .map(|a| TimelineEntry {
            urgent: is_urgent(&a, now, window),
            completed: completed.contains(&a.id),
            assignment: a,
        })
        .collect()
}

pub fn parse_due_date(raw: &str) -> DomainResult<DateTime<Utc>> {
    let t = raw.trim();
    if t.is_empty() {
        return Err(DomainError::validation("dueDate", "due date is required"));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(t, FORM_DUE_DATE_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| {
            DomainError::validation(
                "dueDate",
                "due date must be RFC 3339 or YYYY-MM-DD HH:MM",
            )
        })
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
