use crate::access;
use crate::assignments;
use crate::db;
use crate::error::{DomainError, DomainResult};
use crate::model::{AssignmentId, Millis, Submission, SubmissionId, UserId};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use std::collections::HashSet;

fn submission_from_row(row: &Row<'_>) -> rusqlite::Result<Submission> {
    Ok(Submission {
        id: row.get(0)?,
        assignment_id: row.get(1)?,
        student_id: row.get(2)?,
        content: row.get(3)?,
        submitted_at: row.get::<_, Millis>(4)?.0,
    })
}

/// Records the student's work, replacing any earlier submission for the same
/// assignment. The row id is stable across resubmissions.
pub fn submit(
    conn: &Connection,
    student: UserId,
    assignment_id: AssignmentId,
    content: &str,
    now: DateTime<Utc>,
) -> DomainResult<SubmissionId> {
    let (_, class) = assignments::resolve_with_class(conn, assignment_id)?;
    access::ensure(access::can_submit(conn, student, &class)?, "submit to this assignment")?;
    if content.trim().is_empty() {
        return Err(DomainError::validation("content", "submission content is required"));
    }
    upsert(conn, assignment_id, student, content, now)
}

/// Insert first; a uniqueness violation on (assignment, student) means the
/// row already exists (possibly from a concurrent writer) and becomes an
/// update-in-place.
fn upsert(
    conn: &Connection,
    assignment_id: AssignmentId,
    student: UserId,
    content: &str,
    now: DateTime<Utc>,
) -> DomainResult<SubmissionId> {
    let inserted = conn.execute(
        "INSERT INTO submissions(assignment_id, student_id, content, submitted_at)
         VALUES(?, ?, ?, ?)",
        (assignment_id, student, content, Millis(now)),
    );
    match inserted {
        Ok(_) => {
            let id = SubmissionId(conn.last_insert_rowid());
            log::info!("user {} submitted assignment {}", student, assignment_id);
            Ok(id)
        }
        Err(e) if db::is_unique_violation(&e) => {
            let id = conn
                .query_row(
                    "UPDATE submissions
                     SET content = ?, submitted_at = ?
                     WHERE assignment_id = ? AND student_id = ?
                     RETURNING id",
                    (content, Millis(now), assignment_id, student),
                    |r| r.get::<_, SubmissionId>(0),
                )
                .optional()?
                .ok_or(DomainError::Conflict("submission"))?;
            log::info!("user {} resubmitted assignment {}", student, assignment_id);
            Ok(id)
        }
        Err(e) => Err(e.into()),
    }
}

pub fn list_for_assignment(
    conn: &Connection,
    caller: UserId,
    assignment_id: AssignmentId,
) -> DomainResult<Vec<Submission>> {
    let (_, class) = assignments::resolve_with_class(conn, assignment_id)?;
    access::ensure(access::can_view_submissions(caller, &class), "view submissions")?;
    let mut stmt = conn.prepare(
        "SELECT id, assignment_id, student_id, content, submitted_at
         FROM submissions
         WHERE assignment_id = ?
         ORDER BY id",
    )?;
    let rows = stmt
        .query_map([assignment_id], submission_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn own_submission(
    conn: &Connection,
    student: UserId,
    assignment_id: AssignmentId,
) -> DomainResult<Option<Submission>> {
    let (_, class) = assignments::resolve_with_class(conn, assignment_id)?;
    access::ensure(access::can_view_class(conn, student, &class)?, "view assignment")?;
    Ok(conn
        .query_row(
            "SELECT id, assignment_id, student_id, content, submitted_at
             FROM submissions
             WHERE assignment_id = ? AND student_id = ?",
            (assignment_id, student),
            submission_from_row,
        )
        .optional()?)
}

pub fn is_completed(conn: &Connection, assignment_id: AssignmentId, student: UserId) -> DomainResult<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM submissions WHERE assignment_id = ? AND student_id = ?",
            (assignment_id, student),
            |r| r.get::<_, i64>(0),
        )
        .optional()?
        .is_some())
}

pub fn completed_assignment_ids(conn: &Connection, student: UserId) -> DomainResult<HashSet<AssignmentId>> {
    let mut stmt = conn.prepare("SELECT assignment_id FROM submissions WHERE student_id = ?")?;
    let ids = stmt
        .query_map([student], |r| r.get::<_, AssignmentId>(0))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(ids)
}
