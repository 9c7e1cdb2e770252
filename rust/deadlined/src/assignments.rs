use crate::access;
use crate::enrollment;
use crate::error::{DomainError, DomainResult};
use crate::model::{Assignment, AssignmentId, Class, ClassId, Millis, UserId};
use crate::temporal;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};

pub const DEFAULT_REMINDER_HOURS: i64 = 24;
const TITLE_MAX: usize = 140;

const SELECT_COLUMNS: &str =
    "SELECT id, class_id, creator_id, title, description, due_date, created_at, reminder_hours
     FROM assignments";

#[derive(Debug, Clone)]
pub struct NewAssignment {
    pub title: String,
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    pub reminder_hours: Option<i64>,
}

/// Absent fields are left as they are. `description: Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct AssignmentPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub due_date: Option<DateTime<Utc>>,
    pub reminder_hours: Option<i64>,
}

fn assignment_from_row(row: &Row<'_>) -> rusqlite::Result<Assignment> {
    Ok(Assignment {
        id: row.get(0)?,
        class_id: row.get(1)?,
        creator_id: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        due_date: row.get::<_, Millis>(5)?.0,
        created_at: row.get::<_, Millis>(6)?.0,
        reminder_hours: row.get(7)?,
    })
}

fn validate_title(title: &str) -> DomainResult<String> {
    let t = title.trim();
    if t.is_empty() {
        return Err(DomainError::validation("title", "title is required"));
    }
    if t.chars().count() > TITLE_MAX {
        return Err(DomainError::validation(
            "title",
            format!("title must be at most {} characters", TITLE_MAX),
        ));
    }
    Ok(t.to_string())
}

fn validate_reminder_hours(hours: i64) -> DomainResult<i64> {
    if hours < 0 {
        return Err(DomainError::validation(
            "reminderHours",
            "reminder hours must not be negative",
        ));
    }
    Ok(hours)
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

pub fn find_assignment(conn: &Connection, id: AssignmentId) -> DomainResult<Option<Assignment>> {
    let sql = format!("{} WHERE id = ?", SELECT_COLUMNS);
    Ok(conn
        .query_row(&sql, [id], assignment_from_row)
        .optional()?)
}

pub fn get_assignment(conn: &Connection, id: AssignmentId) -> DomainResult<Assignment> {
    find_assignment(conn, id)?.ok_or_else(|| DomainError::not_found("assignment"))
}

/// Resolves the assignment and its parent class, in that order.
pub(crate) fn resolve_with_class(
    conn: &Connection,
    id: AssignmentId,
) -> DomainResult<(Assignment, Class)> {
    let assignment = get_assignment(conn, id)?;
    let class = enrollment::get_class(conn, assignment.class_id)?;
    Ok((assignment, class))
}

pub fn create_assignment(
    conn: &Connection,
    class_id: ClassId,
    creator: UserId,
    new: NewAssignment,
    now: DateTime<Utc>,
) -> DomainResult<AssignmentId> {
    let class = enrollment::get_class(conn, class_id)?;
    access::ensure(
        access::can_create_assignment(creator, &class),
        "create assignments in this class",
    )?;
    let title = validate_title(&new.title)?;
    let reminder_hours =
        validate_reminder_hours(new.reminder_hours.unwrap_or(DEFAULT_REMINDER_HOURS))?;

    conn.execute(
        "INSERT INTO assignments(title, description, due_date, created_at, reminder_hours, creator_id, class_id)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &title,
            normalize_description(new.description),
            Millis(new.due_date),
            Millis(now),
            reminder_hours,
            creator,
            class_id,
        ),
    )?;
    let id = AssignmentId(conn.last_insert_rowid());
    log::info!("user {} created assignment {} in class {}", creator, id, class_id);
    Ok(id)
}

pub fn view_assignment(conn: &Connection, actor: UserId, id: AssignmentId) -> DomainResult<Assignment> {
    let (assignment, class) = resolve_with_class(conn, id)?;
    access::ensure(access::can_view_class(conn, actor, &class)?, "view assignment")?;
    Ok(assignment)
}

pub fn update_assignment(
    conn: &Connection,
    actor: UserId,
    id: AssignmentId,
    patch: AssignmentPatch,
) -> DomainResult<Assignment> {
    let (mut assignment, class) = resolve_with_class(conn, id)?;
    access::ensure(access::can_edit_assignment(actor, &class), "edit assignment")?;

    if let Some(title) = patch.title {
        assignment.title = validate_title(&title)?;
    }
    if let Some(description) = patch.description {
        assignment.description = normalize_description(description);
    }
    if let Some(due_date) = patch.due_date {
        assignment.due_date = due_date;
    }
    if let Some(hours) = patch.reminder_hours {
        assignment.reminder_hours = validate_reminder_hours(hours)?;
    }

    conn.execute(
        "UPDATE assignments
         SET title = ?, description = ?, due_date = ?, reminder_hours = ?
         WHERE id = ?",
        (
            &assignment.title,
            assignment.description.as_deref(),
            Millis(assignment.due_date),
            assignment.reminder_hours,
            id,
        ),
    )?;
    log::info!("user {} updated assignment {}", actor, id);
    Ok(assignment)
}

/// Deletes the assignment together with its submissions.
pub fn delete_assignment(conn: &Connection, actor: UserId, id: AssignmentId) -> DomainResult<()> {
    let (_, class) = resolve_with_class(conn, id)?;
    access::ensure(access::can_edit_assignment(actor, &class), "delete assignment")?;

    let submissions = conn.execute("DELETE FROM submissions WHERE assignment_id = ?", [id])?;
    conn.execute("DELETE FROM assignments WHERE id = ?", [id])?;
    log::info!(
        "user {} deleted assignment {} ({} submissions)",
        actor,
        id,
        submissions
    );
    Ok(())
}

/// No access check; callers have already authorized the class.
pub(crate) fn load_for_class(conn: &Connection, class_id: ClassId) -> DomainResult<Vec<Assignment>> {
    let sql = format!("{} WHERE class_id = ?", SELECT_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([class_id], assignment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(temporal::ordered_by_due_date(rows))
}

pub fn list_for_class(conn: &Connection, actor: UserId, class_id: ClassId) -> DomainResult<Vec<Assignment>> {
    let class = enrollment::get_class(conn, class_id)?;
    access::ensure(access::can_view_class(conn, actor, &class)?, "view class")?;
    load_for_class(conn, class_id)
}

/// Every assignment in a class the user owns or belongs to. Empty, never an
/// error, for a user with no classes.
pub fn list_for_user(conn: &Connection, user: UserId) -> DomainResult<Vec<Assignment>> {
    let sql = format!(
        "{} WHERE class_id IN (
           SELECT id FROM classes WHERE owner_id = ?1
           UNION
           SELECT class_id FROM class_memberships WHERE user_id = ?1
         )",
        SELECT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([user], assignment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(temporal::ordered_by_due_date(rows))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db;
    use crate::identity::tests::register_user;
    use chrono::{Duration, TimeZone};

    pub(crate) fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("t0")
    }

    pub(crate) fn new_assignment(title: &str, due: DateTime<Utc>) -> NewAssignment {
        NewAssignment {
            title: title.to_string(),
            description: None,
            due_date: due,
            reminder_hours: None,
        }
    }

    #[test]
    fn owner_creates_with_defaults() {
        let conn = db::open_in_memory().expect("db");
        let owner = register_user(&conn, "owner");
        let class_id = enrollment::create_class(&conn, owner, "Math", None).expect("class");
        let id = create_assignment(
            &conn,
            class_id,
            owner,
            new_assignment(" HW1 ", t0() + Duration::days(3)),
            t0(),
        )
        .expect("create");

        let a = get_assignment(&conn, id).expect("get");
        assert_eq!(a.title, "HW1");
        assert_eq!(a.reminder_hours, DEFAULT_REMINDER_HOURS);
        assert_eq!(a.created_at, t0());
        assert_eq!(a.due_date, t0() + Duration::days(3));
        assert_eq!(a.creator_id, Some(owner));
        assert_eq!(a.class_id, class_id);
    }

    #[test]
    fn members_cannot_create_and_unknown_class_is_not_found() {
        let conn = db::open_in_memory().expect("db");
        let owner = register_user(&conn, "owner");
        let student = register_user(&conn, "student");
        let class_id = enrollment::create_class(&conn, owner, "Math", None).expect("class");
        enrollment::enroll(&conn, class_id, student).expect("enroll");

        let e = create_assignment(&conn, class_id, student, new_assignment("x", t0()), t0())
            .expect_err("student create");
        assert!(matches!(e, DomainError::Forbidden { .. }));
        let e = create_assignment(&conn, ClassId(77), owner, new_assignment("x", t0()), t0())
            .expect_err("missing class");
        assert!(matches!(e, DomainError::NotFound { entity: "class" }));
    }

    #[test]
    fn create_validates_title_and_reminder() {
        let conn = db::open_in_memory().expect("db");
        let owner = register_user(&conn, "owner");
        let class_id = enrollment::create_class(&conn, owner, "Math", None).expect("class");
        let e = create_assignment(&conn, class_id, owner, new_assignment("  ", t0()), t0())
            .expect_err("blank title");
        assert!(matches!(e, DomainError::Validation { field: "title", .. }));

        let mut bad = new_assignment("HW", t0());
        bad.reminder_hours = Some(-1);
        let e = create_assignment(&conn, class_id, owner, bad, t0()).expect_err("negative");
        assert!(matches!(e, DomainError::Validation { field: "reminderHours", .. }));
    }

    #[test]
    fn update_applies_patch_and_keeps_created_at() {
        let conn = db::open_in_memory().expect("db");
        let owner = register_user(&conn, "owner");
        let class_id = enrollment::create_class(&conn, owner, "Math", None).expect("class");
        let mut new = new_assignment("Draft HW", t0() + Duration::days(4));
        new.description = Some("Old description".to_string());
        let id = create_assignment(&conn, class_id, owner, new, t0()).expect("create");

        let patch = AssignmentPatch {
            title: Some("Final HW".to_string()),
            description: Some(Some("Updated description".to_string())),
            due_date: Some(t0() + Duration::days(6)),
            reminder_hours: Some(48),
        };
        update_assignment(&conn, owner, id, patch).expect("update");

        let saved = get_assignment(&conn, id).expect("get");
        assert_eq!(saved.title, "Final HW");
        assert_eq!(saved.description.as_deref(), Some("Updated description"));
        assert_eq!(saved.due_date, t0() + Duration::days(6));
        assert_eq!(saved.reminder_hours, 48);
        assert_eq!(saved.created_at, t0());

        let clear = AssignmentPatch {
            description: Some(None),
            ..Default::default()
        };
        let cleared = update_assignment(&conn, owner, id, clear).expect("clear");
        assert_eq!(cleared.description, None);
        assert_eq!(cleared.title, "Final HW");
    }

    #[test]
    fn update_and_delete_are_owner_only() {
        let conn = db::open_in_memory().expect("db");
        let owner = register_user(&conn, "owner");
        let student = register_user(&conn, "student");
        let class_id = enrollment::create_class(&conn, owner, "Math", None).expect("class");
        enrollment::enroll(&conn, class_id, student).expect("enroll");
        let id = create_assignment(&conn, class_id, owner, new_assignment("HW", t0()), t0())
            .expect("create");

        let e = update_assignment(&conn, student, id, AssignmentPatch::default())
            .expect_err("student update");
        assert!(matches!(e, DomainError::Forbidden { .. }));
        let e = delete_assignment(&conn, student, id).expect_err("student delete");
        assert!(matches!(e, DomainError::Forbidden { .. }));
        let e = delete_assignment(&conn, owner, AssignmentId(999)).expect_err("missing");
        assert!(matches!(e, DomainError::NotFound { entity: "assignment" }));

        delete_assignment(&conn, owner, id).expect("owner delete");
        assert!(find_assignment(&conn, id).expect("find").is_none());
    }

    #[test]
    fn list_for_user_unions_owned_and_member_classes_in_due_order() {
        let conn = db::open_in_memory().expect("db");
        let teacher_a = register_user(&conn, "teacher_a");
        let teacher_b = register_user(&conn, "teacher_b");
        let student = register_user(&conn, "student");
        let algebra = enrollment::create_class(&conn, teacher_a, "Algebra", None).expect("class");
        let poetry = enrollment::create_class(&conn, teacher_b, "Poetry", None).expect("class");
        let other = enrollment::create_class(&conn, teacher_b, "Other", None).expect("class");
        enrollment::enroll(&conn, algebra, student).expect("enroll");
        enrollment::enroll(&conn, poetry, student).expect("enroll");

        let later = create_assignment(
            &conn,
            algebra,
            teacher_a,
            new_assignment("Later", t0() + Duration::days(5)),
            t0(),
        )
        .expect("later");
        let sooner = create_assignment(
            &conn,
            poetry,
            teacher_b,
            new_assignment("Soon", t0() + Duration::days(1)),
            t0(),
        )
        .expect("sooner");
        create_assignment(
            &conn,
            other,
            teacher_b,
            new_assignment("Hidden", t0()),
            t0(),
        )
        .expect("hidden");

        let ids: Vec<AssignmentId> = list_for_user(&conn, student)
            .expect("list")
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec![sooner, later]);

        // Ownership alone still counts once the owner's edges are gone.
        conn.execute("DELETE FROM class_memberships WHERE user_id = ?", [teacher_b])
            .expect("drop owner edges");
        assert_eq!(list_for_user(&conn, teacher_b).expect("owner list").len(), 2);
    }

    #[test]
    fn list_for_user_without_classes_is_empty() {
        let conn = db::open_in_memory().expect("db");
        let loner = register_user(&conn, "loner");
        assert!(list_for_user(&conn, loner).expect("list").is_empty());
    }

    #[test]
    fn list_for_class_requires_view_rights() {
        let conn = db::open_in_memory().expect("db");
        let owner = register_user(&conn, "owner");
        let outsider = register_user(&conn, "outsider");
        let class_id = enrollment::create_class(&conn, owner, "Math", None).expect("class");
        create_assignment(&conn, class_id, owner, new_assignment("HW", t0()), t0())
            .expect("create");

        assert_eq!(list_for_class(&conn, owner, class_id).expect("owner").len(), 1);
        assert!(matches!(
            list_for_class(&conn, outsider, class_id),
            Err(DomainError::Forbidden { .. })
        ));
        assert!(matches!(
            view_assignment(&conn, outsider, AssignmentId(1)),
            Err(DomainError::Forbidden { .. })
        ));
    }
}
