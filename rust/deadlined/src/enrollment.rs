use crate::access;
use crate::assignments;
use crate::error::{DomainError, DomainResult};
use crate::model::{Assignment, Class, ClassId, User, UserId};
use rusqlite::{Connection, OptionalExtension, Row};

const CLASS_NAME_MAX: usize = 140;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassRole {
    Owner,
    Member,
}

impl ClassRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassRole::Owner => "owner",
            ClassRole::Member => "member",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassSummary {
    pub class: Class,
    pub role: ClassRole,
    pub member_count: i64,
    pub assignment_count: i64,
}

#[derive(Debug, Clone)]
pub struct ClassDetail {
    pub class: Class,
    pub is_owner: bool,
    pub members: Vec<User>,
    pub assignments: Vec<Assignment>,
}

fn class_from_row(row: &Row<'_>) -> rusqlite::Result<Class> {
    Ok(Class {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        owner_id: row.get(3)?,
    })
}

fn normalize_description(description: Option<&str>) -> Option<String> {
    description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
}

pub fn create_class(
    conn: &Connection,
    owner: UserId,
    name: &str,
    description: Option<&str>,
) -> DomainResult<ClassId> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("name", "class name is required"));
    }
    if name.chars().count() > CLASS_NAME_MAX {
        return Err(DomainError::validation(
            "name",
            format!("class name must be at most {} characters", CLASS_NAME_MAX),
        ));
    }

    conn.execute(
        "INSERT INTO classes(name, description, owner_id) VALUES(?, ?, ?)",
        (name, normalize_description(description), owner),
    )?;
    let class_id = ClassId(conn.last_insert_rowid());
    conn.execute(
        "INSERT INTO class_memberships(user_id, class_id) VALUES(?, ?)",
        (owner, class_id),
    )?;
    log::info!("user {} created class {} ({})", owner, class_id, name);
    Ok(class_id)
}

pub fn find_class(conn: &Connection, id: ClassId) -> DomainResult<Option<Class>> {
    Ok(conn
        .query_row(
            "SELECT id, name, description, owner_id FROM classes WHERE id = ?",
            [id],
            class_from_row,
        )
        .optional()?)
}

pub fn get_class(conn: &Connection, id: ClassId) -> DomainResult<Class> {
    find_class(conn, id)?.ok_or_else(|| DomainError::not_found("class"))
}

fn has_membership_edge(conn: &Connection, class_id: ClassId, user: UserId) -> DomainResult<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM class_memberships WHERE class_id = ? AND user_id = ?",
            (class_id, user),
            |r| r.get::<_, i64>(0),
        )
        .optional()?
        .is_some())
}

/// The owner counts as a member whether or not an edge row exists.
pub fn is_member_of(conn: &Connection, class: &Class, user: UserId) -> DomainResult<bool> {
    if class.owner_id == user {
        return Ok(true);
    }
    has_membership_edge(conn, class.id, user)
}

pub fn is_member(conn: &Connection, class_id: ClassId, user: UserId) -> DomainResult<bool> {
    let class = get_class(conn, class_id)?;
    is_member_of(conn, &class, user)
}

pub fn enroll(conn: &Connection, class_id: ClassId, user: UserId) -> DomainResult<()> {
    let class = get_class(conn, class_id)?;
    if is_member_of(conn, &class, user)? {
        return Err(DomainError::AlreadyEnrolled);
    }
    let user_exists = conn
        .query_row("SELECT 1 FROM users WHERE id = ?", [user], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?
        .is_some();
    if !user_exists {
        return Err(DomainError::not_found("user"));
    }

    conn.execute(
        "INSERT INTO class_memberships(user_id, class_id) VALUES(?, ?)",
        (user, class_id),
    )
    .map_err(|e| DomainError::on_unique_violation(e, DomainError::AlreadyEnrolled))?;
    log::info!("user {} enrolled in class {}", user, class_id);
    Ok(())
}

/// Owner plus every enrolled user, ordered by username.
pub fn members_of(conn: &Connection, class_id: ClassId) -> DomainResult<Vec<User>> {
    get_class(conn, class_id)?;
    let mut stmt = conn.prepare(
        "SELECT u.id, u.username, u.email, u.notifications_enabled
         FROM users u
         WHERE u.id IN (
           SELECT owner_id FROM classes WHERE id = ?1
           UNION
           SELECT user_id FROM class_memberships WHERE class_id = ?1
         )
         ORDER BY u.username",
    )?;
    let members = stmt
        .query_map([class_id], |r| {
            Ok(User {
                id: r.get(0)?,
                username: r.get(1)?,
                email: r.get(2)?,
                notifications_enabled: r.get::<_, i64>(3)? != 0,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(members)
}

/// Classes the user owns or belongs to.
pub fn classes_of(conn: &Connection, user: UserId) -> DomainResult<Vec<Class>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.name, c.description, c.owner_id
         FROM classes c
         WHERE c.owner_id = ?1
            OR c.id IN (SELECT class_id FROM class_memberships WHERE user_id = ?1)
         ORDER BY c.name, c.id",
    )?;
    let classes = stmt
        .query_map([user], class_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(classes)
}

pub fn class_summaries_of(conn: &Connection, user: UserId) -> DomainResult<Vec<ClassSummary>> {
    // Correlated subqueries keep the counts independent of each other.
    let mut stmt = conn.prepare(
        "SELECT
           c.id,
           c.name,
           c.description,
           c.owner_id,
           1 + (SELECT COUNT(*) FROM class_memberships m
                WHERE m.class_id = c.id AND m.user_id != c.owner_id) AS member_count,
           (SELECT COUNT(*) FROM assignments a WHERE a.class_id = c.id) AS assignment_count
         FROM classes c
         WHERE c.owner_id = ?1
            OR c.id IN (SELECT class_id FROM class_memberships WHERE user_id = ?1)
         ORDER BY c.name, c.id",
    )?;
    let rows = stmt
        .query_map([user], |r| {
            let class = class_from_row(r)?;
            let role = if class.owner_id == user {
                ClassRole::Owner
            } else {
                ClassRole::Member
            };
            Ok(ClassSummary {
                class,
                role,
                member_count: r.get(4)?,
                assignment_count: r.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn class_detail(conn: &Connection, actor: UserId, class_id: ClassId) -> DomainResult<ClassDetail> {
    let class = get_class(conn, class_id)?;
    access::ensure(access::can_view_class(conn, actor, &class)?, "view class")?;
    let members = members_of(conn, class_id)?;
    let assignments = assignments::load_for_class(conn, class_id)?;
    Ok(ClassDetail {
        is_owner: class.owner_id == actor,
        class,
        members,
        assignments,
    })
}

/// Removes the class with its submissions, assignments and membership edges.
pub fn delete_class(conn: &Connection, actor: UserId, class_id: ClassId) -> DomainResult<()> {
    let class = get_class(conn, class_id)?;
    access::ensure(access::can_manage_class(actor, &class), "delete class")?;

    // Explicit dependency order; the schema has no ON DELETE CASCADE.
    let submissions = conn.execute(
        "DELETE FROM submissions
         WHERE assignment_id IN (SELECT id FROM assignments WHERE class_id = ?)",
        [class_id],
    )?;
    let assignments = conn.execute("DELETE FROM assignments WHERE class_id = ?", [class_id])?;
    conn.execute("DELETE FROM class_memberships WHERE class_id = ?", [class_id])?;
    conn.execute("DELETE FROM classes WHERE id = ?", [class_id])?;
    log::info!(
        "user {} deleted class {} ({} assignments, {} submissions)",
        actor,
        class_id,
        assignments,
        submissions
    );
    Ok(())
}
