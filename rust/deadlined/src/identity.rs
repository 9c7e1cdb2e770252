use crate::db;
use crate::error::{DomainError, DomainResult};
use crate::model::{User, UserId};
use anyhow::Context;
use rusqlite::{Connection, OptionalExtension, Row};

const USERNAME_MAX: usize = 64;
const EMAIL_MAX: usize = 128;
/// bcrypt ignores everything past this many bytes.
const PASSWORD_MAX_BYTES: usize = 72;

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        notifications_enabled: row.get::<_, i64>(3)? != 0,
    })
}

fn validate_username(username: &str) -> DomainResult<()> {
    if username.trim().is_empty() {
        return Err(DomainError::validation("username", "username is required"));
    }
    if username.chars().count() > USERNAME_MAX {
        return Err(DomainError::validation(
            "username",
            format!("username must be at most {} characters", USERNAME_MAX),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> DomainResult<()> {
    if email.chars().count() > EMAIL_MAX {
        return Err(DomainError::validation(
            "email",
            format!("email must be at most {} characters", EMAIL_MAX),
        ));
    }
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !email.chars().any(char::is_whitespace)
                && domain
                    .split_once('.')
                    .map(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.contains('@'))
                    .unwrap_or(false)
        }
        None => false,
    };
    if !valid {
        return Err(DomainError::validation("email", "invalid email address"));
    }
    Ok(())
}

fn validate_password(password: &str) -> DomainResult<()> {
    if password.is_empty() {
        return Err(DomainError::validation("password", "password is required"));
    }
    if password.len() > PASSWORD_MAX_BYTES {
        return Err(DomainError::validation(
            "password",
            format!("password must be at most {} bytes", PASSWORD_MAX_BYTES),
        ));
    }
    Ok(())
}

fn hash_password(password: &str, cost: u32) -> DomainResult<String> {
    let hashed = bcrypt::hash(password, cost).context("hash password")?;
    Ok(hashed)
}

fn exists_with(conn: &Connection, column: &str, value: &str) -> DomainResult<bool> {
    let sql = format!("SELECT 1 FROM users WHERE {} = ?", column);
    Ok(conn
        .query_row(&sql, [value], |r| r.get::<_, i64>(0))
        .optional()?
        .is_some())
}

fn taken_field(
    conn: &Connection,
    username: &str,
    email: &str,
) -> DomainResult<Option<&'static str>> {
    if exists_with(conn, "username", username)? {
        return Ok(Some("username"));
    }
    if exists_with(conn, "email", email)? {
        return Ok(Some("email"));
    }
    Ok(None)
}

/// Names the column behind a uniqueness failure on insert. The colliding row
/// may have been rolled back already, so fall back to the constraint message.
fn collided_field(
    conn: &Connection,
    username: &str,
    email: &str,
    e: &rusqlite::Error,
) -> DomainResult<&'static str> {
    if let Some(field) = taken_field(conn, username, email)? {
        return Ok(field);
    }
    let email_constraint = matches!(
        e,
        rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("users.email")
    );
    Ok(if email_constraint { "email" } else { "username" })
}

/// Creates an account. Username and email are matched exactly, case included.
pub fn register(
    conn: &Connection,
    username: &str,
    email: &str,
    password: &str,
    cost: u32,
) -> DomainResult<UserId> {
    validate_username(username)?;
    validate_email(email)?;
    validate_password(password)?;

    if let Some(field) = taken_field(conn, username, email)? {
        return Err(DomainError::DuplicateIdentity { field });
    }

    let hash = hash_password(password, cost)?;
    let inserted = conn.execute(
        "INSERT INTO users(username, email, password_hash) VALUES(?, ?, ?)",
        (username, email, &hash),
    );
    match inserted {
        Ok(_) => {}
        Err(e) if db::is_unique_violation(&e) => {
            let field = collided_field(conn, username, email, &e)?;
            return Err(DomainError::DuplicateIdentity { field });
        }
        Err(e) => return Err(e.into()),
    }
    let id = UserId(conn.last_insert_rowid());
    log::info!("registered user {} ({})", id, username);
    Ok(id)
}

/// `None` for an unknown username and for a wrong password alike. Both paths
/// pay for one bcrypt round at `cost`.
pub fn verify(
    conn: &Connection,
    username: &str,
    password: &str,
    cost: u32,
) -> DomainResult<Option<UserId>> {
    let row: Option<(UserId, String)> = conn
        .query_row(
            "SELECT id, password_hash FROM users WHERE username = ?",
            [username],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;
    let Some((id, hash)) = row else {
        hash_password(password, cost)?;
        return Ok(None);
    };
    // Longer input could only match through bcrypt's truncation.
    if password.len() > PASSWORD_MAX_BYTES {
        bcrypt::verify("", &hash).context("verify password hash")?;
        return Ok(None);
    }
    let matches = bcrypt::verify(password, &hash).context("verify password hash")?;
    Ok(matches.then_some(id))
}

pub fn get_user(conn: &Connection, id: UserId) -> DomainResult<User> {
    conn.query_row(
        "SELECT id, username, email, notifications_enabled FROM users WHERE id = ?",
        [id],
        user_from_row,
    )
    .optional()?
    .ok_or_else(|| DomainError::not_found("user"))
}

pub fn set_notifications(conn: &Connection, user: UserId, enabled: bool) -> DomainResult<User> {
    let changed = conn.execute(
        "UPDATE users SET notifications_enabled = ? WHERE id = ?",
        (enabled as i64, user),
    )?;
    if changed == 0 {
        return Err(DomainError::not_found("user"));
    }
    get_user(conn, user)
}

pub fn change_password(
    conn: &Connection,
    user: UserId,
    old_password: &str,
    new_password: &str,
    cost: u32,
) -> DomainResult<()> {
    validate_password(new_password)?;
    let current: String = conn
        .query_row("SELECT password_hash FROM users WHERE id = ?", [user], |r| {
            r.get(0)
        })
        .optional()?
        .ok_or_else(|| DomainError::not_found("user"))?;
    let old_matches = old_password.len() <= PASSWORD_MAX_BYTES
        && bcrypt::verify(old_password, &current).context("verify password hash")?;
    if !old_matches {
        return Err(DomainError::InvalidCredentials);
    }
    let hash = hash_password(new_password, cost)?;
    conn.execute(
        "UPDATE users SET password_hash = ? WHERE id = ?",
        (&hash, user),
    )?;
    log::info!("password changed for user {}", user);
    Ok(())
}
