pub mod assignments;
pub mod auth;
pub mod classes;
pub mod core;
pub mod submissions;

use crate::access;
use crate::config::Config;
use crate::db;
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{Assignment, Class, Identity, Submission, User, UserId};
use crate::temporal::format_timestamp;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde_json::json;

/// What a handler sees for one request.
pub(crate) struct Ctx<'a> {
    pub identity: Identity,
    pub now: DateTime<Utc>,
    pub config: &'a Config,
    pub params: &'a serde_json::Value,
}

impl Ctx<'_> {
    pub fn user(&self) -> Result<UserId, HandlerErr> {
        Ok(access::require_user(self.identity)?)
    }
}

/// Runs `f` against the open store inside one transaction.
pub(crate) fn transact<T>(
    state: &AppState,
    req: &Request,
    f: impl FnOnce(&Connection, &Ctx<'_>) -> Result<T, HandlerErr>,
) -> Result<T, HandlerErr> {
    let Some(conn) = state.db.as_ref() else {
        return Err(HandlerErr {
            code: "no_workspace",
            message: "select a workspace first".to_string(),
            details: None,
        });
    };
    let ctx = Ctx {
        identity: state.identity(req),
        now: Utc::now(),
        config: &state.config,
        params: &req.params,
    };
    db::with_transaction(conn, |tx| f(tx, &ctx))
}

pub(crate) fn dispatch(
    state: &AppState,
    req: &Request,
    f: impl FnOnce(&Connection, &Ctx<'_>) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    match transact(state, req, f) {
        Ok(result) => ok(&req.id, result),
        Err(error) => {
            log::debug!("{} failed: {} {}", req.method, error.code, error.message);
            error.response(&req.id)
        }
    }
}

pub(crate) fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub(crate) fn get_optional_str(params: &serde_json::Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a string", key))),
    }
}

pub(crate) fn get_optional_i64(params: &serde_json::Value, key: &str) -> Result<Option<i64>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an integer", key))),
    }
}

pub(crate) fn get_required_id(params: &serde_json::Value, key: &str) -> Result<i64, HandlerErr> {
    get_optional_i64(params, key)?.ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub(crate) fn user_json(user: &User) -> serde_json::Value {
    json!({
        "id": user.id.0,
        "username": user.username,
        "email": user.email,
        "notificationsEnabled": user.notifications_enabled,
    })
}

pub(crate) fn class_json(class: &Class) -> serde_json::Value {
    json!({
        "id": class.id.0,
        "name": class.name,
        "description": class.description,
        "ownerId": class.owner_id.0,
    })
}

pub(crate) fn assignment_json(a: &Assignment) -> serde_json::Value {
    json!({
        "id": a.id.0,
        "classId": a.class_id.0,
        "creatorId": a.creator_id.map(|c| c.0),
        "title": a.title,
        "description": a.description,
        "dueDate": format_timestamp(a.due_date),
        "createdAt": format_timestamp(a.created_at),
        "reminderHours": a.reminder_hours,
    })
}

pub(crate) fn submission_json(s: &Submission) -> serde_json::Value {
    json!({
        "id": s.id.0,
        "assignmentId": s.assignment_id.0,
        "studentId": s.student_id.0,
        "content": s.content,
        "submittedAt": format_timestamp(s.submitted_at),
    })
}
