use super::{assignment_json, dispatch, get_optional_i64, get_optional_str, get_required_id, get_required_str};
use crate::assignments::{self, AssignmentPatch, NewAssignment};
use crate::error::DomainError;
use crate::ipc::error::HandlerErr;
use crate::ipc::types::{AppState, Request};
use crate::model::{AssignmentId, ClassId};
use crate::submissions;
use crate::temporal;
use chrono::Duration;
use serde_json::json;

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    dispatch(state, req, |conn, ctx| {
        let user = ctx.user()?;
        let class_id = ClassId(get_required_id(ctx.params, "classId")?);
        let new = NewAssignment {
            title: get_required_str(ctx.params, "title")?,
            description: get_optional_str(ctx.params, "description")?,
            due_date: temporal::parse_due_date(&get_required_str(ctx.params, "dueDate")?)?,
            reminder_hours: get_optional_i64(ctx.params, "reminderHours")?,
        };
        let id = assignments::create_assignment(conn, class_id, user, new, ctx.now)?;
        let created = assignments::get_assignment(conn, id)?;
        Ok(json!({ "assignmentId": id.0, "assignment": assignment_json(&created) }))
    })
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    dispatch(state, req, |conn, ctx| {
        let user = ctx.user()?;
        let id = AssignmentId(get_required_id(ctx.params, "assignmentId")?);
        let assignment = assignments::view_assignment(conn, user, id)?;
        Ok(json!({ "assignment": assignment_json(&assignment) }))
    })
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    dispatch(state, req, |conn, ctx| {
        let user = ctx.user()?;
        let id = AssignmentId(get_required_id(ctx.params, "assignmentId")?);
        // An explicit null description clears it; an absent key leaves it alone.
        let description = match ctx.params.get("description") {
            None => None,
            Some(_) => Some(get_optional_str(ctx.params, "description")?),
        };
        let due_date = get_optional_str(ctx.params, "dueDate")?
            .map(|raw| temporal::parse_due_date(&raw))
            .transpose()?;
        let patch = AssignmentPatch {
            title: get_optional_str(ctx.params, "title")?,
            description,
            due_date,
            reminder_hours: get_optional_i64(ctx.params, "reminderHours")?,
        };
        let updated = assignments::update_assignment(conn, user, id, patch)?;
        Ok(json!({ "assignment": assignment_json(&updated) }))
    })
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    dispatch(state, req, |conn, ctx| {
        let user = ctx.user()?;
        let id = AssignmentId(get_required_id(ctx.params, "assignmentId")?);
        assignments::delete_assignment(conn, user, id)?;
        Ok(json!({ "deleted": true }))
    })
}

fn handle_list_for_class(state: &mut AppState, req: &Request) -> serde_json::Value {
    dispatch(state, req, |conn, ctx| {
        let user = ctx.user()?;
        let class_id = ClassId(get_required_id(ctx.params, "classId")?);
        let rows = assignments::list_for_class(conn, user, class_id)?;
        Ok(json!({ "assignments": rows.iter().map(assignment_json).collect::<Vec<_>>() }))
    })
}

fn handle_timeline(state: &mut AppState, req: &Request) -> serde_json::Value {
    dispatch(state, req, |conn, ctx| {
        let user = ctx.user()?;
        let rows = assignments::list_for_user(conn, user)?;
        let completed = submissions::completed_assignment_ids(conn, user)?;
        let entries: Vec<serde_json::Value> =
            temporal::timeline(rows, &completed, ctx.now, ctx.config.urgent_window())
                .iter()
                .map(|e| {
                    let mut v = assignment_json(&e.assignment);
                    v["urgent"] = json!(e.urgent);
                    v["completed"] = json!(e.completed);
                    v
                })
                .collect();
        Ok(json!({ "assignments": entries }))
    })
}

fn handle_urgent(state: &mut AppState, req: &Request) -> serde_json::Value {
    dispatch(state, req, |conn, ctx| {
        let user = ctx.user()?;
        let window = match get_optional_i64(ctx.params, "windowHours")? {
            Some(hours) => Duration::try_hours(hours)
                .filter(|_| hours > 0)
                .ok_or_else(|| {
                    HandlerErr::from(DomainError::validation(
                        "windowHours",
                        "window must be a positive number of hours",
                    ))
                })?,
            None => ctx.config.urgent_window(),
        };
        let rows = assignments::list_for_user(conn, user)?;
        let due_soon = temporal::urgent(&rows, ctx.now, window);
        Ok(json!({
            "windowHours": window.num_hours(),
            "assignments": due_soon.iter().map(assignment_json).collect::<Vec<_>>(),
        }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "assignments.create" => Some(handle_create(state, req)),
        "assignments.get" => Some(handle_get(state, req)),
        "assignments.update" => Some(handle_update(state, req)),
        "assignments.delete" => Some(handle_delete(state, req)),
        "assignments.listForClass" => Some(handle_list_for_class(state, req)),
        "assignments.timeline" => Some(handle_timeline(state, req)),
        "assignments.urgent" => Some(handle_urgent(state, req)),
        _ => None,
    }
}
