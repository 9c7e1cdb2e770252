use super::{dispatch, get_required_id, get_required_str, submission_json};
use crate::ipc::types::{AppState, Request};
use crate::model::AssignmentId;
use crate::submissions;
use serde_json::json;

fn handle_submit(state: &mut AppState, req: &Request) -> serde_json::Value {
    dispatch(state, req, |conn, ctx| {
        let user = ctx.user()?;
        let assignment_id = AssignmentId(get_required_id(ctx.params, "assignmentId")?);
        let content = get_required_str(ctx.params, "content")?;
        let id = submissions::submit(conn, user, assignment_id, &content, ctx.now)?;
        Ok(json!({ "submissionId": id.0 }))
    })
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    dispatch(state, req, |conn, ctx| {
        let user = ctx.user()?;
        let assignment_id = AssignmentId(get_required_id(ctx.params, "assignmentId")?);
        let rows = submissions::list_for_assignment(conn, user, assignment_id)?;
        Ok(json!({ "submissions": rows.iter().map(submission_json).collect::<Vec<_>>() }))
    })
}

fn handle_mine(state: &mut AppState, req: &Request) -> serde_json::Value {
    dispatch(state, req, |conn, ctx| {
        let user = ctx.user()?;
        let assignment_id = AssignmentId(get_required_id(ctx.params, "assignmentId")?);
        let own = submissions::own_submission(conn, user, assignment_id)?;
        Ok(json!({
            "completed": own.is_some(),
            "submission": own.as_ref().map(submission_json),
        }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "submissions.submit" => Some(handle_submit(state, req)),
        "submissions.list" => Some(handle_list(state, req)),
        "submissions.mine" => Some(handle_mine(state, req)),
        _ => None,
    }
}
