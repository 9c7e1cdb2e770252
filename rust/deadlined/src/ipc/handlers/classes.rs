use super::{assignment_json, class_json, dispatch, get_optional_str, get_required_id, get_required_str};
use crate::access;
use crate::enrollment;
use crate::ipc::types::{AppState, Request};
use crate::model::{ClassId, User};
use serde_json::json;

fn member_json(user: &User) -> serde_json::Value {
    json!({ "id": user.id.0, "username": user.username })
}

fn handle_classes_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    dispatch(state, req, |conn, ctx| {
        let owner = ctx.user()?;
        let name = get_required_str(ctx.params, "name")?;
        let description = get_optional_str(ctx.params, "description")?;
        let class_id = enrollment::create_class(conn, owner, &name, description.as_deref())?;
        let class = enrollment::get_class(conn, class_id)?;
        Ok(json!({ "classId": class_id.0, "class": class_json(&class) }))
    })
}

fn handle_classes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    dispatch(state, req, |conn, ctx| {
        let user = ctx.user()?;
        let classes: Vec<serde_json::Value> = enrollment::class_summaries_of(conn, user)?
            .iter()
            .map(|s| {
                let mut v = class_json(&s.class);
                v["role"] = json!(s.role.as_str());
                v["memberCount"] = json!(s.member_count);
                v["assignmentCount"] = json!(s.assignment_count);
                v
            })
            .collect();
        Ok(json!({ "classes": classes }))
    })
}

fn handle_classes_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    dispatch(state, req, |conn, ctx| {
        let user = ctx.user()?;
        let class_id = ClassId(get_required_id(ctx.params, "classId")?);
        let detail = enrollment::class_detail(conn, user, class_id)?;
        Ok(json!({
            "class": class_json(&detail.class),
            "isOwner": detail.is_owner,
            "members": detail.members.iter().map(member_json).collect::<Vec<_>>(),
            "assignments": detail.assignments.iter().map(assignment_json).collect::<Vec<_>>(),
        }))
    })
}

fn handle_classes_join(state: &mut AppState, req: &Request) -> serde_json::Value {
    dispatch(state, req, |conn, ctx| {
        let user = ctx.user()?;
        let class_id = ClassId(get_required_id(ctx.params, "classId")?);
        enrollment::enroll(conn, class_id, user)?;
        Ok(json!({ "classId": class_id.0, "joined": true }))
    })
}

fn handle_classes_members(state: &mut AppState, req: &Request) -> serde_json::Value {
    dispatch(state, req, |conn, ctx| {
        let user = ctx.user()?;
        let class_id = ClassId(get_required_id(ctx.params, "classId")?);
        let class = enrollment::get_class(conn, class_id)?;
        access::ensure(access::can_view_class(conn, user, &class)?, "view class")?;
        let members = enrollment::members_of(conn, class_id)?;
        Ok(json!({ "members": members.iter().map(member_json).collect::<Vec<_>>() }))
    })
}

fn handle_classes_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    dispatch(state, req, |conn, ctx| {
        let user = ctx.user()?;
        let class_id = ClassId(get_required_id(ctx.params, "classId")?);
        enrollment::delete_class(conn, user, class_id)?;
        Ok(json!({ "deleted": true }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.create" => Some(handle_classes_create(state, req)),
        "classes.list" => Some(handle_classes_list(state, req)),
        "classes.get" => Some(handle_classes_get(state, req)),
        "classes.join" => Some(handle_classes_join(state, req)),
        "classes.members" => Some(handle_classes_members(state, req)),
        "classes.delete" => Some(handle_classes_delete(state, req)),
        _ => None,
    }
}
