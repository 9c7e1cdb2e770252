use super::{dispatch, get_optional_str, get_required_str, transact, user_json};
use crate::error::DomainError;
use crate::identity;
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use uuid::Uuid;

fn handle_register(state: &mut AppState, req: &Request) -> serde_json::Value {
    dispatch(state, req, |conn, ctx| {
        let username = get_required_str(ctx.params, "username")?;
        let email = get_required_str(ctx.params, "email")?;
        let password = get_required_str(ctx.params, "password")?;
        if let Some(confirm) = get_optional_str(ctx.params, "passwordConfirm")? {
            if confirm != password {
                return Err(DomainError::validation("passwordConfirm", "passwords do not match").into());
            }
        }
        let id = identity::register(
            conn,
            username.trim(),
            email.trim(),
            &password,
            ctx.config.bcrypt_cost,
        )?;
        Ok(json!({ "userId": id.0 }))
    })
}

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let verified = transact(state, req, |conn, ctx| {
        let username = get_required_str(ctx.params, "username")?;
        let password = get_required_str(ctx.params, "password")?;
        // Unknown user and wrong password must be indistinguishable.
        let verified = identity::verify(conn, username.trim(), &password, ctx.config.bcrypt_cost)?;
        let Some(id) = verified else {
            return Err(DomainError::InvalidCredentials.into());
        };
        Ok(identity::get_user(conn, id)?)
    });

    match verified {
        Ok(user) => {
            let token = Uuid::new_v4().to_string();
            // One live session per user; a fresh login retires the old token.
            state.sessions.retain(|_, owner| *owner != user.id);
            state.sessions.insert(token.clone(), user.id);
            log::info!("user {} logged in", user.id);
            ok(&req.id, json!({ "session": token, "user": user_json(&user) }))
        }
        Err(e) => e.response(&req.id),
    }
}

fn handle_logout(state: &mut AppState, req: &Request) -> serde_json::Value {
    let removed = req
        .session
        .as_deref()
        .and_then(|token| state.sessions.remove(token));
    if let Some(user) = removed {
        log::info!("user {} logged out", user);
    }
    ok(&req.id, json!({ "loggedOut": removed.is_some() }))
}

fn handle_me(state: &mut AppState, req: &Request) -> serde_json::Value {
    dispatch(state, req, |conn, ctx| {
        let user = identity::get_user(conn, ctx.user()?)?;
        Ok(json!({ "user": user_json(&user) }))
    })
}

fn handle_notifications_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    dispatch(state, req, |conn, ctx| {
        let user = ctx.user()?;
        let enabled = ctx
            .params
            .get("enabled")
            .and_then(|v| v.as_bool())
            .ok_or_else(|| HandlerErr::bad_params("missing enabled"))?;
        let updated = identity::set_notifications(conn, user, enabled)?;
        Ok(json!({ "user": user_json(&updated) }))
    })
}

fn handle_password_change(state: &mut AppState, req: &Request) -> serde_json::Value {
    dispatch(state, req, |conn, ctx| {
        let user = ctx.user()?;
        let old_password = get_required_str(ctx.params, "oldPassword")?;
        let new_password = get_required_str(ctx.params, "newPassword")?;
        identity::change_password(conn, user, &old_password, &new_password, ctx.config.bcrypt_cost)?;
        Ok(json!({ "changed": true }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.register" => Some(handle_register(state, req)),
        "auth.login" => Some(handle_login(state, req)),
        "auth.logout" => Some(handle_logout(state, req)),
        "auth.me" => Some(handle_me(state, req)),
        "account.notifications.set" => Some(handle_notifications_set(state, req)),
        "account.password.change" => Some(handle_password_change(state, req)),
        _ => None,
    }
}
