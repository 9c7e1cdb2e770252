//! Per-request capability checks.
//!
//! Callers resolve every referenced id first (`NotFound`) and only then ask
//! these predicates, so a missing record and a forbidden one stay distinct.
//! Assignment-level checks take the assignment's parent class, since every
//! right over an assignment is derived from that class.

use crate::enrollment;
use crate::error::{DomainError, DomainResult};
use crate::model::{Class, Identity, UserId};
use rusqlite::Connection;

pub fn require_user(identity: Identity) -> DomainResult<UserId> {
    identity.user_id().ok_or(DomainError::Unauthenticated)
}

pub fn can_view_class(conn: &Connection, user: UserId, class: &Class) -> DomainResult<bool> {
    if user == class.owner_id {
        return Ok(true);
    }
    enrollment::is_member_of(conn, class, user)
}

pub fn can_manage_class(user: UserId, class: &Class) -> bool {
    user == class.owner_id
}

pub fn can_create_assignment(user: UserId, class: &Class) -> bool {
    user == class.owner_id
}

/// Edit and delete rights follow the class owner, not the creator column.
pub fn can_edit_assignment(user: UserId, assignment_class: &Class) -> bool {
    user == assignment_class.owner_id
}

pub fn can_submit(conn: &Connection, user: UserId, assignment_class: &Class) -> DomainResult<bool> {
    can_view_class(conn, user, assignment_class)
}

pub fn can_view_submissions(user: UserId, assignment_class: &Class) -> bool {
    user == assignment_class.owner_id
}

pub fn ensure(allowed: bool, action: &'static str) -> DomainResult<()> {
    if allowed {
        Ok(())
    } else {
        Err(DomainError::forbidden(action))
    }
}
