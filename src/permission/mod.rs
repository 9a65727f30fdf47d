//! Permission validator (component D): scope/role hierarchy enforcement.
//!
//! No direct teacher analogue (the teacher is single-tenant); grounded on
//! the teacher's error-taxonomy style (`RateLimitError::Exceeded { .. }` in
//! `daemon/security/rate_limiter.rs`) for reporting the specific offending
//! scope rather than a bare boolean.

use std::collections::HashSet;

use crate::error::{GatewayError, Result};
use crate::model::user::{Role, Scope};
use crate::model::User;

fn offending_scope(requested: &[Scope], held: &HashSet<Scope>) -> Option<Scope> {
    requested.iter().find(|s| !held.contains(*s)).cloned()
}

/// Succeeds iff `caller` is owner at `project`, or `scopes_to_grant` is a
/// subset of `caller`'s effective scopes there (spec §4.D).
pub fn can_grant_scopes(caller: &User, scopes_to_grant: &[Scope], project: Option<i64>) -> Result<()> {
    if caller.is_owner_at(project) {
        return Ok(());
    }
    let held = caller.effective_scopes(project);
    match offending_scope(scopes_to_grant, &held) {
        None => Ok(()),
        Some(scope) => Err(GatewayError::InsufficientPermissions { scope: Some(scope) }),
    }
}

/// Succeeds iff `caller` is owner; or `target` is not an owner and its
/// effective scopes at `project` are a subset of `caller`'s (spec §4.D).
pub fn can_edit_user_permissions(caller: &User, target: &User, project: Option<i64>) -> Result<()> {
    if caller.is_owner_at(project) {
        return Ok(());
    }
    if target.is_owner_at(project) {
        return Err(GatewayError::CannotEditOwner);
    }
    let caller_scopes = caller.effective_scopes(project);
    let target_scopes = target.effective_scopes(project);
    let mut target_sorted: Vec<Scope> = target_scopes.into_iter().collect();
    target_sorted.sort();
    match offending_scope(&target_sorted, &caller_scopes) {
        None => Ok(()),
        Some(scope) => Err(GatewayError::InsufficientPermissions { scope: Some(scope) }),
    }
}

/// Delegates to `can_grant_scopes(role.scopes, project)` (spec §4.D).
pub fn can_edit_role(caller: &User, role: &Role, project: Option<i64>) -> Result<()> {
    can_grant_scopes(caller, &role.scopes, project)
}
