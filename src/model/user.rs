use std::collections::HashSet;

use serde::{Deserialize, Serialize};

pub type Scope = String;

/// A role's scope grant, either global or bound to one project (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: i64,
    pub project_id: Option<i64>,
    pub scopes: Vec<Scope>,
}

impl Role {
    pub fn is_global(&self) -> bool {
        self.project_id.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleScope {
    Global,
    Project(i64),
}

/// Binds a user to a project with direct scopes and an owner flag
/// (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProject {
    pub project_id: i64,
    pub is_owner: bool,
    pub scopes: Vec<Scope>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub is_owner: bool,
    pub direct_scopes: Vec<Scope>,
    pub roles: Vec<Role>,
    pub projects: Vec<UserProject>,
}

impl User {
    pub fn project(&self, project_id: i64) -> Option<&UserProject> {
        self.projects.iter().find(|p| p.project_id == project_id)
    }

    pub fn is_owner_at(&self, project_id: Option<i64>) -> bool {
        match project_id {
            None => self.is_owner,
            Some(pid) => self.is_owner || self.project(pid).is_some_and(|p| p.is_owner),
        }
    }

    /// Effective scope set at the given scope (spec §3 invariant):
    /// global = direct ∪ (∪ global-role scopes);
    /// project(P) = global ∪ project-user.scopes ∪ (∪ scopes of project-roles
    /// whose project_id = P).
    pub fn effective_scopes(&self, project_id: Option<i64>) -> HashSet<Scope> {
        let mut scopes: HashSet<Scope> = self.direct_scopes.iter().cloned().collect();
        for role in &self.roles {
            if role.is_global() {
                scopes.extend(role.scopes.iter().cloned());
            }
        }

        if let Some(pid) = project_id {
            if let Some(up) = self.project(pid) {
                scopes.extend(up.scopes.iter().cloned());
            }
            for role in &self.roles {
                if role.project_id == Some(pid) {
                    scopes.extend(role.scopes.iter().cloned());
                }
            }
        }

        scopes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 1,
            is_owner: false,
            direct_scopes: vec!["read_users".into()],
            roles: vec![
                Role { id: 10, project_id: None, scopes: vec!["write_users".into()] },
                Role { id: 11, project_id: Some(5), scopes: vec!["deploy".into()] },
            ],
            projects: vec![UserProject { project_id: 5, is_owner: false, scopes: vec!["read_project".into()] }],
        }
    }

    #[test]
    fn global_scope_is_direct_plus_global_roles() {
        let u = user();
        let scopes = u.effective_scopes(None);
        assert_eq!(scopes.len(), 2);
        assert!(scopes.contains("read_users"));
        assert!(scopes.contains("write_users"));
    }

    #[test]
    fn project_scope_adds_project_user_and_project_role_scopes() {
        let u = user();
        let scopes = u.effective_scopes(Some(5));
        assert!(scopes.contains("read_users"));
        assert!(scopes.contains("write_users"));
        assert!(scopes.contains("read_project"));
        assert!(scopes.contains("deploy"));
    }

    #[test]
    fn other_project_role_scopes_do_not_leak() {
        let u = user();
        let scopes = u.effective_scopes(Some(6));
        assert!(!scopes.contains("deploy"));
        assert!(!scopes.contains("read_project"));
    }
}
