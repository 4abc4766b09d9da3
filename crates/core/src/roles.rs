//! Project role names and the acting-user identity.
//!
//! Roles are resolved by the identity collaborator and passed in with every
//! mutating call; nothing in this crate looks them up.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::UserId;

pub const ROLE_OWNER: &str = "owner";
pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_EDITOR: &str = "editor";
pub const ROLE_VIEWER: &str = "viewer";

/// All valid role names.
pub const VALID_ROLES: &[&str] = &[ROLE_OWNER, ROLE_ADMIN, ROLE_EDITOR, ROLE_VIEWER];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Editor,
    Viewer,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Owner => ROLE_OWNER,
            Role::Admin => ROLE_ADMIN,
            Role::Editor => ROLE_EDITOR,
            Role::Viewer => ROLE_VIEWER,
        }
    }

    /// Owners and admins manage the project: assignment, reopening approved
    /// answers, finalizing.
    pub fn is_manager(self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }

    /// Everyone but viewers may touch answer content.
    pub fn can_edit(self) -> bool {
        !matches!(self, Role::Viewer)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ROLE_OWNER => Ok(Role::Owner),
            ROLE_ADMIN => Ok(Role::Admin),
            ROLE_EDITOR => Ok(Role::Editor),
            ROLE_VIEWER => Ok(Role::Viewer),
            other => Err(CoreError::Validation(format!(
                "Invalid role '{other}'. Must be one of: {}",
                VALID_ROLES.join(", ")
            ))),
        }
    }
}

/// The authenticated user performing an operation, with their resolved role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub uid: UserId,
    pub email: String,
    pub display_name: String,
    pub role: Role,
}

impl Actor {
    pub fn new(
        uid: impl Into<UserId>,
        email: impl Into<String>,
        display_name: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            uid: uid.into(),
            email: email.into(),
            display_name: display_name.into(),
            role,
        }
    }

    /// Assignment is keyed by email; comparison ignores ASCII case.
    pub fn is_assignee(&self, assigned_to: Option<&str>) -> bool {
        assigned_to.is_some_and(|email| email.eq_ignore_ascii_case(&self.email))
    }

    pub(crate) fn require_edit(&self) -> Result<(), CoreError> {
        if self.role.can_edit() {
            Ok(())
        } else {
            Err(CoreError::Forbidden(format!(
                "{} has the viewer role and cannot modify answers",
                self.email
            )))
        }
    }

    pub(crate) fn require_manager(&self, action: &str) -> Result<(), CoreError> {
        if self.role.is_manager() {
            Ok(())
        } else {
            Err(CoreError::Forbidden(format!(
                "Only owners and admins may {action} (role: {})",
                self.role
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_str() {
        for name in VALID_ROLES {
            let role: Role = name.parse().unwrap();
            assert_eq!(role.as_str(), *name);
        }
    }

    #[test]
    fn test_unknown_role_rejected() {
        let err = "superuser".parse::<Role>().unwrap_err();
        assert!(err.to_string().contains("Invalid role"));
    }

    #[test]
    fn test_manager_roles() {
        assert!(Role::Owner.is_manager());
        assert!(Role::Admin.is_manager());
        assert!(!Role::Editor.is_manager());
        assert!(!Role::Viewer.is_manager());
    }

    #[test]
    fn test_assignee_match_ignores_case() {
        let actor = Actor::new("u1", "Alice@Example.com", "Alice", Role::Editor);
        assert!(actor.is_assignee(Some("alice@example.com")));
        assert!(!actor.is_assignee(Some("bob@example.com")));
        assert!(!actor.is_assignee(None));
    }

    #[test]
    fn test_viewer_cannot_edit() {
        let actor = Actor::new("u1", "v@example.com", "Viewer", Role::Viewer);
        assert!(actor.require_edit().is_err());
    }
}
