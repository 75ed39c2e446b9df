//! Authorization and identity collaborators.
//!
//! Permission decisions and user directories live outside this crate; the
//! session manager consumes them through these traits.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Document role, ordered from least to most privileged
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Editor,
    Owner,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Editor => "editor",
            Self::Owner => "owner",
        }
    }

    /// Whether holding `self` satisfies a requirement of `required`.
    pub fn satisfies(self, required: Self) -> bool {
        self >= required
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides whether a user holds at least a role on a document (async)
#[allow(async_fn_in_trait)]
pub trait PermissionChecker {
    async fn has_permission(&self, document_id: &str, user_id: &str, role: Role) -> Result<bool>;
}

/// Resolves a user id to the name shown to collaborators (async)
#[allow(async_fn_in_trait)]
pub trait DisplayNameResolver {
    async fn resolve_display_name(&self, user_id: &str) -> Result<String>;
}

/// Grants every role; for trusted local tooling such as the CLI
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PermissionChecker for AllowAll {
    async fn has_permission(&self, _document_id: &str, _user_id: &str, _role: Role) -> Result<bool> {
        Ok(true)
    }
}

/// Shows the user id itself as the display name
#[derive(Debug, Clone, Copy, Default)]
pub struct UserIdAsName;

impl DisplayNameResolver for UserIdAsName {
    async fn resolve_display_name(&self, user_id: &str) -> Result<String> {
        Ok(user_id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_ordered() {
        assert!(Role::Owner.satisfies(Role::Viewer));
        assert!(Role::Editor.satisfies(Role::Editor));
        assert!(!Role::Viewer.satisfies(Role::Editor));
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Editor).unwrap(), "\"editor\"");
        assert_eq!(Role::Owner.to_string(), "owner");
    }

    #[tokio::test]
    async fn local_tooling_collaborators() {
        assert!(AllowAll.has_permission("d1", "u1", Role::Owner).await.unwrap());
        assert_eq!(UserIdAsName.resolve_display_name("u1").await.unwrap(), "u1");
    }
}
