//! Caller identity supplied by the authentication collaborator.

use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// The authenticated caller of an operation.
///
/// The hashed user id comes from the upstream auth provider. Every
/// owner-scoped operation takes the session explicitly and resolves the owner
/// through [`UserSession::owner_id`] before touching storage or the network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    /// Stable hashed user identifier, if the caller is signed in.
    pub user_hash: Option<String>,
    /// Whether the caller may manage the shared admin knowledge base.
    pub is_admin: bool,
}

impl UserSession {
    /// Session for a signed-in user.
    pub fn user(user_hash: impl Into<String>) -> Self {
        Self {
            user_hash: Some(user_hash.into()),
            is_admin: false,
        }
    }

    /// Session for a signed-in administrator.
    pub fn admin(user_hash: impl Into<String>) -> Self {
        Self {
            user_hash: Some(user_hash.into()),
            is_admin: true,
        }
    }

    /// Session with no resolvable identity.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Resolve the owner id, failing with [`ChatError::Unauthorized`] when the
    /// identity is missing or blank.
    pub fn owner_id(&self) -> Result<&str, ChatError> {
        match self.user_hash.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(ChatError::Unauthorized(
                "user identity could not be resolved".to_string(),
            )),
        }
    }
}
