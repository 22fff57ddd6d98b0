//! Shopper identity.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::id::UserId;

/// Who a cart or favorites operation acts on behalf of.
///
/// Services receive this explicitly on every call instead of reading an
/// ambient "current user".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "userId", rename_all = "camelCase")]
pub enum Identity {
    /// Not signed in; state lives in the guest ephemeral store only.
    Guest,
    /// Signed-in shopper; state lives in the remote tables.
    User(UserId),
}

impl Identity {
    /// Returns the user ID for signed-in shoppers.
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        match self {
            Self::Guest => None,
            Self::User(id) => Some(*id),
        }
    }

    #[must_use]
    pub const fn is_guest(&self) -> bool {
        matches!(self, Self::Guest)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Guest => f.write_str("guest"),
            Self::User(id) => write!(f, "user:{id}"),
        }
    }
}

impl From<Option<UserId>> for Identity {
    fn from(user: Option<UserId>) -> Self {
        user.map_or(Self::Guest, Self::User)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_from_optional_user() {
        assert_eq!(Identity::from(None), Identity::Guest);

        let user = UserId::random();
        let identity = Identity::from(Some(user));
        assert_eq!(identity.user_id(), Some(user));
        assert!(!identity.is_guest());
        assert_eq!(identity.to_string(), format!("user:{user}"));
    }

    #[test]
    fn test_identity_serializes_tagged() {
        let json = serde_json::to_value(Identity::Guest).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "guest" }));
    }
}
