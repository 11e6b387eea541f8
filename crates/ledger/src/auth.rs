//! Authorization gate - caller identity supplied by the session layer
//!
//! Authentication happens outside the ledger core. The engine only consults
//! the gate to branch on role and ownership; it never authenticates or
//! mutates anything through it.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Role attached to an authenticated session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Admin,
}

/// An already-authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
}

impl Identity {
    pub fn customer(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Customer,
        }
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Admin,
        }
    }

    #[inline]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Source of the current caller identity.
///
/// Returns None when there is no session.
pub trait AuthorizationGate: Send + Sync {
    fn current_identity(&self) -> Option<Identity>;
}

/// Gate holding one fixed identity for the lifetime of the session.
///
/// The CLI and tests construct this from whatever the session layer (or the
/// operator's flags) already authenticated.
#[derive(Debug, Clone, Default)]
pub struct SessionGate {
    identity: Option<Identity>,
}

impl SessionGate {
    pub fn new(identity: Option<Identity>) -> Self {
        Self { identity }
    }

    /// Gate with no session; every engine operation fails `Unauthorized`.
    pub fn anonymous() -> Self {
        Self { identity: None }
    }
}

impl AuthorizationGate for SessionGate {
    fn current_identity(&self) -> Option<Identity> {
        self.identity.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles() {
        assert!(Identity::admin("ops").is_admin());
        assert!(!Identity::customer("alice").is_admin());
    }

    #[test]
    fn test_session_gate() {
        let gate = SessionGate::new(Some(Identity::customer("alice")));
        assert_eq!(gate.current_identity().unwrap().user_id, "alice");

        assert!(SessionGate::anonymous().current_identity().is_none());
    }

    #[test]
    fn test_role_text_roundtrip() {
        assert_eq!(Role::Admin.to_string(), "admin");
        assert_eq!("customer".parse::<Role>().unwrap(), Role::Customer);
    }
}
