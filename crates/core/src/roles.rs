//! Well-known role name constants and the caller role enum.
//!
//! These must match the role strings embedded in access-token claims.

use crate::error::CoreError;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_USER: &str = "user";

/// All valid role names.
pub const VALID_ROLES: &[&str] = &[ROLE_ADMIN, ROLE_USER];

/// The caller's role, used to gate status transitions and deletes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    User,
}

impl Role {
    /// Return the claim string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => ROLE_ADMIN,
            Self::User => ROLE_USER,
        }
    }

    /// Parse from a claim string, returning an error for unknown roles.
    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            ROLE_ADMIN => Ok(Self::Admin),
            ROLE_USER => Ok(Self::User),
            other => Err(CoreError::Unauthorized(format!(
                "Unknown role: '{other}'. Valid roles: {}",
                VALID_ROLES.join(", ")
            ))),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}
