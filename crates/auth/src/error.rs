use thiserror::Error;

use crate::DenialReason;

/// Failure of authentication, resolution or an access policy.
///
/// Every variant is terminal for the request; nothing here is retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    /// Missing/invalid/expired token, or the subject is not an active user.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// The company (or membership) does not exist or is soft-deleted.
    #[error("not found: {0}")]
    NotFound(String),

    /// Resolution succeeded but visibility or role requirements failed.
    #[error("permission denied: {0}")]
    PermissionDenied(DenialReason),

    /// The collaborator backing a lookup failed.
    #[error("lookup failed: {0}")]
    Lookup(String),
}

impl AuthzError {
    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::Unauthenticated(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}
