//! Request-level error taxonomy for the command handlers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use atelier_auth::{AuthzError, DenialReason};
use atelier_core::DomainError;

use crate::store::StoreError;

/// Transport-neutral error class; the boundary layer maps it to status codes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unauthenticated,
    NotFound,
    PermissionDenied,
    Conflict,
    Validation,
    Internal,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::NotFound => "not_found",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Validation => "validation",
            ErrorKind::Internal => "internal",
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of one command handler call. Terminal; nothing is retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(DenialReason),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation failed: {0}")]
    Validation(String),

    /// Storage or lookup failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Unauthenticated(_) => ErrorKind::Unauthenticated,
            ServiceError::NotFound(_) => ErrorKind::NotFound,
            ServiceError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            ServiceError::Conflict(_) => ErrorKind::Conflict,
            ServiceError::Validation(_) => ErrorKind::Validation,
            ServiceError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The denial reason, when this is a policy or visibility denial.
    pub fn denial_reason(&self) -> Option<DenialReason> {
        match self {
            ServiceError::PermissionDenied(reason) => Some(*reason),
            _ => None,
        }
    }
}

impl From<AuthzError> for ServiceError {
    fn from(value: AuthzError) -> Self {
        match value {
            AuthzError::Unauthenticated(msg) => ServiceError::Unauthenticated(msg),
            AuthzError::NotFound(what) => ServiceError::NotFound(what),
            AuthzError::PermissionDenied(reason) => ServiceError::PermissionDenied(reason),
            AuthzError::Lookup(msg) => ServiceError::Internal(msg),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => ServiceError::Conflict(msg),
            StoreError::NotFound(what) => ServiceError::NotFound(what),
            StoreError::Backend(msg) => ServiceError::Internal(msg),
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                ServiceError::Validation(msg)
            }
            DomainError::NotFound(what) => ServiceError::NotFound(what),
            DomainError::Conflict(msg) => ServiceError::Conflict(msg),
        }
    }
}
