use serde::{Deserialize, Serialize};

use atelier_core::{CompanyId, UserId};

use crate::CompanyRole;

/// How a principal came to see a company.
///
/// A tagged variant instead of a `(is_superuser, Option<role>)` pair, so a
/// superuser can never carry a stale membership role.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "role", rename_all = "snake_case")]
pub enum AccessGrant {
    /// Global override; no membership consulted.
    Superuser,
    /// Holds a membership with the given role.
    Member(CompanyRole),
    /// Public company, no membership.
    PublicGuest,
}

/// Resolved, per-request authorization context for one principal against one company.
///
/// Derived fresh for every request and never persisted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveAccess {
    pub principal_id: UserId,
    pub company_id: CompanyId,
    pub grant: AccessGrant,
}

impl EffectiveAccess {
    pub fn new(principal_id: UserId, company_id: CompanyId, grant: AccessGrant) -> Self {
        Self {
            principal_id,
            company_id,
            grant,
        }
    }

    pub fn is_superuser(&self) -> bool {
        matches!(self.grant, AccessGrant::Superuser)
    }

    /// The membership role, if one was found. Superusers report `None`.
    pub fn role(&self) -> Option<CompanyRole> {
        match self.grant {
            AccessGrant::Member(role) => Some(role),
            AccessGrant::Superuser | AccessGrant::PublicGuest => None,
        }
    }

    /// Role used on the left-hand side of rank comparisons between memberships.
    ///
    /// Superusers act with `Owner` rank there.
    pub fn acting_role(&self) -> Option<CompanyRole> {
        match self.grant {
            AccessGrant::Superuser => Some(CompanyRole::Owner),
            AccessGrant::Member(role) => Some(role),
            AccessGrant::PublicGuest => None,
        }
    }
}
