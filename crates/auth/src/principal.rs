use serde::{Deserialize, Serialize};

use atelier_core::{CompanyId, UserAccount, UserId};

use crate::CompanyRole;

/// The authenticated caller of a request.
///
/// Built once per request from stored user data and never mutated afterwards.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub id: UserId,
    pub is_superuser: bool,
    pub is_active: bool,
}

impl Principal {
    pub fn user(id: UserId) -> Self {
        Self {
            id,
            is_superuser: false,
            is_active: true,
        }
    }

    pub fn superuser(id: UserId) -> Self {
        Self {
            id,
            is_superuser: true,
            is_active: true,
        }
    }
}

impl From<&UserAccount> for Principal {
    fn from(account: &UserAccount) -> Self {
        Self {
            id: account.id,
            is_superuser: account.is_superuser,
            is_active: account.is_active,
        }
    }
}

/// A principal's membership in a company.
///
/// At most one membership exists per `(company_id, user_id)` pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub company_id: CompanyId,
    pub user_id: UserId,
    pub role: CompanyRole,
}

/// Employee listing row: a membership joined with the member's account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub user_id: UserId,
    pub email: String,
    pub full_name: Option<String>,
    pub role: CompanyRole,
}

/// Request to add an employee or change an employee's role.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeGrant {
    pub user_id: UserId,
    pub role: CompanyRole,
}

impl EmployeeGrant {
    pub fn new(user_id: UserId, role: CompanyRole) -> Self {
        Self { user_id, role }
    }
}
