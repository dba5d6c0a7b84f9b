//! User accounts as held by the external user store.

use serde::{Deserialize, Serialize};

use crate::id::UserId;

/// Stored user data relevant to authorization and employee listings.
///
/// Password hashes and profile management live with the user store; the
/// directory only reads these fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    pub email: String,
    pub full_name: Option<String>,
    pub is_superuser: bool,
    /// False for deactivated or soft-deleted accounts.
    pub is_active: bool,
}

impl UserAccount {
    pub fn new(id: UserId, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            full_name: None,
            is_superuser: false,
            is_active: true,
        }
    }

    pub fn superuser(mut self) -> Self {
        self.is_superuser = true;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}
