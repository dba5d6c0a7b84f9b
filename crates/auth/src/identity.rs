//! Identity context: token -> active [`Principal`].

use std::sync::Arc;

use chrono::{DateTime, Utc};

use atelier_core::{UserAccount, UserId};

use crate::{AuthzError, Principal, TokenVerifier};

/// User store boundary.
pub trait UserDirectory: Send + Sync {
    fn find_user(&self, id: UserId) -> Result<Option<UserAccount>, AuthzError>;
}

impl<S> UserDirectory for Arc<S>
where
    S: UserDirectory + ?Sized,
{
    fn find_user(&self, id: UserId) -> Result<Option<UserAccount>, AuthzError> {
        (**self).find_user(id)
    }
}

/// Load the subject and reject missing or inactive accounts.
///
/// Inactive users are turned away here; the resolver never sees them.
pub fn load_active_user<U>(users: &U, subject: UserId) -> Result<Principal, AuthzError>
where
    U: UserDirectory + ?Sized,
{
    let account = users
        .find_user(subject)?
        .ok_or_else(|| AuthzError::unauthenticated("user not found"))?;

    if !account.is_active {
        return Err(AuthzError::unauthenticated("inactive user"));
    }

    Ok(Principal::from(&account))
}

/// Full identity pipeline for one request.
pub fn authenticate<V, U>(
    verifier: &V,
    users: &U,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Principal, AuthzError>
where
    V: TokenVerifier + ?Sized,
    U: UserDirectory + ?Sized,
{
    let subject = verifier.verify(token, now)?;
    let principal = load_active_user(users, subject)?;
    tracing::debug!(
        principal_id = %principal.id,
        superuser = principal.is_superuser,
        "authenticated"
    );
    Ok(principal)
}
