//! Membership resolution: principal + company id -> [`EffectiveAccess`].
//!
//! The resolver never performs two separate reads for "does the company exist"
//! and "what is my role"; the [`AccessSource`] contract returns both from one
//! atomic lookup so a company cannot disappear between the checks.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use atelier_core::{CompanyId, CompanyStatus, UserId};

use crate::{AccessGrant, AuthzError, CompanyRole, DenialReason, EffectiveAccess, Principal};

/// Visibility fields of a company.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyVisibility {
    pub status: CompanyStatus,
    pub is_deleted: bool,
}

/// Result of the company ⟕ membership read for one `(company, user)` pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRow {
    pub status: CompanyStatus,
    pub is_deleted: bool,
    /// `None` when the user holds no membership in the company.
    pub role: Option<CompanyRole>,
}

/// Storage collaborator consumed by the resolver.
pub trait AccessSource: Send + Sync {
    /// Look a company up by id only.
    fn lookup_company(
        &self,
        company_id: CompanyId,
    ) -> Result<Option<CompanyVisibility>, AuthzError>;

    /// Single outer-join read of company visibility and the user's membership role.
    ///
    /// Returns `None` iff the company row does not exist.
    fn lookup_access(
        &self,
        company_id: CompanyId,
        user_id: UserId,
    ) -> Result<Option<AccessRow>, AuthzError>;
}

impl<S> AccessSource for Arc<S>
where
    S: AccessSource + ?Sized,
{
    fn lookup_company(
        &self,
        company_id: CompanyId,
    ) -> Result<Option<CompanyVisibility>, AuthzError> {
        (**self).lookup_company(company_id)
    }

    fn lookup_access(
        &self,
        company_id: CompanyId,
        user_id: UserId,
    ) -> Result<Option<AccessRow>, AuthzError> {
        (**self).lookup_access(company_id, user_id)
    }
}

/// Resolve a principal's effective access to a company.
///
/// - Superusers: the company must exist and not be soft-deleted.
/// - Others: missing or soft-deleted companies are `NotFound`; a private company
///   without a membership is `PermissionDenied`; a public company without a
///   membership resolves to [`AccessGrant::PublicGuest`].
pub fn resolve_access<S>(
    source: &S,
    principal: &Principal,
    company_id: CompanyId,
) -> Result<EffectiveAccess, AuthzError>
where
    S: AccessSource + ?Sized,
{
    let grant = if principal.is_superuser {
        match source.lookup_company(company_id)? {
            Some(company) if !company.is_deleted => AccessGrant::Superuser,
            _ => return Err(company_not_found(company_id)),
        }
    } else {
        let row = source
            .lookup_access(company_id, principal.id)?
            .ok_or_else(|| company_not_found(company_id))?;

        if row.is_deleted {
            return Err(company_not_found(company_id));
        }

        match (row.role, row.status) {
            (Some(role), _) => AccessGrant::Member(role),
            (None, CompanyStatus::Public) => AccessGrant::PublicGuest,
            (None, CompanyStatus::Private) => {
                tracing::debug!(
                    company_id = %company_id,
                    principal_id = %principal.id,
                    "private company without membership"
                );
                return Err(AuthzError::PermissionDenied(DenialReason::PrivateCompany));
            }
        }
    };

    tracing::debug!(
        company_id = %company_id,
        principal_id = %principal.id,
        grant = ?grant,
        "resolved company access"
    );

    Ok(EffectiveAccess::new(principal.id, company_id, grant))
}

fn company_not_found(company_id: CompanyId) -> AuthzError {
    AuthzError::not_found(format!("company {company_id}"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use proptest::prelude::*;

    use super::*;

    #[derive(Default)]
    struct FakeSource {
        companies: HashMap<CompanyId, CompanyVisibility>,
        roles: HashMap<(CompanyId, UserId), CompanyRole>,
    }

    impl FakeSource {
        fn company(&mut self, status: CompanyStatus, is_deleted: bool) -> CompanyId {
            let id = CompanyId::new();
            self.companies.insert(id, CompanyVisibility { status, is_deleted });
            id
        }
    }

    impl AccessSource for FakeSource {
        fn lookup_company(
            &self,
            company_id: CompanyId,
        ) -> Result<Option<CompanyVisibility>, AuthzError> {
            Ok(self.companies.get(&company_id).copied())
        }

        fn lookup_access(
            &self,
            company_id: CompanyId,
            user_id: UserId,
        ) -> Result<Option<AccessRow>, AuthzError> {
            Ok(self.companies.get(&company_id).map(|c| AccessRow {
                status: c.status,
                is_deleted: c.is_deleted,
                role: self.roles.get(&(company_id, user_id)).copied(),
            }))
        }
    }

    struct FailingSource;

    impl AccessSource for FailingSource {
        fn lookup_company(&self, _: CompanyId) -> Result<Option<CompanyVisibility>, AuthzError> {
            Err(AuthzError::Lookup("connection reset".into()))
        }

        fn lookup_access(&self, _: CompanyId, _: UserId) -> Result<Option<AccessRow>, AuthzError> {
            Err(AuthzError::Lookup("connection reset".into()))
        }
    }

    #[test]
    fn superuser_sees_private_company_without_membership() {
        let mut source = FakeSource::default();
        let company = source.company(CompanyStatus::Private, false);
        let access =
            resolve_access(&source, &Principal::superuser(UserId::new()), company).unwrap();
        assert_eq!(access.grant, AccessGrant::Superuser);
        assert_eq!(access.role(), None);
    }

    #[test]
    fn superuser_gets_not_found_for_deleted_company() {
        let mut source = FakeSource::default();
        let company = source.company(CompanyStatus::Public, true);
        let err =
            resolve_access(&source, &Principal::superuser(UserId::new()), company).unwrap_err();
        assert!(matches!(err, AuthzError::NotFound(_)));
    }

    #[test]
    fn superuser_gets_not_found_for_missing_company() {
        let source = FakeSource::default();
        let principal = Principal::superuser(UserId::new());
        let err = resolve_access(&source, &principal, CompanyId::new()).unwrap_err();
        assert!(matches!(err, AuthzError::NotFound(_)));
    }

    #[test]
    fn member_of_deleted_company_gets_not_found() {
        let mut source = FakeSource::default();
        let company = source.company(CompanyStatus::Private, true);
        let user = UserId::new();
        source.roles.insert((company, user), CompanyRole::Owner);
        let err = resolve_access(&source, &Principal::user(user), company).unwrap_err();
        assert!(matches!(err, AuthzError::NotFound(_)));
    }

    #[test]
    fn stranger_on_private_company_is_denied() {
        let mut source = FakeSource::default();
        let company = source.company(CompanyStatus::Private, false);
        let err = resolve_access(&source, &Principal::user(UserId::new()), company).unwrap_err();
        assert_eq!(err, AuthzError::PermissionDenied(DenialReason::PrivateCompany));
    }

    #[test]
    fn stranger_on_public_company_is_guest() {
        let mut source = FakeSource::default();
        let company = source.company(CompanyStatus::Public, false);
        let access = resolve_access(&source, &Principal::user(UserId::new()), company).unwrap();
        assert_eq!(access.grant, AccessGrant::PublicGuest);
    }

    #[test]
    fn member_gets_stored_role() {
        let mut source = FakeSource::default();
        let company = source.company(CompanyStatus::Private, false);
        let user = UserId::new();
        source.roles.insert((company, user), CompanyRole::Creator);
        let access = resolve_access(&source, &Principal::user(user), company).unwrap();
        assert_eq!(access.grant, AccessGrant::Member(CompanyRole::Creator));
        assert_eq!(access.principal_id, user);
        assert_eq!(access.company_id, company);
    }

    #[test]
    fn lookup_failures_propagate() {
        let err = resolve_access(&FailingSource, &Principal::user(UserId::new()), CompanyId::new())
            .unwrap_err();
        assert!(matches!(err, AuthzError::Lookup(_)));
    }

    proptest! {
        /// Property: resolving twice against unchanged state yields the same result.
        #[test]
        fn resolution_is_idempotent(
            private in any::<bool>(),
            deleted in any::<bool>(),
            superuser in any::<bool>(),
            role in prop::option::of(prop::sample::select(CompanyRole::ALL.to_vec())),
        ) {
            let mut source = FakeSource::default();
            let status = if private { CompanyStatus::Private } else { CompanyStatus::Public };
            let company = source.company(status, deleted);
            let user = UserId::new();
            if let Some(role) = role {
                source.roles.insert((company, user), role);
            }
            let principal = Principal { id: user, is_superuser: superuser, is_active: true };

            let first = resolve_access(&source, &principal, company);
            let second = resolve_access(&source, &principal, company);
            prop_assert_eq!(first, second);
        }
    }
}
