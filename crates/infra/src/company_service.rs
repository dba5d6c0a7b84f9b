//! Command handlers for companies, employees and tags.
//!
//! Every company-scoped handler runs the same pipeline:
//!
//! ```text
//! Principal
//!   ↓
//! 1. Resolve EffectiveAccess (NotFound / PermissionDenied short-circuit here)
//!   ↓
//! 2. Decide the action (a denial short-circuits before any write)
//!   ↓
//! 3. Read or write through the DirectoryStore
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};

use atelier_auth::{
    Action, CompanyRole, EffectiveAccess, Employee, EmployeeGrant, Membership, Principal,
    TokenVerifier, Verdict, can_manage_employees, decide, resolve_access,
};
use atelier_core::{
    Company, CompanyId, CompanyPatch, CompanyQuery, Listing, NewCompany, NewTag, Page, Tag, TagId,
    TagPatch, UserId,
};

use crate::error::ServiceError;
use crate::store::{CompanyScope, DirectoryStore};

/// Company directory use cases on top of a [`DirectoryStore`].
///
/// Holds the store behind an `Arc`, so `CompanyService<dyn DirectoryStore>`
/// works with whatever backend `connect` produced.
#[derive(Debug)]
pub struct CompanyService<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for CompanyService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> CompanyService<S>
where
    S: DirectoryStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Turn a bearer token into an active principal.
    pub fn authenticate<V>(
        &self,
        verifier: &V,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Principal, ServiceError>
    where
        V: TokenVerifier + ?Sized,
    {
        Ok(atelier_auth::authenticate(verifier, &*self.store, token, now)?)
    }

    pub fn create_company(
        &self,
        principal: &Principal,
        draft: NewCompany,
    ) -> Result<Company, ServiceError> {
        let company = Company::from_draft(CompanyId::new(), draft)?;
        self.store.create_company(&company, principal.id)?;

        tracing::info!(
            company_id = %company.id,
            principal_id = %principal.id,
            status = %company.status,
            "company created"
        );
        Ok(company)
    }

    pub fn list_companies(
        &self,
        principal: &Principal,
        query: &CompanyQuery,
    ) -> Result<Listing<Company>, ServiceError> {
        let scope = if principal.is_superuser {
            CompanyScope::All
        } else {
            CompanyScope::VisibleTo(principal.id)
        };
        Ok(self.store.list_companies(scope, query)?)
    }

    pub fn read_company(
        &self,
        principal: &Principal,
        company_id: CompanyId,
    ) -> Result<(Company, EffectiveAccess), ServiceError> {
        let access = self.resolve(principal, company_id)?;
        self.enforce(&access, Action::ViewCompany)?;
        let company = self.load_company(company_id)?;
        Ok((company, access))
    }

    pub fn update_company(
        &self,
        principal: &Principal,
        company_id: CompanyId,
        patch: &CompanyPatch,
    ) -> Result<Company, ServiceError> {
        let access = self.resolve(principal, company_id)?;
        self.enforce(&access, Action::UpdateCompany)?;

        let mut company = self.load_company(company_id)?;
        company.apply_patch(patch)?;
        self.store.update_company(&company)?;

        tracing::info!(company_id = %company_id, principal_id = %principal.id, "company updated");
        Ok(company)
    }

    pub fn delete_company(
        &self,
        principal: &Principal,
        company_id: CompanyId,
    ) -> Result<(), ServiceError> {
        let access = self.resolve(principal, company_id)?;
        self.enforce(&access, Action::DeleteCompany)?;
        self.store.soft_delete_company(company_id)?;

        tracing::info!(company_id = %company_id, principal_id = %principal.id, "company deleted");
        Ok(())
    }

    pub fn list_employees(
        &self,
        principal: &Principal,
        company_id: CompanyId,
        page: Page,
    ) -> Result<Listing<Employee>, ServiceError> {
        let access = self.resolve(principal, company_id)?;
        self.enforce(&access, Action::ListEmployees)?;
        Ok(self.store.list_employees(company_id, page)?)
    }

    /// Add a member, or re-grant an existing one.
    ///
    /// An existing membership is judged by the update policy against its
    /// stored role, so adding cannot be used to bypass the rank rules.
    pub fn add_employee(
        &self,
        principal: &Principal,
        company_id: CompanyId,
        grant: EmployeeGrant,
    ) -> Result<Membership, ServiceError> {
        let access = self.resolve(principal, company_id)?;
        self.gate_employee_management(&access)?;

        if self.store.find_user(grant.user_id)?.is_none() {
            return Err(ServiceError::NotFound(format!("user {}", grant.user_id)));
        }

        let action = match self.store.find_membership(company_id, grant.user_id)? {
            Some(current) => Action::UpdateEmployee {
                current,
                requested: grant.role,
            },
            None => Action::AddEmployee {
                granted: grant.role,
            },
        };
        self.enforce(&access, action)?;

        let membership = Membership {
            company_id,
            user_id: grant.user_id,
            role: grant.role,
        };
        self.store.upsert_membership(membership)?;

        tracing::info!(
            company_id = %company_id,
            principal_id = %principal.id,
            user_id = %grant.user_id,
            role = %grant.role,
            "employee granted"
        );
        Ok(membership)
    }

    pub fn update_employee(
        &self,
        principal: &Principal,
        company_id: CompanyId,
        grant: EmployeeGrant,
    ) -> Result<Membership, ServiceError> {
        let access = self.resolve(principal, company_id)?;
        self.gate_employee_management(&access)?;

        let current = self.load_membership(company_id, grant.user_id)?;
        self.enforce(
            &access,
            Action::UpdateEmployee {
                current,
                requested: grant.role,
            },
        )?;

        let membership = Membership {
            company_id,
            user_id: grant.user_id,
            role: grant.role,
        };
        self.store.upsert_membership(membership)?;

        tracing::info!(
            company_id = %company_id,
            principal_id = %principal.id,
            user_id = %grant.user_id,
            from = %current,
            to = %grant.role,
            "employee role changed"
        );
        Ok(membership)
    }

    pub fn delete_employee(
        &self,
        principal: &Principal,
        company_id: CompanyId,
        user_id: UserId,
    ) -> Result<(), ServiceError> {
        let access = self.resolve(principal, company_id)?;
        self.gate_employee_management(&access)?;

        let target = self.load_membership(company_id, user_id)?;
        self.enforce(&access, Action::DeleteEmployee { target })?;

        if !self.store.delete_membership(company_id, user_id)? {
            return Err(membership_not_found(company_id, user_id));
        }

        tracing::info!(
            company_id = %company_id,
            principal_id = %principal.id,
            user_id = %user_id,
            "employee removed"
        );
        Ok(())
    }

    pub fn list_tags(
        &self,
        principal: &Principal,
        company_id: CompanyId,
    ) -> Result<Vec<Tag>, ServiceError> {
        let access = self.resolve(principal, company_id)?;
        self.enforce(&access, Action::ListTags)?;
        Ok(self.store.list_tags(company_id)?)
    }

    pub fn create_tag(
        &self,
        principal: &Principal,
        company_id: CompanyId,
        draft: NewTag,
    ) -> Result<Tag, ServiceError> {
        let access = self.resolve(principal, company_id)?;
        self.enforce(&access, Action::CreateTag)?;

        let tag = Tag::from_draft(TagId::new(), company_id, draft)?;
        self.store.insert_tag(&tag)?;

        tracing::info!(company_id = %company_id, tag_id = %tag.id, "tag created");
        Ok(tag)
    }

    pub fn update_tag(
        &self,
        principal: &Principal,
        company_id: CompanyId,
        tag_id: TagId,
        patch: &TagPatch,
    ) -> Result<Tag, ServiceError> {
        let access = self.resolve(principal, company_id)?;
        self.enforce(&access, Action::UpdateTag)?;

        let mut tag = self
            .store
            .find_tag(company_id, tag_id)?
            .ok_or_else(|| tag_not_found(tag_id))?;
        tag.apply_patch(patch)?;
        self.store.update_tag(&tag)?;

        tracing::info!(company_id = %company_id, tag_id = %tag_id, "tag updated");
        Ok(tag)
    }

    pub fn delete_tag(
        &self,
        principal: &Principal,
        company_id: CompanyId,
        tag_id: TagId,
    ) -> Result<(), ServiceError> {
        let access = self.resolve(principal, company_id)?;
        self.enforce(&access, Action::DeleteTag)?;

        if !self.store.delete_tag(company_id, tag_id)? {
            return Err(tag_not_found(tag_id));
        }

        tracing::info!(company_id = %company_id, tag_id = %tag_id, "tag deleted");
        Ok(())
    }

    fn resolve(
        &self,
        principal: &Principal,
        company_id: CompanyId,
    ) -> Result<EffectiveAccess, ServiceError> {
        resolve_access(&*self.store, principal, company_id).map_err(|err| {
            tracing::info!(
                company_id = %company_id,
                principal_id = %principal.id,
                error = %err,
                "company access refused"
            );
            ServiceError::from(err)
        })
    }

    fn enforce(&self, access: &EffectiveAccess, action: Action) -> Result<(), ServiceError> {
        let verdict = decide(access, &action);
        log_denial(access, action.name(), verdict);
        Ok(verdict.into_result()?)
    }

    fn gate_employee_management(&self, access: &EffectiveAccess) -> Result<(), ServiceError> {
        let verdict = can_manage_employees(access);
        log_denial(access, "employee.manage", verdict);
        Ok(verdict.into_result()?)
    }

    fn load_company(&self, company_id: CompanyId) -> Result<Company, ServiceError> {
        self.store
            .find_company(company_id)?
            .ok_or_else(|| ServiceError::NotFound(format!("company {company_id}")))
    }

    fn load_membership(
        &self,
        company_id: CompanyId,
        user_id: UserId,
    ) -> Result<CompanyRole, ServiceError> {
        self.store
            .find_membership(company_id, user_id)?
            .ok_or_else(|| membership_not_found(company_id, user_id))
    }
}

fn log_denial(access: &EffectiveAccess, action: &'static str, verdict: Verdict) {
    if let Verdict::Denied(reason) = verdict {
        tracing::info!(
            action,
            company_id = %access.company_id,
            principal_id = %access.principal_id,
            grant = ?access.grant,
            reason = reason.code(),
            "access denied"
        );
    }
}

fn membership_not_found(company_id: CompanyId, user_id: UserId) -> ServiceError {
    ServiceError::NotFound(format!("employee {user_id} in company {company_id}"))
}

fn tag_not_found(tag_id: TagId) -> ServiceError {
    ServiceError::NotFound(format!("tag {tag_id}"))
}
