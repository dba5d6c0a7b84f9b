use std::sync::Arc;

use thiserror::Error;

use atelier_auth::{AccessSource, AuthzError, CompanyRole, Employee, Membership, UserDirectory};
use atelier_core::{
    Company, CompanyId, CompanyQuery, Listing, Page, Tag, TagId, UserAccount, UserId,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness rule was violated (company title, tag title, user email).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The backend itself failed (lock poisoned, connection lost, bad row).
    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl From<StoreError> for AuthzError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AuthzError::NotFound(what),
            other => AuthzError::Lookup(other.to_string()),
        }
    }
}

/// Which companies a listing may include.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CompanyScope {
    /// Every non-deleted company (superusers).
    All,
    /// Public companies plus those the user is a member of.
    VisibleTo(UserId),
}

/// Persistence for users, companies, memberships and tags.
///
/// The access lookups used by the resolver come from the [`AccessSource`] and
/// [`UserDirectory`] supertraits so one backend serves both.
///
/// ## Implementation Requirements
///
/// - Company titles are unique (case-insensitively) among non-deleted companies
/// - Tag titles are unique (case-insensitively) within a company
/// - At most one membership exists per `(company, user)` pair
/// - `create_company` writes the company and its owner membership atomically
/// - `soft_delete_company` flags the company and drops its memberships and tags
///   in one step
/// - Deleted companies are invisible to every read except `lookup_company`
pub trait DirectoryStore: AccessSource + UserDirectory {
    fn insert_user(&self, account: UserAccount) -> Result<(), StoreError>;

    /// Persist a new company with `owner` as its `Owner` member.
    fn create_company(&self, company: &Company, owner: UserId) -> Result<(), StoreError>;

    /// Load a non-deleted company.
    fn find_company(&self, id: CompanyId) -> Result<Option<Company>, StoreError>;

    /// Overwrite title, description and status of a non-deleted company.
    fn update_company(&self, company: &Company) -> Result<(), StoreError>;

    fn soft_delete_company(&self, id: CompanyId) -> Result<(), StoreError>;

    /// Companies in `scope` matching `query`, in creation order.
    fn list_companies(
        &self,
        scope: CompanyScope,
        query: &CompanyQuery,
    ) -> Result<Listing<Company>, StoreError>;

    fn find_membership(
        &self,
        company_id: CompanyId,
        user_id: UserId,
    ) -> Result<Option<CompanyRole>, StoreError>;

    /// Insert the membership, or replace the role of the existing one.
    fn upsert_membership(&self, membership: Membership) -> Result<(), StoreError>;

    /// Returns `false` when no membership existed.
    fn delete_membership(&self, company_id: CompanyId, user_id: UserId) -> Result<bool, StoreError>;

    fn list_employees(
        &self,
        company_id: CompanyId,
        page: Page,
    ) -> Result<Listing<Employee>, StoreError>;

    fn insert_tag(&self, tag: &Tag) -> Result<(), StoreError>;

    /// Load a tag only if it belongs to `company_id`.
    fn find_tag(&self, company_id: CompanyId, tag_id: TagId) -> Result<Option<Tag>, StoreError>;

    fn update_tag(&self, tag: &Tag) -> Result<(), StoreError>;

    /// Returns `false` when the tag does not exist in `company_id`.
    fn delete_tag(&self, company_id: CompanyId, tag_id: TagId) -> Result<bool, StoreError>;

    fn list_tags(&self, company_id: CompanyId) -> Result<Vec<Tag>, StoreError>;
}

impl<S> DirectoryStore for Arc<S>
where
    S: DirectoryStore + ?Sized,
{
    fn insert_user(&self, account: UserAccount) -> Result<(), StoreError> {
        (**self).insert_user(account)
    }

    fn create_company(&self, company: &Company, owner: UserId) -> Result<(), StoreError> {
        (**self).create_company(company, owner)
    }

    fn find_company(&self, id: CompanyId) -> Result<Option<Company>, StoreError> {
        (**self).find_company(id)
    }

    fn update_company(&self, company: &Company) -> Result<(), StoreError> {
        (**self).update_company(company)
    }

    fn soft_delete_company(&self, id: CompanyId) -> Result<(), StoreError> {
        (**self).soft_delete_company(id)
    }

    fn list_companies(
        &self,
        scope: CompanyScope,
        query: &CompanyQuery,
    ) -> Result<Listing<Company>, StoreError> {
        (**self).list_companies(scope, query)
    }

    fn find_membership(
        &self,
        company_id: CompanyId,
        user_id: UserId,
    ) -> Result<Option<CompanyRole>, StoreError> {
        (**self).find_membership(company_id, user_id)
    }

    fn upsert_membership(&self, membership: Membership) -> Result<(), StoreError> {
        (**self).upsert_membership(membership)
    }

    fn delete_membership(
        &self,
        company_id: CompanyId,
        user_id: UserId,
    ) -> Result<bool, StoreError> {
        (**self).delete_membership(company_id, user_id)
    }

    fn list_employees(
        &self,
        company_id: CompanyId,
        page: Page,
    ) -> Result<Listing<Employee>, StoreError> {
        (**self).list_employees(company_id, page)
    }

    fn insert_tag(&self, tag: &Tag) -> Result<(), StoreError> {
        (**self).insert_tag(tag)
    }

    fn find_tag(&self, company_id: CompanyId, tag_id: TagId) -> Result<Option<Tag>, StoreError> {
        (**self).find_tag(company_id, tag_id)
    }

    fn update_tag(&self, tag: &Tag) -> Result<(), StoreError> {
        (**self).update_tag(tag)
    }

    fn delete_tag(&self, company_id: CompanyId, tag_id: TagId) -> Result<bool, StoreError> {
        (**self).delete_tag(company_id, tag_id)
    }

    fn list_tags(&self, company_id: CompanyId) -> Result<Vec<Tag>, StoreError> {
        (**self).list_tags(company_id)
    }
}
