use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use atelier_auth::{
    AccessRow, AccessSource, AuthzError, CompanyRole, CompanyVisibility, Employee, Membership,
    UserDirectory,
};
use atelier_core::{
    Company, CompanyId, CompanyQuery, Listing, Page, Tag, TagId, UserAccount, UserId,
};

use super::r#trait::{CompanyScope, DirectoryStore, StoreError};

/// Row plus its insertion sequence, so listings keep creation order.
#[derive(Debug, Clone)]
struct Sequenced<T> {
    seq: u64,
    value: T,
}

#[derive(Debug, Default)]
struct DirectoryState {
    next_seq: u64,
    users: HashMap<UserId, UserAccount>,
    companies: HashMap<CompanyId, Sequenced<Company>>,
    memberships: HashMap<(CompanyId, UserId), Sequenced<CompanyRole>>,
    tags: HashMap<TagId, Sequenced<Tag>>,
}

impl DirectoryState {
    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn live_company(&self, id: CompanyId) -> Option<&Company> {
        self.companies
            .get(&id)
            .map(|c| &c.value)
            .filter(|c| !c.is_deleted)
    }

    fn title_taken(&self, title: &str, except: Option<CompanyId>) -> bool {
        self.companies.values().any(|c| {
            !c.value.is_deleted && Some(c.value.id) != except && c.value.has_title(title)
        })
    }

    fn tag_title_taken(&self, company_id: CompanyId, title: &str, except: Option<TagId>) -> bool {
        self.tags.values().any(|t| {
            t.value.company_id == company_id
                && Some(t.value.id) != except
                && t.value.has_title(title)
        })
    }

    fn is_member(&self, company_id: CompanyId, user_id: UserId) -> bool {
        self.memberships.contains_key(&(company_id, user_id))
    }
}

/// In-memory directory store.
///
/// Intended for tests/dev. One lock guards all tables, so every write that
/// touches several of them (company + owner, soft delete cascade) is atomic.
#[derive(Debug, Default)]
pub struct InMemoryDirectoryStore {
    state: RwLock<DirectoryState>,
}

impl InMemoryDirectoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, DirectoryState>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Backend("directory lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, DirectoryState>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Backend("directory lock poisoned".to_string()))
    }
}

impl AccessSource for InMemoryDirectoryStore {
    fn lookup_company(
        &self,
        company_id: CompanyId,
    ) -> Result<Option<CompanyVisibility>, AuthzError> {
        let state = self.read()?;
        Ok(state.companies.get(&company_id).map(|c| CompanyVisibility {
            status: c.value.status,
            is_deleted: c.value.is_deleted,
        }))
    }

    fn lookup_access(
        &self,
        company_id: CompanyId,
        user_id: UserId,
    ) -> Result<Option<AccessRow>, AuthzError> {
        // Company and membership are read under the same guard.
        let state = self.read()?;
        Ok(state.companies.get(&company_id).map(|c| AccessRow {
            status: c.value.status,
            is_deleted: c.value.is_deleted,
            role: state
                .memberships
                .get(&(company_id, user_id))
                .map(|m| m.value),
        }))
    }
}

impl UserDirectory for InMemoryDirectoryStore {
    fn find_user(&self, id: UserId) -> Result<Option<UserAccount>, AuthzError> {
        Ok(self.read()?.users.get(&id).cloned())
    }
}

impl DirectoryStore for InMemoryDirectoryStore {
    fn insert_user(&self, account: UserAccount) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let email_taken = state
            .users
            .values()
            .any(|u| u.id != account.id && u.email.eq_ignore_ascii_case(&account.email));
        if email_taken {
            return Err(StoreError::Conflict(format!("email {} already registered", account.email)));
        }
        state.users.insert(account.id, account);
        Ok(())
    }

    fn create_company(&self, company: &Company, owner: UserId) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if state.companies.contains_key(&company.id) {
            return Err(StoreError::Conflict(format!("company {} already exists", company.id)));
        }
        if state.title_taken(&company.title, None) {
            return Err(StoreError::Conflict(format!(
                "company with title {:?} already exists",
                company.title
            )));
        }
        if !state.users.contains_key(&owner) {
            return Err(StoreError::NotFound(format!("user {owner}")));
        }

        let seq = state.next_seq();
        state.companies.insert(
            company.id,
            Sequenced {
                seq,
                value: company.clone(),
            },
        );
        let seq = state.next_seq();
        state.memberships.insert(
            (company.id, owner),
            Sequenced {
                seq,
                value: CompanyRole::Owner,
            },
        );
        Ok(())
    }

    fn find_company(&self, id: CompanyId) -> Result<Option<Company>, StoreError> {
        Ok(self.read()?.live_company(id).cloned())
    }

    fn update_company(&self, company: &Company) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if state.live_company(company.id).is_none() {
            return Err(StoreError::NotFound(format!("company {}", company.id)));
        }
        if state.title_taken(&company.title, Some(company.id)) {
            return Err(StoreError::Conflict(format!(
                "company with title {:?} already exists",
                company.title
            )));
        }
        if let Some(stored) = state.companies.get_mut(&company.id) {
            stored.value.title = company.title.clone();
            stored.value.description = company.description.clone();
            stored.value.status = company.status;
        }
        Ok(())
    }

    fn soft_delete_company(&self, id: CompanyId) -> Result<(), StoreError> {
        let mut state = self.write()?;
        match state.companies.get_mut(&id) {
            Some(stored) if !stored.value.is_deleted => stored.value.is_deleted = true,
            _ => return Err(StoreError::NotFound(format!("company {id}"))),
        }
        state.memberships.retain(|(company_id, _), _| *company_id != id);
        state.tags.retain(|_, t| t.value.company_id != id);
        Ok(())
    }

    fn list_companies(
        &self,
        scope: CompanyScope,
        query: &CompanyQuery,
    ) -> Result<Listing<Company>, StoreError> {
        let state = self.read()?;
        let mut matching: Vec<&Sequenced<Company>> = state
            .companies
            .values()
            .filter(|c| !c.value.is_deleted && query.matches(&c.value))
            .filter(|c| match scope {
                CompanyScope::All => true,
                CompanyScope::VisibleTo(user_id) => {
                    c.value.status.is_public() || state.is_member(c.value.id, user_id)
                }
            })
            .collect();
        matching.sort_by_key(|c| c.seq);

        let count = matching.len() as u64;
        let data = query.page.slice(matching.into_iter().map(|c| c.value.clone()));
        Ok(Listing::new(data, count))
    }

    fn find_membership(
        &self,
        company_id: CompanyId,
        user_id: UserId,
    ) -> Result<Option<CompanyRole>, StoreError> {
        let state = self.read()?;
        if state.live_company(company_id).is_none() {
            return Ok(None);
        }
        Ok(state.memberships.get(&(company_id, user_id)).map(|m| m.value))
    }

    fn upsert_membership(&self, membership: Membership) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if state.live_company(membership.company_id).is_none() {
            return Err(StoreError::NotFound(format!("company {}", membership.company_id)));
        }
        if !state.users.contains_key(&membership.user_id) {
            return Err(StoreError::NotFound(format!("user {}", membership.user_id)));
        }

        let key = (membership.company_id, membership.user_id);
        if let Some(existing) = state.memberships.get_mut(&key) {
            existing.value = membership.role;
            return Ok(());
        }
        let seq = state.next_seq();
        state.memberships.insert(
            key,
            Sequenced {
                seq,
                value: membership.role,
            },
        );
        Ok(())
    }

    fn delete_membership(
        &self,
        company_id: CompanyId,
        user_id: UserId,
    ) -> Result<bool, StoreError> {
        Ok(self.write()?.memberships.remove(&(company_id, user_id)).is_some())
    }

    fn list_employees(
        &self,
        company_id: CompanyId,
        page: Page,
    ) -> Result<Listing<Employee>, StoreError> {
        let state = self.read()?;
        let mut rows: Vec<(u64, Employee)> = state
            .memberships
            .iter()
            .filter(|((c, _), _)| *c == company_id)
            .filter_map(|((_, user_id), m)| {
                state.users.get(user_id).map(|user| {
                    (
                        m.seq,
                        Employee {
                            user_id: user.id,
                            email: user.email.clone(),
                            full_name: user.full_name.clone(),
                            role: m.value,
                        },
                    )
                })
            })
            .collect();
        rows.sort_by_key(|(seq, _)| *seq);

        let count = rows.len() as u64;
        Ok(Listing::new(page.slice(rows.into_iter().map(|(_, e)| e)), count))
    }

    fn insert_tag(&self, tag: &Tag) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if state.live_company(tag.company_id).is_none() {
            return Err(StoreError::NotFound(format!("company {}", tag.company_id)));
        }
        if state.tags.contains_key(&tag.id)
            || state.tag_title_taken(tag.company_id, &tag.title, None)
        {
            return Err(tag_title_conflict(&tag.title));
        }
        let seq = state.next_seq();
        state.tags.insert(
            tag.id,
            Sequenced {
                seq,
                value: tag.clone(),
            },
        );
        Ok(())
    }

    fn find_tag(&self, company_id: CompanyId, tag_id: TagId) -> Result<Option<Tag>, StoreError> {
        let state = self.read()?;
        Ok(state
            .tags
            .get(&tag_id)
            .map(|t| &t.value)
            .filter(|t| t.company_id == company_id)
            .cloned())
    }

    fn update_tag(&self, tag: &Tag) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let owned_by_company = state
            .tags
            .get(&tag.id)
            .is_some_and(|t| t.value.company_id == tag.company_id);
        if !owned_by_company {
            return Err(StoreError::NotFound(format!("tag {}", tag.id)));
        }
        if state.tag_title_taken(tag.company_id, &tag.title, Some(tag.id)) {
            return Err(tag_title_conflict(&tag.title));
        }
        if let Some(stored) = state.tags.get_mut(&tag.id) {
            stored.value.title = tag.title.clone();
            stored.value.description = tag.description.clone();
        }
        Ok(())
    }

    fn delete_tag(&self, company_id: CompanyId, tag_id: TagId) -> Result<bool, StoreError> {
        let mut state = self.write()?;
        let owned_by_company = state
            .tags
            .get(&tag_id)
            .is_some_and(|t| t.value.company_id == company_id);
        if owned_by_company {
            state.tags.remove(&tag_id);
        }
        Ok(owned_by_company)
    }

    fn list_tags(&self, company_id: CompanyId) -> Result<Vec<Tag>, StoreError> {
        let state = self.read()?;
        let mut tags: Vec<&Sequenced<Tag>> = state
            .tags
            .values()
            .filter(|t| t.value.company_id == company_id)
            .collect();
        tags.sort_by_key(|t| t.seq);
        Ok(tags.into_iter().map(|t| t.value.clone()).collect())
    }
}

fn tag_title_conflict(title: &str) -> StoreError {
    StoreError::Conflict(format!("tag with title {title:?} already exists"))
}
