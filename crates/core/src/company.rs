//! Company records: the tenant boundary of the directory.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::CompanyId;
use crate::page::Page;

/// Company visibility.
///
/// Public companies can be read by any authenticated principal; private
/// companies require a membership (or superuser status).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompanyStatus {
    #[default]
    Public,
    Private,
}

impl CompanyStatus {
    /// Storage code (`public=1`, `private=9`).
    pub const fn code(self) -> i16 {
        match self {
            CompanyStatus::Public => 1,
            CompanyStatus::Private => 9,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            1 => Some(CompanyStatus::Public),
            9 => Some(CompanyStatus::Private),
            _ => None,
        }
    }

    pub fn is_public(self) -> bool {
        self == CompanyStatus::Public
    }
}

impl core::fmt::Display for CompanyStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CompanyStatus::Public => f.write_str("public"),
            CompanyStatus::Private => f.write_str("private"),
        }
    }
}

/// A company as stored by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub title: String,
    pub description: Option<String>,
    pub status: CompanyStatus,
    pub is_deleted: bool,
}

impl Company {
    /// Build a fresh (non-deleted) company from a validated draft.
    pub fn from_draft(id: CompanyId, draft: NewCompany) -> DomainResult<Self> {
        Ok(Self {
            id,
            title: normalize_title(&draft.title)?,
            description: draft.description,
            status: draft.status,
            is_deleted: false,
        })
    }

    /// Case-insensitive title comparison used for uniqueness checks.
    pub fn has_title(&self, title: &str) -> bool {
        same_title(&self.title, title)
    }

    /// Apply a partial update. Fields left as `None` are unchanged.
    pub fn apply_patch(&mut self, patch: &CompanyPatch) -> DomainResult<()> {
        if let Some(title) = &patch.title {
            self.title = normalize_title(title)?;
        }
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        Ok(())
    }
}

/// Input for creating a company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCompany {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: CompanyStatus,
}

impl NewCompany {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            status: CompanyStatus::Public,
        }
    }

    pub fn with_status(mut self, status: CompanyStatus) -> Self {
        self.status = status;
        self
    }
}

/// Partial update of a company.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<CompanyStatus>,
}

/// Company listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyQuery {
    /// Case-insensitive substring match on the title.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub page: Page,
}

impl CompanyQuery {
    pub fn matches(&self, company: &Company) -> bool {
        match &self.name {
            Some(needle) => company
                .title
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            None => true,
        }
    }
}

/// Trim a title and reject blanks.
pub fn normalize_title(raw: &str) -> DomainResult<String> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(DomainError::validation("title cannot be empty"));
    }
    Ok(title.to_string())
}

pub fn same_title(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}
