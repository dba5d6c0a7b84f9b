//! Company-scoped tags.

use serde::{Deserialize, Serialize};

use crate::company::{normalize_title, same_title};
use crate::error::DomainResult;
use crate::id::{CompanyId, TagId};

/// A tag belongs to exactly one company; titles are unique within it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub company_id: CompanyId,
    pub title: String,
    pub description: Option<String>,
}

impl Tag {
    pub fn from_draft(id: TagId, company_id: CompanyId, draft: NewTag) -> DomainResult<Self> {
        Ok(Self {
            id,
            company_id,
            title: normalize_title(&draft.title)?,
            description: draft.description,
        })
    }

    pub fn has_title(&self, title: &str) -> bool {
        same_title(&self.title, title)
    }

    pub fn apply_patch(&mut self, patch: &TagPatch) -> DomainResult<()> {
        if let Some(title) = &patch.title {
            self.title = normalize_title(title)?;
        }
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTag {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewTag {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}
