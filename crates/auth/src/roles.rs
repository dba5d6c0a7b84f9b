use core::cmp::Ordering;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use atelier_core::DomainError;

/// Company-scoped role held through a membership.
///
/// Roles form a total order by [`rank`](CompanyRole::rank). Ranks are spaced
/// (`1, 5, 9`) so new roles can be slotted in without renumbering stored rows;
/// only the ordering is meaningful.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanyRole {
    Reader,
    Creator,
    Owner,
}

impl CompanyRole {
    /// All roles, lowest rank first.
    pub const ALL: [CompanyRole; 3] =
        [CompanyRole::Reader, CompanyRole::Creator, CompanyRole::Owner];

    pub const fn rank(self) -> u8 {
        match self {
            CompanyRole::Reader => 1,
            CompanyRole::Creator => 5,
            CompanyRole::Owner => 9,
        }
    }

    pub fn from_rank(rank: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.rank() == rank)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            CompanyRole::Reader => "reader",
            CompanyRole::Creator => "creator",
            CompanyRole::Owner => "owner",
        }
    }

    /// Strictly higher rank than `other`.
    pub fn outranks(self, other: CompanyRole) -> bool {
        self.rank() > other.rank()
    }

    /// Same or higher rank than `other`.
    pub fn is_at_least(self, other: CompanyRole) -> bool {
        self.rank() >= other.rank()
    }
}

impl PartialOrd for CompanyRole {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CompanyRole {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl FromStr for CompanyRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reader" => Ok(CompanyRole::Reader),
            "creator" => Ok(CompanyRole::Creator),
            "owner" => Ok(CompanyRole::Owner),
            other => Err(DomainError::validation(format!(
                "unknown role '{other}' (expected one of: reader, creator, owner)"
            ))),
        }
    }
}

impl core::fmt::Display for CompanyRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
