//! Offset pagination shared by every listing.

use serde::{Deserialize, Serialize};

/// Offset/limit window over a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Offset (0-based).
    pub skip: u32,
    /// Maximum number of records to return.
    pub limit: u32,
}

impl Page {
    pub const DEFAULT_LIMIT: u32 = 100;
    pub const MAX_LIMIT: u32 = 1000;

    pub fn new(skip: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            skip: skip.unwrap_or(0),
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).min(Self::MAX_LIMIT),
        }
    }

    /// Apply the window to an already ordered iterator.
    pub fn slice<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.skip as usize)
            .take(self.limit.min(Self::MAX_LIMIT) as usize)
            .collect()
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// A page of records plus the total count before paging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing<T> {
    pub data: Vec<T>,
    pub count: u64,
}

impl<T> Listing<T> {
    pub fn new(data: Vec<T>, count: u64) -> Self {
        Self { data, count }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_capped() {
        assert_eq!(Page::new(None, Some(50_000)).limit, Page::MAX_LIMIT);
    }

    #[test]
    fn slice_applies_skip_then_limit() {
        let page = Page::new(Some(2), Some(3));
        assert_eq!(page.slice(0..10), vec![2, 3, 4]);
    }
}
