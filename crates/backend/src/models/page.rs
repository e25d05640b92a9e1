//! Paged result sets.

use serde::{Deserialize, Serialize};

/// A 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: u32 = 12;
    pub const MAX_LIMIT: u32 = 100;

    /// Page numbers below 1 become 1; limits are clamped to `1..=MAX_LIMIT`.
    #[must_use]
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, Self::MAX_LIMIT),
        }
    }

    /// Zero-based index of the first row.
    #[must_use]
    pub fn offset(self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }

    /// Inclusive zero-based row range for the REST `range` filter.
    #[must_use]
    pub fn range(self) -> (u64, u64) {
        let from = self.offset();
        (from, (from + u64::from(self.limit)).saturating_sub(1).max(from))
    }

    /// Rows seen up to and including this page.
    #[must_use]
    pub fn seen(self) -> u64 {
        u64::from(self.page) * u64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, Self::DEFAULT_LIMIT)
    }
}

/// One page of results with the exact total count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub count: u64,
    pub has_more: bool,
}

impl<T> Page<T> {
    /// `has_more` is `count > page * limit`.
    #[must_use]
    pub fn new(data: Vec<T>, count: u64, request: PageRequest) -> Self {
        Self {
            data,
            count,
            has_more: count > request.seen(),
        }
    }

    /// Slice an in-memory result set.
    #[must_use]
    pub fn from_all(all: Vec<T>, request: PageRequest) -> Self {
        let count = all.len() as u64;
        let offset = usize::try_from(request.offset()).unwrap_or(usize::MAX);
        let data = all
            .into_iter()
            .skip(offset)
            .take(request.limit as usize)
            .collect();
        Self::new(data, count, request)
    }

    /// Convert every row, keeping the counts.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            count: self.count,
            has_more: self.has_more,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_more_arithmetic() {
        let request = PageRequest::new(1, 12);
        assert!(Page::new(Vec::<u8>::new(), 13, request).has_more);
        assert!(!Page::new(Vec::<u8>::new(), 12, request).has_more);

        let request = PageRequest::new(2, 12);
        assert!(!Page::new(Vec::<u8>::new(), 24, request).has_more);
        assert!(Page::new(Vec::<u8>::new(), 25, request).has_more);
    }

    #[test]
    fn test_range() {
        assert_eq!(PageRequest::new(1, 12).range(), (0, 11));
        assert_eq!(PageRequest::new(3, 10).range(), (20, 29));
        assert_eq!(PageRequest::new(0, 0).range(), (0, 0));
    }

    #[test]
    fn test_from_all() {
        let page = Page::from_all((1..=25).collect::<Vec<u32>>(), PageRequest::new(3, 10));
        assert_eq!(page.data, vec![21, 22, 23, 24, 25]);
        assert_eq!(page.count, 25);
        assert!(!page.has_more);
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(Page::new(vec![1], 5, PageRequest::new(1, 1))).unwrap_or_default();
        assert_eq!(json["hasMore"], true);
        assert_eq!(json["count"], 5);
    }
}
