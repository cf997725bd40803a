//! Page-number pagination shared by list endpoints.

use serde::Serialize;

/// Page size when the client does not ask for one.
pub const DEFAULT_LIMIT: u64 = 10;
/// Largest page size a client may request.
pub const MAX_LIMIT: u64 = 100;
/// Highest page number; keeps the row offset within the store's signed 64-bit range.
pub const MAX_PAGE: u64 = i64::MAX.unsigned_abs() / MAX_LIMIT;

/// A normalized page request: `page` is 1-based, `limit` is within `1..=MAX_LIMIT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    #[must_use]
    pub fn new(page: Option<u64>, limit: Option<u64>) -> Self {
        Self {
            page: page.unwrap_or(1).clamp(1, MAX_PAGE),
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        }
    }

    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: u64,
    pub total_pages: u64,
    pub page: u64,
    pub limit: u64,
}

/// One page of results plus the metadata needed to fetch the others.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: PageMeta,
}

impl<T> Page<T> {
    #[must_use]
    pub const fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            items,
            pagination: PageMeta {
                total,
                total_pages: total.div_ceil(request.limit),
                page: request.page,
                limit: request.limit,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let req = PageRequest::default();
        assert_eq!(req.page, 1);
        assert_eq!(req.limit, DEFAULT_LIMIT);
        assert_eq!(req.offset(), 0);
    }

    #[test]
    fn test_clamping() {
        assert_eq!(PageRequest::new(Some(0), Some(0)), PageRequest { page: 1, limit: 1 });
        assert_eq!(PageRequest::new(Some(3), Some(1000)).limit, MAX_LIMIT);
        assert_eq!(PageRequest::new(Some(3), Some(20)).offset(), 40);
    }

    #[test]
    fn test_huge_page_keeps_offset_in_range() {
        let req = PageRequest::new(Some(u64::MAX), Some(MAX_LIMIT));
        assert_eq!(req.page, MAX_PAGE);
        assert!(i64::try_from(req.offset()).is_ok());

        let req = PageRequest::new(Some(u64::MAX), None);
        assert!(i64::try_from(req.offset()).is_ok());
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let page = Page::new(vec![1, 2], 21, PageRequest::new(Some(1), Some(10)));
        assert_eq!(page.pagination.total_pages, 3);

        let empty: Page<u8> = Page::new(vec![], 0, PageRequest::default());
        assert_eq!(empty.pagination.total_pages, 0);
    }
}
