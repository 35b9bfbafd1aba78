//! Pagination types for list queries such as the audit trail.

use serde::{Deserialize, Serialize};

/// Request parameters for paginated queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRequest {
    /// Page number (1-indexed).
    #[serde(default = "default_page")]
    pub page: u32,
    /// Number of items per page.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

/// Largest page size a caller may request.
pub const MAX_PER_PAGE: u32 = 200;

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl PageRequest {
    /// Creates a page request, clamping the page to at least 1 and the
    /// page size to `1..=MAX_PER_PAGE`.
    #[must_use]
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    /// Calculates the offset for database queries.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }

    /// Returns the limit for database queries.
    #[must_use]
    pub fn limit(&self) -> u64 {
        u64::from(self.per_page)
    }
}

/// Response wrapper for paginated data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResponse<T> {
    /// The items in the current page.
    pub data: Vec<T>,
    /// Pagination metadata.
    pub meta: PageMeta,
}

/// Pagination metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageMeta {
    /// Current page number.
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
    /// Total number of items across all pages.
    pub total: u64,
    /// Total number of pages.
    pub total_pages: u32,
}

impl<T> PageResponse<T> {
    /// Creates a new paginated response.
    #[must_use]
    pub fn new(data: Vec<T>, page: u32, per_page: u32, total: u64) -> Self {
        let total_pages = if total == 0 || per_page == 0 {
            1
        } else {
            u32::try_from(total.div_ceil(u64::from(per_page))).unwrap_or(u32::MAX)
        };

        Self {
            data,
            meta: PageMeta {
                page,
                per_page,
                total,
                total_pages,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_request() {
        let req = PageRequest::default();
        assert_eq!(req.page, 1);
        assert_eq!(req.per_page, 20);
        assert_eq!(req.offset(), 0);
        assert_eq!(req.limit(), 20);
    }

    #[rstest]
    #[case(0, 10, 1, 10)]
    #[case(3, 0, 3, 1)]
    #[case(2, 10_000, 2, MAX_PER_PAGE)]
    fn test_new_clamps(
        #[case] page: u32,
        #[case] per_page: u32,
        #[case] expected_page: u32,
        #[case] expected_per_page: u32,
    ) {
        let req = PageRequest::new(page, per_page);
        assert_eq!(req.page, expected_page);
        assert_eq!(req.per_page, expected_per_page);
    }

    #[test]
    fn test_offset_does_not_overflow_u32() {
        let req = PageRequest {
            page: u32::MAX,
            per_page: 200,
        };
        assert_eq!(req.offset(), u64::from(u32::MAX - 1) * 200);
    }

    #[rstest]
    #[case(0, 1)]
    #[case(1, 1)]
    #[case(20, 1)]
    #[case(21, 2)]
    #[case(45, 3)]
    fn test_total_pages(#[case] total: u64, #[case] expected: u32) {
        let response: PageResponse<()> = PageResponse::new(vec![], 1, 20, total);
        assert_eq!(response.meta.total_pages, expected);
        assert_eq!(response.meta.total, total);
    }
}
