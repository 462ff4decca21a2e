use serde::Serialize;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_LIMIT: i64 = 10;
pub const MAX_PAGE_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl PageRequest {
    /// Rows to skip, or `None` when the page is out of the representable range.
    pub fn offset(&self) -> Option<i64> {
        self.page.checked_sub(1)?.checked_mul(self.limit)
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_count: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(request: PageRequest, total_count: i64) -> Self {
        let total_pages = if request.limit > 0 {
            (total_count + request.limit - 1) / request.limit
        } else {
            0
        };

        Self {
            current_page: request.page,
            total_pages,
            total_count,
            has_next: request.page < total_pages,
            has_prev: request.page > 1,
        }
    }
}
