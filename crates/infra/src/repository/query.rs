//! Paged order listing types.

use serde::{Deserialize, Serialize};

use minimart_sales::Order;

/// Page size used when nothing else is configured.
pub const DEFAULT_PAGE_SIZE: u32 = 5;

/// Upper bound on a page, whatever the caller asks for.
pub const MAX_PAGE_SIZE: u32 = 100;

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    /// Page 0 is read as page 1; the page size is clamped to `1..=MAX_PAGE_SIZE`.
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }
}

/// One page of orders plus the overall count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

impl OrderPage {
    pub fn page_count(&self) -> u64 {
        self.total.div_ceil(u64::from(self.page_size.max(1)))
    }

    pub fn has_more(&self) -> bool {
        u64::from(self.page) < self.page_count()
    }
}
