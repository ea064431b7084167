//! Offset-based pagination utilities.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Page size used when the caller does not specify one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest page size a caller may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Error type for pagination parameters.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("Page must be at least 1")]
    InvalidPage,
    #[error("Limit must be between 1 and {max}")]
    InvalidLimit { max: u32 },
}

/// Validated page/limit pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    page: u32,
    limit: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    /// Builds pagination from optional query parameters.
    ///
    /// Missing values fall back to page 1 and [`DEFAULT_PAGE_SIZE`].
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Result<Self, PaginationError> {
        let page = page.unwrap_or(1);
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE);

        if page == 0 {
            return Err(PaginationError::InvalidPage);
        }
        if limit == 0 || limit > MAX_PAGE_SIZE {
            return Err(PaginationError::InvalidLimit { max: MAX_PAGE_SIZE });
        }

        Ok(Self { page, limit })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Number of items to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

/// One page of results with derived totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub pages: u32,
    pub page: u32,
    pub limit: u32,
}

impl<T> Page<T> {
    /// Slices an already-ordered result set into the requested page.
    pub fn from_ordered(all: Vec<T>, pagination: Pagination) -> Self {
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(pagination.offset() as usize)
            .take(pagination.limit() as usize)
            .collect();

        Self {
            items,
            total,
            pages: total_pages(total, pagination.limit()),
            page: pagination.page(),
            limit: pagination.limit(),
        }
    }

    /// Wraps a page the store already windowed, given the unwindowed total.
    pub fn from_window(items: Vec<T>, total: u64, pagination: Pagination) -> Self {
        Self {
            items,
            total,
            pages: total_pages(total, pagination.limit()),
            page: pagination.page(),
            limit: pagination.limit(),
        }
    }

    /// Maps the items of the page, keeping the totals.
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            pages: self.pages,
            page: self.page,
            limit: self.limit,
        }
    }
}

/// Number of pages needed to hold `total` items.
pub fn total_pages(total: u64, limit: u32) -> u32 {
    if limit == 0 {
        return 0;
    }
    total.div_ceil(u64::from(limit)) as u32
}
