use serde::Serialize;
use thiserror::Error;

/// Default number of polls per page.
pub const DEFAULT_PAGE_SIZE: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaginationError {
    #[error("Page numbers start at 1")]
    ZeroPage,
    #[error("Page size must be at least 1")]
    ZeroSize,
}

/// A 1-based page request over a listing.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Pagination {
    page_num: usize,
    page_size: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page_num: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    pub fn new(page_num: usize, page_size: usize) -> Result<Self, PaginationError> {
        if page_num == 0 {
            return Err(PaginationError::ZeroPage);
        }
        if page_size == 0 {
            return Err(PaginationError::ZeroSize);
        }
        Ok(Self {
            page_num,
            page_size,
        })
    }

    pub fn page_num(&self) -> usize {
        self.page_num
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn skip(&self) -> usize {
        (self.page_num - 1).saturating_mul(self.page_size)
    }

    /// Cut the requested page out of the full listing.
    pub fn apply<T>(self, items: Vec<T>) -> Page<T> {
        let total = items.len();
        let items = items
            .into_iter()
            .skip(self.skip())
            .take(self.page_size)
            .collect();
        Page {
            items,
            page_num: self.page_num,
            page_size: self.page_size,
            total,
        }
    }
}

/// One page of a listing, with enough context to render "page X of Y".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page_num: usize,
    pub page_size: usize,
    /// Number of items across all pages.
    pub total: usize,
}

impl<T> Page<T> {
    /// Number of pages; an empty listing still has one (empty) page.
    pub fn page_count(&self) -> usize {
        self.total.div_ceil(self.page_size).max(1)
    }

    pub fn has_next(&self) -> bool {
        self.page_num < self.page_count()
    }
}
