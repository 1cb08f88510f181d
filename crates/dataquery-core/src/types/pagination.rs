//! Pagination types for paged, sliced and listed queries.

use serde::{Deserialize, Serialize};

use crate::config::QueryConfig;
use crate::error::AppError;
use crate::result::AppResult;
use crate::types::sorting::Sort;

/// How a query result is shaped with respect to paging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryMode {
    /// Plain ordered sequence; paging applied only when a request is given.
    List,
    /// Content plus a total count from a second statement.
    Page,
    /// Content plus `has_next` from a `size + 1` fetch, no totals.
    Slice,
}

/// Request parameters for paginated queries.
///
/// Page indexes are zero-based. The request is immutable; derived requests
/// are new values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    page: u64,
    size: u64,
    sort: Sort,
}

impl PageRequest {
    /// Create an unsorted page request.
    pub fn of(page: u64, size: u64) -> AppResult<Self> {
        Self::of_sorted(page, size, Sort::unsorted())
    }

    /// Create a sorted page request.
    ///
    /// The window end (`page * size + size`) must fit a SQL `BIGINT`.
    pub fn of_sorted(page: u64, size: u64, sort: Sort) -> AppResult<Self> {
        if size == 0 {
            return Err(AppError::validation("page size must be greater than zero"));
        }
        let end = page.checked_mul(size).and_then(|offset| offset.checked_add(size));
        if !end.is_some_and(|end| end <= i64::MAX as u64) {
            return Err(AppError::validation(format!(
                "page {page} of size {size} is out of range"
            )));
        }
        Ok(Self { page, size, sort })
    }

    /// Build a request from externally supplied, possibly missing values,
    /// applying the configured default size, maximum size and indexing.
    pub fn from_params(
        page: Option<u64>,
        size: Option<u64>,
        sort: Sort,
        config: &QueryConfig,
    ) -> AppResult<Self> {
        let size = size.unwrap_or(config.default_page_size);
        if size > config.max_page_size {
            return Err(AppError::validation(format!(
                "page size {size} exceeds the maximum of {}",
                config.max_page_size
            )));
        }
        let page = match (page, config.one_indexed_parameters) {
            (None, _) => 0,
            (Some(0), true) => {
                return Err(AppError::validation("page numbers start at 1"));
            }
            (Some(p), true) => p - 1,
            (Some(p), false) => p,
        };
        Self::of_sorted(page, size, sort)
    }

    /// Zero-based page index.
    pub fn page(&self) -> u64 {
        self.page
    }

    /// Page size.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Requested ordering.
    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    /// Calculate the SQL `OFFSET` value.
    pub fn offset(&self) -> u64 {
        self.page.saturating_mul(self.size)
    }

    /// Return the SQL `LIMIT` value.
    pub fn limit(&self) -> u64 {
        self.size
    }

    /// The request for the following page.
    pub fn next(&self) -> Self {
        Self {
            page: self.page.saturating_add(1),
            size: self.size,
            sort: self.sort.clone(),
        }
    }

    /// The request for the previous page, or this one if it is the first.
    pub fn previous_or_first(&self) -> Self {
        Self {
            page: self.page.saturating_sub(1),
            size: self.size,
            sort: self.sort.clone(),
        }
    }

    /// The same window with a different ordering.
    pub fn with_sort(&self, sort: Sort) -> Self {
        Self {
            page: self.page,
            size: self.size,
            sort,
        }
    }
}

/// A page (or slice) of results.
///
/// Slices leave `total_elements`, `total_pages` and `last` unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult<T> {
    /// The items on this page.
    pub content: Vec<T>,
    /// Zero-based page index.
    pub page: u64,
    /// Requested page size.
    pub size: u64,
    /// Total matching elements (page mode only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_elements: Option<u64>,
    /// Total pages (page mode only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u64>,
    /// Whether this is the first page.
    pub first: bool,
    /// Whether this is the last page (page mode only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last: Option<bool>,
    /// Whether there is a next page.
    pub has_next: bool,
    /// Whether there is a previous page.
    pub has_previous: bool,
}

impl<T> PageResult<T> {
    /// Create a page with a known total.
    pub fn page(content: Vec<T>, request: &PageRequest, total_elements: u64) -> Self {
        let size = request.size();
        let total_pages = total_elements.div_ceil(size);
        let page = request.page();
        Self {
            content,
            page,
            size,
            total_elements: Some(total_elements),
            total_pages: Some(total_pages),
            first: page == 0,
            last: Some(page.saturating_add(1) >= total_pages),
            has_next: page.saturating_add(1) < total_pages,
            has_previous: page > 0,
        }
    }

    /// Create a slice; `has_next` comes from the extra fetched row.
    pub fn slice(content: Vec<T>, request: &PageRequest, has_next: bool) -> Self {
        let page = request.page();
        Self {
            content,
            page,
            size: request.size(),
            total_elements: None,
            total_pages: None,
            first: page == 0,
            last: None,
            has_next,
            has_previous: page > 0,
        }
    }

    /// Number of items on this page.
    pub fn number_of_elements(&self) -> usize {
        self.content.len()
    }

    /// Whether the page has no content.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Convert the content, keeping the paging metadata.
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> PageResult<U> {
        PageResult {
            content: self.content.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
            first: self.first,
            last: self.last,
            has_next: self.has_next,
            has_previous: self.has_previous,
        }
    }

    /// Fallible variant of [`PageResult::map`].
    pub fn try_map<U, F: FnMut(T) -> AppResult<U>>(self, f: F) -> AppResult<PageResult<U>> {
        let content = self.content.into_iter().map(f).collect::<AppResult<Vec<U>>>()?;
        Ok(PageResult {
            content,
            page: self.page,
            size: self.size,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
            first: self.first,
            last: self.last,
            has_next: self.has_next,
            has_previous: self.has_previous,
        })
    }
}
