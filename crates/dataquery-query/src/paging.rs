//! Page and slice windows.
//!
//! A window is the `LIMIT`/`OFFSET` pair a query runs with, derived from
//! the result mode, the caller's page request and the descriptor's
//! `Top`/`First` cap.

use dataquery_core::types::{PageRequest, PageResult, QueryMode};

/// `LIMIT`/`OFFSET` for one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Row limit; `None` is unbounded.
    pub limit: Option<u64>,
    /// Rows skipped.
    pub offset: u64,
    /// One extra row is fetched to detect a following slice.
    pub lookahead: bool,
}

impl Window {
    /// No limit, no offset.
    pub const UNBOUNDED: Self = Self {
        limit: None,
        offset: 0,
        lookahead: false,
    };

    /// Compute the window for `mode`.
    ///
    /// `top` caps the rows the query may ever return, so a page that
    /// starts past it is empty and a page that straddles it is cut short.
    pub fn compute(mode: QueryMode, request: Option<&PageRequest>, top: Option<u64>) -> Self {
        let Some(request) = request else {
            return Self {
                limit: top,
                offset: 0,
                lookahead: false,
            };
        };
        let offset = request.offset();
        let size = request.size();
        let remaining = top.map(|n| n.saturating_sub(offset));
        match mode {
            QueryMode::Slice => match remaining {
                Some(left) if left <= size => Self {
                    limit: Some(left),
                    offset,
                    lookahead: false,
                },
                _ => Self {
                    limit: Some(size.saturating_add(1)),
                    offset,
                    lookahead: true,
                },
            },
            QueryMode::List | QueryMode::Page => Self {
                limit: Some(remaining.map_or(size, |left| left.min(size))),
                offset,
                lookahead: false,
            },
        }
    }

    /// Whether the window can return no rows at all.
    pub fn is_empty(&self) -> bool {
        self.limit == Some(0)
    }
}

/// Total derivable from the content alone, without a count query.
///
/// The first page that is not full holds everything; any page that is
/// partially filled is the last one.
pub fn implied_total(request: &PageRequest, content_len: u64) -> Option<u64> {
    let size = request.size();
    if request.offset() == 0 && content_len < size {
        return Some(content_len);
    }
    if content_len != 0 && content_len < size {
        return Some(request.offset().saturating_add(content_len));
    }
    None
}

/// Build a page, capping the counted total at the `Top`/`First` limit.
pub fn assemble_page<T>(
    content: Vec<T>,
    request: &PageRequest,
    total: u64,
    top: Option<u64>,
) -> PageResult<T> {
    let total = top.map_or(total, |n| total.min(n));
    PageResult::page(content, request, total)
}

/// Drop the lookahead row of a slice fetch, returning whether it was there.
pub fn take_lookahead<T>(content: &mut Vec<T>, request: &PageRequest, window: Window) -> bool {
    let size = usize::try_from(request.size()).unwrap_or(usize::MAX);
    let has_next = window.lookahead && content.len() > size;
    if has_next {
        content.truncate(size);
    }
    has_next
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(page: u64, size: u64) -> PageRequest {
        PageRequest::of(page, size).unwrap()
    }

    #[test]
    fn test_page_window() {
        let window = Window::compute(QueryMode::Page, Some(&request(2, 3)), None);
        assert_eq!(
            window,
            Window {
                limit: Some(3),
                offset: 6,
                lookahead: false
            }
        );
    }

    #[test]
    fn test_list_without_request_is_unbounded_or_top() {
        assert_eq!(Window::compute(QueryMode::List, None, None), Window::UNBOUNDED);
        assert_eq!(Window::compute(QueryMode::List, None, Some(3)).limit, Some(3));
    }

    #[test]
    fn test_slice_fetches_lookahead_row() {
        let window = Window::compute(QueryMode::Slice, Some(&request(0, 3)), None);
        assert_eq!(window.limit, Some(4));
        assert!(window.lookahead);

        let mut full = vec![1, 2, 3, 4];
        assert!(take_lookahead(&mut full, &request(0, 3), window));
        assert_eq!(full, vec![1, 2, 3]);

        let mut exact = vec![1, 2, 3];
        assert!(!take_lookahead(&mut exact, &request(0, 3), window));
        assert_eq!(exact.len(), 3);
    }

    #[test]
    fn test_top_caps_page_windows() {
        // Top 5, pages of 3: the second page holds the last two rows.
        let second = Window::compute(QueryMode::Page, Some(&request(1, 3)), Some(5));
        assert_eq!(second.limit, Some(2));
        assert_eq!(second.offset, 3);

        let past = Window::compute(QueryMode::Page, Some(&request(4, 3)), Some(5));
        assert!(past.is_empty());

        let slice = Window::compute(QueryMode::Slice, Some(&request(1, 3)), Some(5));
        assert_eq!(slice.limit, Some(2));
        assert!(!slice.lookahead);

        let page = assemble_page(vec![4, 5], &request(1, 3), 100, Some(5));
        assert_eq!(page.total_elements, Some(5));
        assert_eq!(page.total_pages, Some(2));
        assert_eq!(page.last, Some(true));
    }

    #[test]
    fn test_implied_total() {
        assert_eq!(implied_total(&request(0, 5), 3), Some(3));
        assert_eq!(implied_total(&request(2, 5), 3), Some(13));
        assert_eq!(implied_total(&request(0, 5), 5), None);
        assert_eq!(implied_total(&request(3, 5), 0), None);
    }

    #[test]
    fn test_page_content_length_property() {
        let total = 12u64;
        for size in 1..6u64 {
            for page in 0..5u64 {
                let window = Window::compute(QueryMode::Page, Some(&request(page, size)), None);
                let returned = total.saturating_sub(window.offset).min(window.limit.unwrap_or(total));
                assert_eq!(returned, size.min(total.saturating_sub(page * size)));
            }
        }
    }
}
