//! Paginated Search
//!
//! Scans an offset-paginated list until a caller predicate matches. Used for
//! resources the platform cannot look up by id or filter precisely.

use std::future::Future;

/// Fixed page size requested from every list endpoint
pub const PAGE_SIZE: usize = 100;

/// One page returned by a list endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPage<T> {
    pub items: Vec<T>,
    /// Declared total. `None` and `Some(0)` both mean "unknown".
    pub total_size: Option<i64>,
}

impl<T> SearchPage<T> {
    pub fn new(items: Vec<T>, total_size: Option<i64>) -> Self {
        Self { items, total_size }
    }
}

/// Fetch pages in order and return the first item matching `matches`
///
/// `fetch_page(max, offset)` is called with `max = PAGE_SIZE`. Fetching
/// stops at the first match, or when a page is empty, the declared total has
/// been reached (only trusted when > 0), or a page comes back short.
/// Errors from `fetch_page` abort the search.
pub async fn paginated_search<T, E, F, Fut, M>(
    mut fetch_page: F,
    mut matches: M,
) -> Result<Option<T>, E>
where
    F: FnMut(usize, usize) -> Fut,
    Fut: Future<Output = Result<SearchPage<T>, E>>,
    M: FnMut(&T) -> bool,
{
    let mut offset = 0usize;

    loop {
        let page = fetch_page(PAGE_SIZE, offset).await?;
        let items_in_page = page.items.len();
        tracing::trace!(
            offset,
            items_in_page,
            total_size = ?page.total_size,
            "Search page fetched"
        );

        if let Some(found) = page.items.into_iter().find(|item| matches(item)) {
            return Ok(Some(found));
        }

        if items_in_page == 0 {
            break;
        }

        // A zero total means "unknown" on some endpoints, not "empty"
        if let Some(total) = page.total_size.filter(|t| *t > 0) {
            if (offset + items_in_page) as i64 >= total {
                break;
            }
        }

        if items_in_page < PAGE_SIZE {
            break;
        }

        offset += PAGE_SIZE;
    }

    Ok(None)
}
