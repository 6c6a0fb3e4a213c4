//! Page-by-page traversal of a category's remote history

use super::SyncError;
use crate::models::{PoolCategory, PullRecord};
use crate::remote::{RecordPage, RemoteApi};

/// Lazy iterator over the pages of one category
///
/// The first request carries no cursor; each later request carries the
/// cursor of the page before it. Iteration ends after a page without a
/// cursor, or right after yielding an error.
pub struct PageWalker<'a, A: RemoteApi + ?Sized> {
    api: &'a A,
    category: PoolCategory,
    cursor: Option<String>,
    pages_requested: usize,
    finished: bool,
}

impl<'a, A: RemoteApi + ?Sized> PageWalker<'a, A> {
    pub fn new(api: &'a A, category: PoolCategory) -> Self {
        Self {
            api,
            category,
            cursor: None,
            pages_requested: 0,
            finished: false,
        }
    }

    /// Number of requests issued so far
    pub fn pages_requested(&self) -> usize {
        self.pages_requested
    }
}

impl<A: RemoteApi + ?Sized> Iterator for PageWalker<'_, A> {
    type Item = Result<RecordPage, SyncError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let page_index = self.pages_requested;
        self.pages_requested += 1;

        match self.api.fetch_page(self.category, self.cursor.as_deref()) {
            Ok(page) => {
                self.cursor = page.next_cursor().map(str::to_string);
                self.finished = self.cursor.is_none();
                Some(Ok(page))
            }
            Err(e) => {
                self.finished = true;
                Some(Err(SyncError::fetch(self.category, page_index, e)))
            }
        }
    }
}

/// Fetch every remote record of a category, newest first
pub fn fetch_all<A: RemoteApi + ?Sized>(
    api: &A,
    category: PoolCategory,
) -> Result<Vec<PullRecord>, SyncError> {
    let mut records = Vec::new();
    for page in PageWalker::new(api, category) {
        records.extend(page?.records);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{FetchError, ScriptedApi};

    fn history(count: i64) -> Vec<PullRecord> {
        (0..count)
            .rev()
            .map(|i| PullRecord::new(PoolCategory::Standard, 1001, 100 + i, 1000 + i * 10))
            .collect()
    }

    #[test]
    fn test_walks_until_cursor_is_empty() {
        let api = ScriptedApi::new("u1").with_history(PoolCategory::Standard, history(25), 10);

        let mut walker = PageWalker::new(&api, PoolCategory::Standard);
        let sizes: Vec<usize> = walker
            .by_ref()
            .map(|page| page.unwrap().records.len())
            .collect();

        assert_eq!(sizes, vec![10, 10, 5]);
        assert_eq!(walker.pages_requested(), 3);
        assert_eq!(
            api.cursors_for(PoolCategory::Standard),
            vec![None, Some("1-1".to_string()), Some("1-2".to_string())]
        );
    }

    #[test]
    fn test_empty_history_is_one_empty_page() {
        let api = ScriptedApi::new("u1");
        let pages: Vec<_> = PageWalker::new(&api, PoolCategory::Armory).collect();
        assert_eq!(pages.len(), 1);
        assert!(pages[0].as_ref().unwrap().records.is_empty());
    }

    #[test]
    fn test_error_ends_walk_with_page_context() {
        let api = ScriptedApi::new("u1")
            .with_history(PoolCategory::Standard, history(25), 10)
            .fail_page(PoolCategory::Standard, 1, FetchError::Http { status: 500 });

        let pages: Vec<_> = PageWalker::new(&api, PoolCategory::Standard).collect();
        assert_eq!(pages.len(), 2);
        assert!(pages[0].is_ok());
        match &pages[1] {
            Err(SyncError::Fetch { category, page, .. }) => {
                assert_eq!(*category, PoolCategory::Standard);
                assert_eq!(*page, 1);
            }
            other => panic!("expected fetch error, got {:?}", other),
        }
        assert_eq!(api.requests_for(PoolCategory::Standard), 2);
    }

    #[test]
    fn test_fetch_all_preserves_remote_order() {
        let api = ScriptedApi::new("u1").with_history(PoolCategory::Standard, history(12), 5);
        let records = fetch_all(&api, PoolCategory::Standard).unwrap();
        assert_eq!(records.len(), 12);
        assert!(records.windows(2).all(|w| w[0].timestamp > w[1].timestamp));
    }
}
