//! Scripted remote API
//!
//! Serves canned pages from memory and records every request, so sync
//! behaviour can be asserted without a network.

use std::cell::RefCell;
use std::collections::HashMap;

use super::{FetchError, RecordPage, RemoteApi};
use crate::models::{PoolCategory, PullRecord};

/// In-memory [`RemoteApi`] with one fixed page list per category
pub struct ScriptedApi {
    uid: String,
    pages: HashMap<PoolCategory, Vec<Vec<PullRecord>>>,
    /// One-shot failures keyed by (category, page index)
    page_failures: RefCell<HashMap<(PoolCategory, usize), FetchError>>,
    uid_failure: RefCell<Option<FetchError>>,
    requests: RefCell<Vec<(PoolCategory, Option<String>)>>,
}

impl ScriptedApi {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            pages: HashMap::new(),
            page_failures: RefCell::new(HashMap::new()),
            uid_failure: RefCell::new(None),
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Serve exactly these pages (each newest first) for a category
    pub fn with_pages(mut self, category: PoolCategory, pages: Vec<Vec<PullRecord>>) -> Self {
        self.pages.insert(category, pages);
        self
    }

    /// Split a newest-first history into pages of `page_size`
    pub fn with_history(
        self,
        category: PoolCategory,
        newest_first: Vec<PullRecord>,
        page_size: usize,
    ) -> Self {
        let pages = newest_first
            .chunks(page_size.max(1))
            .map(<[PullRecord]>::to_vec)
            .collect();
        self.with_pages(category, pages)
    }

    /// Fail the next request for the given page with `error`
    pub fn fail_page(self, category: PoolCategory, page: usize, error: FetchError) -> Self {
        self.page_failures.borrow_mut().insert((category, page), error);
        self
    }

    /// Fail the next uid lookup with `error`
    pub fn fail_uid(self, error: FetchError) -> Self {
        *self.uid_failure.borrow_mut() = Some(error);
        self
    }

    /// Number of page requests made for a category
    pub fn requests_for(&self, category: PoolCategory) -> usize {
        self.requests
            .borrow()
            .iter()
            .filter(|(c, _)| *c == category)
            .count()
    }

    /// Cursors sent for a category, in request order
    pub fn cursors_for(&self, category: PoolCategory) -> Vec<Option<String>> {
        self.requests
            .borrow()
            .iter()
            .filter(|(c, _)| *c == category)
            .map(|(_, cursor)| cursor.clone())
            .collect()
    }

    pub fn total_requests(&self) -> usize {
        self.requests.borrow().len()
    }

    fn cursor_for(category: PoolCategory, index: usize) -> String {
        format!("{}-{}", category.id(), index)
    }

    fn page_index(category: PoolCategory, cursor: Option<&str>) -> Result<usize, FetchError> {
        let Some(cursor) = cursor else {
            return Ok(0);
        };
        cursor
            .strip_prefix(&format!("{}-", category.id()))
            .and_then(|index| index.parse().ok())
            .ok_or_else(|| FetchError::api(1, format!("unknown cursor {:?}", cursor)))
    }
}

impl RemoteApi for ScriptedApi {
    fn fetch_page(
        &self,
        category: PoolCategory,
        cursor: Option<&str>,
    ) -> Result<RecordPage, FetchError> {
        self.requests
            .borrow_mut()
            .push((category, cursor.map(str::to_string)));

        let index = Self::page_index(category, cursor)?;
        if let Some(error) = self.page_failures.borrow_mut().remove(&(category, index)) {
            return Err(error);
        }

        let pages = self.pages.get(&category).map(Vec::as_slice).unwrap_or_default();
        let records = pages.get(index).cloned().unwrap_or_default();
        let next = (index + 1 < pages.len()).then(|| Self::cursor_for(category, index + 1));

        Ok(RecordPage { records, next })
    }

    fn fetch_uid(&self) -> Result<String, FetchError> {
        match self.uid_failure.borrow_mut().take() {
            Some(error) => Err(error),
            None => Ok(self.uid.clone()),
        }
    }
}
