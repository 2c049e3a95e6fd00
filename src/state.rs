//! Reader view state: current page, pending navigation, last search.

use serde::{Deserialize, Serialize};

use crate::error::ReaderError;
use crate::search::{SearchMode, SearchResult};

/// The last executed search. Replaced wholesale by each new search.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct QueryState {
    pub query: String,
    pub mode: SearchMode,
    pub max_results: usize,
    pub results: Vec<SearchResult>,
}

/// Navigation context for one reading session.
///
/// Page numbers are 1-based and always stay within `1..=page_count`; an empty
/// book pins the reader at page 0.
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderState {
    page_count: u32,
    current_page: u32,
    pending_page: Option<u32>,
    query: Option<QueryState>,
}

impl ReaderState {
    pub fn new(page_count: u32) -> Self {
        ReaderState {
            page_count,
            current_page: page_count.min(1),
            pending_page: None,
            query: None,
        }
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn pending_page(&self) -> Option<u32> {
        self.pending_page
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn query(&self) -> Option<&QueryState> {
        self.query.as_ref()
    }

    fn check(&self, page: u32) -> Result<u32, ReaderError> {
        if page == 0 || page > self.page_count {
            return Err(ReaderError::PageOutOfRange { page, page_count: self.page_count });
        }
        Ok(page)
    }

    /// Jump straight to `page`. Clears any pending request.
    pub fn go_to(&mut self, page: u32) -> Result<u32, ReaderError> {
        self.current_page = self.check(page)?;
        self.pending_page = None;
        Ok(self.current_page)
    }

    /// Advance one page; stays on the last page.
    pub fn next(&mut self) -> u32 {
        if self.current_page < self.page_count {
            self.current_page += 1;
        }
        self.current_page
    }

    /// Go back one page; stays on the first page.
    pub fn previous(&mut self) -> u32 {
        if self.current_page > 1 {
            self.current_page -= 1;
        }
        self.current_page
    }

    /// Queue a page change to apply with [`ReaderState::commit_pending`].
    pub fn request(&mut self, page: u32) -> Result<(), ReaderError> {
        self.pending_page = Some(self.check(page)?);
        Ok(())
    }

    /// Apply the queued page change, if any, and return the current page.
    pub fn commit_pending(&mut self) -> u32 {
        if let Some(page) = self.pending_page.take() {
            self.current_page = page;
        }
        self.current_page
    }

    pub fn record_search(&mut self, query: &str, mode: SearchMode, max_results: usize, results: Vec<SearchResult>) {
        self.query = Some(QueryState {
            query: query.to_string(),
            mode,
            max_results,
            results,
        });
    }

    /// Navigate to the page of the `index`-th result of the last search.
    pub fn jump_to_result(&mut self, index: usize) -> Result<u32, ReaderError> {
        let page = self
            .query
            .as_ref()
            .and_then(|q| q.results.get(index))
            .map(SearchResult::page)
            .ok_or_else(|| ReaderError::InvalidArgs(format!("No search result #{}", index + 1)))?;
        self.go_to(page)
    }
}
