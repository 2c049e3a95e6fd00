//! Build-once holder for the search index.

use std::sync::OnceLock;

use tracing::debug;

use crate::index::SearchIndex;

/// Lazily built, then read-only, search index.
///
/// The first [`LazyIndex::get_or_build`] runs the builder to completion and
/// blocks concurrent callers until it is done; every later call returns the
/// same index.
#[derive(Debug, Default)]
pub struct LazyIndex {
    cell: OnceLock<SearchIndex>,
}

impl LazyIndex {
    pub fn new() -> Self {
        LazyIndex { cell: OnceLock::new() }
    }

    /// A cache already holding `index` (e.g. loaded from disk).
    pub fn prebuilt(index: SearchIndex) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(index);
        LazyIndex { cell }
    }

    pub fn get_or_build<F>(&self, build: F) -> &SearchIndex
    where
        F: FnOnce() -> SearchIndex,
    {
        self.cell.get_or_init(|| {
            debug!("Search index not built yet, building on first use");
            build()
        })
    }

    pub fn get(&self) -> Option<&SearchIndex> {
        self.cell.get()
    }

    pub fn is_built(&self) -> bool {
        self.cell.get().is_some()
    }
}
