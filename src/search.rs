//! Query routing and the word, phrase, chapter and verse search routines.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Instant;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::book::Book;
use crate::cache::LazyIndex;
use crate::error::ReaderError;
use crate::excerpt::{build_excerpt, build_token_excerpt, token_excerpt_at};
use crate::index::{build_search_index, IndexOptions, PageOccurrences, SearchIndex};
use crate::{token_spans, Chapter, DEFAULT_CONTEXT_WORDS, DEFAULT_MAX_RESULTS};

/// Context words on each side of a verse match.
pub const VERSE_CONTEXT_WORDS: usize = 5;

/// Phrases longer than this many words get the approximate fallback.
pub const APPROXIMATE_PHRASE_MIN_WORDS: usize = 3;

static VERSE_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)[:.](\d+)").expect("verse reference pattern is valid"));

// ─── Modes and results ───────────────────────────────────────────────

/// Which search routines a query runs.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    All,
    Word,
    Phrase,
    Chapter,
    Verse,
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SearchMode::All => "all",
            SearchMode::Word => "word",
            SearchMode::Phrase => "phrase",
            SearchMode::Chapter => "chapter",
            SearchMode::Verse => "verse",
        })
    }
}

impl FromStr for SearchMode {
    type Err = ReaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(SearchMode::All),
            "word" => Ok(SearchMode::Word),
            "phrase" => Ok(SearchMode::Phrase),
            "chapter" => Ok(SearchMode::Chapter),
            "verse" => Ok(SearchMode::Verse),
            other => Err(ReaderError::InvalidArgs(format!(
                "Unknown search mode '{}' (expected all, word, phrase, chapter or verse)",
                other
            ))),
        }
    }
}

/// One search hit.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SearchResult {
    Word {
        page: u32,
        count: u32,
        excerpt: String,
        matched_term: String,
    },
    Phrase {
        page: u32,
        excerpt: String,
        /// Found by the first-word fallback rather than the phrase index
        approximate: bool,
    },
    Chapter {
        number: u32,
        title: String,
        start_page: u32,
        end_page: u32,
        page_count: usize,
    },
    Verse {
        page: u32,
        chapter: u32,
        verse: u32,
        excerpt: String,
    },
}

impl SearchResult {
    /// Page to jump to for this result (a chapter's first page).
    pub fn page(&self) -> u32 {
        match self {
            SearchResult::Word { page, .. }
            | SearchResult::Phrase { page, .. }
            | SearchResult::Verse { page, .. } => *page,
            SearchResult::Chapter { start_page, .. } => *start_page,
        }
    }

    pub fn mode(&self) -> SearchMode {
        match self {
            SearchResult::Word { .. } => SearchMode::Word,
            SearchResult::Phrase { .. } => SearchMode::Phrase,
            SearchResult::Chapter { .. } => SearchMode::Chapter,
            SearchResult::Verse { .. } => SearchMode::Verse,
        }
    }

    pub fn count(&self) -> Option<u32> {
        match self {
            SearchResult::Word { count, .. } => Some(*count),
            _ => None,
        }
    }

    pub fn excerpt(&self) -> Option<&str> {
        match self {
            SearchResult::Word { excerpt, .. }
            | SearchResult::Phrase { excerpt, .. }
            | SearchResult::Verse { excerpt, .. } => Some(excerpt),
            SearchResult::Chapter { .. } => None,
        }
    }

    fn from_chapter(chapter: &Chapter) -> Self {
        SearchResult::Chapter {
            number: chapter.number,
            title: chapter.title.clone(),
            start_page: chapter.start_page,
            end_page: chapter.end_page,
            page_count: chapter.pages.len(),
        }
    }
}

// ─── Engine ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Exact token lookup for word searches issued through `advanced_search`
    pub exact_match: bool,
    pub context_words: usize,
    pub index: IndexOptions,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            exact_match: false,
            context_words: DEFAULT_CONTEXT_WORDS,
            index: IndexOptions::default(),
        }
    }
}

/// Search engine over one loaded book. The index is built on first search.
#[derive(Debug)]
pub struct SearchEngine {
    book: Book,
    options: SearchOptions,
    index: LazyIndex,
}

impl SearchEngine {
    pub fn new(book: Book, options: SearchOptions) -> Self {
        SearchEngine { book, options, index: LazyIndex::new() }
    }

    /// Engine seeded with an already-built index (e.g. loaded from the disk cache).
    pub fn with_index(book: Book, options: SearchOptions, index: SearchIndex) -> Self {
        SearchEngine { book, options, index: LazyIndex::prebuilt(index) }
    }

    pub fn book(&self) -> &Book {
        &self.book
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    pub fn is_indexed(&self) -> bool {
        self.index.is_built()
    }

    /// The search index, building it on first access.
    pub fn index(&self) -> &SearchIndex {
        self.index.get_or_build(|| {
            build_search_index(
                self.book.pages(),
                self.book.chapters(),
                self.book.fingerprint(),
                &self.options.index,
            )
        })
    }

    // ─── Word ────────────────────────────────────────────────

    /// Word search, sorted by descending occurrence count.
    ///
    /// `exact_match` looks the token up directly; otherwise every vocabulary
    /// token containing `word` matches.
    pub fn search_word(&self, word: &str, exact_match: bool) -> Vec<SearchResult> {
        let term = word.trim().to_lowercase();
        if term.is_empty() {
            return Vec::new();
        }
        let index = self.index();

        let mut results = Vec::new();
        if exact_match {
            if let Some(postings) = index.word_index.get(&term) {
                results.extend(postings.iter().filter_map(|p| self.word_result(p, &term)));
            }
        } else {
            let mut tokens: Vec<&String> = index
                .word_index
                .keys()
                .filter(|k| k.contains(term.as_str()))
                .collect();
            tokens.sort();
            for token in tokens {
                results.extend(index.word_index[token].iter().filter_map(|p| self.word_result(p, token)));
            }
        }

        // stable: ties keep vocabulary then page order
        results.sort_by(|a, b| b.count().cmp(&a.count()));
        results
    }

    fn word_result(&self, posting: &PageOccurrences, token: &str) -> Option<SearchResult> {
        let page = self.book.page(posting.page)?;
        let excerpt = match posting.positions.first() {
            Some(&offset) => {
                let lowered = page.text.to_lowercase();
                token_excerpt_at(&page.text, &lowered, offset as usize, token, self.options.context_words)
            }
            None => build_token_excerpt(&page.text, token, self.options.context_words),
        };
        Some(SearchResult::Word {
            page: posting.page,
            count: posting.count,
            excerpt,
            matched_term: token.to_string(),
        })
    }

    // ─── Phrase ──────────────────────────────────────────────

    /// Phrase search via the fragment index, with a first-word substring
    /// fallback for phrases of more than three words.
    pub fn search_phrase(&self, phrase: &str) -> Vec<SearchResult> {
        let needle = phrase.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        let index = self.index();

        if let Some(pages) = index.phrase_index.get(&needle) {
            return pages
                .iter()
                .filter_map(|&n| self.phrase_result(n, &needle, false))
                .collect();
        }

        if needle.split_whitespace().count() <= APPROXIMATE_PHRASE_MIN_WORDS {
            return Vec::new();
        }
        let Some((_, first_word)) = token_spans(&needle).next() else {
            return Vec::new();
        };
        let Some(postings) = index.word_index.get(first_word) else {
            return Vec::new();
        };

        postings
            .iter()
            .filter(|p| {
                self.book
                    .page(p.page)
                    .is_some_and(|page| page.text.to_lowercase().contains(&needle))
            })
            .filter_map(|p| self.phrase_result(p.page, &needle, true))
            .collect()
    }

    fn phrase_result(&self, page_no: u32, needle: &str, approximate: bool) -> Option<SearchResult> {
        let page = self.book.page(page_no)?;
        Some(SearchResult::Phrase {
            page: page_no,
            excerpt: build_excerpt(&page.text, needle, self.options.context_words),
            approximate,
        })
    }

    // ─── Chapter ─────────────────────────────────────────────

    /// Chapter search: number lookup when `chapter_ref` is an integer, plus
    /// every chapter whose title contains it (case-insensitive).
    pub fn search_chapter(&self, chapter_ref: &str) -> Vec<SearchResult> {
        let reference = chapter_ref.trim();
        if reference.is_empty() {
            return Vec::new();
        }
        let index = self.index();

        let mut results = Vec::new();
        if let Some(chapter) = reference.parse::<u32>().ok().and_then(|n| index.chapter(n)) {
            results.push(SearchResult::from_chapter(chapter));
        }

        let needle = reference.to_lowercase();
        results.extend(
            index
                .chapters
                .iter()
                .filter(|c| c.title.to_lowercase().contains(&needle))
                .map(SearchResult::from_chapter),
        );
        results
    }

    // ─── Verse ───────────────────────────────────────────────

    /// Verse search for a `chapter:verse` (or `chapter.verse`) reference.
    pub fn search_verse(&self, verse_ref: &str) -> Vec<SearchResult> {
        let Some((chapter_no, verse_no)) = parse_verse_ref(verse_ref) else {
            return Vec::new();
        };
        let index = self.index();
        let Some(chapter) = index.chapter(chapter_no) else {
            return Vec::new();
        };

        let pattern = format!(r"\b{}(?:[.:]|\b)", verse_no);
        let verse_re = match Regex::new(&pattern) {
            Ok(re) => re,
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "Verse pattern rejected");
                return Vec::new();
            }
        };
        let verse_str = verse_no.to_string();

        (chapter.start_page..=chapter.end_page)
            .filter_map(|n| self.book.page(n))
            .filter_map(|page| {
                let m = verse_re.find(&page.text)?;
                Some(SearchResult::Verse {
                    page: page.number,
                    chapter: chapter_no,
                    verse: verse_no,
                    excerpt: token_excerpt_at(&page.text, &page.text, m.start(), &verse_str, VERSE_CONTEXT_WORDS),
                })
            })
            .collect()
    }

    // ─── Router ──────────────────────────────────────────────

    /// Run the routines implied by `mode`, concatenate, and cap at `max_results`.
    pub fn advanced_search(&self, query: &str, mode: SearchMode, max_results: usize) -> Vec<SearchResult> {
        let query = query.trim();
        if max_results == 0 || query.is_empty() {
            return Vec::new();
        }
        let start = Instant::now();

        let mut results = Vec::new();
        for step in route(query, mode) {
            let found = match step {
                SearchMode::Word => self.search_word(query, self.options.exact_match),
                SearchMode::Phrase => self.search_phrase(query),
                SearchMode::Chapter => self.search_chapter(query),
                SearchMode::Verse => self.search_verse(query),
                SearchMode::All => Vec::new(),
            };
            results.extend(found);
            if results.len() >= max_results {
                break;
            }
        }
        results.truncate(max_results);

        debug!(
            query,
            mode = %mode,
            results = results.len(),
            elapsed_ms = format_args!("{:.2}", start.elapsed().as_secs_f64() * 1000.0),
            "Search finished"
        );
        results
    }

    /// `advanced_search` with the default result cap.
    pub fn search(&self, query: &str, mode: SearchMode) -> Vec<SearchResult> {
        self.advanced_search(query, mode, DEFAULT_MAX_RESULTS)
    }
}

/// Concrete routines for a query, in execution order.
///
/// `All` runs word search, phrase search for multi-word queries, chapter
/// search, and verse search when the query holds a verse reference.
pub fn route(query: &str, mode: SearchMode) -> Vec<SearchMode> {
    match mode {
        SearchMode::All => {
            let mut steps = vec![SearchMode::Word];
            if query.trim().contains(char::is_whitespace) {
                steps.push(SearchMode::Phrase);
            }
            steps.push(SearchMode::Chapter);
            if parse_verse_ref(query).is_some() {
                steps.push(SearchMode::Verse);
            }
            steps
        }
        concrete => vec![concrete],
    }
}

/// Extract `(chapter, verse)` from the first `<int>[:.]<int>` in `reference`.
pub fn parse_verse_ref(reference: &str) -> Option<(u32, u32)> {
    let caps = VERSE_REF_RE.captures(reference)?;
    let chapter = caps.get(1)?.as_str().parse().ok()?;
    let verse = caps.get(2)?.as_str().parse().ok()?;
    Some((chapter, verse))
}

#[cfg(test)]
#[path = "search_tests.rs"]
mod tests;
