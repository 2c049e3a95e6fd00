//! # booksearch — Book Reader Search Engine
//!
//! Inverted word index, sentence-fragment phrase index and chapter/verse
//! lookup over a single pre-analyzed book. Pages carry precomputed metadata
//! (keywords, entities, theme scores, difficulty) that the reader surfaces
//! alongside search results.
//!
//! ## Library usage
//!
//! ```
//! use booksearch::{Book, SearchEngine, SearchMode, SearchOptions};
//!
//! let book = Book::from_texts("Demo", ["O governo decidiu", "A fé e a religião"]);
//! let engine = SearchEngine::new(book, SearchOptions::default());
//! let results = engine.advanced_search("governo", SearchMode::Word, 10);
//! assert_eq!(results.len(), 1);
//! assert_eq!(results[0].page(), 1);
//! ```

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub mod book;
pub mod cache;
pub mod chapters;
pub mod error;
pub mod excerpt;
pub mod export;
pub mod highlight;
pub mod index;
pub mod search;
pub mod state;
pub mod themes;

pub use book::Book;
pub use cache::LazyIndex;
pub use chapters::{ChapterDetector, HeadingDetector};
pub use error::ReaderError;
pub use excerpt::{build_excerpt, build_token_excerpt, excerpt_at, token_excerpt_at};
pub use index::{build_search_index, IndexGranularity, IndexOptions, PageOccurrences, SearchIndex};
pub use search::{SearchEngine, SearchMode, SearchOptions, SearchResult};
pub use state::{QueryState, ReaderState};

/// Shortest sentence fragment admitted into the phrase index (characters).
pub const PHRASE_MIN_LEN: usize = 15;

/// Longest sentence fragment admitted into the phrase index (characters).
pub const PHRASE_MAX_LEN: usize = 200;

/// Default result cap for `advanced_search`.
pub const DEFAULT_MAX_RESULTS: usize = 50;

/// Default number of words kept on each side of a match in an excerpt.
pub const DEFAULT_CONTEXT_WORDS: usize = 5;

/// Upper bound for `context_words`.
pub const MAX_CONTEXT_WORDS: usize = 15;

/// Length of the fallback excerpt when a term cannot be located (characters).
pub const FALLBACK_EXCERPT_CHARS: usize = 200;

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+").expect("word pattern is valid"));

static FRAGMENT_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+").expect("fragment pattern is valid"));

// ─── Stable hashing ─────────────────────────────────────────────────

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

/// 64-bit FNV-1a over the concatenation of `parts`.
///
/// Book fingerprints are written into cache file names, so the value must not
/// change between builds or platforms.
#[must_use]
pub fn stable_hash(parts: &[&[u8]]) -> u64 {
    parts
        .iter()
        .flat_map(|part| part.iter())
        .fold(FNV_OFFSET_BASIS, |hash, &byte| (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME))
}

// ─── Core public types ───────────────────────────────────────────────

/// One page (segment) of the book with its precomputed analysis.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Page {
    /// 1-based page number
    pub number: u32,
    pub text: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub entities: Vec<String>,
    /// theme name → score in `[0, 1]`
    #[serde(default)]
    pub themes: BTreeMap<String, f64>,
    #[serde(default)]
    pub difficulty: f64,
}

impl Page {
    /// A page with text only and no precomputed metadata.
    pub fn new(number: u32, text: impl Into<String>) -> Self {
        Page {
            number,
            text: text.into(),
            keywords: Vec::new(),
            entities: Vec::new(),
            themes: BTreeMap::new(),
            difficulty: 0.0,
        }
    }
}

/// A detected chapter: a titled run of consecutive pages.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub number: u32,
    pub title: String,
    pub start_page: u32,
    pub end_page: u32,
    /// Page numbers spanned, in order.
    pub pages: Vec<u32>,
}

impl Chapter {
    /// Build a chapter spanning `start_page..=end_page`.
    /// An `end_page` before `start_page` collapses to a one-page chapter.
    pub fn new(number: u32, title: impl Into<String>, start_page: u32, end_page: u32) -> Self {
        let end_page = end_page.max(start_page);
        Chapter {
            number,
            title: title.into(),
            start_page,
            end_page,
            pages: (start_page..=end_page).collect(),
        }
    }

    pub fn contains(&self, page: u32) -> bool {
        (self.start_page..=self.end_page).contains(&page)
    }
}

// ─── Tokenization ────────────────────────────────────────────────────

/// Iterate word tokens of already-lowercased text as `(byte_offset, token)`.
///
/// Tokens are runs of Unicode word characters, so accented words such as
/// `religião` stay whole.
pub fn token_spans(lowered: &str) -> impl Iterator<Item = (usize, &str)> {
    WORD_RE.find_iter(lowered).map(|m| (m.start(), m.as_str()))
}

/// Tokenize text into lowercase word tokens.
///
/// # Examples
///
/// ```
/// use booksearch::tokenize;
///
/// let tokens = tokenize("A fé e a Religião!");
/// assert_eq!(tokens, vec!["a", "fé", "e", "a", "religião"]);
/// ```
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    token_spans(&lowered).map(|(_, t)| t.to_string()).collect()
}

/// Split lowercased text into phrase-index fragments.
///
/// Splits on runs of `.`, `!` and `?`, trims each piece and keeps those whose
/// character length lies within [`PHRASE_MIN_LEN`, `PHRASE_MAX_LEN`].
pub fn sentence_fragments(lowered: &str) -> impl Iterator<Item = &str> {
    FRAGMENT_SPLIT_RE
        .split(lowered)
        .map(str::trim)
        .filter(|f| (PHRASE_MIN_LEN..=PHRASE_MAX_LEN).contains(&f.chars().count()))
}


// ─── Property-based tests (proptest) ─────────────────────────────────
