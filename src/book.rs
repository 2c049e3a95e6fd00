//! Book loading: JSON schema, embedded sample book, chapter resolution.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::chapters::{ChapterDetector, HeadingDetector};
use crate::error::ReaderError;
use crate::{stable_hash, Chapter, Page};

/// The pre-analyzed book compiled into the binary.
pub const EMBEDDED_BOOK_JSON: &str = include_str!("../data/sample_book.json");

/// On-disk page record. Page numbers are positional, not stored.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct PageRecord {
    pub text: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub themes: BTreeMap<String, f64>,
    #[serde(default)]
    pub difficulty: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ChapterRecord {
    pub number: u32,
    pub title: String,
    pub start_page: u32,
    pub end_page: u32,
}

/// On-disk book file.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct BookFile {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    pub pages: Vec<PageRecord>,
    /// Explicit chapter list; when absent, chapters are detected from page text.
    #[serde(default)]
    pub chapters: Option<Vec<ChapterRecord>>,
}

/// A loaded book: immutable pages plus resolved chapters.
#[derive(Debug, Clone)]
pub struct Book {
    pub title: String,
    pub author: Option<String>,
    pages: Vec<Page>,
    chapters: Vec<Chapter>,
}

impl Book {
    /// Assemble a book from pages (renumbered 1..=N) and chapters.
    pub fn new(title: impl Into<String>, author: Option<String>, pages: Vec<Page>, chapters: Vec<Chapter>) -> Self {
        let pages = pages
            .into_iter()
            .enumerate()
            .map(|(i, mut p)| {
                p.number = i as u32 + 1;
                p
            })
            .collect();
        Book { title: title.into(), author, pages, chapters }
    }

    /// Book from bare page texts, with chapters detected by the default detector.
    pub fn from_texts<I, S>(title: &str, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pages: Vec<Page> = texts
            .into_iter()
            .enumerate()
            .map(|(i, t)| Page::new(i as u32 + 1, t))
            .collect();
        let chapters = HeadingDetector::default().detect(&pages);
        Book::new(title, None, pages, chapters)
    }

    /// Parse a book file, detecting chapters with `detector` when the file lists none.
    pub fn from_json(json: &str, detector: &dyn ChapterDetector) -> Result<Self, ReaderError> {
        let file: BookFile = serde_json::from_str(json)?;
        Ok(Book::from_file(file, detector))
    }

    pub fn from_file(file: BookFile, detector: &dyn ChapterDetector) -> Self {
        let pages: Vec<Page> = file
            .pages
            .into_iter()
            .enumerate()
            .map(|(i, r)| Page {
                number: i as u32 + 1,
                text: r.text,
                keywords: r.keywords,
                entities: r.entities,
                themes: r.themes,
                difficulty: r.difficulty,
            })
            .collect();

        let chapters = match file.chapters {
            Some(records) => records
                .into_iter()
                .map(|c| Chapter::new(c.number, c.title, c.start_page, c.end_page))
                .collect(),
            None => detector.detect(&pages),
        };

        Book::new(file.title, file.author, pages, chapters)
    }

    /// Read and parse a book file from disk.
    pub fn load(path: &Path, detector: &dyn ChapterDetector) -> Result<Self, ReaderError> {
        let json = std::fs::read_to_string(path)?;
        let book = Book::from_json(&json, detector)?;
        info!(
            path = %path.display(),
            pages = book.page_count(),
            chapters = book.chapters.len(),
            "Book loaded"
        );
        Ok(book)
    }

    /// The sample book embedded at compile time.
    pub fn embedded(detector: &dyn ChapterDetector) -> Result<Self, ReaderError> {
        Book::from_json(EMBEDDED_BOOK_JSON, detector)
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn page(&self, number: u32) -> Option<&Page> {
        number
            .checked_sub(1)
            .and_then(|i| self.pages.get(i as usize))
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Stable content fingerprint over page texts and chapter boundaries.
    /// Identifies which book a cached index belongs to.
    pub fn fingerprint(&self) -> u64 {
        let mut parts: Vec<Vec<u8>> = Vec::with_capacity(self.pages.len() + self.chapters.len());
        for page in &self.pages {
            let mut bytes = page.text.as_bytes().to_vec();
            bytes.push(0);
            parts.push(bytes);
        }
        for ch in &self.chapters {
            parts.push(format!("{}|{}|{}|{}\0", ch.number, ch.title, ch.start_page, ch.end_page).into_bytes());
        }
        let slices: Vec<&[u8]> = parts.iter().map(Vec::as_slice).collect();
        stable_hash(&slices)
    }
}
