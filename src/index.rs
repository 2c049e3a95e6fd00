//! Search index: build, save and load the word, phrase and chapter indexes.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ReaderError;
use crate::{sentence_fragments, token_spans, Chapter, Page};

/// Common Portuguese and English function words, skipped when stopword filtering is on.
pub static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "a", "o", "as", "os", "um", "uma", "uns", "umas", "de", "do", "da", "dos", "das", "em",
        "no", "na", "nos", "nas", "por", "pelo", "pela", "para", "com", "sem", "e", "ou", "mas",
        "que", "se", "é", "era", "foi", "ao", "aos", "à", "às", "seu", "sua", "lhe", "não",
        // English
        "an", "and", "are", "at", "be", "but", "by", "for", "in", "is", "it", "of", "on", "or",
        "the", "to", "was", "with",
    ]
    .into_iter()
    .collect()
});

/// Pages per batch when the build logs progress.
pub const DEFAULT_BATCH_SIZE: usize = 100;

// ─── Options ─────────────────────────────────────────────────────────

/// How much detail the word index keeps per page.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexGranularity {
    /// Byte offsets of every occurrence (anchors excerpts at the exact token).
    #[default]
    Positions,
    /// Occurrence counts only (smaller index for large books).
    Counts,
}

impl fmt::Display for IndexGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IndexGranularity::Positions => "positions",
            IndexGranularity::Counts => "counts",
        })
    }
}

impl FromStr for IndexGranularity {
    type Err = ReaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positions" => Ok(IndexGranularity::Positions),
            "counts" => Ok(IndexGranularity::Counts),
            other => Err(ReaderError::InvalidArgs(format!(
                "Unknown index granularity '{}' (expected positions or counts)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexOptions {
    pub granularity: IndexGranularity,
    pub filter_stopwords: bool,
    pub batch_size: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        IndexOptions::positions()
    }
}

impl IndexOptions {
    /// Full-fidelity index: every token, every position.
    pub fn positions() -> Self {
        IndexOptions {
            granularity: IndexGranularity::Positions,
            filter_stopwords: false,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Compact index: counts only, stopwords skipped.
    pub fn counts() -> Self {
        IndexOptions {
            granularity: IndexGranularity::Counts,
            filter_stopwords: true,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn for_granularity(granularity: IndexGranularity) -> Self {
        match granularity {
            IndexGranularity::Positions => IndexOptions::positions(),
            IndexGranularity::Counts => IndexOptions::counts(),
        }
    }

    /// Names the settings that change index contents, e.g. `counts_nostop`.
    pub fn cache_key(&self) -> String {
        cache_key(self.granularity, self.filter_stopwords)
    }
}

fn cache_key(granularity: IndexGranularity, filter_stopwords: bool) -> String {
    if filter_stopwords {
        format!("{}_nostop", granularity)
    } else {
        granularity.to_string()
    }
}

// ─── Index types ─────────────────────────────────────────────────────

/// A word index posting: where one token occurs on one page.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PageOccurrences {
    pub page: u32,
    /// Byte offsets into the page's lowercased text. Empty in `Counts` granularity.
    pub positions: Vec<u32>,
    pub count: u32,
}

/// Word, phrase and chapter lookup structures for one book.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SearchIndex {
    /// Fingerprint of the book this index was built from
    pub fingerprint: u64,
    pub created_at: u64,
    pub granularity: IndexGranularity,
    /// Whether stopwords were left out of `word_index`
    pub filter_stopwords: bool,
    /// Chapters in detection order
    pub chapters: Vec<Chapter>,
    /// chapter number → position in `chapters` (a later detection of the same number wins)
    pub chapter_index: BTreeMap<u32, usize>,
    /// token (lowercased) → one posting per page, in page order
    pub word_index: HashMap<String, Vec<PageOccurrences>>,
    /// sentence fragment (lowercased) → pages containing it
    pub phrase_index: HashMap<String, Vec<u32>>,
    /// total tokens indexed
    pub total_tokens: u64,
}

impl SearchIndex {
    pub fn chapter(&self, number: u32) -> Option<&Chapter> {
        self.chapter_index
            .get(&number)
            .and_then(|&i| self.chapters.get(i))
    }

    pub fn vocabulary_size(&self) -> usize {
        self.word_index.len()
    }

    /// Same key as [`IndexOptions::cache_key`] for the options this index was built with.
    pub fn cache_key(&self) -> String {
        cache_key(self.granularity, self.filter_stopwords)
    }
}

// ─── Build ───────────────────────────────────────────────────────────

/// Build the search index in one blocking pass over all page text.
pub fn build_search_index(
    pages: &[Page],
    chapters: &[Chapter],
    fingerprint: u64,
    options: &IndexOptions,
) -> SearchIndex {
    let start = Instant::now();
    let keep_positions = options.granularity == IndexGranularity::Positions;
    let batch_size = options.batch_size.max(1);

    let mut word_index: HashMap<String, Vec<PageOccurrences>> = HashMap::new();
    let mut phrase_index: HashMap<String, Vec<u32>> = HashMap::new();
    let mut total_tokens: u64 = 0;

    for (batch_no, batch) in pages.chunks(batch_size).enumerate() {
        for page in batch {
            if page.text.is_empty() {
                continue;
            }
            let lowered = page.text.to_lowercase();

            // BTreeMap keeps per-page posting insertion deterministic
            let mut page_tokens: BTreeMap<&str, Vec<u32>> = BTreeMap::new();
            for (offset, token) in token_spans(&lowered) {
                total_tokens += 1;
                if options.filter_stopwords && STOP_WORDS.contains(token) {
                    continue;
                }
                page_tokens.entry(token).or_default().push(offset as u32);
            }

            for (token, positions) in page_tokens {
                let count = positions.len() as u32;
                let positions = if keep_positions { positions } else { Vec::new() };
                word_index
                    .entry(token.to_string())
                    .or_default()
                    .push(PageOccurrences { page: page.number, positions, count });
            }

            for fragment in sentence_fragments(&lowered) {
                let hits = phrase_index.entry(fragment.to_string()).or_default();
                if hits.last() != Some(&page.number) {
                    hits.push(page.number);
                }
            }
        }
        debug!(
            batch = batch_no + 1,
            pages_done = (batch_no * batch_size + batch.len()).min(pages.len()),
            pages_total = pages.len(),
            "Indexed page batch"
        );
    }

    if !keep_positions {
        word_index.shrink_to_fit();
        phrase_index.shrink_to_fit();
    }

    let mut chapter_index = BTreeMap::new();
    for (i, chapter) in chapters.iter().enumerate() {
        chapter_index.insert(chapter.number, i);
    }

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs();

    info!(
        pages = pages.len(),
        unique_tokens = word_index.len(),
        total_tokens,
        fragments = phrase_index.len(),
        chapters = chapters.len(),
        granularity = %options.granularity,
        elapsed_ms = format_args!("{:.1}", start.elapsed().as_secs_f64() * 1000.0),
        "Search index built"
    );

    SearchIndex {
        fingerprint,
        created_at: now,
        granularity: options.granularity,
        filter_stopwords: options.filter_stopwords,
        chapters: chapters.to_vec(),
        chapter_index,
        word_index,
        phrase_index,
        total_tokens,
    }
}

// ─── Cache file format ──────────────────────────────────────────────

/// Leading bytes of an LZ4-framed cache file.
pub const LZ4_MAGIC: &[u8; 4] = b"LZ4B";

/// Write `data` as `LZ4_MAGIC` followed by an LZ4 frame of its bincode encoding.
pub fn save_compressed<T: Serialize>(path: &Path, data: &T, label: &str) -> Result<(), ReaderError> {
    let start = Instant::now();

    let mut out = BufWriter::new(fs::File::create(path)?);
    out.write_all(LZ4_MAGIC)?;
    let mut frame = lz4_flex::frame::FrameEncoder::new(out);
    bincode::serialize_into(&mut frame, data)?;
    frame.finish().map_err(std::io::Error::other)?.flush()?;

    let bytes = fs::metadata(path)?.len();
    info!(
        label,
        size_kb = format_args!("{:.1}", bytes as f64 / 1024.0),
        elapsed_ms = format_args!("{:.1}", start.elapsed().as_secs_f64() * 1000.0),
        path = %path.display(),
        "Cache file written"
    );
    Ok(())
}

/// Read a file written by [`save_compressed`]. Files without the magic
/// prefix are decoded as bare bincode.
pub fn load_compressed<T: serde::de::DeserializeOwned>(path: &Path, label: &str) -> Result<T, ReaderError> {
    let start = Instant::now();
    let load_err = |message: String| ReaderError::IndexLoad {
        path: path.display().to_string(),
        message,
    };

    let raw = fs::read(path).map_err(|e| load_err(format!("cannot open file: {}", e)))?;
    let value = match raw.strip_prefix(LZ4_MAGIC.as_slice()) {
        Some(frame) => bincode::deserialize_from(lz4_flex::frame::FrameDecoder::new(frame))
            .map_err(|e| load_err(format!("LZ4 deserialization failed: {}", e)))?,
        None => bincode::deserialize(&raw).map_err(|e| load_err(format!("deserialization failed: {}", e)))?,
    };

    debug!(
        label,
        bytes = raw.len(),
        elapsed_ms = format_args!("{:.1}", start.elapsed().as_secs_f64() * 1000.0),
        path = %path.display(),
        "Cache file read"
    );
    Ok(value)
}

// ─── Index storage ───────────────────────────────────────────────────

/// Default index cache directory: `<local data dir>/booksearch`.
/// Tests pass a temporary directory instead.
pub fn index_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("booksearch")
}

/// `<fingerprint>_<cache key>.bidx` under `index_base`.
pub fn index_path_for(fingerprint: u64, cache_key: &str, index_base: &Path) -> PathBuf {
    index_base.join(format!("{:016x}_{}.bidx", fingerprint, cache_key))
}

/// Save an index under `index_base`; returns the file path.
pub fn save_search_index(index: &SearchIndex, index_base: &Path) -> Result<PathBuf, ReaderError> {
    fs::create_dir_all(index_base)?;
    let path = index_path_for(index.fingerprint, &index.cache_key(), index_base);
    save_compressed(&path, index, "search-index")?;
    Ok(path)
}

/// Load the cached index for a book built with `options`.
///
/// An index from different book content fails with `IndexMismatch`; one
/// built with other granularity or stopword settings fails with
/// `IndexOptionsMismatch`.
pub fn load_search_index(
    fingerprint: u64,
    options: &IndexOptions,
    index_base: &Path,
) -> Result<SearchIndex, ReaderError> {
    let expected = options.cache_key();
    let path = index_path_for(fingerprint, &expected, index_base);
    let index: SearchIndex = load_compressed(&path, "search-index")?;
    if index.fingerprint != fingerprint {
        return Err(ReaderError::IndexMismatch { expected: fingerprint, found: index.fingerprint });
    }
    let found = index.cache_key();
    if found != expected {
        return Err(ReaderError::IndexOptionsMismatch { expected, found });
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Book;

    fn build(texts: &[&str], options: &IndexOptions) -> SearchIndex {
        let book = Book::from_texts("T", texts.iter().copied());
        build_search_index(book.pages(), book.chapters(), book.fingerprint(), options)
    }

    #[test]
    fn test_word_index_positions_and_counts() {
        let index = build(&["O povo, o POVO e o rei", "nada"], &IndexOptions::positions());
        let povo = &index.word_index["povo"];
        assert_eq!(povo.len(), 1);
        assert_eq!(povo[0].page, 1);
        assert_eq!(povo[0].count, 2);
        assert_eq!(povo[0].positions, vec![2, 10]);
        assert_eq!(index.word_index["o"][0].count, 3);
        // seven tokens on page 1 plus "nada"
        assert_eq!(index.total_tokens, 8);
    }

    #[test]
    fn test_word_index_one_posting_per_page_in_page_order() {
        let index = build(&["fé", "sem", "fé fé"], &IndexOptions::positions());
        let pages: Vec<u32> = index.word_index["fé"].iter().map(|p| p.page).collect();
        assert_eq!(pages, vec![1, 3]);
        assert_eq!(index.word_index["fé"][1].count, 2);
    }

    #[test]
    fn test_positions_are_valid_in_lowered_text() {
        let text = "Ação e REAÇÃO: ação!";
        let index = build(&[text], &IndexOptions::positions());
        let lowered = text.to_lowercase();
        for p in &index.word_index["ação"][0].positions {
            let start = *p as usize;
            assert_eq!(&lowered[start..start + "ação".len()], "ação");
        }
        assert_eq!(index.word_index["ação"][0].count, 2);
    }

    #[test]
    fn test_counts_granularity_drops_positions_and_stopwords() {
        let index = build(&["O povo e o rei do povo"], &IndexOptions::counts());
        assert_eq!(index.granularity, IndexGranularity::Counts);
        assert!(!index.word_index.contains_key("o"));
        assert!(!index.word_index.contains_key("do"));
        let povo = &index.word_index["povo"][0];
        assert_eq!(povo.count, 2);
        assert!(povo.positions.is_empty());
        // stopwords still count toward the token total
        assert_eq!(index.total_tokens, 7);
    }

    #[test]
    fn test_counts_keep_stopwords_when_configured() {
        let options = IndexOptions { filter_stopwords: false, ..IndexOptions::counts() };
        let index = build(&["o povo"], &options);
        assert!(index.word_index.contains_key("o"));
    }

    #[test]
    fn test_phrase_index_fragments() {
        let index = build(
            &["Curto. A fé e a religião! A fé e a religião?", "a fé e a religião"],
            &IndexOptions::positions(),
        );
        assert_eq!(index.phrase_index["a fé e a religião"], vec![1, 2]);
        assert!(!index.phrase_index.contains_key("curto"));
    }

    #[test]
    fn test_empty_page_contributes_nothing() {
        let index = build(&["", "governo"], &IndexOptions::positions());
        assert_eq!(index.word_index.len(), 1);
        assert_eq!(index.word_index["governo"][0].page, 2);
        assert!(index.phrase_index.is_empty());
    }

    #[test]
    fn test_chapter_index_later_detection_wins() {
        let chapters = vec![
            Chapter::new(1, "Primeiro", 1, 1),
            Chapter::new(1, "Repetido", 2, 2),
        ];
        let pages = vec![Page::new(1, "a"), Page::new(2, "b")];
        let index = build_search_index(&pages, &chapters, 0, &IndexOptions::default());
        assert_eq!(index.chapter(1).unwrap().title, "Repetido");
        assert_eq!(index.chapters.len(), 2);
        assert!(index.chapter(2).is_none());
    }

    #[test]
    fn test_small_batch_size_same_result() {
        let texts = ["um dois", "dois três", "três quatro", "quatro um"];
        let a = build(&texts, &IndexOptions { batch_size: 1, ..IndexOptions::positions() });
        let b = build(&texts, &IndexOptions::positions());
        assert_eq!(a.word_index, b.word_index);
        assert_eq!(a.total_tokens, b.total_tokens);
    }

    #[test]
    fn test_granularity_from_str() {
        assert_eq!("counts".parse::<IndexGranularity>().unwrap(), IndexGranularity::Counts);
        assert_eq!(" Positions ".parse::<IndexGranularity>().unwrap(), IndexGranularity::Positions);
        assert!("bytes".parse::<IndexGranularity>().is_err());
    }

    // ─── Persistence ────────────────────────────────────────

    #[test]
    fn test_save_load_search_index_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let index = build(&["O governo decidiu", "Capítulo 2: Fim"], &IndexOptions::positions());
        let path = save_search_index(&index, tmp.path()).unwrap();
        assert!(path.exists());

        let raw = fs::read(&path).unwrap();
        assert_eq!(&raw[..4], LZ4_MAGIC);

        let loaded = load_search_index(index.fingerprint, &IndexOptions::positions(), tmp.path()).unwrap();
        assert_eq!(loaded.word_index, index.word_index);
        assert_eq!(loaded.phrase_index, index.phrase_index);
        assert_eq!(loaded.chapters, index.chapters);
    }

    #[test]
    fn test_load_search_index_rejects_other_book() {
        let tmp = tempfile::tempdir().unwrap();
        let index = build(&["um"], &IndexOptions::positions());
        let path = save_search_index(&index, tmp.path()).unwrap();

        // Place the file where another fingerprint would look for it
        let other = index_path_for(index.fingerprint ^ 1, &index.cache_key(), tmp.path());
        fs::rename(&path, &other).unwrap();
        let err = load_search_index(index.fingerprint ^ 1, &IndexOptions::positions(), tmp.path()).unwrap_err();
        assert!(matches!(err, ReaderError::IndexMismatch { .. }));
    }

    #[test]
    fn test_stopword_setting_selects_its_own_cache_file() {
        let tmp = tempfile::tempdir().unwrap();
        let filtered = build(&["o povo e o rei"], &IndexOptions::counts());
        save_search_index(&filtered, tmp.path()).unwrap();

        let keep = IndexOptions { filter_stopwords: false, ..IndexOptions::counts() };
        let err = load_search_index(filtered.fingerprint, &keep, tmp.path()).unwrap_err();
        assert!(matches!(err, ReaderError::IndexLoad { .. }), "got: {}", err);

        let loaded = load_search_index(filtered.fingerprint, &IndexOptions::counts(), tmp.path()).unwrap();
        assert!(loaded.filter_stopwords);
        assert!(!loaded.word_index.contains_key("o"));
    }

    #[test]
    fn test_load_search_index_rejects_other_stopword_setting() {
        let tmp = tempfile::tempdir().unwrap();
        let filtered = build(&["o povo e o rei"], &IndexOptions::counts());
        let path = save_search_index(&filtered, tmp.path()).unwrap();

        // a filtered index sitting under the unfiltered file name
        let keep = IndexOptions { filter_stopwords: false, ..IndexOptions::counts() };
        fs::rename(&path, index_path_for(filtered.fingerprint, &keep.cache_key(), tmp.path())).unwrap();
        let err = load_search_index(filtered.fingerprint, &keep, tmp.path()).unwrap_err();
        match err {
            ReaderError::IndexOptionsMismatch { expected, found } => {
                assert_eq!(expected, "counts");
                assert_eq!(found, "counts_nostop");
            }
            other => panic!("expected options mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_load_compressed_legacy_uncompressed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("legacy.bin");
        let data = vec!["legado".to_string(), "formato".to_string()];
        fs::write(&path, bincode::serialize(&data).unwrap()).unwrap();

        let loaded: Vec<String> = load_compressed(&path, "test").unwrap();
        assert_eq!(loaded, data);
    }

    #[test]
    fn test_load_compressed_missing_file_returns_err() {
        let result: Result<Vec<String>, _> = load_compressed(Path::new("/nonexistent/file.bidx"), "test");
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("Failed to load index"), "got: {}", msg);
    }

    #[test]
    fn test_load_compressed_corrupt_data() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("corrupt.bidx");
        fs::write(&path, b"LZ4Bthis is not a valid frame").unwrap();
        let result: Result<Vec<String>, _> = load_compressed(&path, "test");
        assert!(result.unwrap_err().to_string().contains("deserialization failed"));
    }

    #[test]
    fn test_cache_key_covers_granularity_and_stopwords() {
        let keep_counts = IndexOptions { filter_stopwords: false, ..IndexOptions::counts() };
        assert_eq!(IndexOptions::positions().cache_key(), "positions");
        assert_eq!(IndexOptions::counts().cache_key(), "counts_nostop");
        assert_eq!(keep_counts.cache_key(), "counts");

        let base = Path::new("/tmp/idx");
        assert_eq!(
            index_path_for(7, &keep_counts.cache_key(), base),
            base.join("0000000000000007_counts.bidx")
        );
        let index = build(&["o rei"], &keep_counts);
        assert_eq!(index.cache_key(), "counts");
    }
}
