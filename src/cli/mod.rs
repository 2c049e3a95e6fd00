//! CLI layer: argument parsing, logging setup, command dispatch, and subcommand implementations.

pub mod args;

pub use args::*;

use std::path::Path;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use booksearch::chapters::HeadingDetector;
use booksearch::export::ExportDocument;
use booksearch::highlight::highlight_page;
use booksearch::index::{build_search_index, index_dir, load_search_index, save_search_index};
use booksearch::themes::{book_themes, dominant_theme, page_themes, ThemeLexicon};
use booksearch::{
    Book, IndexOptions, ReaderError, ReaderState, SearchEngine, SearchOptions, SearchResult,
};

// ─── CLI ─────────────────────────────────────────────────────────────

/// Search and read a pre-analyzed book: words, phrases, chapters and verses
#[derive(Parser, Debug)]
#[command(name = "booksearch", version, about, after_help = "\
Run 'booksearch <COMMAND> --help' for detailed options and examples.\n\
Common options: -b <FILE> (book JSON, default: embedded sample book)")]
pub(crate) struct Cli {
    /// Log level: error, warn, info, debug, trace (RUST_LOG overrides)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Search the book (word, phrase, chapter, verse, or all)
    Search(SearchArgs),

    /// Build the search index and save it to the on-disk cache
    Index(IndexArgs),

    /// List detected chapters
    Chapters(ChaptersArgs),

    /// Print one page, optionally with highlights and themes
    Page(PageArgs),

    /// Show book and index statistics
    Info(InfoArgs),
}

// ─── Main entry point ───────────────────────────────────────────────

pub fn run() {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_json);

    let result = match cli.command {
        Commands::Search(args) => cmd_search(args),
        Commands::Index(args) => cmd_index(args),
        Commands::Chapters(args) => cmd_chapters(args),
        Commands::Page(args) => cmd_page(args),
        Commands::Info(args) => cmd_info(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(level: &str, json: bool) {
    let level = match level {
        "error" | "warn" | "info" | "debug" | "trace" => level,
        _ => "warn",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

// ─── Shared helpers ─────────────────────────────────────────────────

fn load_book(args: &BookArgs) -> Result<Book, ReaderError> {
    let detector = match &args.heading_pattern {
        Some(pattern) => HeadingDetector::with_pattern(pattern)?,
        None => HeadingDetector::default(),
    };
    match &args.book {
        Some(path) => Book::load(path, &detector),
        None => Book::embedded(&detector),
    }
}

fn index_options(args: &IndexingArgs) -> IndexOptions {
    let mut options = IndexOptions::for_granularity(args.granularity);
    if args.keep_stopwords {
        options.filter_stopwords = false;
    }
    options
}

/// Engine for `book`, seeded from the disk cache when an index built from the
/// same content with the same index options exists. The flag tells whether
/// the cache was used.
fn open_engine(book: Book, options: SearchOptions, cache_dir: Option<&Path>) -> (SearchEngine, bool) {
    let Some(cache_dir) = cache_dir else {
        return (SearchEngine::new(book, options), false);
    };
    let fingerprint = book.fingerprint();
    match load_search_index(fingerprint, &options.index, cache_dir) {
        Ok(index) => {
            info!(fingerprint = format_args!("{:016x}", fingerprint), "Using cached search index");
            (SearchEngine::with_index(book, options, index), true)
        }
        Err(e @ ReaderError::IndexLoad { .. }) => {
            debug!(error = %e, "No cached index, building in memory");
            (SearchEngine::new(book, options), false)
        }
        Err(e) => {
            warn!(error = %e, "Ignoring unusable cached index");
            (SearchEngine::new(book, options), false)
        }
    }
}

// ─── Commands ───────────────────────────────────────────────────────

fn cmd_search(args: SearchArgs) -> Result<(), ReaderError> {
    let start = Instant::now();
    let book = load_book(&args.book)?;
    let options = SearchOptions {
        exact_match: args.exact,
        context_words: args.context_words,
        index: index_options(&args.indexing),
    };
    let cache_dir = (!args.no_cache).then(index_dir);
    let (engine, cached) = open_engine(book, options, cache_dir.as_deref());
    let mut state = ReaderState::new(engine.book().page_count());

    let results = engine.advanced_search(&args.query, args.mode, args.max_results);
    state.record_search(&args.query, args.mode, args.max_results, results);

    if let Some(dir) = cache_dir.as_deref().filter(|_| !cached && engine.is_indexed()) {
        if let Err(e) = save_search_index(engine.index(), dir) {
            warn!(error = %e, "Failed to save search index cache");
        }
    }
    let Some(query) = state.query() else {
        return Ok(());
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&query.results)?);
    } else {
        print_results(&query.results);
        eprintln!(
            "{} result(s) for '{}' [{}] in {:.1}ms",
            query.results.len(),
            query.query,
            query.mode,
            start.elapsed().as_secs_f64() * 1000.0
        );
    }

    if let Some(path) = &args.output {
        ExportDocument::from_query(&engine.book().title, query).write(path)?;
        eprintln!("Exported to {}", path.display());
    }
    Ok(())
}

fn print_results(results: &[SearchResult]) {
    for (i, result) in results.iter().enumerate() {
        match result {
            SearchResult::Word { page, count, excerpt, matched_term } => {
                println!("{:>3}. [word] p.{} '{}' x{}: {}", i + 1, page, matched_term, count, excerpt);
            }
            SearchResult::Phrase { page, excerpt, approximate } => {
                let tag = if *approximate { "phrase~" } else { "phrase" };
                println!("{:>3}. [{}] p.{}: {}", i + 1, tag, page, excerpt);
            }
            SearchResult::Chapter { number, title, start_page, end_page, .. } => {
                println!("{:>3}. [chapter] {} '{}' pp.{}-{}", i + 1, number, title, start_page, end_page);
            }
            SearchResult::Verse { page, chapter, verse, excerpt } => {
                println!("{:>3}. [verse] {}:{} p.{}: {}", i + 1, chapter, verse, page, excerpt);
            }
        }
    }
}

fn cmd_index(args: IndexArgs) -> Result<(), ReaderError> {
    let book = load_book(&args.book)?;
    let options = index_options(&args.indexing);
    let index = build_search_index(book.pages(), book.chapters(), book.fingerprint(), &options);
    let path = save_search_index(&index, &index_dir())?;
    let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
    eprintln!(
        "Index saved to {} ({:.1} KB, {} unique tokens, {} fragments)",
        path.display(),
        size as f64 / 1024.0,
        index.vocabulary_size(),
        index.phrase_index.len()
    );
    Ok(())
}

fn cmd_chapters(args: ChaptersArgs) -> Result<(), ReaderError> {
    let book = load_book(&args.book)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(book.chapters())?);
        return Ok(());
    }
    if book.chapters().is_empty() {
        eprintln!("No chapters detected in '{}'.", book.title);
        return Ok(());
    }
    for ch in book.chapters() {
        println!("{:>3}. {} (pp.{}-{})", ch.number, ch.title, ch.start_page, ch.end_page);
    }
    Ok(())
}

fn cmd_page(args: PageArgs) -> Result<(), ReaderError> {
    let book = load_book(&args.book)?;
    let mut state = ReaderState::new(book.page_count());
    let number = state.go_to(args.number)?;
    let Some(page) = book.page(number) else {
        return Err(ReaderError::PageOutOfRange { page: number, page_count: book.page_count() });
    };

    println!("── {} · page {}/{} ──", book.title, page.number, book.page_count());
    if args.highlight {
        println!("{}", highlight_page(page)?);
    } else {
        println!("{}", page.text);
    }

    if args.themes {
        let themes = page_themes(page, &ThemeLexicon::default());
        println!();
        for (theme, score) in &themes {
            println!("  {:<12} {:.2}", theme, score);
        }
        if let Some((theme, _)) = dominant_theme(&themes) {
            println!("  dominant: {}", theme);
        }
        println!("  difficulty: {:.2}", page.difficulty);
    }
    Ok(())
}

fn cmd_info(args: InfoArgs) -> Result<(), ReaderError> {
    let book = load_book(&args.book)?;
    let engine = SearchEngine::new(book, SearchOptions::default());
    let book = engine.book();
    let index = engine.index();

    println!("Title:      {}", book.title);
    if let Some(author) = &book.author {
        println!("Author:     {}", author);
    }
    println!("Pages:      {}", book.page_count());
    println!("Chapters:   {}", book.chapters().len());
    println!("Tokens:     {} ({} unique)", index.total_tokens, index.vocabulary_size());
    println!("Fragments:  {}", index.phrase_index.len());
    println!("Fingerprint: {:016x}", index.fingerprint);

    let themes = book_themes(book.pages(), &ThemeLexicon::default());
    if let Some((theme, score)) = dominant_theme(&themes) {
        println!("Dominant theme: {} ({:.2})", theme, score);
    }
    if !book.is_empty() {
        let avg = book.pages().iter().map(|p| p.difficulty).sum::<f64>() / book.pages().len() as f64;
        println!("Avg difficulty: {:.2}", avg);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use booksearch::{IndexGranularity, SearchMode};

    #[test]
    fn test_parse_search_defaults() {
        let cli = Cli::try_parse_from(["booksearch", "search", "governo"]).unwrap();
        match cli.command {
            Commands::Search(args) => {
                assert_eq!(args.query, "governo");
                assert_eq!(args.mode, SearchMode::All);
                assert_eq!(args.max_results, booksearch::DEFAULT_MAX_RESULTS);
                assert_eq!(args.indexing.granularity, IndexGranularity::Positions);
                assert!(!args.exact);
                assert!(args.book.book.is_none());
            }
            other => panic!("expected search, got {:?}", other),
        }
        assert_eq!(cli.log_level, "warn");
    }

    #[test]
    fn test_parse_search_options() {
        let cli = Cli::try_parse_from([
            "booksearch", "search", "2:3", "-m", "verse", "-n", "5", "-g", "counts",
            "--exact", "--log-level", "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "debug");
        match cli.command {
            Commands::Search(args) => {
                assert_eq!(args.mode, SearchMode::Verse);
                assert_eq!(args.max_results, 5);
                assert_eq!(args.indexing.granularity, IndexGranularity::Counts);
                assert!(args.exact);
            }
            other => panic!("expected search, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_mode() {
        assert!(Cli::try_parse_from(["booksearch", "search", "x", "--mode", "fuzzy"]).is_err());
    }

    #[test]
    fn test_index_options_keep_stopwords() {
        let args = IndexingArgs { granularity: IndexGranularity::Counts, keep_stopwords: true };
        let options = index_options(&args);
        assert_eq!(options.granularity, IndexGranularity::Counts);
        assert!(!options.filter_stopwords);
    }

    #[test]
    fn test_load_book_defaults_to_embedded() {
        let book = load_book(&BookArgs::default()).unwrap();
        assert_eq!(book.title, "Crônicas da Cidade Antiga");
        assert_eq!(book.chapters().len(), 4);
    }

    #[test]
    fn test_load_book_invalid_heading_pattern() {
        let args = BookArgs { book: None, heading_pattern: Some("(".to_string()) };
        assert!(matches!(load_book(&args), Err(ReaderError::InvalidRegex { .. })));
    }

    #[test]
    fn test_open_engine_without_cache_builds_lazily() {
        let book = Book::from_texts("T", ["o rei"]);
        let (engine, cached) = open_engine(book, SearchOptions::default(), None);
        assert!(!cached);
        assert!(!engine.is_indexed());
        assert_eq!(engine.search_word("rei", true).len(), 1);
    }

    #[test]
    fn test_open_engine_uses_cache_only_for_matching_stopword_setting() {
        let tmp = tempfile::tempdir().unwrap();
        let book = Book::from_texts("T", ["o povo e o rei"]);
        let filtered = SearchOptions { index: IndexOptions::counts(), ..SearchOptions::default() };
        let (first, cached) = open_engine(book.clone(), filtered.clone(), Some(tmp.path()));
        assert!(!cached);
        save_search_index(first.index(), tmp.path()).unwrap();

        let (again, cached) = open_engine(book.clone(), filtered, Some(tmp.path()));
        assert!(cached);
        assert!(again.search_word("o", true).is_empty());

        let keep = SearchOptions {
            index: IndexOptions { filter_stopwords: false, ..IndexOptions::counts() },
            ..SearchOptions::default()
        };
        let (engine, cached) = open_engine(book, keep, Some(tmp.path()));
        assert!(!cached);
        assert_eq!(engine.search_word("o", true)[0].count(), Some(2));
    }
}
