//! CLI argument structs for all subcommands.

use std::path::PathBuf;

use clap::{Args, Parser};

use booksearch::{IndexGranularity, SearchMode, DEFAULT_CONTEXT_WORDS, DEFAULT_MAX_RESULTS};

/// Book selection shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct BookArgs {
    /// Book JSON file (default: the embedded sample book)
    #[arg(short, long)]
    pub book: Option<PathBuf>,

    /// Custom chapter heading regex with two groups: number, title
    #[arg(long)]
    pub heading_pattern: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct IndexingArgs {
    /// Word index granularity: positions (exact excerpts) or counts (smaller)
    #[arg(short, long, default_value = "positions")]
    pub granularity: IndexGranularity,

    /// Index stopwords even in counts granularity
    #[arg(long)]
    pub keep_stopwords: bool,
}

#[derive(Parser, Debug)]
#[command(after_long_help = r#"MODES:
  all      word search, phrase search (multi-word queries), chapter search,
           and verse search when the query holds a chapter:verse reference
  word     token search (substring over the vocabulary unless --exact)
  phrase   sentence-fragment lookup, approximate fallback for 4+ words
  chapter  chapter number or title substring
  verse    chapter:verse reference, e.g. 2:3 or 2.3

EXAMPLES:
  booksearch search governo --exact
  booksearch search "a fé e a religião" --mode phrase
  booksearch search 2:3 --mode verse --json
  booksearch search povo --book livro.json --max-results 10 -o resultados.json
"#)]
pub struct SearchArgs {
    /// Query text
    pub query: String,

    #[command(flatten)]
    pub book: BookArgs,

    #[command(flatten)]
    pub indexing: IndexingArgs,

    /// Search mode: all, word, phrase, chapter, verse
    #[arg(short, long, default_value = "all")]
    pub mode: SearchMode,

    /// Maximum number of results
    #[arg(short = 'n', long, default_value_t = DEFAULT_MAX_RESULTS)]
    pub max_results: usize,

    /// Exact token match for word searches
    #[arg(long)]
    pub exact: bool,

    /// Words of context on each side of a match (max 15)
    #[arg(short = 'C', long, default_value_t = DEFAULT_CONTEXT_WORDS)]
    pub context_words: usize,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,

    /// Also export results to a JSON file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Ignore the on-disk index cache and build in memory
    #[arg(long)]
    pub no_cache: bool,
}

#[derive(Parser, Debug)]
pub struct IndexArgs {
    #[command(flatten)]
    pub book: BookArgs,

    #[command(flatten)]
    pub indexing: IndexingArgs,
}

#[derive(Parser, Debug)]
pub struct ChaptersArgs {
    #[command(flatten)]
    pub book: BookArgs,

    /// Print chapters as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct PageArgs {
    /// Page number (1-based)
    pub number: u32,

    #[command(flatten)]
    pub book: BookArgs,

    /// Mark keywords and entities in the page text
    #[arg(long)]
    pub highlight: bool,

    /// Show theme scores and difficulty
    #[arg(long)]
    pub themes: bool,
}

#[derive(Parser, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub book: BookArgs,
}
