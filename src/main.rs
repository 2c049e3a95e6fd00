//! Book reader search engine: word, phrase, chapter and verse search over a pre-analyzed book.
//!
//! Binary crate entry point. All CLI logic is in the `cli` module.

// mimalloc returns freed pages to the OS promptly; index builds allocate many small postings.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod cli;

fn main() {
    cli::run();
}
