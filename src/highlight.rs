//! Keyword and named-entity highlighting for a page's text.

use regex::Regex;

use crate::excerpt::mark_matches;
use crate::{Page, ReaderError};

pub const ENTITY_CLASS: &str = "entity";
pub const KEYWORD_CLASS: &str = "keyword";

/// Render a page's text with its entities and keywords wrapped in
/// `<mark class="entity">` / `<mark class="keyword">`. Matching is
/// case-insensitive and word-bounded; on overlap the longer term wins and an
/// entity beats a keyword of the same text.
pub fn highlight_page(page: &Page) -> Result<String, ReaderError> {
    highlight_terms(&page.text, &page.keywords, &page.entities)
}

pub fn highlight_terms(text: &str, keywords: &[String], entities: &[String]) -> Result<String, ReaderError> {
    let mut terms: Vec<(String, &'static str)> = Vec::new();
    for (list, class) in [(entities, ENTITY_CLASS), (keywords, KEYWORD_CLASS)] {
        for term in list {
            let term = term.trim().to_lowercase();
            if !term.is_empty() && !terms.iter().any(|(t, _)| *t == term) {
                terms.push((term, class));
            }
        }
    }
    if terms.is_empty() {
        return Ok(html_escape::encode_text(text).into_owned());
    }
    // stable sort keeps entities ahead of equal-length keywords
    terms.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));

    let alternation = terms
        .iter()
        .map(|(t, _)| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!(r"(?i)\b(?:{})\b", alternation);
    let re = Regex::new(&pattern).map_err(|e| ReaderError::InvalidRegex { pattern, source: e })?;

    Ok(mark_matches(text, &re, |matched| {
        let matched = matched.to_lowercase();
        terms
            .iter()
            .find(|(t, _)| *t == matched)
            .map(|(_, class)| *class)
    }))
}
