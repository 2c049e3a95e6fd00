//! Highlighted context snippets around a matched term.

use html_escape::encode_text;
use regex::Regex;

use crate::{FALLBACK_EXCERPT_CHARS, MAX_CONTEXT_WORDS};

/// Excerpt around the first case-insensitive occurrence of `term` in `text`.
///
/// Falls back to the first [`FALLBACK_EXCERPT_CHARS`] characters when the
/// term does not occur.
///
/// ```
/// use booksearch::build_excerpt;
///
/// let excerpt = build_excerpt("um dois três quatro cinco", "Três", 1);
/// assert_eq!(excerpt, "... dois <mark>três</mark> quatro ...");
/// ```
pub fn build_excerpt(text: &str, term: &str, context_words: usize) -> String {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return fallback_excerpt(text);
    }
    let lowered = text.to_lowercase();
    match lowered.find(&needle) {
        Some(offset) => excerpt_at(text, &lowered, offset, term, context_words),
        None => fallback_excerpt(text),
    }
}

/// Excerpt around the first whole-token occurrence of `token` in `text`.
///
/// Unlike [`build_excerpt`], an occurrence inside a longer word is skipped and
/// only whole tokens are marked. Falls back to [`build_excerpt`] when the term
/// never stands alone.
pub fn build_token_excerpt(text: &str, token: &str, context_words: usize) -> String {
    let lowered = text.to_lowercase();
    let found = term_regex(&token.trim().to_lowercase(), true).and_then(|re| re.find(&lowered).map(|m| m.start()));
    match found {
        Some(offset) => token_excerpt_at(text, &lowered, offset, token, context_words),
        None => build_excerpt(text, token, context_words),
    }
}

/// Excerpt anchored at byte `offset` of `haystack`.
///
/// `haystack` is the text the offset was computed against: the lowercased
/// page text for index positions, or `text` itself for raw-text matches.
/// Words before the match are counted in `haystack`, the window is cut from
/// the whitespace split of `text`.
pub fn excerpt_at(text: &str, haystack: &str, offset: usize, term: &str, context_words: usize) -> String {
    match word_window(text, haystack, offset, term, context_words) {
        Some(snippet) => highlight_term(&snippet, term),
        None => fallback_excerpt(text),
    }
}

/// [`excerpt_at`] that marks `token` only where it stands as a whole token.
pub fn token_excerpt_at(text: &str, haystack: &str, offset: usize, token: &str, context_words: usize) -> String {
    match word_window(text, haystack, offset, token, context_words) {
        Some(snippet) => highlight_token(&snippet, token),
        None => fallback_excerpt(text),
    }
}

fn word_window(text: &str, haystack: &str, offset: usize, term: &str, context_words: usize) -> Option<String> {
    let prefix = haystack.get(..offset)?;
    let mut words_before = prefix.split_whitespace().count();
    // match starts inside a word: that word is the match, not context
    if !prefix.is_empty() && !prefix.ends_with(char::is_whitespace) {
        words_before = words_before.saturating_sub(1);
    }

    let context = context_words.min(MAX_CONTEXT_WORDS);
    let words: Vec<&str> = text.split_whitespace().collect();
    let term_words = term.split_whitespace().count().max(1);

    let end = (words_before + term_words + context).min(words.len());
    let start = words_before.saturating_sub(context).min(end);

    let mut snippet = String::new();
    if start > 0 {
        snippet.push_str("... ");
    }
    snippet.push_str(&words[start..end].join(" "));
    if end < words.len() {
        snippet.push_str(" ...");
    }
    Some(snippet)
}

/// Case-insensitive matcher for `term`. `bounded` adds `\b` on each side
/// that starts or ends with a word character.
fn term_regex(term: &str, bounded: bool) -> Option<Regex> {
    let term = term.trim();
    if term.is_empty() {
        return None;
    }
    let is_word = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric() || c == '_');
    let lead = if bounded && is_word(term.chars().next()) { r"\b" } else { "" };
    let tail = if bounded && is_word(term.chars().last()) { r"\b" } else { "" };
    Regex::new(&format!("(?i){}{}{}", lead, regex::escape(term), tail)).ok()
}

/// Wrap every case-insensitive occurrence of `term` in `<mark>`; other text is HTML-escaped.
pub fn highlight_term(snippet: &str, term: &str) -> String {
    match term_regex(term, false) {
        Some(re) => mark_matches(snippet, &re, |_| None),
        None => encode_text(snippet).into_owned(),
    }
}

/// Like [`highlight_term`], but a match inside a longer word is left unmarked.
pub fn highlight_token(snippet: &str, token: &str) -> String {
    match term_regex(token, true) {
        Some(re) => mark_matches(snippet, &re, |_| None),
        None => encode_text(snippet).into_owned(),
    }
}

/// Render `text` with every `re` match wrapped in a `<mark>` tag.
///
/// `class_of` picks an optional CSS class for a matched string.
pub(crate) fn mark_matches<F>(text: &str, re: &Regex, class_of: F) -> String
where
    F: Fn(&str) -> Option<&'static str>,
{
    let mut out = String::with_capacity(text.len() + 16);
    let mut last = 0;
    for m in re.find_iter(text) {
        if m.as_str().is_empty() {
            continue;
        }
        out.push_str(&encode_text(&text[last..m.start()]));
        match class_of(m.as_str()) {
            Some(class) => {
                out.push_str("<mark class=\"");
                out.push_str(class);
                out.push_str("\">");
            }
            None => out.push_str("<mark>"),
        }
        out.push_str(&encode_text(m.as_str()));
        out.push_str("</mark>");
        last = m.end();
    }
    out.push_str(&encode_text(&text[last..]));
    out
}

/// First [`FALLBACK_EXCERPT_CHARS`] characters, with `...` when truncated.
pub fn fallback_excerpt(text: &str) -> String {
    let mut chars = text.char_indices();
    match chars.nth(FALLBACK_EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", encode_text(&text[..cut])),
        None => encode_text(text).into_owned(),
    }
}
