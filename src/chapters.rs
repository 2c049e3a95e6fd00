//! Chapter boundary detection over the page stream.
//!
//! Detection is a best-effort structural classifier: the default
//! [`HeadingDetector`] looks for "Capítulo N: Title" style headings near the
//! top of each page. Other heuristics plug in through [`ChapterDetector`].

use regex::Regex;
use tracing::debug;

use crate::error::ReaderError;
use crate::{Chapter, Page};

/// Default heading pattern. Group 1 = chapter number (arabic or roman), group 2 = title.
pub const DEFAULT_HEADING_PATTERN: &str =
    r"(?i)^\s*(?:cap[íi]tulo|chapter|cap\.)\s+(\d+|[ivxlcdm]+)\b\s*[:.\-–—]?\s*(.*?)\s*$";

const HEADING_SEPARATORS: [char; 5] = [':', '.', '-', '–', '—'];

/// Number of non-empty lines at the top of a page that may hold a heading.
pub const DEFAULT_SCAN_LINES: usize = 3;

/// Finds chapter boundaries in an ordered page list.
pub trait ChapterDetector {
    /// Chapters in detection order; each satisfies `start_page <= end_page`.
    fn detect(&self, pages: &[Page]) -> Vec<Chapter>;
}

/// Regex-driven heading detector.
#[derive(Debug, Clone)]
pub struct HeadingDetector {
    pattern: Regex,
    scan_lines: usize,
}

impl Default for HeadingDetector {
    fn default() -> Self {
        HeadingDetector {
            pattern: Regex::new(DEFAULT_HEADING_PATTERN).expect("default heading pattern is valid"),
            scan_lines: DEFAULT_SCAN_LINES,
        }
    }
}

impl HeadingDetector {
    /// Detector with a custom heading regex. The pattern needs two capture
    /// groups: the chapter number and the title.
    pub fn with_pattern(pattern: &str) -> Result<Self, ReaderError> {
        let re = Regex::new(pattern).map_err(|e| ReaderError::InvalidRegex {
            pattern: pattern.to_string(),
            source: e,
        })?;
        if re.captures_len() < 3 {
            return Err(ReaderError::InvalidArgs(format!(
                "Heading pattern '{}' needs two capture groups (number, title)",
                pattern
            )));
        }
        Ok(HeadingDetector { pattern: re, scan_lines: DEFAULT_SCAN_LINES })
    }

    pub fn scan_lines(mut self, lines: usize) -> Self {
        self.scan_lines = lines.max(1);
        self
    }

    /// Parse a heading from the top of one page: `(number, title)`.
    fn heading(&self, text: &str) -> Option<(u32, String)> {
        text.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .take(self.scan_lines)
            .find_map(|line| {
                let caps = self.pattern.captures(line)?;
                let raw = caps.get(1)?;
                let number = parse_chapter_number(raw.as_str())?;
                let title_match = caps.get(2);
                let title = title_match.map(|m| m.as_str().trim()).unwrap_or("");
                // a roman numeral followed by a title needs a separator: "Chapter mix up" is prose
                if !title.is_empty() && !raw.as_str().bytes().all(|b| b.is_ascii_digit()) {
                    let gap = title_match.map_or("", |m| line.get(raw.end()..m.start()).unwrap_or(""));
                    if !gap.contains(HEADING_SEPARATORS) {
                        return None;
                    }
                }
                let title = if title.is_empty() {
                    format!("Capítulo {}", number)
                } else {
                    title.to_string()
                };
                Some((number, title))
            })
    }
}

impl ChapterDetector for HeadingDetector {
    fn detect(&self, pages: &[Page]) -> Vec<Chapter> {
        let Some(last_page) = pages.last().map(|p| p.number) else {
            return Vec::new();
        };

        let starts: Vec<(u32, String, u32)> = pages
            .iter()
            .filter_map(|page| {
                self.heading(&page.text)
                    .map(|(number, title)| (number, title, page.number))
            })
            .collect();

        let chapters: Vec<Chapter> = starts
            .iter()
            .enumerate()
            .map(|(i, (number, title, start))| {
                let end = starts
                    .get(i + 1)
                    .map(|(_, _, next)| next.saturating_sub(1))
                    .unwrap_or(last_page);
                Chapter::new(*number, title.clone(), *start, end)
            })
            .collect();

        debug!(pages = pages.len(), chapters = chapters.len(), "Chapter detection finished");
        chapters
    }
}

/// Parse an arabic or roman chapter number. Zero is rejected.
pub fn parse_chapter_number(raw: &str) -> Option<u32> {
    if let Ok(n) = raw.parse::<u32>() {
        return (n > 0).then_some(n);
    }
    parse_roman(raw)
}

fn parse_roman(raw: &str) -> Option<u32> {
    let mut total: u32 = 0;
    let mut prev: u32 = 0;
    for c in raw.chars().rev() {
        let value = match c.to_ascii_lowercase() {
            'i' => 1,
            'v' => 5,
            'x' => 10,
            'l' => 50,
            'c' => 100,
            'd' => 500,
            'm' => 1000,
            _ => return None,
        };
        if value < prev {
            total = total.checked_sub(value)?;
        } else {
            total = total.checked_add(value)?;
            prev = value;
        }
    }
    // only canonical spellings count, so words like "civil" are not numerals
    (total > 0 && to_roman(total) == raw.to_ascii_lowercase()).then_some(total)
}

fn to_roman(mut n: u32) -> String {
    const DIGITS: [(u32, &str); 13] = [
        (1000, "m"), (900, "cm"), (500, "d"), (400, "cd"), (100, "c"), (90, "xc"),
        (50, "l"), (40, "xl"), (10, "x"), (9, "ix"), (5, "v"), (4, "iv"), (1, "i"),
    ];
    let mut out = String::new();
    for (value, digits) in DIGITS {
        while n >= value {
            out.push_str(digits);
            n -= value;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(texts: &[&str]) -> Vec<Page> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Page::new(i as u32 + 1, *t))
            .collect()
    }

    #[test]
    fn test_detect_single_heading_at_last_page() {
        let pages = pages(&["O governo decidiu", "A fé e a religião", "Capítulo 3: A Revolução"]);
        let chapters = HeadingDetector::default().detect(&pages);
        assert_eq!(chapters, vec![Chapter::new(3, "A Revolução", 3, 3)]);
    }

    #[test]
    fn test_detect_chapter_ranges_close_on_next_heading() {
        let pages = pages(&[
            "Capítulo 1: Origens\ntexto",
            "continua",
            "Capítulo 2 - Conflito\nmais",
            "fim",
        ]);
        let chapters = HeadingDetector::default().detect(&pages);
        assert_eq!(chapters.len(), 2);
        assert_eq!((chapters[0].start_page, chapters[0].end_page), (1, 2));
        assert_eq!(chapters[0].title, "Origens");
        assert_eq!((chapters[1].start_page, chapters[1].end_page), (3, 4));
        assert_eq!(chapters[1].title, "Conflito");
    }

    #[test]
    fn test_detect_roman_and_english_headings() {
        let pages = pages(&["CHAPTER IV. The Storm", "Chapter 5"]);
        let chapters = HeadingDetector::default().detect(&pages);
        assert_eq!(chapters[0].number, 4);
        assert_eq!(chapters[0].title, "The Storm");
        assert_eq!(chapters[1].number, 5);
        assert_eq!(chapters[1].title, "Capítulo 5");
    }

    #[test]
    fn test_heading_deep_in_page_is_ignored() {
        let pages = pages(&["um\ndois\ntrês\nCapítulo 9: Tarde demais"]);
        assert!(HeadingDetector::default().detect(&pages).is_empty());
    }

    #[test]
    fn test_detect_empty_pages() {
        assert!(HeadingDetector::default().detect(&[]).is_empty());
    }

    #[test]
    fn test_custom_pattern() {
        let detector = HeadingDetector::with_pattern(r"^Parte (\d+)\s*(.*)$").unwrap();
        let pages = pages(&["Parte 1 Início", "x", "Parte 2 Meio"]);
        let chapters = detector.detect(&pages);
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].pages, vec![1, 2]);
        assert_eq!(chapters[1].title, "Meio");
    }

    #[test]
    fn test_custom_pattern_invalid_regex() {
        let err = HeadingDetector::with_pattern("([unclosed").unwrap_err();
        assert!(matches!(err, ReaderError::InvalidRegex { .. }));
    }

    #[test]
    fn test_custom_pattern_missing_groups() {
        let err = HeadingDetector::with_pattern(r"^Parte \d+$").unwrap_err();
        assert!(matches!(err, ReaderError::InvalidArgs(_)));
    }

    #[test]
    fn test_parse_chapter_number() {
        assert_eq!(parse_chapter_number("12"), Some(12));
        assert_eq!(parse_chapter_number("XIV"), Some(14));
        assert_eq!(parse_chapter_number("ix"), Some(9));
        assert_eq!(parse_chapter_number("0"), None);
        assert_eq!(parse_chapter_number("abc"), None);
        assert_eq!(parse_chapter_number("civil"), None);
        assert_eq!(parse_chapter_number("iiii"), None);
        assert_eq!(parse_chapter_number("MCMXC"), Some(1990));
    }

    #[test]
    fn test_prose_after_chapter_word_is_not_a_heading() {
        let pages = pages(&["Chapter civil war", "Chapter mix up", "Capítulo vi - Seis", "Chapter X"]);
        let chapters = HeadingDetector::default().detect(&pages);
        let found: Vec<(u32, &str)> = chapters.iter().map(|c| (c.number, c.title.as_str())).collect();
        assert_eq!(found, vec![(6, "Seis"), (10, "Capítulo 10")]);
    }

    #[test]
    fn test_scan_lines_limits_heading_search() {
        let pages = pages(&["prefácio\nCapítulo 1: Tarde"]);
        assert_eq!(HeadingDetector::default().detect(&pages).len(), 1);
        assert!(HeadingDetector::default().scan_lines(1).detect(&pages).is_empty());
        // zero is raised to one line
        assert!(HeadingDetector::default().scan_lines(0).detect(&pages).is_empty());
    }
}
