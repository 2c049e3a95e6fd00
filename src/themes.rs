//! Theme scoring heuristics over keyword lexicons.

use std::collections::{BTreeMap, HashSet};

use crate::{token_spans, Page};

/// Keyword-hit rate at which a theme saturates to 1.0.
pub const SATURATION_RATE: f64 = 0.10;

/// Theme name → lowercase keywords signalling that theme.
#[derive(Debug, Clone)]
pub struct ThemeLexicon {
    themes: BTreeMap<String, HashSet<String>>,
}

impl Default for ThemeLexicon {
    fn default() -> Self {
        let mut lexicon = ThemeLexicon::empty();
        lexicon.insert("política", ["governo", "rei", "lei", "leis", "poder", "conselho", "estado", "palácio"]);
        lexicon.insert("religião", ["fé", "deus", "igreja", "templo", "religião", "sacerdote", "sacerdotes", "rezava"]);
        lexicon.insert("economia", ["imposto", "comércio", "ouro", "tesouro", "mercadores", "mercado", "sal"]);
        lexicon.insert("sociedade", ["povo", "camponeses", "terra", "praças", "ruas", "pão"]);
        lexicon.insert("guerra", ["revolução", "guarda", "armas", "batalha", "medo"]);
        lexicon
    }
}

impl ThemeLexicon {
    pub fn empty() -> Self {
        ThemeLexicon { themes: BTreeMap::new() }
    }

    pub fn insert<I, S>(&mut self, theme: &str, keywords: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.themes
            .entry(theme.to_string())
            .or_default()
            .extend(keywords.into_iter().map(|k| k.as_ref().to_lowercase()));
    }

    /// Score each theme in `[0, 1]`: keyword hits per token, scaled so that
    /// [`SATURATION_RATE`] maps to 1.0. Themes without hits are omitted.
    pub fn score(&self, text: &str) -> BTreeMap<String, f64> {
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = token_spans(&lowered).map(|(_, t)| t).collect();
        let mut scores = BTreeMap::new();
        if tokens.is_empty() {
            return scores;
        }
        for (theme, keywords) in &self.themes {
            let hits = tokens.iter().filter(|t| keywords.contains(**t)).count();
            if hits > 0 {
                let rate = hits as f64 / tokens.len() as f64;
                scores.insert(theme.clone(), (rate / SATURATION_RATE).min(1.0));
            }
        }
        scores
    }
}

/// Precomputed theme scores when the page carries them, computed ones otherwise.
pub fn page_themes(page: &Page, lexicon: &ThemeLexicon) -> BTreeMap<String, f64> {
    if page.themes.is_empty() {
        lexicon.score(&page.text)
    } else {
        page.themes.clone()
    }
}

/// Highest-scoring theme; ties go to the alphabetically first name.
pub fn dominant_theme(scores: &BTreeMap<String, f64>) -> Option<(&str, f64)> {
    scores
        .iter()
        .fold(None, |best: Option<(&str, f64)>, (name, &score)| match best {
            Some((_, top)) if top >= score => best,
            _ => Some((name.as_str(), score)),
        })
}

/// Average theme scores over all pages (pages lacking a theme count as 0).
pub fn book_themes(pages: &[Page], lexicon: &ThemeLexicon) -> BTreeMap<String, f64> {
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    if pages.is_empty() {
        return totals;
    }
    for page in pages {
        for (theme, score) in page_themes(page, lexicon) {
            *totals.entry(theme).or_default() += score;
        }
    }
    let n = pages.len() as f64;
    for score in totals.values_mut() {
        *score /= n;
    }
    totals
}
