//! Tokenization shared by lexical search, compaction and attribution.
//!
//! Latin text is split on Unicode word boundaries and lowercased. CJK runs
//! have no word boundaries, so they become overlapping character bigrams.

use std::collections::{BTreeSet, HashSet};
use unicode_segmentation::UnicodeSegmentation;

/// Generic terms ignored when measuring question/evidence overlap.
pub const DEFAULT_STOP_TERMS: &[&str] = &[
    // English
    "a", "about", "all", "also", "an", "and", "any", "are", "as", "at", "be", "been", "but",
    "by", "can", "could", "did", "do", "does", "for", "from", "give", "had", "has", "have",
    "how", "i", "in", "into", "is", "it", "its", "list", "me", "much", "many", "of", "on",
    "or", "please", "say", "sentence", "sentences", "should", "show", "tell", "than", "that",
    "the", "their", "them", "there", "these", "they", "this", "those", "to", "was", "were",
    "what", "when", "where", "which", "who", "whom", "why", "will", "with", "would", "you",
    "your", "explain", "describe", "summarize", "document", "documents",
    // Japanese question scaffolding (bigrams)
    "とは", "です", "すか", "ます", "まし", "した", "につ", "つい", "いて", "教え", "えて",
    "くだ", "ださ", "さい", "何で", "何が", "何を", "どの", "どう", "うな", "よう", "ような",
    "文で", "以内",
];

/// Whether a character belongs to a CJK script.
pub fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{3040}'..='\u{309F}'   // Hiragana
        | '\u{30A0}'..='\u{30FF}' // Katakana
        | '\u{31F0}'..='\u{31FF}' // Katakana phonetic extensions
        | '\u{3400}'..='\u{4DBF}' // CJK extension A
        | '\u{4E00}'..='\u{9FFF}' // CJK unified ideographs
        | '\u{AC00}'..='\u{D7AF}' // Hangul syllables
        | '\u{F900}'..='\u{FAFF}' // CJK compatibility ideographs
        | '\u{FF66}'..='\u{FF9F}' // Halfwidth katakana
        | '\u{20000}'..='\u{2A6DF}'
    )
}

/// Split text into lowercase Latin words and CJK bigrams, in text order.
///
/// A CJK run of a single character yields that character.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut latin = String::new();
    let mut cjk: Vec<char> = Vec::new();

    for c in text.chars() {
        if is_cjk(c) {
            if !latin.is_empty() {
                push_latin(&latin, &mut tokens);
                latin.clear();
            }
            cjk.push(c);
        } else {
            if !cjk.is_empty() {
                push_cjk(&cjk, &mut tokens);
                cjk.clear();
            }
            latin.push(c);
        }
    }
    push_latin(&latin, &mut tokens);
    push_cjk(&cjk, &mut tokens);

    tokens
}

fn push_latin(segment: &str, tokens: &mut Vec<String>) {
    tokens.extend(
        segment
            .unicode_words()
            .map(str::to_lowercase)
            .filter(|w| w.chars().any(char::is_alphanumeric)),
    );
}

fn push_cjk(run: &[char], tokens: &mut Vec<String>) {
    match run.len() {
        0 => {}
        1 => tokens.push(run[0].to_string()),
        _ => tokens.extend(run.windows(2).map(|pair| pair.iter().collect::<String>())),
    }
}

/// Stop-term set used for overlap measurements.
#[derive(Debug, Clone)]
pub struct StopTerms {
    terms: HashSet<String>,
}

impl StopTerms {
    /// Build from configuration; `None` selects the built-in list.
    pub fn from_config(terms: Option<&[String]>) -> Self {
        match terms {
            Some(custom) => Self {
                terms: custom.iter().map(|t| t.to_lowercase()).collect(),
            },
            None => Self::default(),
        }
    }

    pub fn contains(&self, term: &str) -> bool {
        self.terms.contains(term)
    }

    /// Distinct content terms of `text`.
    pub fn content_terms(&self, text: &str) -> BTreeSet<String> {
        tokenize(text)
            .into_iter()
            .filter(|t| !self.contains(t))
            .collect()
    }
}

impl Default for StopTerms {
    fn default() -> Self {
        Self {
            terms: DEFAULT_STOP_TERMS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// Character-trigram set over normalized text (lowercased, whitespace collapsed).
pub fn char_trigrams(text: &str) -> HashSet<String> {
    let normalized: Vec<char> = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .chars()
        .collect();

    normalized
        .windows(3)
        .map(|w| w.iter().collect::<String>())
        .collect()
}

/// Trigram Jaccard similarity in `[0, 1]`.
pub fn trigram_similarity(a: &str, b: &str) -> f64 {
    let ta = char_trigrams(a);
    let tb = char_trigrams(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let shared = ta.intersection(&tb).count();
    let union = ta.len() + tb.len() - shared;
    shared as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latin_words_are_lowercased() {
        assert_eq!(
            tokenize("Paris is the Capital, isn't it?"),
            vec!["paris", "is", "the", "capital", "isn't", "it"]
        );
    }

    #[test]
    fn test_cjk_runs_become_bigrams() {
        assert_eq!(tokenize("東京都"), vec!["東京", "京都"]);
        assert_eq!(tokenize("日 本"), vec!["日", "本"]);
    }

    #[test]
    fn test_mixed_script() {
        assert_eq!(tokenize("GDPの成長"), vec!["gdp", "の成", "成長"]);
    }

    #[test]
    fn test_content_terms_drop_stop_terms() {
        let stop = StopTerms::default();
        let terms = stop.content_terms("What is the capital of France?");
        assert_eq!(
            terms.into_iter().collect::<Vec<_>>(),
            vec!["capital", "france"]
        );
    }

    #[test]
    fn test_custom_stop_terms_replace_defaults() {
        let stop = StopTerms::from_config(Some(&["Capital".to_string()]));
        let terms = stop.content_terms("the capital");
        assert_eq!(terms.into_iter().collect::<Vec<_>>(), vec!["the"]);
    }

    #[test]
    fn test_trigram_similarity() {
        assert_eq!(trigram_similarity("abc", "abc"), 1.0);
        assert_eq!(trigram_similarity("ab", "abc"), 0.0);
        let sim = trigram_similarity("東京都の人口", "東京都の人口は約1400万人です");
        assert!(sim > 0.0 && sim < 1.0);
    }
}
