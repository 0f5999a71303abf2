//! Front-matter and navigation noise filter.
//!
//! Tables of contents, lists of figures, acknowledgments and copyright pages
//! rank well lexically but rarely answer anything.

use crate::types::FusedHit;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Fraction of a line's non-space characters that must be leader dots.
const DOT_LEADER_RATIO: f64 = 0.35;

/// Dot-leader lines needed before a passage counts as a listing.
const MIN_DOT_LEADER_LINES: usize = 2;

/// Share of tokens that are roman numerals in a front-matter page.
const ROMAN_TOKEN_RATIO: f64 = 0.15;
const MIN_ROMAN_TOKENS: usize = 3;

/// Longest line still treated as a possible section heading.
const MAX_HEADING_CHARS: usize = 80;

/// A noise heading on its own line, or followed by a colon, leaders, a page
/// number or a copyright mark. Matched per line.
static RE_NOISE_HEADING: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:(?:table of contents|contents|list of (?:figures|tables|illustrations|abbreviations)|acknowledge?ments?|preface|foreword|copyright)\b|(?:目次|図目次|表目次|謝辞|まえがき|序文|奥付|著作権))\s*(?:$|[:：]|[.…·・]{2,}|\d+\s*$|©|\(c\)|\d{4}\b)",
    )
    .ok()
});

/// Copyright-page boilerplate anywhere in a passage.
static RE_NOISE_MARKER: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)\ball rights reserved\b|\bisbn(?:-1[03])?[\s:]*[\dx][\dx -]{8,}").ok()
});

/// Question asks about a noise category itself.
static RE_NOISE_QUESTION: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:table of contents|\btoc\b|list of (?:figures|tables|illustrations|abbreviations)|acknowledge?ments?|\bpreface\b|\bforeword\b|copyright|\bisbn\b|目次|謝辞|まえがき|序文|奥付|著作権)",
    )
    .ok()
});

static RE_ROMAN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^(?i)m{0,3}(?:cm|cd|d?c{0,3})(?:xc|xl|l?x{0,3})(?:ix|iv|v?i{0,3})$").ok()
});

fn matches(re: &LazyLock<Option<Regex>>, text: &str) -> bool {
    re.as_ref().is_some_and(|re| re.is_match(text))
}

fn is_dot_leader_line(line: &str) -> bool {
    let visible: Vec<char> = line.chars().filter(|c| !c.is_whitespace()).collect();
    if visible.len() < 6 {
        return false;
    }
    let dots = visible
        .iter()
        .filter(|c| matches!(c, '.' | '…' | '．' | '・' | '·'))
        .count();
    dots as f64 / visible.len() as f64 > DOT_LEADER_RATIO
}

fn is_roman_heavy(text: &str) -> bool {
    let tokens: Vec<&str> = text
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | '.' | ';' | ':' | '(' | ')'))
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.is_empty() {
        return false;
    }
    // A lone capital "I" is usually the pronoun.
    let roman = tokens
        .iter()
        .filter(|t| **t != "I" && matches(&RE_ROMAN, t))
        .count();
    roman >= MIN_ROMAN_TOKENS && roman as f64 / tokens.len() as f64 >= ROMAN_TOKEN_RATIO
}

/// Whether a passage looks like front matter or navigation.
pub fn is_noise(text: &str) -> bool {
    let heading = text.lines().any(|line| {
        line.chars().count() <= MAX_HEADING_CHARS && matches(&RE_NOISE_HEADING, line)
    });
    if heading || matches(&RE_NOISE_MARKER, text) {
        return true;
    }
    let leader_lines = text.lines().filter(|l| is_dot_leader_line(l)).count();
    leader_lines >= MIN_DOT_LEADER_LINES || is_roman_heavy(text)
}

/// Whether the question explicitly asks for a noise category.
pub fn question_requests_noise(question: &str) -> bool {
    matches(&RE_NOISE_QUESTION, question)
}

/// What the filter did for one request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NoiseReport {
    pub bypassed: bool,
    pub noise_candidates: usize,
    pub backfilled: usize,
}

/// Keep up to `keep` hits, preferring non-noise ones.
///
/// Stable partition: non-noise hits fill the list in fused order, then noise
/// hits backfill (in fused order) only if the quota is unmet. When the
/// question asks about the noise category, the first `keep` hits are kept
/// unchanged.
pub fn filter_noise(question: &str, hits: Vec<FusedHit>, keep: usize) -> (Vec<FusedHit>, NoiseReport) {
    if question_requests_noise(question) {
        let mut hits = hits;
        hits.truncate(keep);
        return (
            hits,
            NoiseReport {
                bypassed: true,
                ..Default::default()
            },
        );
    }

    let (clean, noisy): (Vec<FusedHit>, Vec<FusedHit>) = hits
        .into_iter()
        .partition(|hit| !is_noise(&hit.passage().text));

    let noise_candidates = noisy.len();
    let mut kept: Vec<FusedHit> = clean.into_iter().take(keep).collect();
    let shortfall = keep.saturating_sub(kept.len());
    kept.extend(noisy.into_iter().take(shortfall));
    let backfilled = kept.len().saturating_sub(keep - shortfall);

    if noise_candidates > 0 {
        tracing::debug!(noise_candidates, backfilled, "Noise filter applied");
    }

    (
        kept,
        NoiseReport {
            bypassed: false,
            noise_candidates,
            backfilled,
        },
    )
}
