//! Per-query signal selection.

use crate::text::is_cjk;
use serde::Serialize;

/// Script class of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptClass {
    Cjk,
    Latin,
}

impl ScriptClass {
    pub fn is_cjk(&self) -> bool {
        matches!(self, ScriptClass::Cjk)
    }
}

/// Count CJK code points against other letters. CJK wins ties; text without
/// any letters is Latin.
pub fn classify(text: &str) -> ScriptClass {
    let (cjk, latin) = text.chars().fold((0usize, 0usize), |(cjk, latin), c| {
        if is_cjk(c) {
            (cjk + 1, latin)
        } else if c.is_alphabetic() {
            (cjk, latin + 1)
        } else {
            (cjk, latin)
        }
    });

    if cjk > 0 && cjk >= latin {
        ScriptClass::Cjk
    } else {
        ScriptClass::Latin
    }
}

/// Signals enabled for one query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LanguagePolicy {
    pub script: ScriptClass,
    pub use_lexical: bool,
    pub use_vector: bool,
    pub use_fuzzy: bool,
    pub fuzzy_threshold: f32,
}

/// Decide which signals run for `text`.
///
/// Lexical search relies on token boundaries, so it is off for CJK queries.
/// Fuzzy search only runs for CJK queries, with its similarity floor capped
/// at `cjk_cap` because n-gram similarity against long passages is small
/// even for exact substrings.
pub fn decide(
    text: &str,
    lexical_enabled: bool,
    fuzzy_enabled: bool,
    fuzzy_threshold: f32,
    cjk_cap: f32,
) -> LanguagePolicy {
    let script = classify(text);
    match script {
        ScriptClass::Cjk => LanguagePolicy {
            script,
            use_lexical: false,
            use_vector: true,
            use_fuzzy: fuzzy_enabled,
            fuzzy_threshold: fuzzy_threshold.min(cjk_cap),
        },
        ScriptClass::Latin => LanguagePolicy {
            script,
            use_lexical: lexical_enabled,
            use_vector: true,
            use_fuzzy: false,
            fuzzy_threshold,
        },
    }
}
