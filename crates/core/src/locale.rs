//! Answer locale selection.

use serde::{Deserialize, Serialize};

/// Language used for fixed answer text, uncertainty phrasing and injection patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    En,
    Ja,
}

/// Configured locale; `Auto` follows the script of the question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalePreference {
    #[default]
    Auto,
    En,
    Ja,
}

impl LocalePreference {
    pub fn resolve(self, question_is_cjk: bool) -> Locale {
        match self {
            LocalePreference::En => Locale::En,
            LocalePreference::Ja => Locale::Ja,
            LocalePreference::Auto if question_is_cjk => Locale::Ja,
            LocalePreference::Auto => Locale::En,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_follows_question_script() {
        assert_eq!(LocalePreference::Auto.resolve(true), Locale::Ja);
        assert_eq!(LocalePreference::Auto.resolve(false), Locale::En);
        assert_eq!(LocalePreference::En.resolve(true), Locale::En);
    }
}
