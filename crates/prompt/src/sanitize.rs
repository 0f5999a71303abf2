//! Injection-pattern neutralization for untrusted evidence text.
//!
//! Lines that read like instruction overrides are replaced wholesale with
//! [`REDACTION_MARKER`] before the text can reach a generation back-end.

use regex::Regex;
use std::sync::LazyLock;

/// Replacement for a neutralized line.
pub const REDACTION_MARKER: &str = "[redacted: instruction-like content removed]";

macro_rules! injection_pattern {
    ($name:ident, $regex_str:expr) => {
        static $name: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new($regex_str).ok());
    };
}

// ── English ───────────────────────────────────────────────────────────────
injection_pattern!(
    RE_EN_IGNORE,
    r"(?i)\b(?:ignore|disregard|forget|override)\b.{0,40}\b(?:previous|prior|above|earlier|all|system)\b.{0,20}\b(?:instructions?|prompts?|rules?|directions?|context)\b"
);
injection_pattern!(
    RE_EN_ROLE,
    r"(?i)\b(?:you are now|act as|pretend to be|from now on,? you)\b"
);
injection_pattern!(
    RE_EN_SYSTEM,
    r"(?i)(?:^|\s)(?:system prompt|developer mode|jailbreak|new instructions?)\s*[:：]?"
);
injection_pattern!(
    RE_EN_REVEAL,
    r"(?i)\b(?:reveal|print|show|output)\b.{0,30}\b(?:system prompt|hidden instructions?|your instructions)\b"
);
injection_pattern!(
    RE_ROLE_TAG,
    r"(?i)^\s*(?:<\|?(?:system|assistant|im_start|im_end)\|?>|\[/?(?:inst|system)\]|###\s*(?:system|instruction))"
);

// ── Japanese ──────────────────────────────────────────────────────────────
injection_pattern!(
    RE_JA_IGNORE,
    r"(?:これまで|以前|上記|前)の(?:指示|命令|ルール|プロンプト)を(?:無視|忘れ|破棄)"
);
injection_pattern!(
    RE_JA_ROLE,
    r"(?:あなたは今から|今からあなたは|として振る舞|になりきって)"
);
injection_pattern!(
    RE_JA_SYSTEM,
    r"(?:システムプロンプト|開発者モード|新しい指示)(?:を|は|:|：)"
);

fn all_patterns() -> [&'static LazyLock<Option<Regex>>; 8] {
    [
        &RE_EN_IGNORE,
        &RE_EN_ROLE,
        &RE_EN_SYSTEM,
        &RE_EN_REVEAL,
        &RE_ROLE_TAG,
        &RE_JA_IGNORE,
        &RE_JA_ROLE,
        &RE_JA_SYSTEM,
    ]
}

/// Returns true if a single line matches any known override phrasing.
pub fn is_injection_line(line: &str) -> bool {
    all_patterns()
        .iter()
        .filter_map(|re| re.as_ref())
        .any(|re| re.is_match(line))
}

/// Replace every injection-like line with the redaction marker.
///
/// Returns the neutralized text and the number of lines replaced.
pub fn neutralize(text: &str) -> (String, usize) {
    let mut redacted = 0;
    let lines: Vec<&str> = text
        .lines()
        .map(|line| {
            if is_injection_line(line) {
                redacted += 1;
                REDACTION_MARKER
            } else {
                line
            }
        })
        .collect();

    (lines.join("\n"), redacted)
}

/// Opening or closing wrapper tag, any case.
static RE_MARKER_TAG: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)<(\s*/?\s*(?:source|untrusted_context))").ok());

/// Escape the structural markers so evidence cannot close its own wrapper.
pub(crate) fn escape_markers(text: &str) -> String {
    match RE_MARKER_TAG.as_ref() {
        Some(re) => re.replace_all(text, "&lt;$1").into_owned(),
        None => text.replace('<', "&lt;"),
    }
}
