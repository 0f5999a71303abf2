//! Answer segmentation into bullets and sentences.

use regex::Regex;
use std::sync::LazyLock;

static RE_BULLET: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*•]\s+|・\s*|\d{1,3}[.)]\s+)").ok());

/// Citation markers directly after a sentence terminator belong to that sentence.
static RE_TRAILING_MARKER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[ \t]*\[S\d+(?:\s*[,、]\s*S\d+)*\]").ok());

static RE_LIMIT_EN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,2}|one|two|three|four|five|six|seven|eight|nine|ten|a single|single)\s+sentences?\b",
    )
    .ok()
});

static RE_LIMIT_JA: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"([0-9０-９]{1,2}|[一二三四五六七八九十])\s*(?:文|センテンス)(?:で|以内|程度|に)").ok()
});

/// One unit of answer text before attribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    /// Index of the bullet or paragraph this sentence came from
    pub block: usize,
    pub bulleted: bool,
}

fn is_closing(c: char) -> bool {
    matches!(c, '"' | '\'' | ')' | ']' | '」' | '』' | '）' | '”' | '’' | '】')
}

fn bullet_marker_len(line: &str) -> Option<usize> {
    RE_BULLET
        .as_ref()
        .and_then(|re| re.find(line))
        .map(|m| m.end())
}

/// Split into blocks: each bullet item, or each blank-line separated
/// paragraph. Indented lines after a bullet continue it.
fn blocks(answer: &str) -> Vec<(String, bool)> {
    let mut blocks: Vec<(String, bool)> = Vec::new();
    let mut current: Option<(String, bool)> = None;

    for line in answer.lines() {
        if line.trim().is_empty() {
            blocks.extend(current.take());
            continue;
        }

        if let Some(len) = bullet_marker_len(line) {
            blocks.extend(current.take());
            current = Some((line[len..].trim().to_string(), true));
            continue;
        }

        let continues_bullet = line.starts_with(char::is_whitespace);
        match current.as_mut() {
            Some((text, bulleted)) if !*bulleted || continues_bullet => {
                text.push(' ');
                text.push_str(line.trim());
            }
            _ => {
                blocks.extend(current.take());
                current = Some((line.trim().to_string(), false));
            }
        }
    }
    blocks.extend(current);
    blocks.retain(|(text, _)| !text.is_empty());
    blocks
}

/// Split text into sentences.
///
/// `。！？` always end a sentence; `.!?` only when followed by whitespace,
/// a closing quote or bracket, a citation marker, or the end of the text.
/// Closing quotes and `[S<n>]` markers that follow the terminator stay with
/// the sentence they close.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let next = chars.peek().map(|(_, n)| *n);
        let terminal = match c {
            '。' | '！' | '？' => true,
            '.' | '!' | '?' => {
                next.map_or(true, |n| n.is_whitespace() || is_closing(n) || n == '[')
            }
            _ => false,
        };
        if !terminal {
            continue;
        }

        let mut end = i + c.len_utf8();
        while let Some(&(j, n)) = chars.peek() {
            if is_closing(n) || matches!(n, '。' | '！' | '？' | '!' | '?') {
                end = j + n.len_utf8();
                chars.next();
            } else {
                break;
            }
        }
        if let Some(re) = RE_TRAILING_MARKER.as_ref() {
            while let Some(m) = re.find(&text[end..]) {
                end += m.end();
            }
        }
        while chars.peek().is_some_and(|(j, _)| *j < end) {
            chars.next();
        }

        push_sentence(&text[start..end], &mut sentences);
        start = end;
    }
    push_sentence(&text[start..], &mut sentences);

    sentences
}

fn push_sentence(s: &str, sentences: &mut Vec<String>) {
    let s = s.trim();
    if !s.is_empty() {
        sentences.push(s.to_string());
    }
}

/// Segment an answer into sentence units tagged with their block.
pub fn segment_answer(answer: &str) -> Vec<Segment> {
    blocks(answer)
        .into_iter()
        .enumerate()
        .flat_map(|(block, (text, bulleted))| {
            split_sentences(&text)
                .into_iter()
                .map(move |text| Segment {
                    text,
                    block,
                    bulleted,
                })
        })
        .collect()
}

fn parse_count(raw: &str) -> Option<usize> {
    let lower = raw.to_lowercase();
    let word = match lower.as_str() {
        "one" | "a single" | "single" | "一" => Some(1),
        "two" | "二" => Some(2),
        "three" | "三" => Some(3),
        "four" | "四" => Some(4),
        "five" | "五" => Some(5),
        "six" | "六" => Some(6),
        "seven" | "七" => Some(7),
        "eight" | "八" => Some(8),
        "nine" | "九" => Some(9),
        "ten" | "十" => Some(10),
        _ => None,
    };
    if word.is_some() {
        return word;
    }

    // Full-width digits map onto ASCII
    let ascii: String = raw
        .chars()
        .map(|c| match c {
            '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
            _ => c,
        })
        .collect();
    ascii.parse().ok()
}

/// Sentence count explicitly requested in the question, if any.
pub fn requested_sentence_limit(question: &str) -> Option<usize> {
    [&RE_LIMIT_EN, &RE_LIMIT_JA]
        .into_iter()
        .filter_map(|re| re.as_ref())
        .find_map(|re| re.captures(question))
        .and_then(|caps| caps.get(1))
        .and_then(|m| parse_count(m.as_str()))
        .filter(|n| *n > 0)
}

/// Keep at most `limit` items, never fewer than one when any exist.
pub fn apply_sentence_limit<T>(mut items: Vec<T>, limit: Option<usize>) -> Vec<T> {
    if let Some(limit) = limit {
        items.truncate(limit.max(1));
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latin_sentences() {
        assert_eq!(
            split_sentences("Paris is the capital. It has 2.1 million residents! Really?"),
            vec!["Paris is the capital.", "It has 2.1 million residents!", "Really?"]
        );
    }

    #[test]
    fn test_japanese_sentences() {
        assert_eq!(
            split_sentences("東京は首都です。人口は多い！本当？"),
            vec!["東京は首都です。", "人口は多い！", "本当？"]
        );
    }

    #[test]
    fn test_markers_and_quotes_stay_with_sentence() {
        assert_eq!(
            split_sentences("Paris is the capital. [S1] He said \"yes.\" [S2, S3] Done"),
            vec![
                "Paris is the capital. [S1]",
                "He said \"yes.\" [S2, S3]",
                "Done"
            ]
        );
        assert_eq!(
            split_sentences("首都は東京です。[S1]人口は多い。"),
            vec!["首都は東京です。[S1]", "人口は多い。"]
        );
    }

    #[test]
    fn test_bullets_and_paragraphs() {
        let answer = "Summary line one. Line two.\n\n- First point. More detail.\n  continued here.\n* Second point\n1. Third point\n・四番目";
        let segments = segment_answer(answer);
        let texts: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "Summary line one.",
                "Line two.",
                "First point.",
                "More detail.",
                "continued here.",
                "Second point",
                "Third point",
                "四番目"
            ]
        );
        assert_eq!(segments[0].block, 0);
        assert!(!segments[0].bulleted);
        assert_eq!(segments[2].block, 1);
        assert_eq!(segments[4].block, 1);
        assert!(segments[4].bulleted);
        assert_eq!(segments[5].block, 2);
    }

    #[test]
    fn test_requested_sentence_limit() {
        assert_eq!(requested_sentence_limit("Explain it in 2 sentences."), Some(2));
        assert_eq!(requested_sentence_limit("Answer in one sentence"), Some(1));
        assert_eq!(requested_sentence_limit("Give me three sentences"), Some(3));
        assert_eq!(requested_sentence_limit("3文で説明してください"), Some(3));
        assert_eq!(requested_sentence_limit("二文以内で"), Some(2));
        assert_eq!(requested_sentence_limit("２文で"), Some(2));
        assert_eq!(requested_sentence_limit("What is the capital?"), None);
        assert_eq!(requested_sentence_limit("in 0 sentences"), None);
    }

    #[test]
    fn test_limit_never_empties() {
        assert_eq!(apply_sentence_limit(vec![1, 2, 3], Some(2)), vec![1, 2]);
        assert_eq!(apply_sentence_limit(vec![1, 2, 3], Some(0)), vec![1]);
        assert_eq!(apply_sentence_limit(vec![1, 2, 3], None), vec![1, 2, 3]);
    }
}
