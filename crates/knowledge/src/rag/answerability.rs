//! Answerability verdicts and fixed fallback text.
//!
//! The base verdict comes from unit citations. Two guards run afterwards and
//! can only turn an answerable verdict into a non-answerable one.

use crate::rag::types::{AnswerUnit, Answerability, ReasonCode};
use crate::text::StopTerms;
use crate::types::EvidenceSlice;
use grounded_core::Locale;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static RE_UNCERTAIN_EN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bi\s+(?:do\s+not|don't|don’t)\s+know\b|\bi\s+(?:cannot|can't|can’t|am\s+unable\s+to)\s+(?:determine|find|answer|tell)\b|\b(?:cannot|can't|can’t)\s+be\s+determined\b|\bnot\s+(?:mentioned|stated|specified|covered)\s+in\s+the\s+(?:provided\s+)?(?:documents?|sources?|context|evidence)\b|\b(?:no|insufficient|not\s+enough)\s+information\s+(?:about|on|regarding|to)\b|\bthe\s+(?:provided\s+)?(?:documents?|sources?|context)\s+(?:do(?:es)?\s+not|don't|doesn't)\s+(?:contain|mention|say|specify|provide)\b",
    )
    .ok()
});

static RE_UNCERTAIN_JA: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"分かりません|わかりません|分からない|わからない|不明です|判断できません|特定できません|記載されていません|記載がありません|見当たりません|情報がありません|お答えできません|答えられません",
    )
    .ok()
});

/// Whether text hedges with "I don't know" phrasing (English or Japanese).
pub fn expresses_uncertainty(text: &str) -> bool {
    [&RE_UNCERTAIN_EN, &RE_UNCERTAIN_JA]
        .into_iter()
        .filter_map(|re| re.as_ref())
        .any(|re| re.is_match(text))
}

/// Question terms that also appear in the cited evidence.
pub fn lexical_overlap(
    question: &str,
    cited: &[&EvidenceSlice],
    stop_terms: &StopTerms,
) -> BTreeSet<String> {
    let question_terms = stop_terms.content_terms(question);
    let evidence_terms: BTreeSet<String> = cited
        .iter()
        .flat_map(|slice| stop_terms.content_terms(&slice.text))
        .collect();
    question_terms
        .intersection(&evidence_terms)
        .cloned()
        .collect()
}

/// Everything needed to judge one answer.
pub struct Assessment<'a> {
    pub question: &'a str,
    pub answer: &'a str,
    pub units: &'a [AnswerUnit],
    pub evidence: &'a [EvidenceSlice],
    /// Run the lexical-overlap guard
    pub overlap_guard: bool,
    pub locale: Locale,
}

impl Assessment<'_> {
    /// Base verdict, then the uncertainty override, then the overlap guard.
    pub fn verdict(&self, stop_terms: &StopTerms) -> Answerability {
        let base = self.base();
        if !base.answerable {
            return base;
        }

        if expresses_uncertainty(self.answer)
            || self.units.iter().any(|u| expresses_uncertainty(&u.text))
        {
            tracing::info!("Answer declares uncertainty, marking insufficient");
            return self.not_answerable(ReasonCode::InsufficientEvidence, Reason::Uncertain);
        }

        if self.overlap_guard {
            let cited = self.cited_evidence();
            if lexical_overlap(self.question, &cited, stop_terms).is_empty() {
                tracing::info!("No question terms in cited evidence, marking insufficient");
                return self.not_answerable(ReasonCode::InsufficientEvidence, Reason::NoOverlap);
            }
        }

        base
    }

    fn base(&self) -> Answerability {
        if self.evidence.is_empty() {
            self.not_answerable(ReasonCode::NoSources, Reason::NoEvidence)
        } else if self.units.is_empty() {
            self.not_answerable(ReasonCode::Other, Reason::Empty)
        } else if self.units.iter().all(|u| !u.is_cited()) {
            self.not_answerable(ReasonCode::InsufficientEvidence, Reason::Uncited)
        } else {
            Answerability::answerable()
        }
    }

    /// Evidence slices referenced by at least one unit.
    fn cited_evidence(&self) -> Vec<&EvidenceSlice> {
        self.evidence
            .iter()
            .filter(|slice| {
                self.units.iter().any(|u| {
                    u.citations
                        .iter()
                        .any(|c| c.source_id == slice.source_id)
                })
            })
            .collect()
    }

    fn not_answerable(&self, code: ReasonCode, reason: Reason) -> Answerability {
        self.with_suggestions(Answerability::not_answerable(
            code,
            reason.text(self.locale),
        ))
    }

    fn with_suggestions(&self, mut verdict: Answerability) -> Answerability {
        if let Some(code) = verdict.reason_code {
            verdict.suggestions = suggestions(code, self.locale);
        }
        verdict
    }
}

#[derive(Debug, Clone, Copy)]
enum Reason {
    NoEvidence,
    Empty,
    Uncited,
    Uncertain,
    NoOverlap,
}

impl Reason {
    fn text(self, locale: Locale) -> &'static str {
        match (self, locale) {
            (Reason::NoEvidence, Locale::En) => "No passages were retrieved for this question.",
            (Reason::NoEvidence, Locale::Ja) => "この質問に該当する箇所が取得できませんでした。",
            (Reason::Empty, Locale::En) => "No answer text could be composed.",
            (Reason::Empty, Locale::Ja) => "回答文を作成できませんでした。",
            (Reason::Uncited, Locale::En) => "No part of the answer could be tied to the evidence.",
            (Reason::Uncited, Locale::Ja) => "回答のどの部分も根拠と対応付けられませんでした。",
            (Reason::Uncertain, Locale::En) => "The answer states that the documents do not say.",
            (Reason::Uncertain, Locale::Ja) => "回答自体が資料からは判断できないと述べています。",
            (Reason::NoOverlap, Locale::En) => {
                "The cited evidence shares no terms with the question."
            }
            (Reason::NoOverlap, Locale::Ja) => "引用された根拠に質問の語句が含まれていません。",
        }
    }
}

/// Follow-up suggestions shown with a non-answerable verdict.
pub fn suggestions(code: ReasonCode, locale: Locale) -> Vec<String> {
    let items: &[&str] = match (code, locale) {
        (ReasonCode::NoSources, Locale::En) => &[
            "Check that the documents you expect are selected.",
            "Try different keywords or a broader question.",
        ],
        (ReasonCode::NoSources, Locale::Ja) => &[
            "対象の資料が選択されているか確認してください。",
            "別のキーワードや、より広い質問をお試しください。",
        ],
        (ReasonCode::InsufficientEvidence, Locale::En) => &[
            "Ask a more specific question using terms from the documents.",
            "Open the retrieved passages to check them directly.",
        ],
        (ReasonCode::InsufficientEvidence, Locale::Ja) => &[
            "資料中の言葉を使って、より具体的に質問してください。",
            "取得された箇所を直接ご確認ください。",
        ],
        (ReasonCode::Other, Locale::En) => &["Try the question again or rephrase it."],
        (ReasonCode::Other, Locale::Ja) => &["もう一度、または言い換えてお試しください。"],
    };
    items.iter().map(|s| s.to_string()).collect()
}

/// Fixed text substituted for a non-answerable answer. Always at least two
/// sentences.
pub fn fallback_answer(code: ReasonCode, locale: Locale) -> &'static str {
    match (code, locale) {
        (ReasonCode::NoSources, Locale::En) => {
            "No relevant passages were found in the selected documents for this question. Try rephrasing the question or widening the document scope."
        }
        (ReasonCode::NoSources, Locale::Ja) => {
            "選択された資料から、この質問に関連する箇所は見つかりませんでした。質問を言い換えるか、対象の資料を広げてお試しください。"
        }
        (ReasonCode::InsufficientEvidence, Locale::En) => {
            "The retrieved documents do not contain enough evidence to answer this question reliably. Please check the documents directly or ask a more specific question."
        }
        (ReasonCode::InsufficientEvidence, Locale::Ja) => {
            "取得した資料には、この質問に確実に答えるための十分な根拠がありません。資料を直接確認するか、より具体的な質問をお試しください。"
        }
        (ReasonCode::Other, Locale::En) => {
            "An answer could not be composed from the retrieved documents. Please try again or rephrase the question."
        }
        (ReasonCode::Other, Locale::Ja) => {
            "取得した資料から回答を作成できませんでした。時間をおいて再度お試しいただくか、質問を言い換えてください。"
        }
    }
}
