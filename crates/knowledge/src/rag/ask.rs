//! Grounded answering orchestration.
//!
//! validate → retrieve → compact → quarantine → generate or salvage →
//! attribute → answerability → fallback substitution.

use crate::compact::{compact_evidence, CompactedEvidence, EvidenceBudget};
use crate::language::classify;
use crate::rag::answerability::{expresses_uncertainty, fallback_answer, Assessment};
use crate::rag::attribution::CitationEngine;
use crate::rag::salvage::salvage_answer;
use crate::rag::segment::{apply_sentence_limit, requested_sentence_limit, split_sentences};
use crate::rag::sources::formatter_for;
use crate::rag::types::{
    AnswerOrigin, AnswerUnit, AskDiagnostics, AskRequest, EvidenceRef, GenerationReport,
    RagResponse, ReasonCode,
};
use crate::retriever::HybridRetriever;
use crate::text::StopTerms;
use grounded_core::config::{AnswerConfig, GenerationConfig};
use grounded_core::{AppConfig, AppResult, GenerationError, GenerationMode, Locale, RetrievalError};
use grounded_llm::{complete_with_timeout, LlmClient, LlmRequest};
use grounded_prompt::{build_quarantined_prompt, ContextSource};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Long-lived answering service.
pub struct AnswerService {
    retriever: Arc<HybridRetriever>,
    generator: Option<Arc<dyn LlmClient>>,
    citations: CitationEngine,
    stop_terms: StopTerms,
    budget: EvidenceBudget,
    generation: GenerationConfig,
    answer: AnswerConfig,
}

/// Answer text before attribution, with how it was produced.
struct Draft {
    text: String,
    origin: AnswerOrigin,
    report: GenerationReport,
}

impl AnswerService {
    /// `generator` may be `None`; every answer is then salvaged from evidence.
    pub fn new(
        retriever: Arc<HybridRetriever>,
        generator: Option<Arc<dyn LlmClient>>,
        config: &AppConfig,
    ) -> Self {
        let stop_terms = StopTerms::from_config(config.answer.stop_terms.as_deref());
        Self {
            retriever,
            generator,
            citations: CitationEngine::new(
                formatter_for(config.answer.citation_snippets),
                config.answer.min_match_score,
                stop_terms.clone(),
            ),
            stop_terms,
            budget: EvidenceBudget::from(&config.evidence),
            generation: config.generation.clone(),
            answer: config.answer.clone(),
        }
    }

    pub fn retriever(&self) -> &HybridRetriever {
        &self.retriever
    }

    /// Answer a question. Only input errors, cancellation and total
    /// retrieval failure are returned as errors; generation problems fall
    /// back to salvage.
    pub async fn ask(
        &self,
        request: AskRequest,
        cancel: CancellationToken,
    ) -> AppResult<RagResponse> {
        let request_id = Uuid::new_v4().to_string();
        let span = info_span!("ask", request_id = %request_id);
        self.answer(request, request_id, cancel)
            .instrument(span)
            .await
    }

    async fn answer(
        &self,
        request: AskRequest,
        request_id: String,
        cancel: CancellationToken,
    ) -> AppResult<RagResponse> {
        let question = request.query.text.trim().to_string();
        info!(
            tenant = %request.query.tenant_id,
            limit = request.query.limit,
            "Answering question"
        );

        let retrieval = self.retriever.retrieve(&request.query, &cancel).await?;
        let locale = self.answer.locale.resolve(classify(&question).is_cjk());
        let evidence = compact_evidence(&question, &retrieval.hits, &self.budget, &self.stop_terms);
        let sentence_limit = requested_sentence_limit(&question);

        let draft = if evidence.is_empty() {
            Draft {
                text: String::new(),
                origin: AnswerOrigin::Fallback,
                report: self.report(false),
            }
        } else {
            self.draft(&question, &evidence, locale, &cancel).await?
        };

        let units = apply_sentence_limit(
            self.citations.attribute(&draft.text, &evidence.slices),
            sentence_limit,
        );
        let overlap_guard =
            draft.origin == AnswerOrigin::Salvaged || self.generation.mode.is_deterministic();
        let answer_text = compose(&units);

        let answerability = Assessment {
            question: &question,
            answer: &draft.text,
            units: &units,
            evidence: &evidence.slices,
            overlap_guard,
            locale,
        }
        .verdict(&self.stop_terms);

        let (answer, units, origin) = if answerability.answerable {
            (answer_text, units, draft.origin)
        } else {
            let code = answerability.reason_code.unwrap_or(ReasonCode::Other);
            let text = fallback_answer(code, locale).to_string();
            let units = fallback_units(&text);
            (text, units, AnswerOrigin::Fallback)
        };

        let citations = dedup_citations(&units);
        info!(
            answerable = answerability.answerable,
            reason = answerability.reason_code.map(|c| c.as_str()),
            origin = ?origin,
            citations = citations.len(),
            "Answer composed"
        );

        let diagnostics = request.wants_diagnostics().then(|| AskDiagnostics {
            retrieval: retrieval.diagnostics.clone(),
            evidence_slices: evidence.slices.len(),
            evidence_chars: evidence.total_chars,
            evidence_fingerprint: evidence.fingerprint.clone(),
            generation: draft.report.clone(),
            overlap_guard_applied: overlap_guard,
            sentence_limit,
        });

        Ok(RagResponse {
            request_id,
            answer,
            answer_units: units,
            answerability,
            citations,
            hits: retrieval.hits,
            origin,
            diagnostics,
        })
    }

    fn report(&self, attempted: bool) -> GenerationReport {
        GenerationReport {
            mode: self.generation.mode,
            provider: self
                .generator
                .as_ref()
                .map(|g| g.provider_name().to_string()),
            attempted,
            error: None,
            low_confidence: false,
            redacted_lines: 0,
        }
    }

    /// Generate when configured, otherwise or on any failure salvage.
    async fn draft(
        &self,
        question: &str,
        evidence: &CompactedEvidence,
        locale: Locale,
        cancel: &CancellationToken,
    ) -> AppResult<Draft> {
        let generator = match (&self.generator, self.generation.mode) {
            (Some(generator), mode) if mode != GenerationMode::Offline => {
                generator.clone()
            }
            _ => {
                let mut report = self.report(false);
                report.error = Some(GenerationError::Disabled.to_string());
                return Ok(self.salvage(question, evidence, report));
            }
        };

        let mut report = self.report(true);
        let sources: Vec<ContextSource> = evidence
            .slices
            .iter()
            .map(|slice| ContextSource {
                source_id: slice.source_id.clone(),
                document_id: slice.document_id.clone(),
                filename: slice.filename.clone(),
                page: slice.page,
                text: slice.text.clone(),
            })
            .collect();

        let prompt = match build_quarantined_prompt(question, &sources, locale) {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!("Prompt assembly failed, salvaging: {}", e);
                report.error = Some(e.to_string());
                return Ok(self.salvage(question, evidence, report));
            }
        };
        report.redacted_lines = prompt.metadata.redacted_lines;

        let llm_request = LlmRequest::new(prompt.question, self.generation.model.clone())
            .with_system(prompt.system)
            .with_context(prompt.context)
            .with_mode(self.generation.mode)
            .with_max_tokens(self.generation.max_tokens);

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetrievalError::Cancelled.into()),
            result = complete_with_timeout(generator.as_ref(), &llm_request, self.generation.timeout()) => result,
        };

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!("Generation failed, salvaging: {}", e);
                report.error = Some(e.to_string());
                return Ok(self.salvage(question, evidence, report));
            }
        };

        // Nothing attributable and no admitted uncertainty: not worth keeping
        let units = self.citations.attribute(&response.content, &evidence.slices);
        if !units.iter().any(AnswerUnit::is_cited) && !expresses_uncertainty(&response.content) {
            warn!("Generated answer has no attributable claim, salvaging");
            report.low_confidence = true;
            return Ok(self.salvage(question, evidence, report));
        }

        Ok(Draft {
            text: response.content,
            origin: AnswerOrigin::Generated,
            report,
        })
    }

    fn salvage(&self, question: &str, evidence: &CompactedEvidence, report: GenerationReport) -> Draft {
        let text = salvage_answer(
            question,
            &evidence.slices,
            self.answer.salvage_max_sentences,
            &self.stop_terms,
        )
        .unwrap_or_default();
        Draft {
            text,
            origin: AnswerOrigin::Salvaged,
            report,
        }
    }
}

fn ends_with_cjk_punctuation(text: &str) -> bool {
    text.ends_with(['。', '！', '？', '」', '』'])
}

/// Display text: bullets one per line, paragraphs separated by blank lines.
fn compose(units: &[AnswerUnit]) -> String {
    let mut blocks: Vec<(bool, String)> = Vec::new();
    let mut current_block = None;

    for unit in units {
        if current_block != Some(unit.block) {
            current_block = Some(unit.block);
            blocks.push((unit.bulleted, String::new()));
        }
        if let Some((_, text)) = blocks.last_mut() {
            if !text.is_empty() && !ends_with_cjk_punctuation(text) {
                text.push(' ');
            }
            text.push_str(&unit.text);
        }
    }

    let mut out = String::new();
    let mut prev_bulleted = None;
    for (bulleted, text) in blocks {
        if let Some(prev) = prev_bulleted {
            out.push_str(if prev && bulleted { "\n" } else { "\n\n" });
        }
        if bulleted {
            out.push_str("- ");
        }
        out.push_str(&text);
        prev_bulleted = Some(bulleted);
    }
    out
}

fn fallback_units(text: &str) -> Vec<AnswerUnit> {
    split_sentences(text)
        .into_iter()
        .map(|text| AnswerUnit {
            text,
            citations: Vec::new(),
            block: 0,
            bulleted: false,
        })
        .collect()
}

/// Union of unit citations in first-use order.
fn dedup_citations(units: &[AnswerUnit]) -> Vec<EvidenceRef> {
    let mut out: Vec<EvidenceRef> = Vec::new();
    for citation in units.iter().flat_map(|u| &u.citations) {
        if !out.iter().any(|c| c.source_id == citation.source_id) {
            out.push(citation.clone());
        }
    }
    out
}
