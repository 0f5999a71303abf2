//! Ask command handler.
//!
//! Retrieves evidence for a question and prints a cited answer.

use clap::Args;
use grounded_core::{config::AppConfig, AppError, AppResult};
use grounded_knowledge::{
    build_answer_service, open_store, AskRequest, DocumentScope, Query, RagResponse,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Ask a question and get a cited answer
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Tenant whose passages are searched
    #[arg(short, long, env = "GROUNDED_TENANT")]
    pub tenant: String,

    /// Restrict retrieval to these document ids (repeatable)
    #[arg(long = "doc")]
    pub documents: Vec<String>,

    /// Search every document of the tenant
    #[arg(long)]
    pub all_documents: bool,

    /// Number of passages to retrieve (default: retrieval.top_k)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Include retrieval and generation diagnostics
    #[arg(long)]
    pub debug: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let selected = (!self.documents.is_empty()).then(|| self.documents.clone());
        let scope = DocumentScope::from_request(self.all_documents, selected)?;
        let query = Query::new(&self.question, &self.tenant)
            .with_scope(scope)
            .with_limit(self.top_k.unwrap_or(config.retrieval.top_k));

        let store = Arc::new(open_store(config)?);
        let service = build_answer_service(config, store)?;

        // The local operator owns the store, so --debug is always authorized
        let request = AskRequest::new(query).with_debug(self.debug, true);

        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling request");
                on_interrupt.cancel();
            }
        });

        let response = service.ask(request, cancel).await?;

        if self.json {
            let json = serde_json::to_string_pretty(&response)
                .map_err(|e| AppError::Serialization(e.to_string()))?;
            println!("{}", json);
        } else {
            print_answer(&response);
        }

        Ok(())
    }
}

fn print_answer(response: &RagResponse) {
    println!("{}", response.answer);

    if !response.citations.is_empty() {
        println!();
        println!("Sources:");
        for citation in &response.citations {
            println!("  [{}] {}", citation.source_id, citation.location);
            if let Some(snippet) = &citation.snippet {
                println!("       {}", snippet);
            }
        }
    }

    if !response.answerability.answerable {
        if let Some(reason) = &response.answerability.reason {
            println!();
            println!("Note: {}", reason);
        }
        for suggestion in &response.answerability.suggestions {
            println!("  - {}", suggestion);
        }
    }

    if let Some(diagnostics) = &response.diagnostics {
        let retrieval = &diagnostics.retrieval;
        eprintln!();
        eprintln!(
            "[debug] request {} | script {:?} | {} hits | fusion k={} over {} signals",
            response.request_id,
            retrieval.script,
            response.hits.len(),
            retrieval.fusion.rrf_k,
            retrieval.fusion.contributing_signals
        );
        for signal in &retrieval.signals {
            eprintln!(
                "[debug]   {} {:?} ({} rows){}",
                signal.signal,
                signal.status,
                signal.count,
                signal
                    .error
                    .as_ref()
                    .map(|e| format!(": {}", e))
                    .unwrap_or_default()
            );
        }
        eprintln!(
            "[debug] evidence: {} slices, {} chars, fingerprint {}",
            diagnostics.evidence_slices, diagnostics.evidence_chars, diagnostics.evidence_fingerprint
        );
        eprintln!(
            "[debug] generation: {:?}, attempted {}, origin {:?}{}",
            diagnostics.generation.mode,
            diagnostics.generation.attempted,
            response.origin,
            diagnostics
                .generation
                .error
                .as_ref()
                .map(|e| format!(", error: {}", e))
                .unwrap_or_default()
        );
    }
}
