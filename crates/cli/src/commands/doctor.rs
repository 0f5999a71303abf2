//! Doctor command handler.
//!
//! Reports store contents, fuzzy capability and collaborator reachability.

use clap::Args;
use grounded_core::{config::AppConfig, AppError, AppResult, GenerationMode};
use grounded_knowledge::capability::{CapabilityState, FuzzyCapability};
use grounded_knowledge::embeddings::OllamaProvider;
use grounded_knowledge::open_store;
use serde::Serialize;

/// Check the passage store and collaborators
#[derive(Args, Debug)]
pub struct DoctorCommand {
    /// Only count passages of this tenant
    #[arg(short, long)]
    pub tenant: Option<String>,

    /// Skip the embedding service check
    #[arg(long)]
    pub skip_network: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    database: String,
    passages: u64,
    tenants: u64,
    fuzzy_capability: CapabilityState,
    generation_mode: GenerationMode,
    generation_provider: String,
    embedding_provider: String,
    embedding_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    embedding_check: Option<String>,
}

impl DoctorCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing doctor command");

        let store = open_store(config)?;
        let passages = store.passage_count(self.tenant.as_deref())?;
        let tenants = store.tenant_count()?;

        let fuzzy = FuzzyCapability::new();
        fuzzy.resolve(&store).await;

        let embedding_check = if self.skip_network || config.embedding.offline {
            None
        } else {
            let provider = OllamaProvider::new(&config.embedding)?;
            Some(match provider.verify_connection().await {
                Ok(()) => format!("ok ({})", provider.base_url()),
                Err(e) => {
                    tracing::warn!("Embedding service check failed: {}", e);
                    format!("failed: {}", e)
                }
            })
        };

        let report = DoctorReport {
            database: config.database_path().display().to_string(),
            passages,
            tenants,
            fuzzy_capability: fuzzy.state(),
            generation_mode: config.generation.mode,
            generation_provider: config.generation.provider.clone(),
            embedding_provider: config.embedding.provider.clone(),
            embedding_model: config.embedding.model.clone(),
            embedding_check,
        };

        if self.json {
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| AppError::Serialization(e.to_string()))?;
            println!("{}", json);
        } else {
            println!("Database:          {}", report.database);
            match &self.tenant {
                Some(tenant) => println!("Passages ({}):   {}", tenant, report.passages),
                None => println!("Passages:          {}", report.passages),
            }
            println!("Tenants:           {}", report.tenants);
            println!("Fuzzy search:      {:?}", report.fuzzy_capability);
            println!(
                "Generation:        {:?} ({})",
                report.generation_mode, report.generation_provider
            );
            println!(
                "Embeddings:        {} ({})",
                report.embedding_provider, report.embedding_model
            );
            if let Some(check) = &report.embedding_check {
                println!("Embedding service: {}", check);
            }
        }

        Ok(())
    }
}
