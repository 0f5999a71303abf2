//! Import command handler.
//!
//! Loads passages from a JSONL file into the passage store.

use clap::Args;
use grounded_core::{config::AppConfig, AppError, AppResult};
use grounded_knowledge::{create_provider, import_passages, open_store, NewPassage};
use std::path::{Path, PathBuf};

/// Import passages from a JSONL file
#[derive(Args, Debug)]
pub struct ImportCommand {
    /// JSONL file, one passage object per line
    pub file: PathBuf,

    /// Tenant that owns the passages
    #[arg(short, long, env = "GROUNDED_TENANT")]
    pub tenant: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ImportCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing import command for {:?}", self.file);

        let passages = read_passages(&self.file)?;
        let store = open_store(config)?;
        let embedder = create_provider(&config.embedding)?;

        let stats = import_passages(&store, embedder.as_ref(), &self.tenant, passages).await?;

        if self.json {
            let output = serde_json::json!({
                "tenant": self.tenant,
                "passages": stats.passages,
                "documents": stats.documents,
                "skipped": stats.skipped,
                "bytes": stats.bytes,
                "durationSecs": stats.duration_secs,
                "embedding": {
                    "provider": embedder.provider_name(),
                    "model": embedder.model_name(),
                    "dimensions": embedder.dimensions(),
                },
            });
            let json = serde_json::to_string_pretty(&output)
                .map_err(|e| AppError::Serialization(e.to_string()))?;
            println!("{}", json);
        } else {
            println!(
                "Imported {} passages from {} documents ({} bytes) in {:.2}s",
                stats.passages, stats.documents, stats.bytes, stats.duration_secs
            );
            if stats.skipped > 0 {
                println!("Skipped {} passages without text", stats.skipped);
            }
        }

        Ok(())
    }
}

/// Parse one `NewPassage` per non-blank line.
fn read_passages(path: &Path) -> AppResult<Vec<NewPassage>> {
    let contents = std::fs::read_to_string(path)?;
    parse_passages(&contents)
}

fn parse_passages(contents: &str) -> AppResult<Vec<NewPassage>> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line)
                .map_err(|e| AppError::Serialization(format!("line {}: {}", i + 1, e)))
        })
        .collect()
}
