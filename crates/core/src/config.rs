//! Configuration management for the grounded workspace.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Defaults
//! - Config file (`.grounded/config.yaml`)
//! - Environment variables
//! - Command-line flags
//!
//! Every retrieval threshold (RRF constant, CJK similarity cap, fused-score
//! floor, stop terms) lives here rather than in code.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::locale::LocalePreference;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .grounded/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// SQLite passage store path (defaults to .grounded/passages.sqlite)
    pub database: Option<PathBuf>,

    /// API key for the generation provider
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    pub log_json: bool,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    pub retrieval: RetrievalConfig,
    pub evidence: EvidenceConfig,
    pub generation: GenerationConfig,
    pub embedding: EmbeddingConfig,
    pub answer: AnswerConfig,
}

/// Signal selection, fusion and filtering settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// RRF smoothing constant K in `1/(K + rank)`
    pub rrf_k: u32,

    /// Default number of fused hits returned per request
    pub top_k: usize,

    /// Candidates requested from each signal
    pub candidate_pool: usize,

    /// Global switch for the lexical signal
    pub lexical_enabled: bool,

    /// Global switch for the fuzzy-similarity signal
    pub fuzzy_enabled: bool,

    /// Fuzzy similarity floor for Latin-dominant queries
    pub fuzzy_threshold: f32,

    /// Upper bound on the fuzzy similarity floor for CJK-dominant queries
    pub cjk_fuzzy_cap: f32,

    /// Fused-score floor, applied only when two or more signals produced results
    pub min_fused_score: Option<f64>,

    /// Drop front matter / table-of-contents passages
    pub noise_filter: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            rrf_k: 60,
            top_k: 8,
            candidate_pool: 40,
            lexical_enabled: true,
            fuzzy_enabled: true,
            fuzzy_threshold: 0.3,
            cjk_fuzzy_cap: 0.003,
            min_fused_score: Some(0.012),
            noise_filter: true,
        }
    }
}

/// Character budgets for evidence handed to generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EvidenceConfig {
    pub per_passage_chars: usize,
    pub total_chars: usize,
    pub max_passages: usize,
    /// Stop adding passages once the remaining total budget is below this
    pub min_slice_chars: usize,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            per_passage_chars: 1200,
            total_chars: 6000,
            max_passages: 8,
            min_slice_chars: 40,
        }
    }
}

/// How answers are composed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    /// No generation call; answers are salvaged from evidence
    Offline,
    /// Generation with temperature 0
    #[default]
    Deterministic,
    /// Generation with sampling
    Creative,
}

impl GenerationMode {
    /// Whether the lexical-overlap guard applies to answers in this mode.
    pub fn is_deterministic(&self) -> bool {
        !matches!(self, GenerationMode::Creative)
    }
}

/// Generation collaborator settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    pub mode: GenerationMode,
    pub provider: String,
    pub model: String,
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
    pub max_tokens: u32,
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            mode: GenerationMode::Deterministic,
            provider: "ollama".to_string(),
            model: "llama3.2".to_string(),
            endpoint: None,
            timeout_secs: 30,
            max_tokens: 800,
        }
    }
}

/// Embedding collaborator settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// "ollama" or "hashing" (offline only)
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
    pub endpoint: Option<String>,
    /// Explicit offline/deterministic mode
    pub offline: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            endpoint: None,
            offline: false,
        }
    }
}

/// Answer composition and attribution settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnswerConfig {
    pub locale: LocalePreference,
    /// Replaces the built-in stop-term list when set
    pub stop_terms: Option<Vec<String>>,
    /// Minimum token-overlap ratio for attributing an unmarked unit
    pub min_match_score: f32,
    pub salvage_max_sentences: usize,
    /// Attach evidence snippets to each citation
    pub citation_snippets: bool,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            locale: LocalePreference::Auto,
            stop_terms: None,
            min_match_score: 0.2,
            salvage_max_sentences: 3,
            citation_snippets: false,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    workspace: Option<WorkspaceConfig>,
    database: Option<String>,
    logging: Option<LoggingConfig>,
    retrieval: Option<RetrievalConfig>,
    evidence: Option<EvidenceConfig>,
    generation: Option<GenerationConfig>,
    embedding: Option<EmbeddingConfig>,
    answer: Option<AnswerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            database: None,
            api_key: None,
            log_level: None,
            log_json: false,
            verbose: false,
            no_color: false,
            retrieval: RetrievalConfig::default(),
            evidence: EvidenceConfig::default(),
            generation: GenerationConfig::default(),
            embedding: EmbeddingConfig::default(),
            answer: AnswerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables, the YAML file and defaults.
    ///
    /// Environment variables:
    /// - `GROUNDED_WORKSPACE`: Override workspace path
    /// - `GROUNDED_CONFIG`: Path to config file
    /// - `GROUNDED_DATABASE`: Passage store path
    /// - `GROUNDED_PROVIDER`: Generation provider
    /// - `GROUNDED_MODEL`: Generation model
    /// - `GROUNDED_API_KEY`: API key
    /// - `GROUNDED_OFFLINE`: Offline generation and embeddings
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Like [`AppConfig::load`], but an explicit workspace or config file
    /// (from CLI flags) replaces the environment's choice before the YAML
    /// file is read.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        let workspace =
            workspace.or_else(|| std::env::var_os("GROUNDED_WORKSPACE").map(PathBuf::from));
        if let Some(workspace) = workspace {
            config.workspace = workspace;
        }

        config.config_file =
            config_file.or_else(|| std::env::var_os("GROUNDED_CONFIG").map(PathBuf::from));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.workspace.join(".grounded/config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(database) = std::env::var("GROUNDED_DATABASE") {
            config.database = Some(PathBuf::from(database));
        }

        if let Ok(provider) = std::env::var("GROUNDED_PROVIDER") {
            config.generation.provider = provider;
        }

        if let Ok(model) = std::env::var("GROUNDED_MODEL") {
            config.generation.model = model;
        }

        if let Ok(offline) = std::env::var("GROUNDED_OFFLINE") {
            if matches!(offline.as_str(), "1" | "true" | "yes") {
                config.set_offline();
            }
        }

        config.api_key = std::env::var("GROUNDED_API_KEY").ok();
        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        Ok(self.clone().apply_file(config_file))
    }

    fn apply_file(mut self, file: ConfigFile) -> Self {
        if let Some(path) = file.workspace.and_then(|ws| ws.path) {
            self.workspace = PathBuf::from(path);
        }

        if let Some(database) = file.database {
            self.database = Some(PathBuf::from(database));
        }

        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                self.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                self.no_color = !color;
            }
            if let Some(json) = logging.json {
                self.log_json = json;
            }
        }

        if let Some(retrieval) = file.retrieval {
            self.retrieval = retrieval;
        }
        if let Some(evidence) = file.evidence {
            self.evidence = evidence;
        }
        if let Some(generation) = file.generation {
            self.generation = generation;
        }
        if let Some(embedding) = file.embedding {
            self.embedding = embedding;
        }
        if let Some(answer) = file.answer {
            self.answer = answer;
        }

        self
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        database: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
        offline: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(database) = database {
            self.database = Some(database);
        }

        if let Some(provider) = provider {
            self.generation.provider = provider;
        }

        if let Some(model) = model {
            self.generation.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        if offline {
            self.set_offline();
        }

        self
    }

    /// Switch generation and embeddings to their deterministic offline variants.
    pub fn set_offline(&mut self) {
        self.generation.mode = GenerationMode::Offline;
        self.embedding.offline = true;
        self.embedding.provider = "hashing".to_string();
    }

    /// Get the path to the .grounded directory.
    pub fn grounded_dir(&self) -> PathBuf {
        self.workspace.join(".grounded")
    }

    /// Ensure the .grounded directory exists.
    pub fn ensure_grounded_dir(&self) -> AppResult<()> {
        let dir = self.grounded_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .grounded directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Resolved passage store path.
    pub fn database_path(&self) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| self.grounded_dir().join("passages.sqlite"))
    }

    /// Validate the merged configuration.
    pub fn validate(&self) -> AppResult<()> {
        let known_providers = ["ollama"];
        if self.generation.mode != GenerationMode::Offline
            && !known_providers.contains(&self.generation.provider.as_str())
        {
            return Err(AppError::Config(format!(
                "Unknown generation provider: {}. Supported: {}",
                self.generation.provider,
                known_providers.join(", ")
            )));
        }

        match self.embedding.provider.as_str() {
            "ollama" => {}
            "hashing" if self.embedding.offline => {}
            "hashing" => {
                return Err(AppError::Config(
                    "The hashing embedding provider requires embedding.offline = true".to_string(),
                ))
            }
            other => {
                return Err(AppError::Config(format!(
                    "Unknown embedding provider: {}. Supported: ollama, hashing",
                    other
                )))
            }
        }

        let r = &self.retrieval;
        if r.rrf_k == 0 {
            return Err(AppError::Config("retrieval.rrf_k must be positive".to_string()));
        }
        if r.top_k == 0 || r.candidate_pool == 0 {
            return Err(AppError::Config(
                "retrieval.top_k and retrieval.candidate_pool must be positive".to_string(),
            ));
        }
        if r.fuzzy_threshold < 0.0 || r.cjk_fuzzy_cap < 0.0 {
            return Err(AppError::Config(
                "fuzzy thresholds must not be negative".to_string(),
            ));
        }

        let e = &self.evidence;
        if e.per_passage_chars == 0 || e.total_chars == 0 || e.max_passages == 0 {
            return Err(AppError::Config(
                "evidence budgets must be positive".to_string(),
            ));
        }

        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "embedding.dimensions must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.retrieval.rrf_k, 60);
        assert_eq!(config.generation.provider, "ollama");
        assert_eq!(config.generation.mode, GenerationMode::Deterministic);
        assert!(!config.verbose);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_database_path_defaults_under_grounded_dir() {
        let config = AppConfig::default();
        assert!(config.database_path().ends_with(".grounded/passages.sqlite"));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default().with_overrides(
            None,
            None,
            Some(PathBuf::from("/tmp/p.sqlite")),
            None,
            Some("qwen2.5".to_string()),
            None,
            true,
            false,
            true,
        );

        assert_eq!(config.generation.model, "qwen2.5");
        assert_eq!(config.generation.mode, GenerationMode::Offline);
        assert!(config.embedding.offline);
        assert_eq!(config.embedding.provider, "hashing");
        assert_eq!(config.log_level, Some("debug".to_string()));
        assert_eq!(config.database_path(), PathBuf::from("/tmp/p.sqlite"));
    }

    #[test]
    fn test_yaml_sections_merge_with_defaults() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(
            &path,
            "retrieval:\n  rrf_k: 30\n  cjk_fuzzy_cap: 0.002\nevidence:\n  total_chars: 900\nlogging:\n  json: true\n",
        )
        .unwrap();

        let merged = AppConfig::default().merge_yaml(&path).unwrap();
        assert_eq!(merged.retrieval.rrf_k, 30);
        assert_eq!(merged.retrieval.cjk_fuzzy_cap, 0.002);
        assert_eq!(merged.retrieval.top_k, 8);
        assert_eq!(merged.evidence.total_chars, 900);
        assert_eq!(merged.evidence.per_passage_chars, 1200);
        assert!(merged.log_json);
    }

    #[test]
    fn test_hashing_embeddings_require_offline() {
        let mut config = AppConfig::default();
        config.embedding.provider = "hashing".to_string();
        assert!(config.validate().is_err());

        config.embedding.offline = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_budgets() {
        let mut config = AppConfig::default();
        config.evidence.total_chars = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = AppConfig::default();
        config.generation.provider = "unknown".to_string();
        assert!(config.validate().is_err());

        config.generation.mode = GenerationMode::Offline;
        assert!(config.validate().is_ok());
    }
}
