use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use claimsight_core::confidence::ScoringStrategy;
use claimsight_core::pipeline::EngineConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub confidence: ConfidenceConfig,
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default = "default_widen_factor")]
    pub widen_factor: usize,
    #[serde(default = "default_max_k")]
    pub max_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            widen_factor: default_widen_factor(),
            max_k: default_max_k(),
        }
    }
}

fn default_k() -> usize {
    4
}
fn default_widen_factor() -> usize {
    2
}
fn default_max_k() -> usize {
    16
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConfidenceConfig {
    #[serde(default = "default_threshold")]
    pub threshold: u8,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub strategy: ScoringStrategy,
    #[serde(default = "default_prompt_budget_chars")]
    pub prompt_budget_chars: usize,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            max_retries: default_max_retries(),
            strategy: ScoringStrategy::default(),
            prompt_budget_chars: default_prompt_budget_chars(),
        }
    }
}

fn default_threshold() -> u8 {
    3
}
fn default_max_retries() -> u32 {
    1
}
fn default_prompt_budget_chars() -> usize {
    6000
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    pub model: String,
    pub dims: usize,
    #[serde(default = "default_embed_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_embed_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_embed_timeout_secs() -> u64 {
    30
}
fn default_embed_max_retries() -> u32 {
    5
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            model: default_generation_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_generation_timeout_secs(),
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_generation_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f64 {
    0.1
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_generation_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

/// Paths to the JSON corpus files loaded into the in-memory index at
/// startup.
#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    #[serde(default = "default_chunks_path")]
    pub chunks: PathBuf,
    #[serde(default = "default_precedents_path")]
    pub precedents: PathBuf,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            chunks: default_chunks_path(),
            precedents: default_precedents_path(),
        }
    }
}

fn default_chunks_path() -> PathBuf {
    PathBuf::from("data/chunks.json")
}
fn default_precedents_path() -> PathBuf {
    PathBuf::from("data/precedents.json")
}

impl Config {
    /// Project the TOML surface onto the engine's tuning knobs.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            retrieval_k: self.retrieval.k,
            widen_factor: self.retrieval.widen_factor,
            max_k: self.retrieval.max_k,
            confidence_threshold: self.confidence.threshold,
            max_retries: self.confidence.max_retries,
            scoring_strategy: self.confidence.strategy,
            prompt_budget_chars: self.confidence.prompt_budget_chars,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // The engine re-validates at construction; failing here gives the
    // operator a config-file error instead of a startup panic later.
    config
        .engine_config()
        .validate()
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    if config.embedding.model.trim().is_empty() {
        anyhow::bail!("embedding.model must not be empty");
    }
    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.generation.model.trim().is_empty() {
        anyhow::bail!("generation.model must not be empty");
    }
    if config.server.bind.trim().is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_minimal_config_gets_defaults() {
        let file = write_config(
            r#"
[embedding]
model = "text-embedding-3-small"
dims = 1536
"#,
        );
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.retrieval.k, 4);
        assert_eq!(cfg.retrieval.widen_factor, 2);
        assert_eq!(cfg.confidence.threshold, 3);
        assert_eq!(cfg.confidence.max_retries, 1);
        assert_eq!(cfg.confidence.strategy, ScoringStrategy::Heuristic);
        assert_eq!(cfg.server.bind, "127.0.0.1:8080");
        assert_eq!(cfg.embedding.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn test_full_config_overrides() {
        let file = write_config(
            r#"
[retrieval]
k = 5
widen_factor = 3
max_k = 20

[confidence]
threshold = 4
max_retries = 2
strategy = "model"

[embedding]
api_base = "http://localhost:11434/v1"
model = "nomic-embed-text"
dims = 768

[generation]
model = "llama3"
temperature = 0.0

[server]
bind = "0.0.0.0:9000"
"#,
        );
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.retrieval.k, 5);
        assert_eq!(cfg.confidence.strategy, ScoringStrategy::Model);
        assert_eq!(cfg.embedding.api_base, "http://localhost:11434/v1");
        assert_eq!(cfg.generation.model, "llama3");
        assert_eq!(cfg.server.bind, "0.0.0.0:9000");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let file = write_config(
            r#"
[confidence]
threshold = 9

[embedding]
model = "text-embedding-3-small"
dims = 1536
"#,
        );
        assert!(load_config(file.path()).is_err());

        let file = write_config(
            r#"
[embedding]
model = ""
dims = 1536
"#,
        );
        assert!(load_config(file.path()).is_err());

        let file = write_config(
            r#"
[embedding]
model = "m"
dims = 0
"#,
        );
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_missing_embedding_section_is_an_error() {
        let file = write_config("[server]\nbind = \"127.0.0.1:8080\"\n");
        assert!(load_config(file.path()).is_err());
    }
}
