use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub answer: AnswerConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// API token for the hosted embedding service. Not read from the TOML
    /// file — populated once from the environment by [`load_config`]
    /// (`HF_TOKEN` for huggingface, `OPENAI_API_KEY` for openai).
    #[serde(skip)]
    pub api_token: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
            api_token: None,
        }
    }
}

fn default_embedding_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Number of nearest records returned by similarity search.
    #[serde(default = "default_top_k")]
    pub top_k: i64,
    /// Row cap for the substring lookup path.
    #[serde(default = "default_lookup_limit")]
    pub lookup_limit: i64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            lookup_limit: 50,
        }
    }
}

fn default_top_k() -> i64 {
    10
}
fn default_lookup_limit() -> i64 {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnswerConfig {
    #[serde(default = "default_answer_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_answer_timeout_secs")]
    pub timeout_secs: u64,
    /// Populated from `OPENAI_API_KEY` by [`load_config`].
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            max_retries: 5,
            timeout_secs: 60,
            api_key: None,
        }
    }
}

fn default_answer_provider() -> String {
    "disabled".to_string()
}
fn default_answer_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

impl AnswerConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Credentials are resolved once here and carried in the config object;
    // pipeline code never reads the environment itself.
    config.embedding.api_token = match config.embedding.provider.as_str() {
        "huggingface" => std::env::var("HF_TOKEN").ok(),
        "openai" => std::env::var("OPENAI_API_KEY").ok(),
        _ => None,
    };
    config.answer.api_key = std::env::var("OPENAI_API_KEY").ok();

    // Validate retrieval
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.lookup_limit < 1 {
        anyhow::bail!("retrieval.lookup_limit must be >= 1");
    }

    // Validate embedding
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.batch_size == 0 {
            anyhow::bail!("embedding.batch_size must be > 0");
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "huggingface" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, huggingface, or openai.",
            other
        ),
    }

    match config.answer.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown answer provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    if config.answer.is_enabled() && config.answer.model.is_none() {
        anyhow::bail!(
            "answer.model must be specified when provider is '{}'",
            config.answer.provider
        );
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_minimal_config_defaults() {
        let file = write_config(
            r#"[db]
path = "/tmp/tarix.sqlite"

[server]
bind = "127.0.0.1:7400"
"#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.embedding.provider, "disabled");
        assert_eq!(config.embedding.batch_size, 64);
        assert_eq!(config.retrieval.top_k, 10);
        assert_eq!(config.answer.provider, "disabled");
    }

    #[test]
    fn test_enabled_embedding_requires_model_and_dims() {
        let file = write_config(
            r#"[db]
path = "/tmp/tarix.sqlite"

[embedding]
provider = "huggingface"

[server]
bind = "127.0.0.1:7400"
"#,
        );
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let file = write_config(
            r#"[db]
path = "/tmp/tarix.sqlite"

[embedding]
provider = "sentencepiece"
model = "x"
dims = 384

[server]
bind = "127.0.0.1:7400"
"#,
        );
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_top_k_must_be_positive() {
        let file = write_config(
            r#"[db]
path = "/tmp/tarix.sqlite"

[retrieval]
top_k = 0

[server]
bind = "127.0.0.1:7400"
"#,
        );
        assert!(load_config(file.path()).is_err());
    }
}
