use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::context::budget::BudgetConfig;
use crate::context::compression::CompressionConfig;
use crate::context::format::FormatConfig;
use crate::context::priority::PriorityConfig;
use crate::context::staleness::StalenessConfig;
use crate::memory::rerank::RerankConfig;
use crate::memory::scoring::{RecencyConfig, ScoringWeights};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct MemexConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub query: QueryConfig,
    pub rerank: RerankConfig,
    pub context: ContextConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub cache_dir: String,
    /// Maximum number of cached text embeddings.
    pub cache_size: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct QueryConfig {
    pub default_limit: usize,
    pub max_limit: usize,
    pub regex_cache_size: u64,
    pub weights: ScoringWeights,
    pub recency: RecencyConfig,
}

/// Settings for the four context pipeline stages plus the formatter.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ContextConfig {
    pub budget: BudgetConfig,
    pub staleness: StalenessConfig,
    pub priority: PriorityConfig,
    pub compression: CompressionConfig,
    pub format: FormatConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".into(),
            host: "127.0.0.1".into(),
            port: 7411,
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_memex_dir()
            .join("memex.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_memex_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "local".into(),
            model: "all-MiniLM-L6-v2".into(),
            cache_dir,
            cache_size: 10_000,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
            regex_cache_size: 100,
            weights: ScoringWeights::default(),
            recency: RecencyConfig::default(),
        }
    }
}

/// Returns `~/.memex/`
pub fn default_memex_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".memex")
}

/// Returns the default config file path: `~/.memex/config.toml`
pub fn default_config_path() -> PathBuf {
    default_memex_dir().join("config.toml")
}

impl MemexConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            MemexConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (MEMEX_DB, MEMEX_LOG_LEVEL, MEMEX_RERANK).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MEMEX_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("MEMEX_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("MEMEX_RERANK") {
            self.rerank.enabled = matches!(val.as_str(), "1" | "true" | "on");
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::format::OutputFormat;
    use crate::memory::scoring::DecayFunction;

    #[test]
    fn default_config_is_valid() {
        let config = MemexConfig::default();
        assert_eq!(config.server.transport, "stdio");
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.query.default_limit, 20);
        assert_eq!(config.query.weights.explicit_relation, 10.0);
        assert_eq!(config.rerank.top_k, 20);
        assert_eq!(config.context.compression.hierarchical_threshold, 1500);
        assert!(config.storage.db_path.ends_with("memex.db"));
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[server]
log_level = "debug"

[storage]
db_path = "/tmp/test.db"

[query]
default_limit = 10

[query.recency]
decay_function = "step"

[rerank]
enabled = true
alpha = 0.7

[context.compression]
enabled = false

[context.format]
default_format = "json"
"#;
        let config: MemexConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.storage.db_path, "/tmp/test.db");
        assert_eq!(config.query.default_limit, 10);
        assert_eq!(config.query.recency.decay_function, DecayFunction::Step);
        assert!(config.rerank.enabled);
        assert_eq!(config.rerank.alpha, 0.7);
        assert!(!config.context.compression.enabled);
        assert_eq!(config.context.format.default_format, OutputFormat::Json);
        // defaults still apply for unset fields
        assert_eq!(config.query.max_limit, 100);
        assert_eq!(config.rerank.top_k, 20);
        assert!(config.context.staleness.enabled);
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = MemexConfig::default();
        std::env::set_var("MEMEX_DB", "/tmp/override.db");
        std::env::set_var("MEMEX_LOG_LEVEL", "trace");
        std::env::set_var("MEMEX_RERANK", "true");

        config.apply_env_overrides();

        assert_eq!(config.storage.db_path, "/tmp/override.db");
        assert_eq!(config.server.log_level, "trace");
        assert!(config.rerank.enabled);

        std::env::remove_var("MEMEX_DB");
        std::env::remove_var("MEMEX_LOG_LEVEL");
        std::env::remove_var("MEMEX_RERANK");
    }
}
