//! Configuration for trial inspection and evaluation runs.
//!
//! Supports both environment variables and YAML config file.
//! Environment variables take precedence over config file values.

use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Supported external vector stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Qdrant,
    Chroma,
    Weaviate,
    Milvus,
}

impl Backend {
    /// Conventional REST port of each backend.
    pub fn default_port(self) -> u16 {
        match self {
            Backend::Qdrant => 6333,
            Backend::Chroma => 8000,
            Backend::Weaviate => 8080,
            Backend::Milvus => 19530,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Backend::Qdrant => "qdrant",
            Backend::Chroma => "chroma",
            Backend::Weaviate => "weaviate",
            Backend::Milvus => "milvus",
        };
        f.write_str(name)
    }
}

impl FromStr for Backend {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "qdrant" => Ok(Backend::Qdrant),
            "chroma" | "chromadb" => Ok(Backend::Chroma),
            "weaviate" => Ok(Backend::Weaviate),
            "milvus" => Ok(Backend::Milvus),
            other => Err(EvalError::InvalidConfig(format!(
                "unknown vector store backend '{}'",
                other
            ))),
        }
    }
}

/// Connection settings for one vector-store backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    /// Which backend the endpoint speaks.
    #[serde(default)]
    pub backend: Backend,

    /// Host name or IP (e.g., "localhost")
    #[serde(default = "default_host")]
    pub host: String,

    /// REST port; defaults to the backend's conventional port.
    #[serde(default)]
    pub port: Option<u16>,

    /// API key or bearer token (optional)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Chroma tenant (optional)
    #[serde(default)]
    pub tenant: Option<String>,

    /// Chroma database (optional)
    #[serde(default)]
    pub database: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            host: default_host(),
            port: None,
            api_key: None,
            tenant: None,
            database: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl VectorStoreConfig {
    pub fn new(backend: Backend, host: impl Into<String>) -> Self {
        Self {
            backend,
            host: host.into(),
            ..Default::default()
        }
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.backend.default_port())
    }

    /// Base URL of the REST API. A host that already carries a scheme is used as-is.
    pub fn base_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{}:{}", host, self.port())
        } else {
            format!("http://{}:{}", host, self.port())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(EvalError::Config(
                "Vector store host is required. Set VECTOR_STORE_HOST environment variable or add to config file.".to_string(),
            ));
        }
        if self.port == Some(0) {
            return Err(EvalError::Config("Vector store port must be non-zero.".to_string()));
        }
        Ok(())
    }
}

/// External evaluator invocation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    /// Program to run (e.g., "autorag")
    pub command: String,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            command: "autorag".to_string(),
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Default vector store for eviction
    pub vector_store: VectorStoreConfig,

    /// External evaluator settings
    pub evaluator: EvaluatorConfig,

    /// Prefix of every derived collection name
    pub collection_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vector_store: VectorStoreConfig::default(),
            evaluator: EvaluatorConfig::default(),
            collection_prefix: "rag".to_string(),
        }
    }
}

/// Configuration file structure (YAML format).
#[derive(Debug, Deserialize)]
struct ConfigFile {
    vector_store: Option<VectorStoreConfig>,
    evaluator: Option<EvaluatorFileSection>,
    collection_prefix: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EvaluatorFileSection {
    command: Option<String>,
}

impl Config {
    /// Load configuration from environment variables and optional config file.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (VECTOR_STORE_*, EVALUATOR_COMMAND, COLLECTION_PREFIX)
    /// 2. Config file (~/.config/rag-trial-inspector/config.yaml)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                config = Self::load_from_file(&config_path)?;
            }
        }

        config.apply_env(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay values from an environment lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(backend) = lookup("VECTOR_STORE_BACKEND") {
            self.vector_store.backend = backend.parse()?;
        }

        if let Some(host) = lookup("VECTOR_STORE_HOST") {
            self.vector_store.host = host;
        }

        if let Some(port) = lookup("VECTOR_STORE_PORT") {
            if let Ok(port) = port.parse() {
                self.vector_store.port = Some(port);
            }
        }

        if let Some(api_key) = lookup("VECTOR_STORE_API_KEY") {
            self.vector_store.api_key = Some(api_key);
        }

        if let Some(command) = lookup("EVALUATOR_COMMAND") {
            self.evaluator.command = command;
        }

        if let Some(prefix) = lookup("COLLECTION_PREFIX") {
            self.collection_prefix = prefix;
        }

        Ok(())
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;

        let file_config: ConfigFile = serde_yaml::from_str(&content)
            .map_err(|e| EvalError::Config(format!("Failed to parse config file: {}", e)))?;

        let mut config = Config::default();

        if let Some(vector_store) = file_config.vector_store {
            config.vector_store = vector_store;
        }
        if let Some(command) = file_config.evaluator.and_then(|e| e.command) {
            config.evaluator.command = command;
        }
        if let Some(prefix) = file_config.collection_prefix {
            config.collection_prefix = prefix;
        }

        Ok(config)
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "rag-trial-inspector")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Validate that required configuration is present.
    pub fn validate(&self) -> Result<()> {
        self.vector_store.validate()?;

        if self.evaluator.command.trim().is_empty() {
            return Err(EvalError::Config(
                "Evaluator command is required. Set EVALUATOR_COMMAND environment variable or add to config file.".to_string(),
            ));
        }

        if self.collection_prefix.is_empty()
            || !self
                .collection_prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(EvalError::InvalidConfig(format!(
                "collection prefix '{}' must be non-empty and use only letters, digits and '_'",
                self.collection_prefix
            )));
        }

        Ok(())
    }

    /// Create a config for an explicit backend (useful for testing).
    pub fn with_vector_store(backend: Backend, host: impl Into<String>) -> Self {
        Self {
            vector_store: VectorStoreConfig::new(backend, host),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.vector_store.backend, Backend::Qdrant);
        assert_eq!(config.vector_store.host, "localhost");
        assert_eq!(config.vector_store.port(), 6333);
        assert_eq!(config.evaluator.command, "autorag");
        assert_eq!(config.collection_prefix, "rag");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_base_url() {
        let mut store = VectorStoreConfig::new(Backend::Weaviate, "db.internal");
        assert_eq!(store.base_url(), "http://db.internal:8080");

        store.host = "https://db.internal/".to_string();
        store.port = Some(443);
        assert_eq!(store.base_url(), "https://db.internal:443");
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("VECTOR_STORE_BACKEND", "Milvus"),
            ("VECTOR_STORE_HOST", "milvus.local"),
            ("VECTOR_STORE_PORT", "19531"),
            ("COLLECTION_PREFIX", "hr"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.vector_store.backend, Backend::Milvus);
        assert_eq!(config.vector_store.host, "milvus.local");
        assert_eq!(config.vector_store.port(), 19531);
        assert_eq!(config.collection_prefix, "hr");
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let mut config = Config::default();
        let result = config.apply_env(|key| {
            (key == "VECTOR_STORE_BACKEND").then(|| "pinecone".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "vector_store:\n  backend: chroma\n  host: chroma.local\n  tenant: t1\nevaluator:\n  command: /opt/bin/autorag\ncollection_prefix: eval\n",
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.vector_store.backend, Backend::Chroma);
        assert_eq!(config.vector_store.port(), 8000);
        assert_eq!(config.vector_store.tenant.as_deref(), Some("t1"));
        assert_eq!(config.vector_store.timeout_secs, 10);
        assert_eq!(config.evaluator.command, "/opt/bin/autorag");
        assert_eq!(config.collection_prefix, "eval");
    }

    #[test]
    fn test_validate_rejects_bad_prefix_and_host() {
        let mut config = Config::default();
        config.collection_prefix = "bad-prefix".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::with_vector_store(Backend::Qdrant, "  ");
        assert!(config.validate().is_err());
        config.vector_store.host = "localhost".to_string();
        config.vector_store.port = Some(0);
        assert!(config.validate().is_err());
    }
}
