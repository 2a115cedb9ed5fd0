//! Configuration management for docsift
//!
//! Loads the TOML configuration, applies profile and environment overrides,
//! and validates the result before anything else touches it.

use crate::error::{DocsiftError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub clustering: ClusteringConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

/// Vectorization configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "semantic" tries the embedding model first, "frequency" goes straight to TF-IDF
    pub mode: String,
    pub model: String,
    /// Vocabulary cap for the TF-IDF fallback
    pub max_features: usize,
}

/// K-means and model-order search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    pub random_seed: u64,
    pub n_init: usize,
    pub max_iterations: usize,
    pub tolerance: f64,
    /// Upper bound of the k search for semantic vectors
    pub max_k_semantic: usize,
    /// Upper bound of the k search for TF-IDF vectors
    pub max_k_frequency: usize,
}

/// Text-generation service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: String,
    pub endpoint: String,
    pub model: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
    /// Extra attempts for transient failures
    pub max_retries: u32,
}

/// Prompt sampling and excerpt bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub naming_sample_docs: usize,
    pub naming_excerpt_chars: usize,
    pub schema_sample_docs: usize,
    pub schema_excerpt_chars: usize,
    pub schema_existing_fields: usize,
    pub extraction_excerpt_chars: usize,
    pub justification_excerpt_chars: usize,
    pub organize_excerpt_chars: usize,
    pub default_field_count: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            naming_sample_docs: 5,
            naming_excerpt_chars: 500,
            schema_sample_docs: 2,
            schema_excerpt_chars: 2000,
            schema_existing_fields: 20,
            extraction_excerpt_chars: 2000,
            justification_excerpt_chars: 3000,
            organize_excerpt_chars: 1000,
            default_field_count: 7,
        }
    }
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_model: Option<String>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DocsiftError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| DocsiftError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| DocsiftError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| DocsiftError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(mode) = overrides.embedding_mode {
            self.embedding.mode = mode;
        }
        if let Some(model) = overrides.embedding_model {
            self.embedding.model = model;
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: DOCSIFT_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("DOCSIFT_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "EMBEDDING__MODE" => {
                self.embedding.mode = value.to_string();
            }
            "EMBEDDING__MODEL" => {
                self.embedding.model = value.to_string();
            }
            "LLM__MODEL" => {
                self.llm.model = value.to_string();
            }
            "LLM__ENDPOINT" => {
                self.llm.endpoint = value.to_string();
            }
            "LLM__MAX_RETRIES" => {
                self.llm.max_retries =
                    value.parse().map_err(|_| DocsiftError::InvalidConfigValue {
                        path: path.to_string(),
                        message: format!("Cannot parse '{}' as an integer", value),
                    })?;
            }
            "STORAGE__DATA_DIR" => {
                self.storage.data_dir = PathBuf::from(value);
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| DocsiftError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("docsift").join("config.toml"))
    }

    /// Get the default data directory
    pub fn default_data_dir() -> Result<PathBuf> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| DocsiftError::Config("Cannot determine home directory".to_string()))?;

        Ok(home_dir.join(".docsift"))
    }

    /// Data directory with a leading `~/` expanded
    pub fn resolved_data_dir(&self) -> Result<PathBuf> {
        expand_home(&self.storage.data_dir)
    }
}

/// Expand a leading `~/` to the user's home directory
pub fn expand_home(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| DocsiftError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| DocsiftError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            storage: StorageConfig {
                data_dir: PathBuf::from("~/.docsift"),
            },
            embedding: EmbeddingConfig {
                mode: "semantic".to_string(),
                model: "paraphrase-multilingual-MiniLM-L12-v2".to_string(),
                max_features: 1000,
            },
            clustering: ClusteringConfig {
                random_seed: 42,
                n_init: 10,
                max_iterations: 300,
                tolerance: 1e-4,
                max_k_semantic: 10,
                max_k_frequency: 5,
            },
            llm: LlmConfig {
                provider: "mistral".to_string(),
                endpoint: "https://api.mistral.ai/v1/chat/completions".to_string(),
                model: "mistral-large-latest".to_string(),
                api_key_env: "MISTRAL_API_KEY".to_string(),
                timeout_secs: 60,
                max_retries: 1,
            },
            limits: LimitsConfig::default(),
            profiles: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let mut config = Config::default();
        config.embedding.mode = "frequency".to_string();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.embedding.mode, "frequency");
        assert_eq!(loaded.clustering.max_k_frequency, 5);
        assert_eq!(loaded.limits.naming_sample_docs, 5);
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = Config::load(&temp_dir.path().join("absent.toml"));
        assert!(matches!(result, Err(DocsiftError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_apply_profile() {
        let mut config = Config::default();
        config.profiles.insert(
            "offline".to_string(),
            ProfileOverrides {
                embedding_mode: Some("frequency".to_string()),
                embedding_model: None,
                llm_model: Some("mistral-small-latest".to_string()),
            },
        );

        config.apply_profile("offline").unwrap();
        assert_eq!(config.embedding.mode, "frequency");
        assert_eq!(config.llm.model, "mistral-small-latest");
        assert!(config.apply_profile("missing").is_err());
    }

    #[test]
    fn test_expand_home_leaves_absolute_paths() {
        let path = PathBuf::from("/var/lib/docsift");
        assert_eq!(expand_home(&path).unwrap(), path);
    }
}
