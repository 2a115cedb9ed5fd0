use crate::config::Config;
use crate::error::{DocsiftError, Result, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_storage(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_clustering(config, &mut errors);
        Self::validate_llm(config, &mut errors);
        Self::validate_limits(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DocsiftError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.storage.data_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.data_dir",
                "Data directory cannot be empty",
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        let mode = &config.embedding.mode;
        if mode != "semantic" && mode != "frequency" {
            errors.push(ValidationError::new(
                "embedding.mode",
                format!("Mode must be 'semantic' or 'frequency', got '{}'", mode),
            ));
        }

        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }

        if config.embedding.max_features == 0 {
            errors.push(ValidationError::new(
                "embedding.max_features",
                "Vocabulary size must be greater than 0",
            ));
        }
    }

    fn validate_clustering(config: &Config, errors: &mut Vec<ValidationError>) {
        let clustering = &config.clustering;

        if clustering.n_init == 0 {
            errors.push(ValidationError::new(
                "clustering.n_init",
                "Number of restarts must be greater than 0",
            ));
        }

        if clustering.max_iterations == 0 {
            errors.push(ValidationError::new(
                "clustering.max_iterations",
                "Iteration cap must be greater than 0",
            ));
        }

        if !(clustering.tolerance >= 0.0 && clustering.tolerance.is_finite()) {
            errors.push(ValidationError::new(
                "clustering.tolerance",
                format!("Tolerance must be a finite non-negative number, got {}", clustering.tolerance),
            ));
        }

        for (path, value) in [
            ("clustering.max_k_semantic", clustering.max_k_semantic),
            ("clustering.max_k_frequency", clustering.max_k_frequency),
        ] {
            if value < 2 {
                errors.push(ValidationError::new(
                    path,
                    format!("Upper bound of the cluster search must be at least 2, got {}", value),
                ));
            }
        }
    }

    fn validate_llm(config: &Config, errors: &mut Vec<ValidationError>) {
        let provider = &config.llm.provider;
        let valid_providers = ["mistral"];
        if !valid_providers.contains(&provider.as_str()) {
            errors.push(ValidationError::new(
                "llm.provider",
                format!(
                    "Provider must be one of {:?}, got '{}'",
                    valid_providers, provider
                ),
            ));
        }

        if !config.llm.endpoint.starts_with("http://") && !config.llm.endpoint.starts_with("https://")
        {
            errors.push(ValidationError::new(
                "llm.endpoint",
                format!("Endpoint must be an http(s) URL, got '{}'", config.llm.endpoint),
            ));
        }

        if config.llm.model.is_empty() {
            errors.push(ValidationError::new("llm.model", "Model name cannot be empty"));
        }

        if config.llm.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "llm.timeout_secs",
                "Timeout must be greater than 0",
            ));
        }
    }

    fn validate_limits(config: &Config, errors: &mut Vec<ValidationError>) {
        let limits = &config.limits;
        for (path, value) in [
            ("limits.naming_sample_docs", limits.naming_sample_docs),
            ("limits.naming_excerpt_chars", limits.naming_excerpt_chars),
            ("limits.schema_sample_docs", limits.schema_sample_docs),
            ("limits.schema_excerpt_chars", limits.schema_excerpt_chars),
            ("limits.extraction_excerpt_chars", limits.extraction_excerpt_chars),
            (
                "limits.justification_excerpt_chars",
                limits.justification_excerpt_chars,
            ),
            ("limits.organize_excerpt_chars", limits.organize_excerpt_chars),
            ("limits.default_field_count", limits.default_field_count),
        ] {
            if value == 0 {
                errors.push(ValidationError::new(path, "Value must be greater than 0"));
            }
        }
    }
}
