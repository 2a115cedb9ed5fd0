use std::path::PathBuf;
use thiserror::Error;

/// Main error type for docsift
#[derive(Error, Debug)]
pub enum DocsiftError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// The text-generation credential is required but not configured
    #[error("No API key configured for the text-generation service; run `docsift api-key set <KEY>` or set {env_var}")]
    MissingCredential { env_var: String },

    /// A request had nothing to work on
    #[error("Nothing to process: no {what} provided")]
    EmptyInput { what: String },

    /// Document lookup failed
    #[error("Document not found: {id}")]
    DocumentNotFound { id: String },

    /// A field was requested that the document or catalog does not know
    #[error("Field '{field}' not found on document {id}")]
    FieldNotFound { id: String, field: String },

    /// Text-generation service failure that a caller chose not to recover from
    #[error("Text-generation service error: {0}")]
    Service(#[from] crate::llm::ServiceError),

    /// Cluster naming aborted; the error keeps the clusters as far as they got
    #[error("Category naming failed: {0}")]
    Naming(Box<crate::pipeline::NamingError>),

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Connection pool errors
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for docsift operations
pub type Result<T> = std::result::Result<T, DocsiftError>;
