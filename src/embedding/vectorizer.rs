//! Vectorization strategy selection
//!
//! Semantic embeddings are preferred; any failure (model unavailable, encoding
//! error) degrades to TF-IDF over the same batch. The caller never sees the
//! semantic failure.

use super::provider::{EmbeddingProvider, FastEmbedProvider};
use super::tfidf::TfidfVectorizer;
use crate::config::EmbeddingConfig;
use crate::error::Result;
use std::sync::OnceLock;

/// Which strategy produced a batch of vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorKind {
    Semantic,
    Frequency,
}

/// Vectors for one batch, one per input text and in input order
#[derive(Debug, Clone)]
pub struct Vectorized {
    pub vectors: Vec<Vec<f32>>,
    pub kind: VectorKind,
}

impl Vectorized {
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

enum SemanticSource {
    Disabled,
    /// Initialized on first use; `None` once initialization has failed
    Lazy {
        model: String,
        provider: OnceLock<Option<Box<dyn EmbeddingProvider>>>,
    },
}

pub struct Vectorizer {
    semantic: SemanticSource,
    tfidf: TfidfVectorizer,
}

impl Vectorizer {
    /// Build from configuration; `mode = "frequency"` disables the semantic path
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let semantic = if config.mode == "frequency" {
            SemanticSource::Disabled
        } else {
            SemanticSource::Lazy {
                model: config.model.clone(),
                provider: OnceLock::new(),
            }
        };

        Ok(Self {
            semantic,
            tfidf: TfidfVectorizer::new(config.max_features)?,
        })
    }

    /// TF-IDF only
    pub fn frequency_only(max_features: usize) -> Result<Self> {
        Ok(Self {
            semantic: SemanticSource::Disabled,
            tfidf: TfidfVectorizer::new(max_features)?,
        })
    }

    /// Use an already constructed semantic provider
    pub fn with_provider(provider: Box<dyn EmbeddingProvider>, max_features: usize) -> Result<Self> {
        let cell = OnceLock::new();
        let _ = cell.set(Some(provider));
        Ok(Self {
            semantic: SemanticSource::Lazy {
                model: String::new(),
                provider: cell,
            },
            tfidf: TfidfVectorizer::new(max_features)?,
        })
    }

    fn semantic_provider(&self) -> Option<&dyn EmbeddingProvider> {
        match &self.semantic {
            SemanticSource::Disabled => None,
            SemanticSource::Lazy { model, provider } => provider
                .get_or_init(|| match FastEmbedProvider::new(model) {
                    Ok(p) => Some(Box::new(p) as Box<dyn EmbeddingProvider>),
                    Err(e) => {
                        tracing::warn!(
                            "Semantic embedding unavailable ({}), using TF-IDF vectors",
                            e
                        );
                        None
                    }
                })
                .as_deref(),
        }
    }

    /// Vectorize `texts`, falling back to TF-IDF on any semantic failure
    pub fn vectorize(&self, texts: &[String]) -> Vectorized {
        if let Some(provider) = self.semantic_provider() {
            match provider.embed_batch(texts) {
                Ok(vectors) if vectors.len() == texts.len() => {
                    tracing::debug!(
                        model = provider.model_name(),
                        documents = texts.len(),
                        "Semantic vectorization complete"
                    );
                    return Vectorized {
                        vectors,
                        kind: VectorKind::Semantic,
                    };
                }
                Ok(vectors) => {
                    tracing::warn!(
                        "Semantic provider returned {} vectors for {} texts, using TF-IDF",
                        vectors.len(),
                        texts.len()
                    );
                }
                Err(e) => {
                    tracing::warn!("Semantic embedding failed ({}), using TF-IDF", e);
                }
            }
        }

        Vectorized {
            vectors: self.tfidf.fit_transform(texts),
            kind: VectorKind::Frequency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingError;

    struct FailingProvider;

    impl EmbeddingProvider for FailingProvider {
        fn embed_batch(&self, _texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::GenerationError("offline".to_string()))
        }

        fn dimension(&self) -> usize {
            3
        }

        fn model_name(&self) -> &str {
            "failing"
        }
    }

    struct ConstantProvider;

    impl EmbeddingProvider for ConstantProvider {
        fn embed_batch(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "constant"
        }
    }

    fn texts() -> Vec<String> {
        vec!["invoice total".to_string(), "kernel module".to_string()]
    }

    #[test]
    fn test_failure_falls_back_to_frequency() {
        let vectorizer = Vectorizer::with_provider(Box::new(FailingProvider), 1000).unwrap();
        let result = vectorizer.vectorize(&texts());
        assert_eq!(result.kind, VectorKind::Frequency);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_semantic_used_when_available() {
        let vectorizer = Vectorizer::with_provider(Box::new(ConstantProvider), 1000).unwrap();
        let result = vectorizer.vectorize(&texts());
        assert_eq!(result.kind, VectorKind::Semantic);
        assert_eq!(result.vectors, vec![vec![1.0, 0.0]; 2]);
    }

    #[test]
    fn test_frequency_mode_from_config() {
        let config = EmbeddingConfig {
            mode: "frequency".to_string(),
            ..crate::config::Config::default().embedding
        };
        let vectorizer = Vectorizer::new(&config).unwrap();
        assert_eq!(vectorizer.vectorize(&texts()).kind, VectorKind::Frequency);
    }
}
