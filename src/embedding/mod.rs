/// Text vectorization
///
/// - EmbeddingProvider trait for semantic backends
/// - FastEmbedProvider for local multilingual sentence embeddings
/// - TfidfVectorizer as the frequency-based fallback
/// - Vectorizer choosing between them per call
mod provider;
mod tfidf;
mod vectorizer;

pub use provider::{l2_normalize, EmbeddingError, EmbeddingProvider, FastEmbedProvider};
pub use tfidf::TfidfVectorizer;
pub use vectorizer::{VectorKind, Vectorized, Vectorizer};
