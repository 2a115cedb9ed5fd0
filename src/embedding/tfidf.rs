//! Frequency-based vectorization
//!
//! TF-IDF fitted over the batch being vectorized: lowercased word tokens of
//! two or more characters, vocabulary capped by corpus term frequency, smooth
//! idf and L2-normalized rows.

use crate::error::{DocsiftError, Result};
use ahash::AHashMap;
use regex::Regex;

use super::provider::l2_normalize;

const TOKEN_PATTERN: &str = r"\b\w\w+\b";

pub struct TfidfVectorizer {
    max_features: usize,
    token_pattern: Regex,
}

impl TfidfVectorizer {
    pub fn new(max_features: usize) -> Result<Self> {
        let token_pattern = Regex::new(TOKEN_PATTERN).map_err(|e| {
            DocsiftError::Config(format!("Invalid token pattern '{}': {}", TOKEN_PATTERN, e))
        })?;

        Ok(Self {
            max_features,
            token_pattern,
        })
    }

    fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        self.token_pattern
            .find_iter(&lowered)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// Retained terms in column order (alphabetical)
    pub fn vocabulary(&self, texts: &[String]) -> Vec<String> {
        let documents: Vec<Vec<String>> = texts.iter().map(|t| self.tokenize(t)).collect();
        self.build_vocabulary(&documents)
    }

    fn build_vocabulary(&self, documents: &[Vec<String>]) -> Vec<String> {
        let mut corpus_counts: AHashMap<&str, usize> = AHashMap::new();
        for tokens in documents {
            for token in tokens {
                *corpus_counts.entry(token.as_str()).or_insert(0) += 1;
            }
        }

        let mut terms: Vec<(&str, usize)> = corpus_counts.into_iter().collect();
        terms.sort_by(|a, b| a.0.cmp(b.0));

        if terms.len() > self.max_features {
            // Stable sort keeps alphabetical order among equal counts
            let mut ranked = terms.clone();
            ranked.sort_by(|a, b| b.1.cmp(&a.1));
            ranked.truncate(self.max_features);
            ranked.sort_by(|a, b| a.0.cmp(b.0));
            terms = ranked;
        }

        terms.into_iter().map(|(term, _)| term.to_string()).collect()
    }

    /// Fit on `texts` and return one dense row per text
    pub fn fit_transform(&self, texts: &[String]) -> Vec<Vec<f32>> {
        let documents: Vec<Vec<String>> = texts.iter().map(|t| self.tokenize(t)).collect();
        let vocabulary = self.build_vocabulary(&documents);

        if vocabulary.is_empty() {
            tracing::debug!("Empty TF-IDF vocabulary, emitting zero vectors");
            return vec![vec![0.0]; texts.len()];
        }

        let columns: AHashMap<&str, usize> = vocabulary
            .iter()
            .enumerate()
            .map(|(i, term)| (term.as_str(), i))
            .collect();

        let mut counts = vec![vec![0.0f32; vocabulary.len()]; documents.len()];
        let mut document_frequency = vec![0usize; vocabulary.len()];

        for (row, tokens) in documents.iter().enumerate() {
            for token in tokens {
                if let Some(&col) = columns.get(token.as_str()) {
                    if counts[row][col] == 0.0 {
                        document_frequency[col] += 1;
                    }
                    counts[row][col] += 1.0;
                }
            }
        }

        let n = documents.len() as f64;
        let idf: Vec<f32> = document_frequency
            .iter()
            .map(|&df| (((1.0 + n) / (1.0 + df as f64)).ln() + 1.0) as f32)
            .collect();

        for row in &mut counts {
            for (value, weight) in row.iter_mut().zip(&idf) {
                *value *= weight;
            }
            l2_normalize(row);
        }

        tracing::debug!(
            documents = texts.len(),
            features = vocabulary.len(),
            "TF-IDF vectorization complete"
        );

        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_tokenization_drops_single_chars() {
        let vectorizer = TfidfVectorizer::new(1000).unwrap();
        let vocab = vectorizer.vocabulary(&texts(&["A b CD été x42"]));
        assert_eq!(vocab, vec!["cd", "x42", "été"]);
    }

    #[test]
    fn test_vocabulary_cap_keeps_most_frequent() {
        let vectorizer = TfidfVectorizer::new(2).unwrap();
        let vocab = vectorizer.vocabulary(&texts(&["zeta zeta alpha", "beta zeta alpha", "gamma"]));
        assert_eq!(vocab, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_vocabulary_cap_ties_alphabetical() {
        let vectorizer = TfidfVectorizer::new(2).unwrap();
        let vocab = vectorizer.vocabulary(&texts(&["delta charlie bravo alpha"]));
        assert_eq!(vocab, vec!["alpha", "bravo"]);
    }

    #[test]
    fn test_rows_are_unit_length() {
        let vectorizer = TfidfVectorizer::new(1000).unwrap();
        let rows = vectorizer.fit_transform(&texts(&[
            "invoice payment total",
            "invoice due date",
            "kernel driver module",
        ]));

        assert_eq!(rows.len(), 3);
        for row in &rows {
            let norm: f32 = row.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_smooth_idf_weights() {
        let vectorizer = TfidfVectorizer::new(1000).unwrap();
        // "common" appears in both documents, "rare" in one
        let rows = vectorizer.fit_transform(&texts(&["common rare", "common"]));
        let vocab = vectorizer.vocabulary(&texts(&["common rare", "common"]));
        assert_eq!(vocab, vec!["common", "rare"]);

        let idf_common = 1.0f32;
        let idf_rare = (3.0f32 / 2.0).ln() + 1.0;
        let norm = (idf_common * idf_common + idf_rare * idf_rare).sqrt();
        assert!((rows[0][0] - idf_common / norm).abs() < 1e-5);
        assert!((rows[0][1] - idf_rare / norm).abs() < 1e-5);
        assert_eq!(rows[1], vec![1.0, 0.0]);
    }

    #[test]
    fn test_empty_vocabulary() {
        let vectorizer = TfidfVectorizer::new(1000).unwrap();
        let rows = vectorizer.fit_transform(&texts(&["a", "", "!"]));
        assert_eq!(rows, vec![vec![0.0]; 3]);
    }
}
