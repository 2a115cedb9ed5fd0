//! Document clustering with automatic cluster-count selection
//!
//! Candidate cluster counts are scanned in ascending order; each is fitted
//! with seeded k-means and scored by mean silhouette. The first count with the
//! strictly highest score wins, so ties keep the smallest k.

mod kmeans;
mod silhouette;

pub use kmeans::{KMeans, KMeansError, KMeansFit};
pub use silhouette::silhouette_score;

use crate::config::ClusteringConfig;
use crate::embedding::{VectorKind, Vectorized};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// Name given to the single group produced when there is nothing to partition
pub const SINGLE_CLUSTER_NAME: &str = "All documents";

/// A transient group of documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub cluster_id: usize,
    pub document_ids: Vec<String>,
    pub name: String,
}

impl Cluster {
    /// Provisional name used until the namer replaces it
    pub fn placeholder_name(cluster_id: usize) -> String {
        format!("Cluster {}", cluster_id + 1)
    }
}

/// Outcome of the cluster-count search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KSelection {
    pub k: usize,
    /// Silhouette of the chosen k, `-1.0` if no candidate produced a score
    pub score: f64,
}

pub struct ClusterEngine {
    config: ClusteringConfig,
}

impl ClusterEngine {
    pub fn new(config: ClusteringConfig) -> Self {
        Self { config }
    }

    /// Largest k considered for this batch
    fn k_upper(&self, n: usize, kind: VectorKind) -> usize {
        let k_max = match kind {
            VectorKind::Semantic => self.config.max_k_semantic,
            VectorKind::Frequency => self.config.max_k_frequency,
        };
        k_max.min(n / 2)
    }

    /// Partition `document_ids` by their vectors. Never fails: anything that
    /// cannot be fitted comes back as a single cluster.
    pub fn cluster(&self, vectorized: &Vectorized, document_ids: &[String]) -> Vec<Cluster> {
        let n = document_ids.len();
        if n < 2 {
            return single_cluster(document_ids);
        }

        if vectorized.len() != n {
            tracing::warn!(
                "Got {} vectors for {} documents, returning a single cluster",
                vectorized.len(),
                n
            );
            return single_cluster(document_ids);
        }

        let data = match to_matrix(&vectorized.vectors) {
            Some(data) => data,
            None => {
                tracing::warn!("Vectors have inconsistent dimensions, returning a single cluster");
                return single_cluster(document_ids);
            }
        };

        let selection = match self.select_k(data.view(), vectorized.kind) {
            Some(selection) => selection,
            None => return single_cluster(document_ids),
        };

        let fit = match KMeans::from_config(selection.k, &self.config).fit(data.view()) {
            Ok(fit) => fit,
            Err(e) => {
                tracing::warn!("Final fit at k={} failed: {}", selection.k, e);
                return single_cluster(document_ids);
            }
        };

        tracing::info!(
            k = selection.k,
            score = selection.score,
            documents = n,
            "Clustering complete"
        );

        group_by_label(&fit.labels, document_ids)
    }

    /// Scan k over `[2, min(K_max, n/2)]`. `None` when the range is empty.
    pub fn select_k(&self, data: ArrayView2<f64>, kind: VectorKind) -> Option<KSelection> {
        let k_upper = self.k_upper(data.nrows(), kind);
        if k_upper < 2 {
            tracing::debug!("No candidate cluster count for {} documents", data.nrows());
            return None;
        }

        let mut best = KSelection { k: 2, score: -1.0 };

        for k in 2..=k_upper {
            let fit = match KMeans::from_config(k, &self.config).fit(data) {
                Ok(fit) => fit,
                Err(e) => {
                    tracing::debug!("Skipping k={}: {}", k, e);
                    continue;
                }
            };

            if fit.distinct_labels() < 2 {
                tracing::debug!("Skipping k={}: labels collapsed to one cluster", k);
                continue;
            }

            let Some(score) = silhouette_score(data, &fit.labels) else {
                continue;
            };

            tracing::debug!(k, score, "Scored candidate cluster count");

            if score > best.score {
                best = KSelection { k, score };
            }
        }

        Some(best)
    }
}

fn single_cluster(document_ids: &[String]) -> Vec<Cluster> {
    vec![Cluster {
        cluster_id: 0,
        document_ids: document_ids.to_vec(),
        name: SINGLE_CLUSTER_NAME.to_string(),
    }]
}

fn to_matrix(vectors: &[Vec<f32>]) -> Option<Array2<f64>> {
    let dim = vectors.first()?.len();
    if vectors.iter().any(|v| v.len() != dim) {
        return None;
    }
    let flat: Vec<f64> = vectors.iter().flatten().map(|&x| x as f64).collect();
    Array2::from_shape_vec((vectors.len(), dim), flat).ok()
}

/// One cluster per label, ordered by first appearance
fn group_by_label(labels: &[usize], document_ids: &[String]) -> Vec<Cluster> {
    let mut clusters: Vec<Cluster> = Vec::new();
    for (label, id) in labels.iter().zip(document_ids) {
        match clusters.iter_mut().find(|c| c.cluster_id == *label) {
            Some(cluster) => cluster.document_ids.push(id.clone()),
            None => clusters.push(Cluster {
                cluster_id: *label,
                document_ids: vec![id.clone()],
                name: Cluster::placeholder_name(*label),
            }),
        }
    }
    clusters
}
