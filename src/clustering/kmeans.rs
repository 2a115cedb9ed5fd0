//! Seeded k-means with k-means++ initialization and multiple restarts

use crate::config::ClusteringConfig;
use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum KMeansError {
    #[error("Number of clusters must be at least 1")]
    ZeroClusters,

    #[error("Cannot fit {k} clusters to {n} samples")]
    TooFewSamples { n: usize, k: usize },

    #[error("Samples have zero dimensions")]
    ZeroDimension,

    #[error("Input contains NaN or infinite values")]
    NonFinite,
}

/// Result of a k-means fit
#[derive(Debug, Clone)]
pub struct KMeansFit {
    /// Cluster index per sample, in sample order
    pub labels: Vec<usize>,
    pub centroids: Array2<f64>,
    /// Sum of squared distances from each sample to its centroid
    pub inertia: f64,
}

impl KMeansFit {
    /// Number of distinct labels actually used
    pub fn distinct_labels(&self) -> usize {
        let mut seen: Vec<usize> = self.labels.clone();
        seen.sort_unstable();
        seen.dedup();
        seen.len()
    }
}

/// K-means estimator
#[derive(Debug, Clone)]
pub struct KMeans {
    k: usize,
    n_init: usize,
    max_iterations: usize,
    tolerance: f64,
    seed: u64,
}

impl KMeans {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            n_init: 10,
            max_iterations: 300,
            tolerance: 1e-4,
            seed: 42,
        }
    }

    pub fn from_config(k: usize, config: &ClusteringConfig) -> Self {
        Self {
            k,
            n_init: config.n_init,
            max_iterations: config.max_iterations,
            tolerance: config.tolerance,
            seed: config.random_seed,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    /// Fit `data` (one sample per row), keeping the restart with the lowest inertia
    pub fn fit(&self, data: ArrayView2<f64>) -> Result<KMeansFit, KMeansError> {
        let (n, dim) = data.dim();

        if self.k == 0 {
            return Err(KMeansError::ZeroClusters);
        }
        if n < self.k {
            return Err(KMeansError::TooFewSamples { n, k: self.k });
        }
        if dim == 0 {
            return Err(KMeansError::ZeroDimension);
        }
        if data.iter().any(|x| !x.is_finite()) {
            return Err(KMeansError::NonFinite);
        }

        let tolerance = self.tolerance * mean_feature_variance(data);
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut best = self.single_run(data, tolerance, &mut rng);
        for _ in 1..self.n_init.max(1) {
            let candidate = self.single_run(data, tolerance, &mut rng);
            if candidate.inertia < best.inertia {
                best = candidate;
            }
        }

        Ok(best)
    }

    fn single_run(&self, data: ArrayView2<f64>, tolerance: f64, rng: &mut StdRng) -> KMeansFit {
        let n = data.nrows();
        let mut centroids = kmeans_plusplus_init(data, self.k, rng);
        let mut labels = vec![usize::MAX; n];

        for _ in 0..self.max_iterations {
            let mut changed = false;
            for (i, sample) in data.outer_iter().enumerate() {
                let nearest = nearest_centroid(sample, &centroids).0;
                if labels[i] != nearest {
                    labels[i] = nearest;
                    changed = true;
                }
            }

            let updated = recompute_centroids(data, &labels, &centroids);
            let shift: f64 = centroids
                .outer_iter()
                .zip(updated.outer_iter())
                .map(|(old, new)| squared_distance(old, new))
                .sum();
            centroids = updated;

            if !changed || shift <= tolerance {
                break;
            }
        }

        // Final assignment against the converged centroids
        let mut inertia = 0.0;
        for (i, sample) in data.outer_iter().enumerate() {
            let (nearest, distance) = nearest_centroid(sample, &centroids);
            labels[i] = nearest;
            inertia += distance;
        }

        KMeansFit {
            labels,
            centroids,
            inertia,
        }
    }
}

/// Squared Euclidean distance
pub fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Index of the closest centroid (lowest index on ties) and its squared distance
fn nearest_centroid(sample: ArrayView1<f64>, centroids: &Array2<f64>) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (c, centroid) in centroids.outer_iter().enumerate() {
        let distance = squared_distance(sample, centroid);
        if distance < best.1 {
            best = (c, distance);
        }
    }
    best
}

fn mean_feature_variance(data: ArrayView2<f64>) -> f64 {
    let n = data.nrows() as f64;
    let dim = data.ncols();
    let mut total = 0.0;
    for column in data.columns() {
        let mean = column.sum() / n;
        total += column.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n;
    }
    total / dim as f64
}

/// k-means++ seeding: first centroid uniform, then proportional to squared distance
fn kmeans_plusplus_init(data: ArrayView2<f64>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let (n, dim) = data.dim();
    let mut centroids = Array2::<f64>::zeros((k, dim));
    centroids.row_mut(0).assign(&data.row(rng.gen_range(0..n)));

    let mut closest: Vec<f64> = data
        .outer_iter()
        .map(|sample| squared_distance(sample, centroids.row(0)))
        .collect();

    for c in 1..k {
        let total: f64 = closest.iter().sum();

        let chosen = if total <= 0.0 {
            // Every sample coincides with a centroid already
            rng.gen_range(0..n)
        } else {
            let threshold = rng.gen::<f64>() * total;
            let mut cumsum = 0.0;
            let mut chosen = n - 1;
            for (i, d) in closest.iter().enumerate() {
                cumsum += d;
                if cumsum >= threshold && *d > 0.0 {
                    chosen = i;
                    break;
                }
            }
            chosen
        };

        centroids.row_mut(c).assign(&data.row(chosen));

        for (i, sample) in data.outer_iter().enumerate() {
            let distance = squared_distance(sample, centroids.row(c));
            if distance < closest[i] {
                closest[i] = distance;
            }
        }
    }

    centroids
}

/// Mean of each cluster's members; an empty cluster keeps its previous centroid
fn recompute_centroids(data: ArrayView2<f64>, labels: &[usize], previous: &Array2<f64>) -> Array2<f64> {
    let (k, dim) = previous.dim();
    let mut sums = Array2::<f64>::zeros((k, dim));
    let mut counts = vec![0usize; k];

    for (sample, &label) in data.outer_iter().zip(labels) {
        counts[label] += 1;
        let mut row = sums.row_mut(label);
        row += &sample;
    }

    for c in 0..k {
        if counts[c] > 0 {
            let mut row = sums.row_mut(c);
            row /= counts[c] as f64;
        } else {
            sums.row_mut(c).assign(&previous.row(c));
        }
    }

    sums
}
