//! Mean silhouette coefficient over Euclidean distances

use ndarray::ArrayView2;

use super::kmeans::squared_distance;

/// Mean silhouette of a labelling, or `None` when it is undefined
/// (fewer than two labels, or every sample in its own cluster).
///
/// Samples in singleton clusters score 0.
pub fn silhouette_score(data: ArrayView2<f64>, labels: &[usize]) -> Option<f64> {
    let n = data.nrows();
    if n == 0 || labels.len() != n {
        return None;
    }

    let n_labels = labels.iter().copied().max().map_or(0, |m| m + 1);
    let mut sizes = vec![0usize; n_labels];
    for &label in labels {
        sizes[label] += 1;
    }
    let used = sizes.iter().filter(|&&s| s > 0).count();
    if used < 2 || used >= n {
        return None;
    }

    let mut total = 0.0;
    let mut distance_sums = vec![0.0f64; n_labels];

    for i in 0..n {
        let own = labels[i];
        if sizes[own] == 1 {
            continue;
        }

        distance_sums.iter_mut().for_each(|d| *d = 0.0);
        for j in 0..n {
            if i != j {
                distance_sums[labels[j]] += squared_distance(data.row(i), data.row(j)).sqrt();
            }
        }

        let a = distance_sums[own] / (sizes[own] - 1) as f64;
        let b = (0..n_labels)
            .filter(|&c| c != own && sizes[c] > 0)
            .map(|c| distance_sums[c] / sizes[c] as f64)
            .fold(f64::INFINITY, f64::min);

        let denominator = a.max(b);
        if denominator > 0.0 {
            total += (b - a) / denominator;
        }
    }

    Some(total / n as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_well_separated_scores_high() {
        let data = array![[0.0, 0.0], [0.0, 1.0], [10.0, 0.0], [10.0, 1.0]];
        let score = silhouette_score(data.view(), &[0, 0, 1, 1]).unwrap();
        assert!(score > 0.85);
    }

    #[test]
    fn test_known_value() {
        // a = 1, b = mean(10, sqrt(101)) for every sample
        let data = array![[0.0, 0.0], [0.0, 1.0], [10.0, 0.0], [10.0, 1.0]];
        let score = silhouette_score(data.view(), &[0, 0, 1, 1]).unwrap();
        let b = (10.0 + 101f64.sqrt()) / 2.0;
        assert!((score - (b - 1.0) / b).abs() < 1e-9);
    }

    #[test]
    fn test_bad_labelling_scores_low() {
        let data = array![[0.0, 0.0], [0.0, 1.0], [10.0, 0.0], [10.0, 1.0]];
        let score = silhouette_score(data.view(), &[0, 1, 0, 1]).unwrap();
        assert!(score < 0.0);
    }

    #[test]
    fn test_singleton_counts_zero() {
        let data = array![[0.0], [0.0], [5.0]];
        // Two identical samples share a cluster (score 1 each), the singleton scores 0
        let score = silhouette_score(data.view(), &[0, 0, 1]).unwrap();
        assert!((score - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_undefined_cases() {
        let data = array![[0.0], [1.0], [2.0]];
        assert!(silhouette_score(data.view(), &[0, 0, 0]).is_none());
        assert!(silhouette_score(data.view(), &[0, 1, 2]).is_none());
        assert!(silhouette_score(data.view(), &[0, 1]).is_none());
    }
}
