//! Silhouette coefficient (Euclidean).
//!
//! For a point `i` with mean intra-cluster distance `a` and mean distance
//! `b` to the nearest other cluster, `s(i) = (b - a) / max(a, b)`. A point
//! alone in its cluster scores 0. The score is the mean over all points.

use crate::kmeans::squared_distance;
use rayon::prelude::*;
use std::collections::HashSet;

/// Mean silhouette over all samples; 0.0 with fewer than 2 clusters or samples
pub fn silhouette_score(data: &[Vec<f64>], labels: &[usize]) -> f64 {
    let n = data.len().min(labels.len());
    if n < 2 {
        return 0.0;
    }
    let distinct: HashSet<usize> = labels[..n].iter().copied().collect();
    if distinct.len() < 2 {
        return 0.0;
    }
    let k = labels[..n].iter().max().map_or(0, |&m| m + 1);

    let total: f64 = (0..n)
        .into_par_iter()
        .map(|i| {
            let mut sums = vec![0.0; k];
            let mut counts = vec![0usize; k];
            for j in 0..n {
                if i == j {
                    continue;
                }
                sums[labels[j]] += squared_distance(&data[i], &data[j]).sqrt();
                counts[labels[j]] += 1;
            }

            let own = labels[i];
            if counts[own] == 0 {
                return 0.0;
            }
            let a = sums[own] / counts[own] as f64;
            let b = (0..k)
                .filter(|&c| c != own && counts[c] > 0)
                .map(|c| sums[c] / counts[c] as f64)
                .fold(f64::INFINITY, f64::min);

            let denom = a.max(b);
            if denom > 0.0 && denom.is_finite() { (b - a) / denom } else { 0.0 }
        })
        .sum();

    total / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_separated_clusters_score_high() {
        let data = vec![
            vec![0.0, 0.0],
            vec![0.1, 0.1],
            vec![5.0, 5.0],
            vec![5.1, 5.1],
        ];
        let score = silhouette_score(&data, &[0, 0, 1, 1]);
        assert!(score > 0.9, "score {score}");
    }

    #[test]
    fn test_single_cluster_scores_zero() {
        let data = vec![vec![0.0], vec![1.0], vec![2.0]];
        assert_eq!(silhouette_score(&data, &[0, 0, 0]), 0.0);
        assert_eq!(silhouette_score(&data[..1], &[0]), 0.0);
    }

    #[test]
    fn test_score_is_bounded() {
        let data = vec![vec![0.0], vec![3.0], vec![1.0], vec![4.0]];
        let score = silhouette_score(&data, &[0, 0, 1, 1]);
        assert!((-1.0..=1.0).contains(&score));
        assert!(score < 0.0);
    }
}
