//! K-Means clustering.
//!
//! ## Algorithm
//! 1. Seed centroids with k-means++ (D² sampling from a seeded `StdRng`)
//! 2. Lloyd iterations: assign every point to its nearest centroid, move
//!    each centroid to the mean of its points
//! 3. Stop when the total centroid shift falls under `tol` (relative to
//!    the data variance) or after `max_iter` iterations
//! 4. Repeat from 1 `n_init` times in parallel; keep the run with the
//!    lowest inertia (ties go to the earliest run)
//!
//! Run `i` is seeded with `random_state + i`, so a fit is fully
//! reproducible for a given input and configuration.

use crate::error::{EngineError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A fitted partition: the centroids and how well they fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeansModel {
    pub centroids: Vec<Vec<f64>>,
    /// Sum of squared distances from each point to its centroid
    #[serde(default)]
    pub inertia: f64,
    #[serde(default)]
    pub n_iter: usize,
}

impl KMeansModel {
    pub fn n_clusters(&self) -> usize {
        self.centroids.len()
    }

    pub fn dim(&self) -> usize {
        self.centroids.first().map(Vec::len).unwrap_or(0)
    }

    /// Nearest centroid for one point
    pub fn predict_one(&self, point: &[f64]) -> usize {
        nearest(&self.centroids, point).0
    }

    pub fn predict(&self, points: &[Vec<f64>]) -> Result<Vec<usize>> {
        if let Some(bad) = points.iter().find(|p| p.len() != self.dim()) {
            return Err(EngineError::DimensionMismatch {
                expected: self.dim(),
                found: bad.len(),
            });
        }
        Ok(points.par_iter().map(|p| self.predict_one(p)).collect())
    }
}

/// Output of [`KMeans::fit`]
#[derive(Debug, Clone)]
pub struct KMeansFit {
    pub model: KMeansModel,
    /// Cluster of each input point, in input order
    pub labels: Vec<usize>,
}

/// K-Means configuration
#[derive(Debug, Clone)]
pub struct KMeans {
    n_clusters: usize,
    n_init: usize,
    max_iter: usize,
    tol: f64,
    random_state: u64,
}

impl KMeans {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            n_init: 10,
            max_iter: 300,
            tol: 1e-4,
            random_state: 42,
        }
    }

    /// Configure the number of independent initializations (default: 10)
    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init.max(1);
        self
    }

    /// Configure the iteration cap per initialization (default: 300)
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter.max(1);
        self
    }

    /// Configure the convergence tolerance (default: 1e-4)
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Configure the base random seed (default: 42)
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn fit(&self, data: &[Vec<f64>]) -> Result<KMeansFit> {
        let Some(first) = data.first() else {
            return Err(EngineError::EmptyInput);
        };
        let dim = first.len();
        if let Some(bad) = data.iter().find(|p| p.len() != dim) {
            return Err(EngineError::DimensionMismatch {
                expected: dim,
                found: bad.len(),
            });
        }

        let mut k = self.n_clusters.max(1);
        if k > data.len() {
            warn!(
                requested = k,
                samples = data.len(),
                "Fewer samples than clusters, reducing cluster count"
            );
            k = data.len();
        }

        let tol = self.tol * mean_variance(data);

        let runs: Vec<KMeansFit> = (0..self.n_init)
            .into_par_iter()
            .map(|i| self.run_once(data, k, tol, self.random_state.wrapping_add(i as u64)))
            .collect();

        let mut best: Option<KMeansFit> = None;
        for run in runs {
            let better = match &best {
                Some(b) => run.model.inertia < b.model.inertia,
                None => true,
            };
            if better {
                best = Some(run);
            }
        }

        let best = best.ok_or(EngineError::EmptyInput)?;
        debug!(
            k,
            inertia = best.model.inertia,
            n_iter = best.model.n_iter,
            "K-Means fit complete"
        );
        Ok(best)
    }

    fn run_once(&self, data: &[Vec<f64>], k: usize, tol: f64, seed: u64) -> KMeansFit {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut centroids = kmeans_plus_plus(data, k, &mut rng);
        let dim = centroids[0].len();
        let mut n_iter = 0;

        for iter in 0..self.max_iter {
            n_iter = iter + 1;
            let assignments: Vec<(usize, f64)> =
                data.par_iter().map(|p| nearest(&centroids, p)).collect();

            let mut sums = vec![vec![0.0; dim]; k];
            let mut counts = vec![0usize; k];
            for (point, &(label, _)) in data.iter().zip(&assignments) {
                counts[label] += 1;
                for (s, v) in sums[label].iter_mut().zip(point) {
                    *s += v;
                }
            }

            // Empty clusters take the points farthest from their centroid
            let mut far: Vec<usize> = Vec::new();
            if counts.contains(&0) {
                far = (0..data.len()).collect();
                far.sort_by(|&a, &b| {
                    assignments[b]
                        .1
                        .total_cmp(&assignments[a].1)
                        .then(a.cmp(&b))
                });
            }
            let mut far = far.into_iter();

            let mut shift = 0.0;
            for c in 0..k {
                let updated = if counts[c] > 0 {
                    sums[c].iter().map(|s| s / counts[c] as f64).collect()
                } else {
                    match far.next() {
                        Some(idx) => data[idx].clone(),
                        None => centroids[c].clone(),
                    }
                };
                shift += squared_distance(&centroids[c], &updated);
                centroids[c] = updated;
            }

            if shift <= tol {
                break;
            }
        }

        let assignments: Vec<(usize, f64)> =
            data.par_iter().map(|p| nearest(&centroids, p)).collect();
        let inertia = assignments.iter().map(|(_, d)| d).sum();
        let labels = assignments.into_iter().map(|(l, _)| l).collect();

        KMeansFit {
            model: KMeansModel {
                centroids,
                inertia,
                n_iter,
            },
            labels,
        }
    }
}

/// k-means++ seeding: each next centroid is drawn with probability
/// proportional to its squared distance from the nearest chosen centroid
fn kmeans_plus_plus(data: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(data[rng.random_range(0..data.len())].clone());

    let mut d2: Vec<f64> = data
        .iter()
        .map(|p| squared_distance(p, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = d2.iter().sum();
        let next = if total > 0.0 {
            let mut target = rng.random::<f64>() * total;
            let mut chosen = data.len() - 1;
            for (i, &w) in d2.iter().enumerate() {
                if target < w {
                    chosen = i;
                    break;
                }
                target -= w;
            }
            chosen
        } else {
            // Every point coincides with a centroid
            rng.random_range(0..data.len())
        };

        let centroid = data[next].clone();
        for (d, p) in d2.iter_mut().zip(data) {
            *d = d.min(squared_distance(p, &centroid));
        }
        centroids.push(centroid);
    }

    centroids
}

/// Index of and squared distance to the nearest centroid (lowest index on ties)
fn nearest(centroids: &[Vec<f64>], point: &[f64]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (i, c) in centroids.iter().enumerate() {
        let d = squared_distance(c, point);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

pub(crate) fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

fn mean_variance(data: &[Vec<f64>]) -> f64 {
    let n = data.len() as f64;
    let dim = data[0].len();
    if dim == 0 {
        return 0.0;
    }
    let total: f64 = (0..dim)
        .map(|c| {
            let mean = data.iter().map(|r| r[c]).sum::<f64>() / n;
            data.iter().map(|r| (r[c] - mean).powi(2)).sum::<f64>() / n
        })
        .sum();
    total / dim as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 0.0],
            vec![0.1, 0.0],
            vec![0.0, 0.1],
            vec![10.0, 10.0],
            vec![10.1, 10.0],
            vec![10.0, 10.1],
        ]
    }

    #[test]
    fn test_separates_blobs() {
        let fit = KMeans::new(2).fit(&two_blobs()).unwrap();
        assert_eq!(fit.model.n_clusters(), 2);
        assert_eq!(fit.labels[0], fit.labels[1]);
        assert_eq!(fit.labels[1], fit.labels[2]);
        assert_eq!(fit.labels[3], fit.labels[4]);
        assert_ne!(fit.labels[0], fit.labels[3]);
        assert!(fit.model.inertia < 0.1);
    }

    #[test]
    fn test_fit_is_reproducible() {
        let a = KMeans::new(3).with_random_state(7).fit(&two_blobs()).unwrap();
        let b = KMeans::new(3).with_random_state(7).fit(&two_blobs()).unwrap();
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.model, b.model);
    }

    #[test]
    fn test_k_clamped_to_sample_count() {
        let data = vec![vec![1.0], vec![2.0]];
        let fit = KMeans::new(5).fit(&data).unwrap();
        assert_eq!(fit.model.n_clusters(), 2);
        assert_ne!(fit.labels[0], fit.labels[1]);
    }

    #[test]
    fn test_identical_points() {
        let data = vec![vec![3.0, 3.0]; 4];
        let fit = KMeans::new(2).fit(&data).unwrap();
        assert_eq!(fit.labels.len(), 4);
        assert_eq!(fit.model.inertia, 0.0);
    }

    #[test]
    fn test_empty_input_is_an_error() {
        assert!(matches!(KMeans::new(2).fit(&[]), Err(EngineError::EmptyInput)));
    }

    #[test]
    fn test_predict_matches_training_labels() {
        let data = two_blobs();
        let fit = KMeans::new(2).fit(&data).unwrap();
        assert_eq!(fit.model.predict(&data).unwrap(), fit.labels);
        assert!(fit.model.predict(&[vec![1.0]]).is_err());
    }
}
