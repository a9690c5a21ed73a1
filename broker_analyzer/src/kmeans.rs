//! Seeded k-means (Lloyd iterations with greedy k-means++ seeding).
//!
//! Fits are fully determined by the seed: the generator is created inside
//! [`KMeans::fit`] and dropped with it.

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::error::AnalysisError;

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_MAX_ITER: usize = 300;
pub const DEFAULT_TOL: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KMeans {
    pub n_clusters: usize,
    pub seed: u64,
    pub max_iter: usize,
    /// Convergence tolerance, relative to the mean per-column variance of the data.
    pub tol: f64,
}

/// Result of one fit.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit {
    pub centroids: Array2<f64>,
    pub labels: Vec<usize>,
    /// Sum of squared distances of every point to its assigned centroid.
    pub inertia: f64,
    pub n_iter: usize,
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Nearest centroid of every row (lowest index wins ties) and the squared distance to it.
fn assign(x: ArrayView2<f64>, centroids: &Array2<f64>) -> (Vec<usize>, Vec<f64>) {
    x.axis_iter(Axis(0))
        .map(|row| {
            centroids
                .axis_iter(Axis(0))
                .enumerate()
                .map(|(c, centre)| (c, squared_distance(row, centre)))
                .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
        })
        .unzip()
}

impl KMeans {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            seed: DEFAULT_SEED,
            max_iter: DEFAULT_MAX_ITER,
            tol: DEFAULT_TOL,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Clusters the rows of `x`.
    ///
    /// # Errors
    ///
    /// [`AnalysisError::Clustering`] when `n_clusters` is zero or exceeds the number of rows.
    pub fn fit(&self, x: ArrayView2<f64>) -> Result<KMeansFit, AnalysisError> {
        let n = x.nrows();
        let k = self.n_clusters;
        if k == 0 || k > n {
            return Err(AnalysisError::Clustering(format!(
                "cannot form {k} clusters from {n} samples"
            )));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut centroids = kmeans_plus_plus(x, k, &mut rng);

        let variance_scale = x
            .var_axis(Axis(0), 0.0)
            .mean()
            .unwrap_or(0.0);
        let tol = self.tol * variance_scale;

        let mut labels: Vec<usize> = Vec::new();
        let mut n_iter = 0;
        for iter in 0..self.max_iter {
            n_iter = iter + 1;
            let (new_labels, distances) = assign(x, &centroids);
            let updated = update_centroids(x, &new_labels, &distances, k);

            let shift: f64 = centroids
                .axis_iter(Axis(0))
                .zip(updated.axis_iter(Axis(0)))
                .map(|(a, b)| squared_distance(a, b))
                .sum();
            centroids = updated;

            let unchanged = new_labels == labels;
            labels = new_labels;
            if unchanged || shift <= tol {
                break;
            }
        }

        // labels must match the final centroids
        let (labels, distances) = assign(x, &centroids);
        Ok(KMeansFit {
            centroids,
            labels,
            inertia: distances.iter().sum(),
            n_iter,
        })
    }
}

/// Greedy k-means++: each new centre is the best of a few candidates sampled
/// proportionally to the squared distance from the centres chosen so far.
fn kmeans_plus_plus(x: ArrayView2<f64>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let n = x.nrows();
    let trials = 2 + (k as f64).ln().floor() as usize;

    let mut chosen = vec![rng.gen_range(0..n)];
    let mut closest: Vec<f64> = x
        .axis_iter(Axis(0))
        .map(|row| squared_distance(row, x.row(chosen[0])))
        .collect();
    let mut potential: f64 = closest.iter().sum();

    while chosen.len() < k {
        let cumulative: Vec<f64> = closest
            .iter()
            .scan(0.0, |acc, d| {
                *acc += d;
                Some(*acc)
            })
            .collect();

        let mut best: Option<(usize, f64, Vec<f64>)> = None;
        for _ in 0..trials {
            let target = rng.r#gen::<f64>() * potential;
            let candidate = cumulative
                .partition_point(|&c| c < target)
                .min(n - 1);
            let distances: Vec<f64> = x
                .axis_iter(Axis(0))
                .zip(&closest)
                .map(|(row, &d)| d.min(squared_distance(row, x.row(candidate))))
                .collect();
            let candidate_potential: f64 = distances.iter().sum();
            if best.as_ref().is_none_or(|b| candidate_potential < b.1) {
                best = Some((candidate, candidate_potential, distances));
            }
        }

        let Some((candidate, candidate_potential, distances)) = best else {
            break;
        };
        chosen.push(candidate);
        closest = distances;
        potential = candidate_potential;
    }

    let mut centroids = Array2::zeros((k, x.ncols()));
    for (c, &row) in chosen.iter().enumerate() {
        centroids.row_mut(c).assign(&x.row(row));
    }
    centroids
}

/// Means of the assigned rows. An empty cluster takes over the row lying
/// farthest from its current centroid.
fn update_centroids(
    x: ArrayView2<f64>,
    labels: &[usize],
    distances: &[f64],
    k: usize,
) -> Array2<f64> {
    let mut sums = Array2::<f64>::zeros((k, x.ncols()));
    let mut counts = vec![0usize; k];
    for (row, &label) in x.axis_iter(Axis(0)).zip(labels) {
        let mut target = sums.row_mut(label);
        target += &row;
        counts[label] += 1;
    }

    let mut far_rows: Vec<usize> = (0..x.nrows()).collect();
    far_rows.sort_by(|&a, &b| distances[b].total_cmp(&distances[a]).then(a.cmp(&b)));
    let mut far_rows = far_rows.into_iter();

    for c in 0..k {
        if counts[c] > 0 {
            let count = counts[c] as f64;
            sums.row_mut(c).mapv_inplace(|v| v / count);
        } else if let Some(row) = far_rows.next() {
            sums.row_mut(c).assign(&x.row(row));
        }
    }
    sums
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    fn blobs() -> Array2<f64> {
        array![
            [0.0, 0.0],
            [0.1, 0.0],
            [0.0, 0.1],
            [10.0, 10.0],
            [10.1, 10.0],
            [10.0, 10.1],
        ]
    }

    #[test]
    fn separates_two_blobs() {
        let x = blobs();
        let fit = KMeans::new(2).fit(x.view()).unwrap();

        assert_eq!(fit.labels[0], fit.labels[1]);
        assert_eq!(fit.labels[1], fit.labels[2]);
        assert_eq!(fit.labels[3], fit.labels[4]);
        assert_eq!(fit.labels[4], fit.labels[5]);
        assert_ne!(fit.labels[0], fit.labels[3]);
        assert!(fit.inertia < 0.1);
    }

    #[test]
    fn one_cluster_inertia_is_total_scatter() {
        let x = array![[0.0], [2.0], [4.0]];
        let fit = KMeans::new(1).fit(x.view()).unwrap();
        assert_eq!(fit.labels, vec![0, 0, 0]);
        assert!((fit.centroids[[0, 0]] - 2.0).abs() < 1e-12);
        assert!((fit.inertia - 8.0).abs() < 1e-12);
    }

    #[test]
    fn k_equal_to_n_has_zero_inertia() {
        let x = blobs();
        let fit = KMeans::new(6).fit(x.view()).unwrap();
        assert!(fit.inertia.abs() < 1e-12);
        let mut labels = fit.labels.clone();
        labels.sort();
        labels.dedup();
        assert_eq!(labels.len(), 6);
    }

    #[test]
    fn same_seed_same_result() {
        let x = blobs();
        let a = KMeans::new(3).fit(x.view()).unwrap();
        let b = KMeans::new(3).fit(x.view()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_impossible_k() {
        let x = blobs();
        assert!(KMeans::new(0).fit(x.view()).is_err());
        assert!(KMeans::new(7).fit(x.view()).is_err());
    }

    #[test]
    fn duplicate_points_do_not_break_seeding() {
        let x = array![[1.0, 1.0], [1.0, 1.0], [1.0, 1.0]];
        let fit = KMeans::new(3).fit(x.view()).unwrap();
        assert_eq!(fit.inertia, 0.0);
        assert_eq!(fit.labels.len(), 3);
    }
}
