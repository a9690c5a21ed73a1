//! Principal component analysis over a small dense matrix.
//!
//! Eigenvectors of the sample covariance come from cyclic Jacobi rotations,
//! which is exact enough for the handful of feature columns used here and
//! needs no LAPACK.

use ndarray::{Array1, Array2, ArrayView2, Axis, s};

use crate::error::AnalysisError;

const MAX_SWEEPS: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct Pca {
    mean: Array1<f64>,
    /// `n_components × n_features`, one principal axis per row.
    components: Array2<f64>,
    explained_variance: Array1<f64>,
    explained_variance_ratio: Array1<f64>,
}

impl Pca {
    /// Fits the top `n_components` principal axes of the rows of `x`.
    ///
    /// Each axis is sign-normalised so that its largest-magnitude loading is
    /// positive. When the data has no variance at all every ratio is `0.0`.
    pub fn fit(x: ArrayView2<f64>, n_components: usize) -> Result<Self, AnalysisError> {
        let (n, features) = x.dim();
        if n < 2 {
            return Err(AnalysisError::Projection(format!(
                "need at least 2 samples, got {n}"
            )));
        }
        if n_components == 0 || n_components > features {
            return Err(AnalysisError::Projection(format!(
                "cannot extract {n_components} components from {features} features"
            )));
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| AnalysisError::Projection("empty input".into()))?;
        let centred = &x - &mean;
        let covariance = centred.t().dot(&centred) / (n as f64 - 1.0);

        let (values, vectors) = jacobi_eigen(&covariance);
        let mut order: Vec<usize> = (0..features).collect();
        order.sort_by(|&a, &b| values[b].total_cmp(&values[a]).then(a.cmp(&b)));

        let values: Vec<f64> = order.iter().map(|&i| values[i].max(0.0)).collect();
        let total: f64 = values.iter().sum();

        let mut components = Array2::zeros((n_components, features));
        for (row, &i) in order.iter().take(n_components).enumerate() {
            let mut axis = vectors.column(i).to_owned();
            let pivot = axis
                .iter()
                .copied()
                .fold(0.0_f64, |best, v| if v.abs() > best.abs() { v } else { best });
            if pivot < 0.0 {
                axis.mapv_inplace(|v| -v);
            }
            components.row_mut(row).assign(&axis);
        }

        let explained_variance = Array1::from_iter(values.iter().take(n_components).copied());
        let explained_variance_ratio = if total > f64::EPSILON {
            explained_variance.mapv(|v| v / total)
        } else {
            Array1::zeros(n_components)
        };

        Ok(Self {
            mean,
            components,
            explained_variance,
            explained_variance_ratio,
        })
    }

    pub fn transform(&self, x: ArrayView2<f64>) -> Array2<f64> {
        (&x - &self.mean).dot(&self.components.t())
    }

    pub fn components(&self) -> &Array2<f64> {
        &self.components
    }

    pub fn explained_variance(&self) -> &Array1<f64> {
        &self.explained_variance
    }

    pub fn explained_variance_ratio(&self) -> &Array1<f64> {
        &self.explained_variance_ratio
    }
}

/// Eigen-decomposition of a symmetric matrix: `(values, vectors)` with
/// eigenvectors in the columns of `vectors`, unsorted.
fn jacobi_eigen(matrix: &Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let n = matrix.nrows();
    let mut a = matrix.clone();
    let mut v = Array2::<f64>::eye(n);

    let norm = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm == 0.0 {
        return (a.diag().to_owned(), v);
    }

    for _ in 0..MAX_SWEEPS {
        let off: f64 = (0..n)
            .flat_map(|p| (p + 1..n).map(move |q| (p, q)))
            .map(|(p, q)| a[[p, q]] * a[[p, q]])
            .sum();
        if off.sqrt() <= f64::EPSILON * norm {
            break;
        }

        for p in 0..n {
            for q in p + 1..n {
                let apq = a[[p, q]];
                if apq == 0.0 {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let (akp, akq) = (a[[k, p]], a[[k, q]]);
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let (apk, aqk) = (a[[p, k]], a[[q, k]]);
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let (vkp, vkq) = (v[[k, p]], v[[k, q]]);
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    (a.diag().to_owned(), v)
}

/// First two columns of a projection, as `(pc1, pc2)` pairs.
pub fn leading_pairs(projected: &Array2<f64>) -> Vec<(f64, f64)> {
    let cols = projected.ncols();
    projected
        .slice(s![.., ..cols.min(2)])
        .axis_iter(Axis(0))
        .map(|row| (row[0], row.get(1).copied().unwrap_or(0.0)))
        .collect()
}
