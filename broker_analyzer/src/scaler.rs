//! Column-wise z-score standardization.

use ndarray::{Array1, Array2, ArrayView2, Axis};

/// Columns whose standard deviation is below this are only centred.
const ZERO_SCALE: f64 = 10.0 * f64::EPSILON;

/// Mean and scale fitted on one matrix.
///
/// A fitted scaler lives only as long as the analysis run that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    /// Fits per-column mean and population standard deviation.
    pub fn fit(x: ArrayView2<f64>) -> Self {
        let cols = x.ncols();
        let mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(cols));
        let scale = if x.nrows() == 0 {
            Array1::ones(cols)
        } else {
            x.std_axis(Axis(0), 0.0)
                .mapv(|s| if s.is_finite() && s >= ZERO_SCALE { s } else { 1.0 })
        };
        Self { mean, scale }
    }

    pub fn transform(&self, x: ArrayView2<f64>) -> Array2<f64> {
        (&x - &self.mean) / &self.scale
    }

    pub fn fit_transform(x: ArrayView2<f64>) -> Array2<f64> {
        Self::fit(x).transform(x)
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn scale(&self) -> &Array1<f64> {
        &self.scale
    }
}
