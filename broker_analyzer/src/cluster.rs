//! Choosing the number of clusters and partitioning brokers.

use ndarray::Array2;
use tracing::debug;

use crate::{
    error::AnalysisError,
    features::{FeatureMatrix, FeatureVector},
    kmeans::KMeans,
    scaler::StandardScaler,
};

/// Upper bound on the number of clusters tried by the elbow search.
pub const MAX_CLUSTERS: usize = 8;

/// Brokers with their cluster labels.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterAssignment {
    pub features: FeatureMatrix,
    /// One label per broker, in `features` order, each in `0..optimal_k`.
    pub labels: Vec<usize>,
    pub optimal_k: usize,
    /// Inertia for `k = 1..=max_k`; empty when only one cluster was possible.
    pub inertias: Vec<f64>,
}

impl ClusterAssignment {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureVector, usize)> {
        self.features
            .iter()
            .zip(&self.labels)
            .map(|((broker, f), &label)| (broker, f, label))
    }

    pub fn label_of(&self, broker: &str) -> Option<usize> {
        self.iter().find(|(b, ..)| *b == broker).map(|(.., label)| label)
    }
}

/// Picks `k` from the inertia curve `inertias[i] = I(k = i + 1)`.
///
/// The knee is where the second difference peaks. With fewer than three
/// points there is no second difference and half of the range is used.
pub fn elbow_k(inertias: &[f64]) -> usize {
    let max_k = inertias.len();
    if max_k <= 1 {
        return 1;
    }
    if max_k < 3 {
        return (max_k / 2).max(1);
    }

    let (best, _) = inertias
        .windows(3)
        .map(|w| w[0] - 2.0 * w[1] + w[2])
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, d)| {
            if d > best.1 { (i, d) } else { best }
        });
    best + 2
}

/// Standardizes the features, runs the elbow search and labels every broker.
///
/// # Errors
///
/// [`AnalysisError::InsufficientBrokers`] when fewer than `min_brokers` brokers are present.
pub fn select_clusters(
    features: &FeatureMatrix,
    min_brokers: usize,
) -> Result<ClusterAssignment, AnalysisError> {
    let found = features.len();
    if found < min_brokers.max(1) {
        return Err(AnalysisError::InsufficientBrokers {
            required: min_brokers,
            found,
        });
    }

    let scaled: Array2<f64> = StandardScaler::fit_transform(features.to_array().view());
    let max_k = found.min(MAX_CLUSTERS);

    let mut inertias = Vec::new();
    if max_k > 1 {
        for k in 1..=max_k {
            inertias.push(KMeans::new(k).fit(scaled.view())?.inertia);
        }
    }
    let optimal_k = elbow_k(&inertias);
    debug!(?inertias, optimal_k, "elbow search");

    let fit = KMeans::new(optimal_k).fit(scaled.view())?;
    Ok(ClusterAssignment {
        features: features.clone(),
        labels: fit.labels,
        optimal_k,
        inertias,
    })
}
