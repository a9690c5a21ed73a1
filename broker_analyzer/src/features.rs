//! Per-broker feed-quality features.
//!
//! Two signals are measured on every broker's bar series:
//! - the *gap* between a bar's open and the previous bar's close, and
//! - the *spike ratio*, the bar's high-low range relative to its body.
//!
//! A clean feed has small gaps and ranges proportionate to its bodies.

use indexmap::IndexMap;
use ndarray::Array2;
use ohlc_source::models::bar_series::BrokerSeries;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{error::AnalysisError, stats};

/// Added to every candle body so the spike ratio stays finite when `open == close`.
pub const BODY_EPSILON: f64 = 1e-9;

/// Column names, in [`FeatureVector::to_array`] order.
pub const FEATURE_NAMES: [&str; 4] = ["Gap_Median", "Spike_Median", "Spike_Max", "Gap_Max"];

/// Quality features of one broker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    #[serde(rename = "Gap_Median")]
    pub gap_median: f64,
    #[serde(rename = "Spike_Median")]
    pub spike_median: f64,
    #[serde(rename = "Spike_Max")]
    pub spike_max: f64,
    #[serde(rename = "Gap_Max")]
    pub gap_max: f64,
}

impl FeatureVector {
    pub fn to_array(&self) -> [f64; 4] {
        [self.gap_median, self.spike_median, self.spike_max, self.gap_max]
    }

    pub fn from_array(values: [f64; 4]) -> Self {
        Self {
            gap_median: values[0],
            spike_median: values[1],
            spike_max: values[2],
            gap_max: values[3],
        }
    }
}

/// Feature vectors keyed by broker, in the order brokers were first seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMatrix {
    rows: IndexMap<String, FeatureVector>,
}

impl FeatureMatrix {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, broker: &str) -> Option<&FeatureVector> {
        self.rows.get(broker)
    }

    pub fn brokers(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureVector)> {
        self.rows.iter().map(|(b, f)| (b.as_str(), f))
    }

    /// Row-major `brokers × features` matrix in iteration order.
    pub fn to_array(&self) -> Array2<f64> {
        let rows: Vec<[f64; 4]> = self.rows.values().map(FeatureVector::to_array).collect();
        Array2::from_shape_fn((rows.len(), FEATURE_NAMES.len()), |(i, j)| rows[i][j])
    }
}

impl FromIterator<(String, FeatureVector)> for FeatureMatrix {
    fn from_iter<T: IntoIterator<Item = (String, FeatureVector)>>(iter: T) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

/// Computes the features of one series, assumed sorted by timestamp.
///
/// A single-bar series has no gaps; its gap statistics are reported as `0.0`.
pub fn series_features(series: &BrokerSeries) -> FeatureVector {
    let bars = &series.bars;

    let gaps: Vec<f64> = bars
        .windows(2)
        .map(|w| (w[1].open - w[0].close).abs())
        .collect();

    let spikes: Vec<f64> = bars
        .iter()
        .map(|b| {
            let high_low = b.high - b.low;
            let body = (b.open - b.close).abs() + BODY_EPSILON;
            high_low / body
        })
        .collect();

    FeatureVector {
        gap_median: stats::median(&gaps).unwrap_or(0.0),
        spike_median: stats::median(&spikes).unwrap_or(0.0),
        spike_max: stats::max(&spikes).unwrap_or(0.0),
        gap_max: stats::max(&gaps).unwrap_or(0.0),
    }
}

/// Builds the feature matrix, skipping brokers with fewer than `min_points` bars.
///
/// # Errors
///
/// [`AnalysisError::InsufficientData`] when no broker has enough bars.
pub fn extract_features(
    series: &[BrokerSeries],
    min_points: usize,
) -> Result<FeatureMatrix, AnalysisError> {
    let matrix: FeatureMatrix = series
        .iter()
        .filter(|s| {
            let keep = s.len() >= min_points;
            if !keep {
                debug!(broker = %s.broker, bars = s.len(), min_points, "skipping broker");
            }
            keep
        })
        .map(|s| (s.broker.clone(), series_features(s)))
        .collect();

    if matrix.is_empty() {
        return Err(AnalysisError::InsufficientData { min_points });
    }
    Ok(matrix)
}
