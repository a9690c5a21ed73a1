//! Broker feed-quality analysis.
//!
//! Takes hourly OHLC bars quoted by several brokers for one symbol, turns each
//! broker's series into a small feature vector, clusters brokers by those
//! features and labels each cluster by how clean its price feed is.
//!
//! The stages run strictly in order:
//!
//! 1. [`features::extract_features`]: bars → [`features::FeatureMatrix`]
//! 2. [`cluster::select_clusters`]: z-score, elbow search over k-means inertia, labels
//! 3. [`profile::interpret_clusters`]: rank clusters, assign a [`profile::QualityLabel`]
//! 4. [`projection::project`]: PCA down to two components for plotting
//!
//! [`pipeline`] wires them to a [`TimeSeriesSource`](ohlc_source::sources::TimeSeriesSource)
//! and reports progress through a callback.

pub mod cluster;
pub mod error;
pub mod features;
pub mod kmeans;
pub mod pca;
pub mod pipeline;
pub mod profile;
pub mod projection;
pub mod report;
pub mod scaler;
pub mod settings;
pub mod stats;

pub use error::AnalysisError;
pub use pipeline::{AnalysisOutcome, Progress, SourceMetadata, analyze_bars, fetch_metadata, run_analysis};
pub use settings::{AnalysisSettings, Thresholds};
