use ohlc_source::sources::SourceError;
use thiserror::Error;

/// The unified error type for the analysis pipeline.
///
/// Every stage fails fast with one of these; nothing is retried.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The source returned nothing for the requested filters.
    #[error("{0}")]
    NoData(String),

    /// No broker met the minimum number of bars.
    #[error("No broker had enough data (minimum {min_points} points).")]
    InsufficientData { min_points: usize },

    /// Fewer brokers survived than clustering needs.
    #[error("Clustering requires at least {required} brokers.")]
    InsufficientBrokers { required: usize, found: usize },

    /// Metadata discovery found no brokers at all.
    #[error("No brokers found.")]
    MetadataUnavailable,

    #[error("Please select at least one broker.")]
    NoBrokersSelected,

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Clustering failed: {0}")]
    Clustering(String),

    #[error("Projection failed: {0}")]
    Projection(String),

    /// Transport or protocol failure talking to the time-series source.
    #[error(transparent)]
    Source(SourceError),
}

impl AnalysisError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::NoData(_) => "no_data",
            AnalysisError::InsufficientData { .. } => "insufficient_data",
            AnalysisError::InsufficientBrokers { .. } => "insufficient_brokers",
            AnalysisError::MetadataUnavailable => "metadata_unavailable",
            AnalysisError::NoBrokersSelected => "no_brokers_selected",
            AnalysisError::InvalidSettings(_) => "invalid_settings",
            AnalysisError::Clustering(_) => "clustering",
            AnalysisError::Projection(_) => "projection",
            AnalysisError::Source(_) => "source",
        }
    }
}

impl From<SourceError> for AnalysisError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::NoData { message, .. } => AnalysisError::NoData(message),
            other => AnalysisError::Source(other),
        }
    }
}
