//! Run orchestration: source I/O, the four analysis stages and progress reporting.
//!
//! Progress is pushed through a caller-supplied `FnMut(Progress)`; the outcome
//! is a single `Result`. The analysis stages themselves are synchronous, so
//! callers that must stay responsive run [`analyze_bars`] on a blocking worker.

use ohlc_source::{
    models::{bar::Bar, bar_series::group_by_broker, request_params::Tag},
    sources::TimeSeriesSource,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    cluster::select_clusters,
    error::AnalysisError,
    features::extract_features,
    profile::{ClusterProfile, ReportRow, build_report, interpret_clusters, quality_map},
    projection::{Projection, project},
    settings::{AnalysisSettings, Thresholds},
};

/// A discrete progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// 0..=100, strictly increasing within one run.
    pub percent: u8,
    pub message: &'static str,
}

impl Progress {
    pub const fn new(percent: u8, message: &'static str) -> Self {
        Self { percent, message }
    }
}

pub const CONNECTING: Progress = Progress::new(5, "Connecting to time-series source...");
pub const EXTRACTING: Progress = Progress::new(25, "Extracting features...");
pub const CLUSTERING: Progress = Progress::new(50, "Performing clustering...");
pub const PROJECTING: Progress = Progress::new(75, "Preparing visualization data...");
pub const ANALYSIS_DONE: Progress = Progress::new(100, "Analysis complete.");

pub const META_CONNECTING: Progress = Progress::new(20, "Connecting to DB to fetch metadata...");
pub const META_BROKERS: Progress = Progress::new(40, "Fetching brokers...");
pub const META_SYMBOLS: Progress = Progress::new(60, "Fetching symbols...");
pub const META_TIMEFRAMES: Progress = Progress::new(80, "Fetching timeframes...");
pub const META_DONE: Progress = Progress::new(100, "Metadata fetched successfully.");

/// Values available for selection, each sorted and de-duplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceMetadata {
    pub brokers: Vec<String>,
    pub symbols: Vec<String>,
    pub timeframes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisOutcome {
    /// One row per analysed broker, ordered by cluster then broker.
    pub report: Vec<ReportRow>,
    pub profiles: Vec<ClusterProfile>,
    pub projection: Projection,
    pub optimal_k: usize,
}

fn sorted_unique(mut values: Vec<String>) -> Vec<String> {
    values.sort();
    values.dedup();
    values
}

/// Lists the brokers, symbols and timeframes present in `bucket`.
///
/// # Errors
///
/// [`AnalysisError::MetadataUnavailable`] when the bucket has no brokers;
/// source failures otherwise.
pub async fn fetch_metadata<S>(
    source: &S,
    bucket: &str,
    mut on_progress: impl FnMut(Progress),
) -> Result<SourceMetadata, AnalysisError>
where
    S: TimeSeriesSource + ?Sized,
{
    on_progress(META_CONNECTING);

    on_progress(META_BROKERS);
    let brokers = sorted_unique(source.list_tag_values(bucket, Tag::Broker).await?);
    if brokers.is_empty() {
        return Err(AnalysisError::MetadataUnavailable);
    }

    on_progress(META_SYMBOLS);
    let symbols = sorted_unique(source.list_tag_values(bucket, Tag::Symbol).await?);

    on_progress(META_TIMEFRAMES);
    let timeframes = sorted_unique(source.list_tag_values(bucket, Tag::Period).await?);

    info!(
        brokers = brokers.len(),
        symbols = symbols.len(),
        timeframes = timeframes.len(),
        "metadata fetched"
    );
    on_progress(META_DONE);
    Ok(SourceMetadata {
        brokers,
        symbols,
        timeframes,
    })
}

/// Reads the bars selected by `settings`.
pub async fn fetch_bars<S>(source: &S, settings: &AnalysisSettings) -> Result<Vec<Bar>, AnalysisError>
where
    S: TimeSeriesSource + ?Sized,
{
    let query = settings.query();
    let bars = source.query_ohlc(&query).await?;
    info!(
        symbol = %query.symbol,
        timeframe = %query.timeframe,
        bars = bars.len(),
        "bars fetched"
    );
    Ok(bars)
}

/// Runs the four analysis stages on bars already in memory.
///
/// # Errors
///
/// * [`AnalysisError::NoData`] - `bars` is empty
/// * [`AnalysisError::InsufficientData`] - no broker has `min_points` bars
/// * [`AnalysisError::InsufficientBrokers`] - fewer than `min_brokers` brokers qualify
/// * [`AnalysisError::Projection`] - fewer than two brokers to project
pub fn analyze_bars(
    bars: Vec<Bar>,
    thresholds: Thresholds,
    mut on_progress: impl FnMut(Progress),
) -> Result<AnalysisOutcome, AnalysisError> {
    if bars.is_empty() {
        return Err(AnalysisError::NoData("Query returned no data.".into()));
    }

    on_progress(EXTRACTING);
    let series = group_by_broker(bars);
    let features = extract_features(&series, thresholds.min_points)?;
    drop(series);
    info!(brokers = features.len(), "features extracted");

    on_progress(CLUSTERING);
    let assignment = select_clusters(&features, thresholds.min_brokers)?;
    let profiles = interpret_clusters(&assignment);
    let qualities = quality_map(&profiles);
    let report = build_report(&assignment, &qualities);
    info!(optimal_k = assignment.optimal_k, "brokers clustered");

    on_progress(PROJECTING);
    let projection = project(&assignment, &qualities)?;
    debug!(
        pc1 = projection.explained_variance.0,
        pc2 = projection.explained_variance.1,
        "explained variance"
    );

    on_progress(ANALYSIS_DONE);
    Ok(AnalysisOutcome {
        report,
        profiles,
        projection,
        optimal_k: assignment.optimal_k,
    })
}

/// Validates `settings`, fetches the bars and analyses them.
pub async fn run_analysis<S>(
    source: &S,
    settings: &AnalysisSettings,
    mut on_progress: impl FnMut(Progress),
) -> Result<AnalysisOutcome, AnalysisError>
where
    S: TimeSeriesSource + ?Sized,
{
    settings.validate()?;

    on_progress(CONNECTING);
    let bars = fetch_bars(source, settings).await?;
    analyze_bars(bars, settings.thresholds(), on_progress)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_constants_increase() {
        let analysis = [CONNECTING, EXTRACTING, CLUSTERING, PROJECTING, ANALYSIS_DONE];
        assert!(analysis.windows(2).all(|w| w[0].percent < w[1].percent));
        let metadata = [META_CONNECTING, META_BROKERS, META_SYMBOLS, META_TIMEFRAMES, META_DONE];
        assert!(metadata.windows(2).all(|w| w[0].percent < w[1].percent));
    }

    #[test]
    fn empty_bars_are_no_data() {
        let mut events = Vec::new();
        let err = analyze_bars(Vec::new(), Thresholds::default(), |p| events.push(p)).unwrap_err();
        assert!(matches!(err, AnalysisError::NoData(_)));
        assert!(events.is_empty());
    }

    #[test]
    fn sorted_unique_dedups() {
        let v = sorted_unique(vec!["b".into(), "a".into(), "b".into()]);
        assert_eq!(v, vec!["a", "b"]);
    }
}
