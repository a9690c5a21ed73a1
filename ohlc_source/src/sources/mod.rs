//! Source abstraction for OHLC time-series stores.
//!
//! This module defines the [`TimeSeriesSource`] trait, the unified interface the
//! analyzer uses to discover tag values and read OHLC bars, whatever store sits
//! behind it.
//!
//! [`influx::InfluxSource`] talks to an InfluxDB v2 server over HTTP;
//! [`memory::InMemorySource`] serves bars that are already loaded, which is
//! what tests and offline runs use.
//!
//! The trait is designed for async usage and supports dynamic dispatch
//! (`dyn TimeSeriesSource`) for runtime selection of the source.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use ohlc_source::models::{bar::Bar, request_params::{OhlcQuery, Tag}};
//! use ohlc_source::sources::{SourceError, TimeSeriesSource};
//!
//! struct MySource;
//!
//! #[async_trait]
//! impl TimeSeriesSource for MySource {
//!     async fn list_tag_values(&self, _bucket: &str, _tag: Tag) -> Result<Vec<String>, SourceError> {
//!         Ok(vec![])
//!     }
//!
//!     async fn query_ohlc(&self, _query: &OhlcQuery) -> Result<Vec<Bar>, SourceError> {
//!         Ok(vec![])
//!     }
//! }
//! ```

pub mod influx;
pub mod memory;

use async_trait::async_trait;
use shared_utils::env::MissingEnvVarError;
use snafu::{Backtrace, Snafu};

use crate::models::{
    bar::Bar,
    request_params::{OhlcQuery, Tag},
};

/// Read access to a store of OHLC bars tagged by broker, symbol and period.
#[async_trait]
pub trait TimeSeriesSource: Send + Sync {
    /// Lists the distinct values of `tag` within `bucket`.
    async fn list_tag_values(&self, bucket: &str, tag: Tag) -> Result<Vec<String>, SourceError>;

    /// Returns the cleaned OHLC bars matching `query`.
    ///
    /// Rows missing a price or carrying a non-numeric price are dropped.
    ///
    /// # Errors
    ///
    /// * [`SourceError::NoData`] - the store returned nothing, or nothing survived cleaning.
    async fn query_ohlc(&self, query: &OhlcQuery) -> Result<Vec<Bar>, SourceError>;
}

/// Errors that can occur during the creation of a source instance.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SourceInitError {
    /// missed environment variable.
    #[snafu(display("Missing environment variable: {source}"))]
    MissingEnvVar {
        source: MissingEnvVarError,
        backtrace: Backtrace,
    },

    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// API token contains invalid characters.
    #[snafu(display("Invalid API token format: {source}"))]
    InvalidToken {
        source: reqwest::header::InvalidHeaderValue,
        backtrace: Backtrace,
    },

    /// The server URL could not be parsed.
    #[snafu(display("Invalid server URL {url:?}: {message}"))]
    InvalidUrl {
        url: String,
        message: String,
        backtrace: Backtrace,
    },
}

/// Errors that can occur within a `TimeSeriesSource` implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SourceError {
    /// The query matched nothing usable.
    #[snafu(display("{message}"))]
    NoData {
        message: String,
        backtrace: Backtrace,
    },

    /// An error during an API request (e.g., network failure, timeout).
    #[snafu(display("API request failed: {source}"))]
    Reqwest {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The server answered with a non-success status.
    #[snafu(display("API error ({status}): {message}"))]
    Api {
        status: u16,
        message: String,
        backtrace: Backtrace,
    },

    /// The response body did not have the expected shape.
    #[snafu(display("Malformed response: {message}"))]
    Parse {
        message: String,
        backtrace: Backtrace,
    },

    /// An error during source configuration or initialization.
    #[snafu(display("Source initialization error: {source}"))]
    Init {
        #[snafu(backtrace)]
        source: SourceInitError,
    },
}

impl SourceError {
    /// True when the failure means "nothing to analyse" rather than a transport problem.
    pub fn is_no_data(&self) -> bool {
        matches!(self, SourceError::NoData { .. })
    }
}
