use std::fmt;

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Tags that can be enumerated on the price measurement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tag {
    Broker,
    Symbol,
    /// The bar timeframe, stored under the tag name `period`.
    Period,
}

impl Tag {
    /// The tag key as written in the database.
    pub fn name(&self) -> &'static str {
        match self {
            Tag::Broker => "broker",
            Tag::Symbol => "symbol",
            Tag::Period => "period",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parameters for requesting OHLC bars for one symbol across several brokers.
///
/// The request always covers a trailing window ending now, downsampled to
/// `resolution` by keeping the last value of each window.
#[derive(Clone, Debug)]
pub struct OhlcQuery {
    /// Bucket (database) holding the price measurement.
    pub bucket: String,

    /// Brokers whose bars are requested.
    pub brokers: Vec<String>,

    /// Instrument symbol (e.g. `EURUSD`).
    pub symbol: String,

    /// Source timeframe tag value (e.g. `M1`, `H1`).
    pub timeframe: String,

    /// How far back from now to read.
    pub window: Duration,

    /// Aggregation interval; the last value of each interval is kept.
    pub resolution: Duration,
}

impl OhlcQuery {
    /// Builds a query with the default 30 day window at 1 hour resolution.
    pub fn new(
        bucket: impl Into<String>,
        brokers: Vec<String>,
        symbol: impl Into<String>,
        timeframe: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            brokers,
            symbol: symbol.into(),
            timeframe: timeframe.into(),
            window: Duration::days(30),
            resolution: Duration::hours(1),
        }
    }
}
