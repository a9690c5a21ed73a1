//! Canonical in-memory representation of one OHLC observation.
//!
//! Every [`TimeSeriesSource`](crate::sources::TimeSeriesSource) returns bars in
//! this shape, whatever the storage engine behind it looks like.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single OHLC bar reported by one broker at one timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// The timestamp for this bar (UTC).
    pub timestamp: DateTime<Utc>,

    /// Identifier of the broker that quoted this bar.
    pub broker: String,

    /// Opening price.
    pub open: f64,

    /// Highest price during the bar interval.
    pub high: f64,

    /// Lowest price during the bar interval.
    pub low: f64,

    /// Closing price.
    pub close: f64,
}

/// Which OHLC field a raw value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OhlcField {
    Open,
    High,
    Low,
    Close,
}

impl OhlcField {
    /// Maps a storage field name (`open`, `high`, `low`, `close`) to the enum.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "open" => Some(Self::Open),
            "high" => Some(Self::High),
            "low" => Some(Self::Low),
            "close" => Some(Self::Close),
            _ => None,
        }
    }
}

/// A bar under construction while pivoting field-per-row data.
///
/// Time-series stores usually return one row per field; the four prices of a
/// bar only come together once every row for `(timestamp, broker)` is seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialBar {
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
}

impl PartialBar {
    /// Records a raw value. Values that are not finite numbers are kept as missing.
    pub fn set(&mut self, field: OhlcField, raw: &str) {
        let value = raw.trim().parse::<f64>().ok().filter(|v| v.is_finite());
        match field {
            OhlcField::Open => self.open = value,
            OhlcField::High => self.high = value,
            OhlcField::Low => self.low = value,
            OhlcField::Close => self.close = value,
        }
    }

    /// Turns the partial bar into a [`Bar`] if all four prices are present.
    pub fn complete(self, timestamp: DateTime<Utc>, broker: String) -> Option<Bar> {
        Some(Bar {
            timestamp,
            broker,
            open: self.open?,
            high: self.high?,
            low: self.low?,
            close: self.close?,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn partial_bar_requires_all_numeric_fields() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();

        let mut partial = PartialBar::default();
        partial.set(OhlcField::Open, "1.1000");
        partial.set(OhlcField::High, "1.1010");
        partial.set(OhlcField::Low, "1.0990");
        assert!(partial.clone().complete(ts, "icm".into()).is_none());

        partial.set(OhlcField::Close, "not-a-number");
        assert!(partial.clone().complete(ts, "icm".into()).is_none());

        partial.set(OhlcField::Close, "NaN");
        assert!(partial.clone().complete(ts, "icm".into()).is_none());

        partial.set(OhlcField::Close, " 1.1005 ");
        let bar = partial.complete(ts, "icm".into()).unwrap();
        assert_eq!(bar.close, 1.1005);
        assert_eq!(bar.broker, "icm");
    }

    #[test]
    fn field_names() {
        assert_eq!(OhlcField::from_name("high"), Some(OhlcField::High));
        assert_eq!(OhlcField::from_name("volume"), None);
    }
}
