//! A [`TimeSeriesSource`] over bars that are already in memory.
//!
//! Window and resolution of an [`OhlcQuery`] are not applied: the bars are
//! taken to be materialized at the wanted granularity already.

use async_trait::async_trait;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::{
    models::{
        bar::Bar,
        request_params::{OhlcQuery, Tag},
    },
    sources::{NoDataSnafu, SourceError, TimeSeriesSource},
};

/// Bars of one symbol/timeframe pair, the on-disk layout accepted by [`InMemorySource::from_tagged`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedBars {
    pub symbol: String,
    pub timeframe: String,
    pub bars: Vec<Bar>,
}

#[derive(Debug, Clone)]
struct Entry {
    symbol: Option<String>,
    timeframe: Option<String>,
    bar: Bar,
}

impl Entry {
    fn matches(&self, query: &OhlcQuery) -> bool {
        query.brokers.iter().any(|b| *b == self.bar.broker)
            && self.symbol.as_ref().is_none_or(|s| *s == query.symbol)
            && self.timeframe.as_ref().is_none_or(|t| *t == query.timeframe)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    entries: Vec<Entry>,
}

impl InMemorySource {
    /// Creates a source whose bars match any symbol and timeframe.
    pub fn new(bars: Vec<Bar>) -> Self {
        let entries = bars
            .into_iter()
            .map(|bar| Entry {
                symbol: None,
                timeframe: None,
                bar,
            })
            .collect();
        Self { entries }
    }

    /// Creates a source from bars grouped under explicit symbol/timeframe tags.
    pub fn from_tagged(sets: Vec<TaggedBars>) -> Self {
        let mut source = Self::default();
        for set in sets {
            source = source.with_series(set.symbol, set.timeframe, set.bars);
        }
        source
    }

    /// Adds bars tagged with `symbol` and `timeframe`.
    pub fn with_series(
        mut self,
        symbol: impl Into<String>,
        timeframe: impl Into<String>,
        bars: Vec<Bar>,
    ) -> Self {
        let symbol = symbol.into();
        let timeframe = timeframe.into();
        self.entries.extend(bars.into_iter().map(|bar| Entry {
            symbol: Some(symbol.clone()),
            timeframe: Some(timeframe.clone()),
            bar,
        }));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl TimeSeriesSource for InMemorySource {
    async fn list_tag_values(&self, _bucket: &str, tag: Tag) -> Result<Vec<String>, SourceError> {
        let values: IndexSet<&str> = self
            .entries
            .iter()
            .filter_map(|e| match tag {
                Tag::Broker => Some(e.bar.broker.as_str()),
                Tag::Symbol => e.symbol.as_deref(),
                Tag::Period => e.timeframe.as_deref(),
            })
            .collect();
        Ok(values.into_iter().map(str::to_string).collect())
    }

    async fn query_ohlc(&self, query: &OhlcQuery) -> Result<Vec<Bar>, SourceError> {
        let matched: Vec<&Bar> = self
            .entries
            .iter()
            .filter(|e| e.matches(query))
            .map(|e| &e.bar)
            .collect();
        if matched.is_empty() {
            return NoDataSnafu {
                message: "Query returned no data.",
            }
            .fail();
        }

        let bars: Vec<Bar> = matched
            .into_iter()
            .filter(|b| [b.open, b.high, b.low, b.close].iter().all(|v| v.is_finite()))
            .cloned()
            .collect();
        if bars.is_empty() {
            return NoDataSnafu {
                message: "No valid OHLC data remained after cleaning.",
            }
            .fail();
        }
        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn bar(broker: &str, close: f64) -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap(),
            broker: broker.into(),
            open: close,
            high: close,
            low: close,
            close,
        }
    }

    fn source() -> InMemorySource {
        InMemorySource::default()
            .with_series("EURUSD", "M1", vec![bar("icm", 1.1), bar("pepper", 1.2)])
            .with_series("XAUUSD", "M1", vec![bar("icm", 2300.0), bar("icm", f64::NAN)])
    }

    #[tokio::test]
    async fn lists_distinct_tags_in_first_seen_order() {
        let src = source();
        assert_eq!(
            src.list_tag_values("b", Tag::Broker).await.unwrap(),
            vec!["icm", "pepper"]
        );
        assert_eq!(
            src.list_tag_values("b", Tag::Symbol).await.unwrap(),
            vec!["EURUSD", "XAUUSD"]
        );
        assert_eq!(src.list_tag_values("b", Tag::Period).await.unwrap(), vec!["M1"]);
    }

    #[tokio::test]
    async fn filters_by_broker_symbol_and_timeframe() {
        let src = source();

        let q = OhlcQuery::new("b", vec!["icm".into()], "EURUSD", "M1");
        let bars = src.query_ohlc(&q).await.unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, 1.1);

        // NaN row is cleaned away
        let q = OhlcQuery::new("b", vec!["icm".into()], "XAUUSD", "M1");
        assert_eq!(src.query_ohlc(&q).await.unwrap().len(), 1);

        let q = OhlcQuery::new("b", vec!["icm".into()], "EURUSD", "H1");
        let err = src.query_ohlc(&q).await.unwrap_err();
        assert!(err.is_no_data());
        assert_eq!(err.to_string(), "Query returned no data.");
    }

    #[tokio::test]
    async fn all_rows_cleaned_away_is_reported_separately() {
        let src = InMemorySource::default()
            .with_series("EURUSD", "H1", vec![bar("icm", f64::NAN), bar("icm", f64::INFINITY)]);
        let q = OhlcQuery::new("b", vec!["icm".into()], "EURUSD", "H1");

        let err = src.query_ohlc(&q).await.unwrap_err();
        assert!(err.is_no_data());
        assert_eq!(err.to_string(), "No valid OHLC data remained after cleaning.");
    }
}
