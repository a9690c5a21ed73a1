//! Bars grouped per broker.

use indexmap::IndexMap;

use crate::models::bar::Bar;

/// All bars quoted by one broker, sorted ascending by timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerSeries {
    /// The broker this data represents.
    pub broker: String,
    /// The collection of OHLC bars, oldest first.
    pub bars: Vec<Bar>,
}

impl BrokerSeries {
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

/// Splits a flat list of bars into one [`BrokerSeries`] per broker.
///
/// Brokers keep the order in which they first appear in `bars`; the bars of
/// each series are sorted by timestamp (stable, so duplicates keep input order).
pub fn group_by_broker(bars: Vec<Bar>) -> Vec<BrokerSeries> {
    let mut grouped: IndexMap<String, Vec<Bar>> = IndexMap::new();
    for bar in bars {
        grouped.entry(bar.broker.clone()).or_default().push(bar);
    }

    grouped
        .into_iter()
        .map(|(broker, mut bars)| {
            bars.sort_by_key(|b| b.timestamp);
            BrokerSeries { broker, bars }
        })
        .collect()
}
