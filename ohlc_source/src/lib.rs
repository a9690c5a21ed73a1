//! OHLC price data access for the broker analyzer.
//!
//! [`models`] holds the vendor-agnostic bar types, [`sources`] the
//! [`TimeSeriesSource`](sources::TimeSeriesSource) trait together with an
//! InfluxDB v2 implementation and an in-memory one.

pub mod models;
pub mod sources;
