//! Run configuration: what to analyse and the thresholds to apply.
//!
//! Settings come from CLI flags or a TOML file such as
//!
//! ```toml
//! bucket = "prices"
//! symbol = "EURUSD"
//! timeframe = "H1"
//! brokers = ["icm", "pepperstone", "oanda"]
//! min_points = 240
//! ```
//!
//! Entrypoints:
//! - Parse + validate from a TOML string: [`AnalysisSettings::from_toml_str`]
//! - Parse + validate from a file path: [`AnalysisSettings::from_toml_path`]
//! - Parse only, leaving validation to the caller: [`AnalysisSettings::parse_toml_path`]

use std::path::Path;

use anyhow::Context;
use indexmap::IndexSet;
use ohlc_source::models::request_params::OhlcQuery;
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

pub const DEFAULT_MIN_POINTS: usize = 240;
pub const MAX_MIN_POINTS: usize = 1000;
pub const DEFAULT_MIN_BROKERS: usize = 2;

fn default_min_points() -> usize {
    DEFAULT_MIN_POINTS
}

fn default_min_brokers() -> usize {
    DEFAULT_MIN_BROKERS
}

/// Thresholds the core pipeline needs, independent of where bars come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// Brokers with fewer bars are left out of the analysis.
    pub min_points: usize,
    /// Clustering refuses to run on fewer brokers.
    pub min_brokers: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_points: DEFAULT_MIN_POINTS,
            min_brokers: DEFAULT_MIN_BROKERS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisSettings {
    pub bucket: String,
    pub symbol: String,
    pub timeframe: String,
    pub brokers: Vec<String>,
    #[serde(default = "default_min_points")]
    pub min_points: usize,
    #[serde(default = "default_min_brokers")]
    pub min_brokers: usize,
}

impl AnalysisSettings {
    pub fn new(
        bucket: impl Into<String>,
        symbol: impl Into<String>,
        timeframe: impl Into<String>,
        brokers: Vec<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            symbol: symbol.into(),
            timeframe: timeframe.into(),
            brokers,
            min_points: DEFAULT_MIN_POINTS,
            min_brokers: DEFAULT_MIN_BROKERS,
        }
    }

    /// Trims broker names and drops blanks and repeats, keeping first-seen order.
    pub fn normalize(&mut self) {
        let unique: IndexSet<String> = self
            .brokers
            .iter()
            .map(|b| b.trim())
            .filter(|b| !b.is_empty())
            .map(str::to_string)
            .collect();
        self.brokers = unique.into_iter().collect();
    }

    /// Checks the settings before any I/O happens.
    ///
    /// Errors:
    /// - [`AnalysisError::NoBrokersSelected`] when `brokers` is empty
    /// - [`AnalysisError::InvalidSettings`] for a zero threshold or
    ///   `min_points` above [`MAX_MIN_POINTS`]
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.brokers.is_empty() {
            return Err(AnalysisError::NoBrokersSelected);
        }
        if self.min_points == 0 || self.min_points > MAX_MIN_POINTS {
            return Err(AnalysisError::InvalidSettings(format!(
                "min_points must be within 1..={MAX_MIN_POINTS}, got {}",
                self.min_points
            )));
        }
        if self.min_brokers == 0 {
            return Err(AnalysisError::InvalidSettings(
                "min_brokers must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            min_points: self.min_points,
            min_brokers: self.min_brokers,
        }
    }

    pub fn query(&self) -> OhlcQuery {
        OhlcQuery::new(
            self.bucket.clone(),
            self.brokers.clone(),
            self.symbol.clone(),
            self.timeframe.clone(),
        )
    }

    /// Parses and normalizes without validating; see [`Self::validate`].
    pub fn parse_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        let mut settings: Self =
            toml::from_str(toml_str).context("failed to parse settings TOML")?;
        settings.normalize();
        Ok(settings)
    }

    pub fn parse_toml_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("read settings file {}", path.as_ref().display()))?;
        Self::parse_toml_str(&text)
    }

    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        let settings = Self::parse_toml_str(toml_str)?;
        settings.validate().context("invalid settings")?;
        Ok(settings)
    }

    pub fn from_toml_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let settings = Self::parse_toml_path(path)?;
        settings.validate().context("invalid settings")?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_thresholds() {
        let s = AnalysisSettings::from_toml_str(
            r#"
            bucket = "prices"
            symbol = "EURUSD"
            timeframe = "H1"
            brokers = ["icm", " icm ", "oanda", ""]
            "#,
        )
        .unwrap();
        assert_eq!(s.brokers, vec!["icm", "oanda"]);
        assert_eq!(s.thresholds(), Thresholds::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = AnalysisSettings::from_toml_str(
            r#"
            bucket = "prices"
            symbol = "EURUSD"
            timeframe = "H1"
            brokers = ["icm"]
            min_point = 10
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn parsing_leaves_validation_to_the_caller() {
        let s = AnalysisSettings::parse_toml_str(
            r#"
            bucket = "prices"
            symbol = "EURUSD"
            timeframe = "H1"
            brokers = ["  "]
            "#,
        )
        .unwrap();
        assert!(s.brokers.is_empty());
        assert!(matches!(s.validate(), Err(AnalysisError::NoBrokersSelected)));
    }

    #[test]
    fn validation() {
        let mut s = AnalysisSettings::new("b", "EURUSD", "H1", vec![]);
        assert!(matches!(s.validate(), Err(AnalysisError::NoBrokersSelected)));

        s.brokers = vec!["icm".into()];
        assert!(s.validate().is_ok());

        s.min_points = 0;
        assert!(matches!(s.validate(), Err(AnalysisError::InvalidSettings(_))));
        s.min_points = MAX_MIN_POINTS + 1;
        assert!(matches!(s.validate(), Err(AnalysisError::InvalidSettings(_))));
        s.min_points = MAX_MIN_POINTS;
        s.min_brokers = 0;
        assert!(matches!(s.validate(), Err(AnalysisError::InvalidSettings(_))));
    }

    #[test]
    fn query_carries_selection() {
        let s = AnalysisSettings::new("b", "XAUUSD", "H4", vec!["a".into(), "c".into()]);
        let q = s.query();
        assert_eq!(q.bucket, "b");
        assert_eq!(q.symbol, "XAUUSD");
        assert_eq!(q.timeframe, "H4");
        assert_eq!(q.brokers, vec!["a", "c"]);
    }
}
