//! Presentation helpers: the text report, plot export and user-facing errors.

use std::fmt::Write;

use indexmap::IndexMap;
use serde::Serialize;

use crate::{
    error::AnalysisError,
    features::FEATURE_NAMES,
    profile::{QualityLabel, ReportRow},
    projection::Projection,
};

pub const PLOT_TITLE: &str = "Broker Clustering Map";

/// Renders the report as an aligned text table, numbers rounded to 4 decimals.
pub fn render_table(rows: &[ReportRow]) -> String {
    let mut header: Vec<String> = vec!["Broker".into()];
    header.extend(FEATURE_NAMES.iter().map(|n| n.to_string()));
    header.push("Cluster".into());
    header.push("Quality".into());

    let body: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            let mut cells = vec![r.broker.clone()];
            cells.extend(r.features.to_array().iter().map(|v| format!("{v:.4}")));
            cells.push(r.cluster.to_string());
            cells.push(r.quality.to_string());
            cells
        })
        .collect();

    let mut widths: Vec<usize> = header.iter().map(String::len).collect();
    for cells in &body {
        for (w, cell) in widths.iter_mut().zip(cells) {
            *w = (*w).max(cell.len());
        }
    }

    let mut out = String::new();
    for cells in std::iter::once(&header).chain(&body) {
        let line: Vec<String> = cells
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(i, (cell, &w))| {
                // broker and quality read better left-aligned
                if i == 0 || i + 1 == cells.len() {
                    format!("{cell:<w$}")
                } else {
                    format!("{cell:>w$}")
                }
            })
            .collect();
        let _ = writeln!(out, "{}", line.join("  ").trim_end());
    }
    out
}

/// Axis caption such as `Principal Component 1 (62.5% variance)`.
pub fn axis_label(component: usize, ratio: f64) -> String {
    format!("Principal Component {component} ({:.1}% variance)", ratio * 100.0)
}

/// Message to show the user for a failed run.
pub fn friendly_error(err: &AnalysisError) -> String {
    match err {
        AnalysisError::InsufficientData { .. } => "Analysis Failed: No Data\n\n\
             None of the selected brokers had enough data points \
             for the chosen symbol and timeframe.\n\n\
             Please try:\n\
             - Selecting a different symbol or timeframe.\n\
             - Choosing other brokers.\n\
             - Lowering the minimum data points value."
            .to_string(),
        other => format!("Error: {other}"),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotPoint {
    pub broker: String,
    pub x: f64,
    pub y: f64,
}

/// Points sharing one quality label, drawn as one series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotSeries {
    pub quality: QualityLabel,
    pub points: Vec<PlotPoint>,
}

/// Everything a scatter-plot renderer needs, ready to serialize as JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotExport {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    /// Ordered by first appearance of each label among the points.
    pub series: Vec<PlotSeries>,
}

impl From<&Projection> for PlotExport {
    fn from(projection: &Projection) -> Self {
        let mut grouped: IndexMap<QualityLabel, Vec<PlotPoint>> = IndexMap::new();
        for p in &projection.points {
            grouped.entry(p.quality).or_default().push(PlotPoint {
                broker: p.broker.clone(),
                x: p.pc1,
                y: p.pc2,
            });
        }

        let (pc1, pc2) = projection.explained_variance;
        Self {
            title: PLOT_TITLE.to_string(),
            x_label: axis_label(1, pc1),
            y_label: axis_label(2, pc2),
            series: grouped
                .into_iter()
                .map(|(quality, points)| PlotSeries { quality, points })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{features::FeatureVector, projection::ProjectionPoint};

    fn row(broker: &str, cluster: usize, quality: QualityLabel) -> ReportRow {
        ReportRow {
            broker: broker.into(),
            features: FeatureVector::from_array([0.000123456, 1.5, 12.0, 0.5]),
            cluster,
            quality,
        }
    }

    #[test]
    fn table_rounds_to_four_decimals() {
        let table = render_table(&[
            row("icm", 0, QualityLabel::Excellent),
            row("oanda", 1, QualityLabel::HighRisk),
        ]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Broker"));
        assert!(lines[0].contains("Spike_Median"));
        assert!(lines[1].contains("0.0001"));
        assert!(lines[1].contains("12.0000"));
        assert!(lines[2].ends_with("High Risk"));
    }

    #[test]
    fn axis_labels_show_percentages() {
        assert_eq!(axis_label(1, 0.625), "Principal Component 1 (62.5% variance)");
        assert_eq!(axis_label(2, 0.0), "Principal Component 2 (0.0% variance)");
    }

    #[test]
    fn friendly_message_only_for_insufficient_data() {
        let msg = friendly_error(&AnalysisError::InsufficientData { min_points: 240 });
        assert!(msg.contains("enough data points"));
        let msg = friendly_error(&AnalysisError::MetadataUnavailable);
        assert_eq!(msg, "Error: No brokers found.");
    }

    #[test]
    fn plot_groups_points_by_quality() {
        let point = |broker: &str, quality| ProjectionPoint {
            broker: broker.into(),
            pc1: 1.0,
            pc2: -1.0,
            cluster: 0,
            quality,
        };
        let projection = Projection {
            points: vec![
                point("a", QualityLabel::Good),
                point("b", QualityLabel::Excellent),
                point("c", QualityLabel::Good),
            ],
            explained_variance: (0.7, 0.2),
        };
        let plot = PlotExport::from(&projection);
        assert_eq!(plot.series.len(), 2);
        assert_eq!(plot.series[0].quality, QualityLabel::Good);
        assert_eq!(plot.series[0].points.len(), 2);
        assert_eq!(plot.x_label, "Principal Component 1 (70.0% variance)");

        let json = serde_json::to_value(&plot).unwrap();
        assert_eq!(json["series"][1]["quality"], "Excellent Quality");
    }
}
