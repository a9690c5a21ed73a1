//! Turning cluster labels into quality verdicts.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    cluster::ClusterAssignment,
    features::{FEATURE_NAMES, FeatureVector},
    stats,
};

/// Verdict attached to every cluster, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QualityLabel {
    #[serde(rename = "Excellent Quality")]
    Excellent,
    #[serde(rename = "Good Quality")]
    Good,
    #[serde(rename = "Standard Quality")]
    Standard,
    #[serde(rename = "High Risk")]
    HighRisk,
    /// Anything ranked below the fourth tier.
    #[serde(rename = "General")]
    General,
}

impl QualityLabel {
    pub fn from_dense_rank(rank: usize) -> Self {
        match rank {
            1 => QualityLabel::Excellent,
            2 => QualityLabel::Good,
            3 => QualityLabel::Standard,
            4 => QualityLabel::HighRisk,
            _ => QualityLabel::General,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityLabel::Excellent => "Excellent Quality",
            QualityLabel::Good => "Good Quality",
            QualityLabel::Standard => "Standard Quality",
            QualityLabel::HighRisk => "High Risk",
            QualityLabel::General => "General",
        }
    }
}

impl fmt::Display for QualityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate view of one cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterProfile {
    pub cluster: usize,
    pub size: usize,
    /// Per-feature mean over the cluster's brokers.
    pub mean: FeatureVector,
    pub gap_rank: f64,
    pub spike_rank: f64,
    pub overall_rank: f64,
    pub dense_rank: usize,
    pub quality: QualityLabel,
}

/// Ranks every non-empty cluster by its mean gap and spike medians.
///
/// Lower is better for both signals. The two average ranks are summed and
/// the sums dense-ranked, so tied clusters share a label. Profiles come back
/// ordered by cluster id.
pub fn interpret_clusters(assignment: &ClusterAssignment) -> Vec<ClusterProfile> {
    let mut members: BTreeMap<usize, Vec<[f64; 4]>> = BTreeMap::new();
    for (_, features, label) in assignment.iter() {
        members.entry(label).or_default().push(features.to_array());
    }

    let means: Vec<(usize, usize, FeatureVector)> = members
        .into_iter()
        .map(|(cluster, rows)| {
            let mut sum = [0.0; 4];
            for row in &rows {
                for (acc, v) in sum.iter_mut().zip(row) {
                    *acc += v;
                }
            }
            let n = rows.len() as f64;
            (cluster, rows.len(), FeatureVector::from_array(sum.map(|s| s / n)))
        })
        .collect();

    let gap: Vec<f64> = means.iter().map(|(_, _, m)| m.gap_median).collect();
    let spike: Vec<f64> = means.iter().map(|(_, _, m)| m.spike_median).collect();
    let gap_rank = stats::average_rank(&gap);
    let spike_rank = stats::average_rank(&spike);
    let overall: Vec<f64> = gap_rank.iter().zip(&spike_rank).map(|(g, s)| g + s).collect();
    let dense = stats::dense_rank(&overall);

    let profiles: Vec<ClusterProfile> = means
        .into_iter()
        .enumerate()
        .map(|(i, (cluster, size, mean))| ClusterProfile {
            cluster,
            size,
            mean,
            gap_rank: gap_rank[i],
            spike_rank: spike_rank[i],
            overall_rank: overall[i],
            dense_rank: dense[i],
            quality: QualityLabel::from_dense_rank(dense[i]),
        })
        .collect();

    for p in &profiles {
        debug!(
            cluster = p.cluster,
            size = p.size,
            overall_rank = p.overall_rank,
            quality = %p.quality,
            "{}={:.6} {}={:.6}",
            FEATURE_NAMES[0],
            p.mean.gap_median,
            FEATURE_NAMES[1],
            p.mean.spike_median,
        );
    }
    profiles
}

pub fn quality_map(profiles: &[ClusterProfile]) -> BTreeMap<usize, QualityLabel> {
    profiles.iter().map(|p| (p.cluster, p.quality)).collect()
}

/// One line of the final report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    #[serde(rename = "Broker")]
    pub broker: String,
    #[serde(flatten)]
    pub features: FeatureVector,
    #[serde(rename = "Cluster")]
    pub cluster: usize,
    #[serde(rename = "Quality")]
    pub quality: QualityLabel,
}

/// Annotates every broker with its cluster's verdict, sorted by cluster then broker.
pub fn build_report(
    assignment: &ClusterAssignment,
    qualities: &BTreeMap<usize, QualityLabel>,
) -> Vec<ReportRow> {
    let mut rows: Vec<ReportRow> = assignment
        .iter()
        .map(|(broker, features, cluster)| ReportRow {
            broker: broker.to_string(),
            features: *features,
            cluster,
            quality: qualities
                .get(&cluster)
                .copied()
                .unwrap_or(QualityLabel::General),
        })
        .collect();
    rows.sort_by(|a, b| a.cluster.cmp(&b.cluster).then_with(|| a.broker.cmp(&b.broker)));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureMatrix;

    fn assignment(rows: &[(&str, f64, f64, usize)]) -> ClusterAssignment {
        let features: FeatureMatrix = rows
            .iter()
            .map(|&(b, gap, spike, _)| {
                (b.to_string(), FeatureVector::from_array([gap, spike, spike * 2.0, gap * 2.0]))
            })
            .collect();
        let labels = rows.iter().map(|r| r.3).collect::<Vec<_>>();
        let optimal_k = labels.iter().max().map_or(1, |m| m + 1);
        ClusterAssignment {
            features,
            labels,
            optimal_k,
            inertias: Vec::new(),
        }
    }

    #[test]
    fn tied_overall_ranks_share_the_top_label() {
        // gap ranks [1, 2, 3], spike ranks [2, 1, 3] -> overall [3, 3, 6]
        let a = assignment(&[
            ("a", 0.1, 2.0, 0),
            ("b", 0.2, 1.0, 1),
            ("c", 0.3, 3.0, 2),
        ]);
        let profiles = interpret_clusters(&a);
        let labels: Vec<_> = profiles.iter().map(|p| p.quality).collect();
        assert_eq!(
            labels,
            vec![QualityLabel::Excellent, QualityLabel::Excellent, QualityLabel::Good]
        );
        assert_eq!(profiles[0].overall_rank, 3.0);
        assert_eq!(profiles[2].dense_rank, 2);
    }

    #[test]
    fn cluster_means_and_average_ranks() {
        let a = assignment(&[
            ("a", 0.25, 1.0, 0),
            ("b", 0.75, 3.0, 0),
            ("c", 0.5, 2.0, 1),
        ]);
        let profiles = interpret_clusters(&a);
        assert_eq!(profiles[0].size, 2);
        assert_eq!(profiles[0].mean.gap_median, 0.5);
        // both clusters have mean gap 0.5 and mean spike 2.0
        assert_eq!(profiles[0].gap_rank, 1.5);
        assert_eq!(profiles[1].spike_rank, 1.5);
        assert!(profiles.iter().all(|p| p.quality == QualityLabel::Excellent));
    }

    #[test]
    fn deep_ranks_become_general() {
        assert_eq!(QualityLabel::from_dense_rank(4), QualityLabel::HighRisk);
        assert_eq!(QualityLabel::from_dense_rank(5), QualityLabel::General);
        assert_eq!(QualityLabel::from_dense_rank(8), QualityLabel::General);
    }

    #[test]
    fn labels_serialize_as_display_text() {
        let json = serde_json::to_string(&QualityLabel::HighRisk).unwrap();
        assert_eq!(json, "\"High Risk\"");
        assert_eq!(QualityLabel::Standard.to_string(), "Standard Quality");
    }

    #[test]
    fn report_is_sorted_by_cluster_then_broker() {
        let a = assignment(&[
            ("zeta", 0.5, 5.0, 1),
            ("beta", 0.1, 1.0, 0),
            ("alpha", 0.6, 6.0, 1),
            ("gamma", 0.1, 1.2, 0),
        ]);
        let qualities = quality_map(&interpret_clusters(&a));
        let report = build_report(&a, &qualities);

        let order: Vec<_> = report.iter().map(|r| r.broker.as_str()).collect();
        assert_eq!(order, vec!["beta", "gamma", "alpha", "zeta"]);
        assert_eq!(report[0].quality, QualityLabel::Excellent);
        assert_eq!(report[3].quality, QualityLabel::Good);
    }
}
