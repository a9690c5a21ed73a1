//! Two-dimensional view of the clustered brokers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    cluster::ClusterAssignment,
    error::AnalysisError,
    pca::{self, Pca},
    profile::QualityLabel,
    scaler::StandardScaler,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionPoint {
    pub broker: String,
    pub pc1: f64,
    pub pc2: f64,
    pub cluster: usize,
    pub quality: QualityLabel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub points: Vec<ProjectionPoint>,
    /// Share of total variance captured by PC1 and PC2.
    pub explained_variance: (f64, f64),
}

/// Projects the standardized features of every broker onto the first two
/// principal components. The scaler is fitted afresh from the raw features.
///
/// # Errors
///
/// [`AnalysisError::Projection`] with fewer than two brokers.
pub fn project(
    assignment: &ClusterAssignment,
    qualities: &BTreeMap<usize, QualityLabel>,
) -> Result<Projection, AnalysisError> {
    let scaled = StandardScaler::fit_transform(assignment.features.to_array().view());
    let pca = Pca::fit(scaled.view(), 2)?;
    let coords = pca::leading_pairs(&pca.transform(scaled.view()));

    let points = assignment
        .iter()
        .zip(coords)
        .map(|((broker, _, cluster), (pc1, pc2))| ProjectionPoint {
            broker: broker.to_string(),
            pc1,
            pc2,
            cluster,
            quality: qualities
                .get(&cluster)
                .copied()
                .unwrap_or(QualityLabel::General),
        })
        .collect();

    let ratio = pca.explained_variance_ratio();
    Ok(Projection {
        points,
        explained_variance: (ratio[0], ratio[1]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        features::{FeatureMatrix, FeatureVector},
        profile::{interpret_clusters, quality_map},
    };

    fn assignment() -> ClusterAssignment {
        let features: FeatureMatrix = [
            ("a", [0.1, 2.0, 5.0, 0.3]),
            ("b", [0.12, 2.2, 5.5, 0.35]),
            ("c", [0.9, 7.0, 30.0, 2.0]),
            ("d", [0.4, 3.0, 12.0, 1.1]),
        ]
        .into_iter()
        .map(|(b, v)| (b.to_string(), FeatureVector::from_array(v)))
        .collect();
        ClusterAssignment {
            features,
            labels: vec![0, 0, 1, 0],
            optimal_k: 2,
            inertias: Vec::new(),
        }
    }

    #[test]
    fn rerunning_gives_identical_coordinates() {
        let a = assignment();
        let q = quality_map(&interpret_clusters(&a));
        let first = project(&a, &q).unwrap();
        let second = project(&a, &q).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn points_carry_cluster_and_quality() {
        let a = assignment();
        let q = quality_map(&interpret_clusters(&a));
        let p = project(&a, &q).unwrap();

        assert_eq!(p.points.len(), 4);
        assert_eq!(p.points[2].broker, "c");
        assert_eq!(p.points[2].cluster, 1);
        assert_eq!(p.points[2].quality, QualityLabel::Good);
        assert_eq!(p.points[0].quality, QualityLabel::Excellent);

        let (pc1, pc2) = p.explained_variance;
        assert!(pc1 >= pc2 && pc2 >= 0.0);
        assert!(pc1 + pc2 <= 1.0 + 1e-12);
        // standardized data is centred, so are its projections
        let mean_pc1: f64 = p.points.iter().map(|pt| pt.pc1).sum::<f64>() / 4.0;
        assert!(mean_pc1.abs() < 1e-9);
    }

    #[test]
    fn single_broker_cannot_be_projected() {
        let features: FeatureMatrix = std::iter::once((
            "solo".to_string(),
            FeatureVector::from_array([1.0, 1.0, 1.0, 1.0]),
        ))
        .collect();
        let a = ClusterAssignment {
            features,
            labels: vec![0],
            optimal_k: 1,
            inertias: Vec::new(),
        };
        assert!(matches!(
            project(&a, &BTreeMap::new()),
            Err(AnalysisError::Projection(_))
        ));
    }
}
