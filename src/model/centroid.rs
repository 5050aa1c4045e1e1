use crate::error::{AuditError, Result};
use crate::model::{check_width, Classifier};
use crate::table::FeatureMatrix;
use serde::{Deserialize, Serialize};

/// Hard-label model: each row gets the class of the closest centroid.
///
/// Offers `predict` only, so probability-based audits reject it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "CentroidParts")]
pub struct NearestCentroid {
    classes: Vec<String>,
    centroids: Vec<Vec<f64>>,
}

#[derive(Deserialize)]
struct CentroidParts {
    classes: Vec<String>,
    centroids: Vec<Vec<f64>>,
}

impl TryFrom<CentroidParts> for NearestCentroid {
    type Error = AuditError;

    fn try_from(parts: CentroidParts) -> Result<Self> {
        Self::new(parts.classes, parts.centroids)
    }
}

impl NearestCentroid {
    pub fn new(classes: Vec<String>, centroids: Vec<Vec<f64>>) -> Result<Self> {
        let model = Self { classes, centroids };
        model.validate()?;
        Ok(model)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    fn validate(&self) -> Result<()> {
        if self.classes.is_empty() || self.classes.len() != self.centroids.len() {
            return Err(AuditError::parse(format!(
                "nearest-centroid model has {} classes and {} centroids",
                self.classes.len(),
                self.centroids.len()
            )));
        }
        let width = self.centroids[0].len();
        if self.centroids.iter().any(|c| c.len() != width) {
            return Err(AuditError::parse("centroids differ in length"));
        }
        Ok(())
    }

    fn nearest(&self, row: &[f64]) -> usize {
        self.centroids
            .iter()
            .map(|c| c.iter().zip(row).map(|(a, b)| (a - b).powi(2)).sum::<f64>())
            .enumerate()
            .fold((0, f64::INFINITY), |acc, (i, d)| if d < acc.1 { (i, d) } else { acc })
            .0
    }
}

impl Classifier for NearestCentroid {
    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<String>> {
        check_width(features, self.centroids.first().map_or(0, Vec::len))?;
        Ok(features
            .rows()
            .iter()
            .map(|row| self.classes[self.nearest(row)].clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assigns_closest_centroid() {
        let model = NearestCentroid::new(
            vec!["low".into(), "high".into()],
            vec![vec![0.0], vec![10.0]],
        )
        .unwrap();
        let features =
            FeatureMatrix::new(vec!["x".into()], vec![vec![1.0], vec![8.0]]).unwrap();
        assert_eq!(model.predict(&features).unwrap(), vec!["low", "high"]);
        assert!(model.probabilistic().is_none());
    }

    #[test]
    fn deserialization_validates_shapes() {
        let ragged = r#"{"classes":["a","b"],"centroids":[[0.0],[1.0,2.0]]}"#;
        assert!(serde_json::from_str::<NearestCentroid>(ragged).is_err());
        let empty = r#"{"classes":[],"centroids":[]}"#;
        assert!(serde_json::from_str::<NearestCentroid>(empty).is_err());
    }
}
