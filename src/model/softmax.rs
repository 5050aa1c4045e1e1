use crate::error::{AuditError, Result};
use crate::model::{check_width, Classifier, ProbabilisticClassifier};
use crate::table::FeatureMatrix;
use serde::{Deserialize, Serialize};

/// Multinomial linear model: `softmax(W·x + b)`.
///
/// Built through `new` or deserialization, both of which validate the shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "SoftmaxParts")]
pub struct SoftmaxClassifier {
    /// Label emitted for each output unit.
    classes: Vec<String>,
    /// One weight vector per class.
    weights: Vec<Vec<f64>>,
    /// One bias per class.
    intercepts: Vec<f64>,
}

#[derive(Deserialize)]
struct SoftmaxParts {
    classes: Vec<String>,
    weights: Vec<Vec<f64>>,
    intercepts: Vec<f64>,
}

impl TryFrom<SoftmaxParts> for SoftmaxClassifier {
    type Error = AuditError;

    fn try_from(parts: SoftmaxParts) -> Result<Self> {
        Self::new(parts.classes, parts.weights, parts.intercepts)
    }
}

impl SoftmaxClassifier {
    pub fn new(classes: Vec<String>, weights: Vec<Vec<f64>>, intercepts: Vec<f64>) -> Result<Self> {
        let model = Self {
            classes,
            weights,
            intercepts,
        };
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<()> {
        if self.classes.is_empty() {
            return Err(AuditError::parse("softmax model has no classes"));
        }
        if self.weights.len() != self.classes.len() || self.intercepts.len() != self.classes.len() {
            return Err(AuditError::parse(format!(
                "softmax model has {} classes but {} weight rows and {} intercepts",
                self.classes.len(),
                self.weights.len(),
                self.intercepts.len()
            )));
        }
        let width = self.n_features();
        if self.weights.iter().any(|w| w.len() != width) {
            return Err(AuditError::parse("softmax weight rows differ in length"));
        }
        Ok(())
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_features(&self) -> usize {
        self.weights.first().map_or(0, Vec::len)
    }

    fn distribution(&self, row: &[f64]) -> Vec<f64> {
        let logits: Vec<f64> = self
            .weights
            .iter()
            .zip(&self.intercepts)
            .map(|(w, b)| w.iter().zip(row).map(|(wi, xi)| wi * xi).sum::<f64>() + b)
            .collect();
        softmax(&logits)
    }
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|z| (z - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

impl Classifier for SoftmaxClassifier {
    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<String>> {
        let probs = self.predict_probability(features)?;
        Ok(probs
            .iter()
            .map(|dist| {
                let best = dist
                    .iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |acc, (i, &p)| if p > acc.1 { (i, p) } else { acc })
                    .0;
                self.classes[best].clone()
            })
            .collect())
    }

    fn probabilistic(&self) -> Option<&dyn ProbabilisticClassifier> {
        Some(self)
    }
}

impl ProbabilisticClassifier for SoftmaxClassifier {
    fn predict_probability(&self, features: &FeatureMatrix) -> Result<Vec<Vec<f64>>> {
        check_width(features, self.n_features())?;
        Ok(features
            .rows()
            .iter()
            .map(|row| self.distribution(row))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_class() -> SoftmaxClassifier {
        SoftmaxClassifier::new(
            vec!["0".into(), "1".into()],
            vec![vec![-1.0, 0.0], vec![1.0, 0.0]],
            vec![0.0, 0.0],
        )
        .unwrap()
    }

    #[test]
    fn distributions_sum_to_one() {
        let features =
            FeatureMatrix::new(vec!["a".into(), "b".into()], vec![vec![0.3, 9.0], vec![-2.0, 1.0]])
                .unwrap();
        for dist in two_class().predict_probability(&features).unwrap() {
            assert!((dist.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn predicts_argmax_class() {
        let features =
            FeatureMatrix::new(vec!["a".into(), "b".into()], vec![vec![2.0, 0.0], vec![-2.0, 0.0]])
                .unwrap();
        assert_eq!(two_class().predict(&features).unwrap(), vec!["1", "0"]);
    }

    #[test]
    fn width_mismatch_is_an_inference_error() {
        let features = FeatureMatrix::new(vec!["a".into()], vec![vec![1.0]]).unwrap();
        let err = two_class().predict_probability(&features).unwrap_err();
        assert!(matches!(err, AuditError::Inference(_)));
    }

    #[test]
    fn softmax_survives_large_logits() {
        let p = softmax(&[1000.0, 1000.0]);
        assert!((p[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn rejects_mismatched_shapes() {
        assert!(SoftmaxClassifier::new(vec!["a".into()], vec![], vec![0.0]).is_err());
    }

    #[test]
    fn deserialization_validates_shapes() {
        let bad = r#"{"classes":["0","1"],"weights":[[1.0]],"intercepts":[0.0,0.0]}"#;
        assert!(serde_json::from_str::<SoftmaxClassifier>(bad).is_err());

        let good = r#"{"classes":["0","1"],"weights":[[1.0],[-1.0]],"intercepts":[0.0,0.0]}"#;
        let model: SoftmaxClassifier = serde_json::from_str(good).unwrap();
        assert_eq!(model.classes(), &["0".to_string(), "1".to_string()]);
        assert_eq!(model.n_features(), 1);
    }
}
