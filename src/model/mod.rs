//! Classifier capability interface and the model artifacts bundled with the CLI.
//!
//! The engine never mutates a classifier; it only calls `predict` and, when the
//! model offers it, `predict_probability`. Capabilities are checked before any
//! work starts so a hard-label model fails fast instead of mid-analysis.

pub mod artifact;
pub mod centroid;
pub mod softmax;

use crate::error::{AuditError, Result};
use crate::table::FeatureMatrix;
use rayon::prelude::*;

pub use artifact::{load_model, ModelArtifact};
pub use centroid::NearestCentroid;
pub use softmax::SoftmaxClassifier;

/// Name used in capability errors.
pub const PREDICT_PROBABILITY: &str = "predict_probability";

/// A trained model the auditor may query.
pub trait Classifier: Send + Sync {
    /// One predicted label per feature row.
    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<String>>;

    /// `Some` when the model can also score class probabilities.
    fn probabilistic(&self) -> Option<&dyn ProbabilisticClassifier> {
        None
    }
}

/// Models that expose a distribution over labels.
pub trait ProbabilisticClassifier: Send + Sync {
    /// One distribution per feature row.
    fn predict_probability(&self, features: &FeatureMatrix) -> Result<Vec<Vec<f64>>>;
}

/// Resolve the probability capability or fail with a capability error.
pub fn require_probabilities(model: &dyn Classifier) -> Result<&dyn ProbabilisticClassifier> {
    model
        .probabilistic()
        .ok_or_else(|| AuditError::unsupported(PREDICT_PROBABILITY))
}

/// Call `predict` and check the model returned one label per row.
pub fn checked_predict(model: &dyn Classifier, features: &FeatureMatrix) -> Result<Vec<String>> {
    let labels = model.predict(features)?;
    if labels.len() != features.num_rows() {
        return Err(AuditError::inference(format!(
            "predict returned {} labels for {} rows",
            labels.len(),
            features.num_rows()
        )));
    }
    Ok(labels)
}

/// Highest class probability per row, validating the model's output shape.
pub fn max_confidences(
    model: &dyn ProbabilisticClassifier,
    features: &FeatureMatrix,
) -> Result<Vec<f64>> {
    let probs = model.predict_probability(features)?;
    if probs.len() != features.num_rows() {
        return Err(AuditError::inference(format!(
            "predict_probability returned {} rows for {} inputs",
            probs.len(),
            features.num_rows()
        )));
    }
    probs
        .par_iter()
        .enumerate()
        .map(|(i, dist)| {
            dist.iter()
                .copied()
                .filter(|p| p.is_finite())
                .reduce(f64::max)
                .ok_or_else(|| AuditError::inference(format!("empty distribution for row {}", i)))
        })
        .collect()
}

/// Row-wise check shared by the bundled models.
pub(crate) fn check_width(features: &FeatureMatrix, expected: usize) -> Result<()> {
    if features.num_features() != expected {
        return Err(AuditError::inference(format!(
            "model expects {} features, got {}",
            expected,
            features.num_features()
        )));
    }
    Ok(())
}
