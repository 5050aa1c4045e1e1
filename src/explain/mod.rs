//! Permutation feature importance: a model-agnostic sampling explainer.
//!
//! Shuffling one feature breaks its link to the label; the accuracy lost
//! measures how much the model leaned on it.

use crate::error::{AuditError, Result};
use crate::model::{checked_predict, Classifier};
use crate::table::{is_sensitive, outcome_eq, FeatureMatrix, Table, LABEL, PREDICTION};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainConfig {
    /// Shuffles per feature.
    pub repeats: usize,
    pub seed: Option<u64>,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            repeats: 5,
            seed: None,
        }
    }
}

impl ExplainConfig {
    pub fn validate(&self) -> Result<()> {
        if self.repeats == 0 {
            return Err(AuditError::config("repeats must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationReport {
    pub baseline_accuracy: f64,
    /// Mean accuracy drop per shuffled feature.
    pub feature_importances: BTreeMap<String, f64>,
    pub repeats: usize,
}

fn accuracy(labels: &[String], predicted: &[String]) -> f64 {
    let hits = labels.iter().zip(predicted).filter(|(l, p)| outcome_eq(l, p)).count();
    hits as f64 / labels.len() as f64
}

fn feature_seed(base: u64, feature: usize) -> u64 {
    base ^ (feature as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

#[instrument(level = "info", skip_all, fields(rows = table.num_rows(), repeats = config.repeats))]
pub fn permutation_importance(
    model: &dyn Classifier,
    table: &Table,
    config: &ExplainConfig,
) -> Result<ExplanationReport> {
    config.validate()?;
    table.require_columns(&[LABEL])?;
    table.require_rows()?;

    let features = table.feature_matrix(|c| c == LABEL || c == PREDICTION || is_sensitive(c))?;
    let labels = table.group_keys(LABEL)?;
    let baseline_accuracy = accuracy(&labels, &checked_predict(model, &features)?);
    let base_seed = config.seed.unwrap_or_else(rand::random);

    let drops = (0..features.num_features())
        .into_par_iter()
        .map(|j| {
            let mut rng = StdRng::seed_from_u64(feature_seed(base_seed, j));
            shuffled_drop(model, &features, &labels, j, config.repeats, baseline_accuracy, &mut rng)
        })
        .collect::<Result<Vec<f64>>>()?;

    let feature_importances: BTreeMap<String, f64> = features
        .names()
        .iter()
        .cloned()
        .zip(drops)
        .collect();
    debug!(features = feature_importances.len(), baseline_accuracy, "permutation importance");

    Ok(ExplanationReport {
        baseline_accuracy,
        feature_importances,
        repeats: config.repeats,
    })
}

fn shuffled_drop(
    model: &dyn Classifier,
    features: &FeatureMatrix,
    labels: &[String],
    feature: usize,
    repeats: usize,
    baseline: f64,
    rng: &mut StdRng,
) -> Result<f64> {
    let mut column = features.column(feature);
    let mut total = 0.0;
    for _ in 0..repeats {
        column.shuffle(rng);
        let permuted = features.with_column(feature, &column)?;
        total += baseline - accuracy(labels, &checked_predict(model, &permuted)?);
    }
    Ok(total / repeats as f64)
}
