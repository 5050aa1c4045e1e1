//! Analyzer entry points for the transport layer.
//!
//! Each function takes the raw upload, runs exactly one analyzer and returns a
//! `Report`. Failures become `{"error": ...}` and are logged here; nothing in
//! this module returns `Err`.

use crate::bias::{
    self, analyze_class_balance, audit_model, ClassBalanceReport, FairnessReport,
    IntersectionalFairnessReport, ModelBiasReport,
};
use crate::error::Result;
use crate::explain::{permutation_importance, ExplainConfig, ExplanationReport};
use crate::mitigate::{group_reweight, MitigationReport};
use crate::model::{require_probabilities, Classifier};
use crate::privacy::{estimate, DpEstimate, DpParams, MembershipProbe, PrivacyReport, ProbeConfig};
use crate::report::Report;
use crate::table::Table;
use tracing::{instrument, warn};

fn finish<T>(analyzer: &'static str, result: Result<T>) -> Report<T> {
    if let Err(e) = &result {
        warn!(analyzer, error = %e, "analysis failed");
    }
    result.into()
}

#[instrument(level = "info", skip_all, fields(bytes = data.len()))]
pub fn analyze_dataset_bias(data: &[u8]) -> Report<ClassBalanceReport> {
    let result = Table::from_csv_bytes(data).and_then(|t| analyze_class_balance(&t));
    finish("dataset_bias", result)
}

#[instrument(level = "info", skip_all, fields(bytes = data.len()))]
pub fn compute_fairness_metrics(data: &[u8]) -> Report<FairnessReport> {
    let result = Table::from_csv_bytes(data).and_then(|t| bias::compute_group_fairness(&t));
    finish("fairness", result)
}

#[instrument(level = "info", skip_all, fields(bytes = data.len()))]
pub fn compute_intersectional_fairness(data: &[u8]) -> Report<IntersectionalFairnessReport> {
    let result =
        Table::from_csv_bytes(data).and_then(|t| bias::compute_intersectional_fairness(&t));
    finish("intersectional_fairness", result)
}

#[instrument(level = "info", skip_all, fields(bytes = data.len()))]
pub fn mitigate_bias(data: &[u8]) -> Report<MitigationReport> {
    let result = Table::from_csv_bytes(data)
        .and_then(group_reweight)
        .map(|(_, report)| report);
    finish("mitigation", result)
}

/// The capability check runs before the upload is parsed.
#[instrument(level = "info", skip_all, fields(bytes = data.len(), seeded = config.seed.is_some()))]
pub fn perform_privacy_tests(
    model: &dyn Classifier,
    data: &[u8],
    config: &ProbeConfig,
) -> Report<PrivacyReport> {
    let result = require_probabilities(model)
        .and_then(|_| Table::from_csv_bytes(data))
        .and_then(|t| MembershipProbe::new(config.clone()).run(model, &t));
    finish("privacy", result)
}

#[instrument(level = "info", skip_all, fields(bytes = data.len()))]
pub fn analyze_model_bias(model: &dyn Classifier, data: &[u8]) -> Report<ModelBiasReport> {
    let result = Table::from_csv_bytes(data).and_then(|t| audit_model(model, &t));
    finish("model_bias", result)
}

#[instrument(level = "info", skip_all, fields(bytes = data.len(), repeats = config.repeats))]
pub fn explain_model(
    model: &dyn Classifier,
    data: &[u8],
    config: &ExplainConfig,
) -> Report<ExplanationReport> {
    let result = Table::from_csv_bytes(data).and_then(|t| permutation_importance(model, &t, config));
    finish("explanation", result)
}

#[instrument(level = "info", skip_all, fields(sigma = params.noise_multiplier, epochs = params.epochs))]
pub fn estimate_privacy_budget(params: &DpParams) -> Report<DpEstimate> {
    finish("privacy_budget", estimate(params))
}
