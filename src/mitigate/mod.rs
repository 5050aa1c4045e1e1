//! Frequency reweighting of a training table.
//!
//! Both weights are inverse-frequency multipliers for downstream training:
//! `sample_weight` balances labels, `group_weight` balances the `sensitive`
//! groups. Nothing is trained here; the group weight is a frequency proxy,
//! not an adversarial debiasing model.

use crate::bias::{histogram, inverse_frequency};
use crate::error::Result;
use crate::table::{Table, LABEL, SENSITIVE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Column holding the per-row label weight.
pub const SAMPLE_WEIGHT: &str = "sample_weight";
/// Column holding the per-row sensitive-group weight.
pub const GROUP_WEIGHT: &str = "group_weight";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MitigationReport {
    /// Input table plus the weight columns, as CSV text.
    pub mitigated_dataset: String,
    pub label_counts: BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_counts: Option<BTreeMap<String, usize>>,
}

/// `max_count / count[key]` for every row's key.
pub fn inverse_frequency_weights(keys: &[String]) -> (BTreeMap<String, usize>, Vec<f64>) {
    let counts = histogram(keys);
    let ratios = inverse_frequency(&counts);
    let weights = keys.iter().map(|k| ratios[k]).collect();
    (counts, weights)
}

/// Append `sample_weight` (and `group_weight` when `sensitive` exists) to the table.
pub fn group_reweight(table: Table) -> Result<(Table, MitigationReport)> {
    table.require_columns(&[LABEL])?;
    table.require_rows()?;

    let (label_counts, sample_weights) = inverse_frequency_weights(&table.group_keys(LABEL)?);

    let group = if table.has_column(SENSITIVE) {
        Some(inverse_frequency_weights(&table.group_keys(SENSITIVE)?))
    } else {
        None
    };

    let mut out = table.with_float_column(SAMPLE_WEIGHT, sample_weights)?;
    let group_counts = match group {
        Some((counts, weights)) => {
            out = out.with_float_column(GROUP_WEIGHT, weights)?;
            Some(counts)
        }
        None => None,
    };

    debug!(
        labels = label_counts.len(),
        groups = group_counts.as_ref().map_or(0, BTreeMap::len),
        "reweighted"
    );
    let report = MitigationReport {
        mitigated_dataset: out.to_csv_string()?,
        label_counts,
        group_counts,
    };
    Ok((out, report))
}
