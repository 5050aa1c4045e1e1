//! Dataset and model bias analyzers.

pub mod balance;
pub mod fairness;
pub mod model;

use std::collections::BTreeMap;

pub use balance::{analyze_class_balance, ClassBalanceReport};
pub use fairness::{
    compute_group_fairness, compute_intersectional_fairness, FairnessReport,
    IntersectionalFairnessReport,
};
pub use model::{audit_model, ModelBiasReport};

/// Count occurrences of each key, ordered by key.
pub fn histogram<S: AsRef<str>>(keys: &[S]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for key in keys {
        *counts.entry(key.as_ref().to_string()).or_insert(0) += 1;
    }
    counts
}

/// `max(counts) / counts[g]` for every group; 1.0 marks the largest group.
pub fn inverse_frequency(counts: &BTreeMap<String, usize>) -> BTreeMap<String, f64> {
    let max_count = counts.values().copied().max().unwrap_or(0) as f64;
    counts
        .iter()
        .map(|(k, &v)| (k.clone(), max_count / v as f64))
        .collect()
}
