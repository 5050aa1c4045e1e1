use crate::error::{AuditError, Result};
use crate::table::{outcome_eq, Table, LABEL, PREDICTION, SENSITIVE, SENSITIVE_PREFIX};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Accuracy per group plus the spread between the best and worst group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupAccuracy {
    pub accuracies: BTreeMap<String, f64>,
    pub overall: f64,
    /// max − min group accuracy; 0 for a single group.
    pub gap: f64,
}

/// Per-group accuracy of `predictions` against `labels`, grouped by `groups`.
///
/// All three slices are row-aligned. Groups come from present rows, so none is empty.
/// A row with a missing label or prediction counts as a miss.
pub fn group_accuracy(labels: &[String], predictions: &[String], groups: &[String]) -> GroupAccuracy {
    let mut tally: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    let mut correct_total = 0usize;
    for ((label, pred), group) in labels.iter().zip(predictions).zip(groups) {
        let hit = outcome_eq(label, pred);
        let entry = tally.entry(group.as_str()).or_insert((0, 0));
        entry.1 += 1;
        if hit {
            entry.0 += 1;
            correct_total += 1;
        }
    }

    let accuracies: BTreeMap<String, f64> = tally
        .into_iter()
        .map(|(g, (correct, total))| (g.to_string(), correct as f64 / total as f64))
        .collect();
    let max = accuracies.values().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = accuracies.values().copied().fold(f64::INFINITY, f64::min);
    let gap = if accuracies.is_empty() { 0.0 } else { max - min };
    let overall = if labels.is_empty() {
        0.0
    } else {
        correct_total as f64 / labels.len() as f64
    };

    GroupAccuracy {
        accuracies,
        overall,
        gap,
    }
}

/// Single-attribute fairness over the `sensitive` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairnessReport {
    pub group_accuracies: BTreeMap<String, f64>,
    pub overall_accuracy: f64,
    pub fairness_gap: f64,
}

/// Fairness over the composite key of every `sensitive_*` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntersectionalFairnessReport {
    /// Columns forming the composite key, in key order.
    pub sensitive_columns: Vec<String>,
    pub intersectional_group_accuracies: BTreeMap<String, f64>,
    pub overall_accuracy: f64,
    pub intersectional_fairness_gap: f64,
}

pub fn compute_group_fairness(table: &Table) -> Result<FairnessReport> {
    table.require_columns(&[LABEL, PREDICTION, SENSITIVE])?;
    table.require_rows()?;

    let groups = table.group_keys(SENSITIVE)?;
    let acc = group_accuracy(
        &table.group_keys(LABEL)?,
        &table.group_keys(PREDICTION)?,
        &groups,
    );
    debug!(groups = acc.accuracies.len(), gap = acc.gap, "group fairness");

    Ok(FairnessReport {
        group_accuracies: acc.accuracies,
        overall_accuracy: acc.overall,
        fairness_gap: acc.gap,
    })
}

pub fn compute_intersectional_fairness(table: &Table) -> Result<IntersectionalFairnessReport> {
    table.require_columns(&[LABEL, PREDICTION])?;
    let sensitive_columns = table.columns_with_prefix(SENSITIVE_PREFIX);
    if sensitive_columns.is_empty() {
        return Err(AuditError::missing_column(format!("{}*", SENSITIVE_PREFIX)));
    }
    table.require_rows()?;

    let keys = table.composite_keys(&sensitive_columns)?;
    let acc = group_accuracy(
        &table.group_keys(LABEL)?,
        &table.group_keys(PREDICTION)?,
        &keys,
    );
    debug!(
        columns = sensitive_columns.len(),
        groups = acc.accuracies.len(),
        gap = acc.gap,
        "intersectional fairness"
    );

    Ok(IntersectionalFairnessReport {
        sensitive_columns,
        intersectional_group_accuracies: acc.accuracies,
        overall_accuracy: acc.overall,
        intersectional_fairness_gap: acc.gap,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(csv: &str) -> Table {
        Table::from_csv_bytes(csv.as_bytes()).unwrap()
    }

    #[test]
    fn per_group_accuracy_and_gap() {
        let report =
            compute_group_fairness(&table("label,prediction,sensitive\n0,0,0\n1,1,1\n0,0,0\n1,0,1\n"))
                .unwrap();
        assert_eq!(report.group_accuracies["0"], 1.0);
        assert_eq!(report.group_accuracies["1"], 0.5);
        assert_eq!(report.fairness_gap, 0.5);
        assert_eq!(report.overall_accuracy, 0.75);
    }

    #[test]
    fn integer_labels_match_float_predictions() {
        let report = compute_group_fairness(&table(
            "label,prediction,sensitive\n0,0.0,a\n1,1.0,a\n0,0.0,b\n1,1.0,b\n",
        ))
        .unwrap();
        assert_eq!(report.overall_accuracy, 1.0);
        assert_eq!(report.group_accuracies["a"], 1.0);
        assert_eq!(report.group_accuracies["b"], 1.0);
        assert_eq!(report.fairness_gap, 0.0);
    }

    #[test]
    fn missing_label_and_prediction_cells_are_misses() {
        let report = compute_group_fairness(&table(
            "label,prediction,sensitive\n,,a\n1,1,a\n0,0,b\n1,1,b\n",
        ))
        .unwrap();
        assert_eq!(report.group_accuracies["a"], 0.5);
        assert_eq!(report.group_accuracies["b"], 1.0);
        assert_eq!(report.overall_accuracy, 0.75);
    }

    #[test]
    fn single_group_has_zero_gap() {
        let report =
            compute_group_fairness(&table("label,prediction,sensitive\n0,1,a\n1,1,a\n")).unwrap();
        assert_eq!(report.fairness_gap, 0.0);
        assert_eq!(report.group_accuracies.len(), 1);
    }

    #[test]
    fn gap_is_unchanged_when_label_and_prediction_swap() {
        let original = table("label,prediction,sensitive\n0,1,a\n1,1,a\n1,0,b\n0,0,b\n1,1,b\n");
        let swapped = table("prediction,label,sensitive\n0,1,a\n1,1,a\n1,0,b\n0,0,b\n1,1,b\n");
        let a = compute_group_fairness(&original).unwrap();
        let b = compute_group_fairness(&swapped).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn missing_prediction_is_named() {
        let err = compute_group_fairness(&table("label,sensitive\n0,a\n")).unwrap_err();
        assert_eq!(err, AuditError::missing_column(PREDICTION));
    }

    #[test]
    fn missing_label_is_named_first() {
        let err = compute_group_fairness(&table("feature\n1\n")).unwrap_err();
        assert_eq!(err, AuditError::missing_column(LABEL));
    }

    #[test]
    fn intersectional_keys_sorted_by_column_name() {
        let report = compute_intersectional_fairness(&table(
            "label,prediction,sensitive_gender,sensitive_age\n0,0,0,1\n1,1,1,1\n0,0,0,0\n1,1,1,0\n1,0,1,0\n",
        ))
        .unwrap();
        assert_eq!(report.sensitive_columns, vec!["sensitive_age", "sensitive_gender"]);
        // key = age-gender
        let accs = &report.intersectional_group_accuracies;
        assert_eq!(accs.len(), 4);
        assert_eq!(accs["1-0"], 1.0);
        assert_eq!(accs["0-1"], 0.5);
        assert_eq!(report.intersectional_fairness_gap, 0.5);
    }

    #[test]
    fn intersectional_requires_prefixed_columns() {
        let err =
            compute_intersectional_fairness(&table("label,prediction,sensitive\n0,0,a\n")).unwrap_err();
        assert_eq!(err, AuditError::missing_column("sensitive_*"));
    }
}
