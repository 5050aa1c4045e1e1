use crate::bias::{histogram, inverse_frequency};
use crate::error::Result;
use crate::table::{Table, LABEL};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Label frequencies and how far they are from an even split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassBalanceReport {
    pub class_counts: BTreeMap<String, usize>,
    /// `max_count / count` per class, always >= 1.
    pub imbalance_ratios: BTreeMap<String, f64>,
    /// `1 - population_std(proportions)`; 1.0 means every class is equally represented.
    pub fairness_score: f64,
}

/// Population standard deviation (divisor = number of values).
pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    var.sqrt()
}

pub fn analyze_class_balance(table: &Table) -> Result<ClassBalanceReport> {
    table.require_columns(&[LABEL])?;
    table.require_rows()?;

    let labels = table.group_keys(LABEL)?;
    let class_counts = histogram(&labels);
    let imbalance_ratios = inverse_frequency(&class_counts);

    let n = labels.len() as f64;
    let proportions: Vec<f64> = class_counts.values().map(|&c| c as f64 / n).collect();
    let fairness_score = 1.0 - population_std(&proportions);

    debug!(classes = class_counts.len(), rows = labels.len(), fairness_score, "class balance");
    Ok(ClassBalanceReport {
        class_counts,
        imbalance_ratios,
        fairness_score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuditError;

    fn analyze(csv: &str) -> Result<ClassBalanceReport> {
        analyze_class_balance(&Table::from_csv_bytes(csv.as_bytes())?)
    }

    #[test]
    fn counts_and_ratios_for_small_table() {
        let report = analyze("label\n0\n1\n0\n1\n1\n").unwrap();
        assert_eq!(report.class_counts["0"], 2);
        assert_eq!(report.class_counts["1"], 3);
        assert_eq!(report.imbalance_ratios["0"], 1.5);
        assert_eq!(report.imbalance_ratios["1"], 1.0);
        // proportions 0.4 / 0.6 → population std 0.1
        assert!((report.fairness_score - 0.9).abs() < 1e-12);
    }

    #[test]
    fn counts_sum_to_row_count_and_ratios_are_at_least_one() {
        let report = analyze("label,x\na,1\nb,2\nc,3\na,4\na,5\nb,6\n").unwrap();
        assert_eq!(report.class_counts.values().sum::<usize>(), 6);
        assert!(report.imbalance_ratios.values().all(|&r| r >= 1.0));
        let majority = report
            .class_counts
            .iter()
            .max_by_key(|(_, c)| **c)
            .map(|(k, _)| k.clone())
            .unwrap();
        assert_eq!(report.imbalance_ratios[&majority], 1.0);
        assert!(report.fairness_score <= 1.0);
    }

    #[test]
    fn equal_groups_score_one() {
        let report = analyze("label\nx\ny\nz\nx\ny\nz\n").unwrap();
        assert!((report.fairness_score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn single_group_is_degenerate_one() {
        let report = analyze("label\n7\n7\n").unwrap();
        assert_eq!(report.fairness_score, 1.0);
    }

    #[test]
    fn missing_label_is_a_schema_error() {
        let err = analyze("feature\n1\n2\n3\n").unwrap_err();
        assert_eq!(err, AuditError::missing_column(LABEL));
    }

    #[test]
    fn header_only_is_a_parse_error() {
        assert!(matches!(analyze("label\n").unwrap_err(), AuditError::Parse(_)));
    }

    #[test]
    fn population_std_uses_n_divisor() {
        assert!((population_std(&[1.0, 3.0]) - 1.0).abs() < 1e-12);
    }
}
