use crate::bias::fairness::group_accuracy;
use crate::error::Result;
use crate::model::{checked_predict, Classifier};
use crate::table::{is_sensitive, outcome_eq, Table, LABEL, PREDICTION, SENSITIVE};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// How a classifier performs on a labelled evaluation table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBiasReport {
    pub overall_accuracy: f64,
    /// Recall per true class.
    pub per_class_accuracy: BTreeMap<String, f64>,
    /// true label → predicted label → count
    pub confusion_matrix: BTreeMap<String, BTreeMap<String, usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_accuracies: Option<BTreeMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fairness_gap: Option<f64>,
}

/// Run `predict` over the evaluation table and score it per class and, when a
/// `sensitive` column is present, per group.
///
/// Features are every column except `label`, `prediction` and the sensitive columns.
pub fn audit_model(model: &dyn Classifier, table: &Table) -> Result<ModelBiasReport> {
    table.require_columns(&[LABEL])?;
    table.require_rows()?;

    let features = table.feature_matrix(|c| c == LABEL || c == PREDICTION || is_sensitive(c))?;
    let labels = table.group_keys(LABEL)?;
    let predicted = align_to_labels(&labels, checked_predict(model, &features)?);

    let mut confusion_matrix: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
    for (truth, pred) in labels.iter().zip(&predicted) {
        *confusion_matrix
            .entry(truth.clone())
            .or_default()
            .entry(pred.clone())
            .or_insert(0) += 1;
    }

    let per_class_accuracy = confusion_matrix
        .iter()
        .map(|(truth, row)| {
            let total: usize = row.values().sum();
            let hits: usize = row
                .iter()
                .filter(|(pred, _)| outcome_eq(truth, pred))
                .map(|(_, &n)| n)
                .sum();
            (truth.clone(), hits as f64 / total as f64)
        })
        .collect();

    let (group_accuracies, fairness_gap, overall_accuracy) = if table.has_column(SENSITIVE) {
        let acc = group_accuracy(&labels, &predicted, &table.group_keys(SENSITIVE)?);
        (Some(acc.accuracies), Some(acc.gap), acc.overall)
    } else {
        let hits = labels.iter().zip(&predicted).filter(|(l, p)| outcome_eq(l, p)).count();
        (None, None, hits as f64 / labels.len() as f64)
    };

    debug!(
        rows = labels.len(),
        classes = confusion_matrix.len(),
        overall_accuracy,
        "model audit"
    );
    Ok(ModelBiasReport {
        overall_accuracy,
        per_class_accuracy,
        confusion_matrix,
        group_accuracies,
        fairness_gap,
    })
}

/// Rename predictions that equal a label value numerically (`1.0` vs `1`) to
/// that label's spelling, so the confusion matrix has one key per class.
fn align_to_labels(labels: &[String], predicted: Vec<String>) -> Vec<String> {
    let classes: BTreeSet<&str> = labels.iter().map(String::as_str).collect();
    predicted
        .into_iter()
        .map(|p| match classes.iter().find(|c| outcome_eq(c, &p)) {
            Some(c) => c.to_string(),
            None => p,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuditError;
    use crate::model::NearestCentroid;

    fn threshold_model() -> NearestCentroid {
        NearestCentroid::new(vec!["0".into(), "1".into()], vec![vec![0.0], vec![10.0]]).unwrap()
    }

    #[test]
    fn confusion_matrix_covers_every_row() {
        let table = Table::from_csv_bytes(b"x,label\n1,0\n2,0\n9,1\n8,0\n4,1\n").unwrap();
        let report = audit_model(&threshold_model(), &table).unwrap();
        let total: usize = report
            .confusion_matrix
            .values()
            .flat_map(|row| row.values())
            .sum();
        assert_eq!(total, 5);
        assert_eq!(report.confusion_matrix["0"]["0"], 2);
        assert_eq!(report.confusion_matrix["0"]["1"], 1);
        assert_eq!(report.confusion_matrix["1"]["1"], 1);
        assert_eq!(report.confusion_matrix["1"]["0"], 1);
        assert!((report.per_class_accuracy["0"] - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(report.per_class_accuracy["1"], 0.5);
        assert_eq!(report.overall_accuracy, 0.6);
        assert!(report.group_accuracies.is_none());
    }

    #[test]
    fn sensitive_column_is_not_a_feature_but_is_grouped() {
        let table =
            Table::from_csv_bytes(b"x,sensitive,label\n1,f,0\n9,f,1\n8,m,0\n2,m,0\n").unwrap();
        let report = audit_model(&threshold_model(), &table).unwrap();
        let groups = report.group_accuracies.unwrap();
        assert_eq!(groups["f"], 1.0);
        assert_eq!(groups["m"], 0.5);
        assert_eq!(report.fairness_gap, Some(0.5));
        assert_eq!(report.overall_accuracy, 0.75);
    }

    #[test]
    fn float_class_names_match_integer_labels() {
        let model =
            NearestCentroid::new(vec!["0.0".into(), "1.0".into()], vec![vec![0.0], vec![10.0]])
                .unwrap();
        let table = Table::from_csv_bytes(b"x,label\n1,0\n9,1\n8,1\n").unwrap();
        let report = audit_model(&model, &table).unwrap();
        assert_eq!(report.overall_accuracy, 1.0);
        assert_eq!(report.per_class_accuracy["0"], 1.0);
        assert_eq!(report.per_class_accuracy["1"], 1.0);
        assert_eq!(report.confusion_matrix["1"]["1"], 2);
        assert_eq!(report.confusion_matrix["1"].len(), 1);
    }

    #[test]
    fn text_feature_is_a_parse_error() {
        let table = Table::from_csv_bytes(b"x,label\nabc,0\n").unwrap();
        assert!(matches!(
            audit_model(&threshold_model(), &table).unwrap_err(),
            AuditError::Parse(_)
        ));
    }
}
