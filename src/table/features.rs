use crate::error::{AuditError, Result};
use arrow::{
    array::{Array, ArrayRef, BooleanArray, Float64Array, Int64Array},
    datatypes::DataType,
};

/// Row-major numeric view of a table, the shape classifiers consume.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    names: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    /// Every row must have one value per feature name.
    pub fn new(names: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != names.len())
        {
            return Err(AuditError::parse(format!(
                "feature row {} has {} values, expected {}",
                idx,
                row.len(),
                names.len()
            )));
        }
        Ok(Self { names, rows })
    }

    pub(crate) fn from_columns(names: Vec<String>, columns: Vec<Vec<f64>>, n_rows: usize) -> Self {
        let rows = (0..n_rows)
            .map(|r| columns.iter().map(|col| col[r]).collect())
            .collect();
        Self { names, rows }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_features(&self) -> usize {
        self.names.len()
    }

    /// Values of feature `j`, top to bottom.
    pub fn column(&self, j: usize) -> Vec<f64> {
        self.rows.iter().map(|row| row[j]).collect()
    }

    /// Copy with feature `j` replaced by `values`, one value per row.
    pub fn with_column(&self, j: usize, values: &[f64]) -> Result<Self> {
        if j >= self.num_features() || values.len() != self.num_rows() {
            return Err(AuditError::parse(format!(
                "cannot replace feature {} of {} with {} values for {} rows",
                j,
                self.num_features(),
                values.len(),
                self.num_rows()
            )));
        }
        let rows = self
            .rows
            .iter()
            .zip(values)
            .map(|(row, &v)| {
                let mut row = row.clone();
                row[j] = v;
                row
            })
            .collect();
        Ok(Self {
            names: self.names.clone(),
            rows,
        })
    }

    /// Copy with `f` applied to every cell.
    pub fn map_values<F>(&self, mut f: F) -> Self
    where
        F: FnMut(f64) -> f64,
    {
        let rows = self
            .rows
            .iter()
            .map(|row| row.iter().map(|&v| f(v)).collect())
            .collect();
        Self {
            names: self.names.clone(),
            rows,
        }
    }
}

/// Read a numeric or boolean column as `f64`; text columns and nulls are rejected.
pub fn numeric_column(name: &str, array: &ArrayRef) -> Result<Vec<f64>> {
    let null_err = || AuditError::parse(format!("feature column '{}' has missing values", name));
    let downcast_err = || AuditError::parse(format!("feature column '{}' has an unexpected layout", name));

    match array.data_type() {
        DataType::Int64 => array
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(downcast_err)?
            .iter()
            .map(|v| v.map(|x| x as f64).ok_or_else(null_err))
            .collect(),
        DataType::Float64 => array
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(downcast_err)?
            .iter()
            .map(|v| v.ok_or_else(null_err))
            .collect(),
        DataType::Boolean => array
            .as_any()
            .downcast_ref::<BooleanArray>()
            .ok_or_else(downcast_err)?
            .iter()
            .map(|v| v.map(|b| if b { 1.0 } else { 0.0 }).ok_or_else(null_err))
            .collect(),
        other => Err(AuditError::parse(format!(
            "feature column '{}' is not numeric ({})",
            name, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::StringArray;
    use std::sync::Arc;

    #[test]
    fn booleans_map_to_unit_values() {
        let arr: ArrayRef = Arc::new(BooleanArray::from(vec![true, false]));
        assert_eq!(numeric_column("flag", &arr).unwrap(), vec![1.0, 0.0]);
    }

    #[test]
    fn text_column_is_rejected() {
        let arr: ArrayRef = Arc::new(StringArray::from(vec!["a"]));
        let err = numeric_column("city", &arr).unwrap_err();
        assert!(matches!(err, AuditError::Parse(msg) if msg.contains("city")));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = FeatureMatrix::new(vec!["a".into(), "b".into()], vec![vec![1.0]]);
        assert!(err.is_err());
    }

    #[test]
    fn with_column_replaces_one_feature() {
        let m = FeatureMatrix::new(
            vec!["a".into(), "b".into()],
            vec![vec![1.0, 2.0], vec![3.0, 4.0]],
        )
        .unwrap();
        let swapped = m.with_column(1, &[9.0, 8.0]).unwrap();
        assert_eq!(swapped.rows(), &[vec![1.0, 9.0], vec![3.0, 8.0]]);
        assert_eq!(m.column(1), vec![2.0, 4.0]);
    }

    #[test]
    fn with_column_rejects_short_values_and_bad_index() {
        let m = FeatureMatrix::new(
            vec!["a".into(), "b".into()],
            vec![vec![1.0, 2.0], vec![3.0, 4.0]],
        )
        .unwrap();
        assert!(matches!(m.with_column(0, &[9.0]), Err(AuditError::Parse(_))));
        assert!(matches!(m.with_column(2, &[9.0, 8.0]), Err(AuditError::Parse(_))));
    }
}
