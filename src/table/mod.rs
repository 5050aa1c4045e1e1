// src/table/mod.rs
//! In-memory tables decoded from uploaded CSV bytes.

pub mod convert;
pub mod features;
pub mod utils;
pub mod write;

use crate::error::{AuditError, Result};
use arrow::{
    array::{Array, ArrayRef, Float64Array},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
    util::display::array_value_to_string,
};
use csv::{ReaderBuilder, Trim};
use std::{collections::HashSet, sync::Arc};
use tracing::debug;

pub use features::FeatureMatrix;

/// Ground-truth column.
pub const LABEL: &str = "label";
/// Model output column.
pub const PREDICTION: &str = "prediction";
/// Single protected-attribute column.
pub const SENSITIVE: &str = "sensitive";
/// Prefix shared by the protected-attribute columns of an intersectional audit.
pub const SENSITIVE_PREFIX: &str = "sensitive_";
/// Separator between the parts of a composite group key.
pub const KEY_SEPARATOR: &str = "-";
/// Group key used for null cells.
pub const MISSING_KEY: &str = "<missing>";

/// Header + string cells, before any type inference.
#[derive(Debug)]
pub struct RawTable {
    /// Column names from the header row.
    pub headers: Vec<String>,
    /// Each data row, one String per field.
    pub rows: Vec<Vec<String>>,
}

/// Decode `bytes` as UTF-8 CSV with a mandatory header row.
///
/// Every data row must have as many fields as the header; blank lines are skipped.
pub fn load_raw_table(bytes: &[u8]) -> Result<RawTable> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| AuditError::parse(format!("input is not valid UTF-8: {}", e)))?;

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| AuditError::parse(format!("CSV header error: {}", e)))?
        .iter()
        .map(utils::clean_str)
        .collect();
    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(AuditError::parse("missing header row"));
    }

    let mut seen = HashSet::with_capacity(headers.len());
    if let Some(dup) = headers.iter().find(|h| !seen.insert(h.as_str())) {
        return Err(AuditError::parse(format!("duplicate column name '{}'", dup)));
    }

    let mut rows = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record =
            result.map_err(|e| AuditError::parse(format!("CSV parse error at record {}: {}", idx, e)))?;
        rows.push(record.iter().map(utils::clean_str).collect());
    }

    Ok(RawTable { headers, rows })
}

/// A typed, column-oriented table backed by an Arrow `RecordBatch`.
#[derive(Debug, Clone)]
pub struct Table {
    batch: RecordBatch,
}

impl Table {
    /// Parse and type a CSV upload.
    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Self> {
        let raw = load_raw_table(bytes)?;
        let batch = convert::raw_to_record_batch(&raw)?;
        debug!(
            rows = batch.num_rows(),
            columns = batch.num_columns(),
            "decoded table"
        );
        Ok(Self { batch })
    }

    pub fn from_batch(batch: RecordBatch) -> Self {
        Self { batch }
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.batch.schema().index_of(name).is_ok()
    }

    /// Fails with a schema error naming the first absent column.
    pub fn require_columns(&self, required: &[&str]) -> Result<()> {
        match required.iter().find(|c| !self.has_column(c)) {
            Some(missing) => Err(AuditError::missing_column(*missing)),
            None => Ok(()),
        }
    }

    /// Group statistics are undefined on a header-only table.
    pub fn require_rows(&self) -> Result<()> {
        if self.num_rows() == 0 {
            return Err(AuditError::parse("table has no data rows"));
        }
        Ok(())
    }

    pub fn column(&self, name: &str) -> Result<&ArrayRef> {
        let idx = self
            .batch
            .schema()
            .index_of(name)
            .map_err(|_| AuditError::missing_column(name))?;
        Ok(self.batch.column(idx))
    }

    /// Names starting with `prefix`, sorted lexicographically.
    pub fn columns_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .column_names()
            .into_iter()
            .filter(|n| n.starts_with(prefix))
            .collect();
        names.sort();
        names
    }

    /// One group key per row for column `name`.
    pub fn group_keys(&self, name: &str) -> Result<Vec<String>> {
        let array = self.column(name)?;
        (0..array.len()).map(|row| cell_key(array, row)).collect()
    }

    /// Per-row keys joining the values of `columns`, in the given order.
    pub fn composite_keys(&self, columns: &[String]) -> Result<Vec<String>> {
        let per_column = columns
            .iter()
            .map(|c| self.group_keys(c))
            .collect::<Result<Vec<_>>>()?;
        Ok((0..self.num_rows())
            .map(|row| {
                per_column
                    .iter()
                    .map(|keys| keys[row].as_str())
                    .collect::<Vec<_>>()
                    .join(KEY_SEPARATOR)
            })
            .collect())
    }

    /// Append a Float64 column, replacing any existing column with the same name.
    pub fn with_float_column(self, name: &str, values: Vec<f64>) -> Result<Self> {
        if values.len() != self.num_rows() {
            return Err(AuditError::parse(format!(
                "column '{}' has {} values for {} rows",
                name,
                values.len(),
                self.num_rows()
            )));
        }

        let schema = self.batch.schema();
        let mut fields: Vec<Field> = Vec::with_capacity(schema.fields().len() + 1);
        let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len() + 1);
        for (field, column) in schema.fields().iter().zip(self.batch.columns()) {
            if field.name() != name {
                fields.push(field.as_ref().clone());
                columns.push(column.clone());
            }
        }
        fields.push(Field::new(name, DataType::Float64, false));
        columns.push(Arc::new(Float64Array::from(values)));

        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?;
        Ok(Self { batch })
    }

    pub fn to_csv_string(&self) -> Result<String> {
        write::encode_csv(&self.batch)
    }

    /// Numeric features from every column for which `exclude` is false.
    pub fn feature_matrix<F>(&self, exclude: F) -> Result<FeatureMatrix>
    where
        F: Fn(&str) -> bool,
    {
        let schema = self.batch.schema();
        let mut names = Vec::new();
        let mut columns = Vec::new();
        for (field, array) in schema.fields().iter().zip(self.batch.columns()) {
            if exclude(field.name()) {
                continue;
            }
            columns.push(features::numeric_column(field.name(), array)?);
            names.push(field.name().clone());
        }
        if names.is_empty() {
            return Err(AuditError::parse("table has no feature columns"));
        }
        Ok(FeatureMatrix::from_columns(names, columns, self.num_rows()))
    }
}

/// Whether a label and a prediction name the same outcome.
///
/// Numeric cells compare by value, so `1` matches `1.0` even when the two
/// columns were typed differently. A missing cell never matches, not even
/// another missing cell.
pub fn outcome_eq(a: &str, b: &str) -> bool {
    if a == MISSING_KEY || b == MISSING_KEY {
        return false;
    }
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x == y,
        _ => a == b,
    }
}

/// True for `sensitive` and every `sensitive_*` column.
pub fn is_sensitive(name: &str) -> bool {
    name == SENSITIVE || name.starts_with(SENSITIVE_PREFIX)
}

fn cell_key(array: &ArrayRef, row: usize) -> Result<String> {
    if array.is_null(row) {
        return Ok(MISSING_KEY.to_string());
    }
    array_value_to_string(array.as_ref(), row).map_err(AuditError::from)
}
