use crate::error::{AuditError, Result};
use crate::table::utils::{infer_arrow_dtype, parse_bool};
use crate::table::RawTable;
use arrow::{
    array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray},
    datatypes::{DataType, Field, Schema},
    record_batch::{RecordBatch, RecordBatchOptions},
};
use std::sync::Arc;

/// Convert the string cells of a `RawTable` into typed Arrow columns.
pub fn raw_to_record_batch(raw: &RawTable) -> Result<RecordBatch> {
    let mut fields = Vec::with_capacity(raw.headers.len());
    let mut columns = Vec::with_capacity(raw.headers.len());

    for (i, name) in raw.headers.iter().enumerate() {
        let cells = || raw.rows.iter().map(move |row| row[i].as_str());
        let dtype = infer_arrow_dtype(cells());
        columns.push(build_column(&dtype, cells()));
        fields.push(Field::new(name, dtype, true));
    }

    let options = RecordBatchOptions::new().with_row_count(Some(raw.rows.len()));
    RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), columns, &options)
        .map_err(AuditError::from)
}

fn build_column<'a, I>(dtype: &DataType, cells: I) -> ArrayRef
where
    I: Iterator<Item = &'a str>,
{
    let present = |s: &'a str| (!s.is_empty()).then_some(s);
    match dtype {
        DataType::Int64 => Arc::new(
            cells
                .map(|s| present(s).and_then(|v| v.parse::<i64>().ok()))
                .collect::<Int64Array>(),
        ),
        DataType::Float64 => Arc::new(
            cells
                .map(|s| present(s).and_then(|v| v.parse::<f64>().ok()))
                .collect::<Float64Array>(),
        ),
        DataType::Boolean => Arc::new(
            cells
                .map(|s| present(s).and_then(parse_bool))
                .collect::<BooleanArray>(),
        ),
        // Everything else
        _ => Arc::new(cells.map(present).collect::<StringArray>()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;

    #[test]
    fn empty_cells_become_nulls() {
        let raw = RawTable {
            headers: vec!["a".into(), "b".into()],
            rows: vec![
                vec!["1".into(), "x".into()],
                vec!["".into(), "".into()],
            ],
        };
        let batch = raw_to_record_batch(&raw).unwrap();
        assert_eq!(batch.schema().field(0).data_type(), &DataType::Int64);
        assert_eq!(batch.schema().field(1).data_type(), &DataType::Utf8);
        assert!(batch.column(0).is_null(1));
        assert!(batch.column(1).is_null(1));
    }

    #[test]
    fn header_only_table_has_zero_rows() {
        let raw = RawTable {
            headers: vec!["label".into()],
            rows: vec![],
        };
        let batch = raw_to_record_batch(&raw).unwrap();
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.num_columns(), 1);
    }
}
