use crate::error::{AuditError, Result};
use arrow::{csv::WriterBuilder, record_batch::RecordBatch};

/// Encode a batch as comma-delimited text with a header row.
pub fn encode_csv(batch: &RecordBatch) -> Result<String> {
    let mut writer = WriterBuilder::new().with_header(true).build(Vec::new());
    writer.write(batch)?;
    let buf = writer.into_inner();
    String::from_utf8(buf).map_err(|e| AuditError::parse(format!("encoded CSV is not UTF-8: {}", e)))
}
