use super::kind::ReportKind;
use anyhow::{bail, Context, Result};
use arrow::{
    array::{Array, StringArray, TimestampMicrosecondArray, UInt64Array},
    datatypes::{DataType as ArrowDataType, Field, Schema as ArrowSchema, TimeUnit},
    record_batch::RecordBatch,
};
use chrono::{DateTime, Utc};
use glob::glob;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde_json::Value;
use std::{
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tracing::{info, instrument, warn};

/// A report as persisted by a `ReportStore`.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredReport {
    pub id: u64,
    pub kind: ReportKind,
    pub created_at: DateTime<Utc>,
    pub report: Value,
}

/// Append-only sink. Ids start at 1 and increase by one per insert.
pub trait ReportStore: Send + Sync {
    fn insert(&self, kind: ReportKind, report: &Value) -> Result<u64>;
}

/// Process-local store, mostly for tests and one-shot CLI runs.
#[derive(Debug, Default)]
pub struct MemoryReportStore {
    entries: Mutex<Vec<StoredReport>>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<StoredReport> {
        self.entries
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl ReportStore for MemoryReportStore {
    fn insert(&self, kind: ReportKind, report: &Value) -> Result<u64> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("report store mutex poisoned"))?;
        let id = guard.len() as u64 + 1;
        guard.push(StoredReport {
            id,
            kind,
            created_at: Utc::now(),
            report: report.clone(),
        });
        Ok(id)
    }
}

/// One single-row Parquet file per report:
/// `report---<id>---<kind>.parquet` with columns
/// `id:UInt64, kind:Utf8, created_at:Timestamp(µs), report:Utf8(JSON)`.
///
/// Files are written to `<name>.tmp` and renamed into place, so a crash never
/// leaves a half-written report under a final name. `next_id` is held under a
/// mutex for the whole write, which serializes concurrent inserts.
pub struct ParquetReportStore {
    report_dir: PathBuf,
    next_id: Mutex<u64>,
}

impl ParquetReportStore {
    /// Open (or create) `report_dir` and resume numbering after the highest id on disk.
    pub fn new(report_dir: impl Into<PathBuf>) -> Result<Self> {
        let report_dir: PathBuf = report_dir.into();
        fs::create_dir_all(&report_dir)
            .with_context(|| format!("creating report directory {:?}", &report_dir))?;

        let mut max_id = 0u64;
        let pattern = format!("{}/report---*---*.parquet", report_dir.display());
        for entry in glob(&pattern).context("invalid glob pattern for ParquetReportStore::new")? {
            let path = match entry {
                Ok(p) => p,
                Err(e) => {
                    warn!(error = %e, "cannot read glob entry");
                    continue;
                }
            };
            if let Some((id, _)) = parse_file_name(&path) {
                max_id = max_id.max(id);
            }
        }

        info!(dir = %report_dir.display(), next_id = max_id + 1, "opened report store");
        Ok(Self {
            report_dir,
            next_id: Mutex::new(max_id + 1),
        })
    }

    pub fn report_dir(&self) -> &Path {
        &self.report_dir
    }

    fn schema() -> Arc<ArrowSchema> {
        Arc::new(ArrowSchema::new(vec![
            Field::new("id", ArrowDataType::UInt64, false),
            Field::new("kind", ArrowDataType::Utf8, false),
            Field::new(
                "created_at",
                ArrowDataType::Timestamp(TimeUnit::Microsecond, None),
                false,
            ),
            Field::new("report", ArrowDataType::Utf8, false),
        ]))
    }

    fn file_name(id: u64, kind: ReportKind) -> String {
        format!("report---{:020}---{}.parquet", id, kind.as_str())
    }

    /// Read a stored report back; `None` when no file carries `id`.
    pub fn load(&self, id: u64) -> Result<Option<StoredReport>> {
        let pattern = format!("{}/report---{:020}---*.parquet", self.report_dir.display(), id);
        let path = match glob(&pattern)
            .context("invalid glob pattern for ParquetReportStore::load")?
            .filter_map(|e| e.ok())
            .next()
        {
            Some(p) => p,
            None => return Ok(None),
        };

        let file = File::open(&path).with_context(|| format!("failed to open `{}`", path.display()))?;
        let mut reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .with_context(|| format!("failed to create reader for `{}`", path.display()))?
            .build()
            .with_context(|| format!("failed to build reader for `{}`", path.display()))?;
        let batch = match reader
            .next()
            .transpose()
            .with_context(|| format!("error reading RecordBatch from `{}`", path.display()))?
        {
            Some(b) if b.num_rows() > 0 => b,
            _ => bail!("report file `{}` is empty", path.display()),
        };

        let ids = column::<UInt64Array>(&batch, 0)?;
        let kinds = column::<StringArray>(&batch, 1)?;
        let times = column::<TimestampMicrosecondArray>(&batch, 2)?;
        let bodies = column::<StringArray>(&batch, 3)?;

        let kind = ReportKind::from_str(kinds.value(0))
            .with_context(|| format!("unknown report kind `{}`", kinds.value(0)))?;
        let created_at = DateTime::from_timestamp_micros(times.value(0))
            .context("stored timestamp out of range")?;
        let report: Value =
            serde_json::from_str(bodies.value(0)).context("stored report is not valid JSON")?;

        Ok(Some(StoredReport {
            id: ids.value(0),
            kind,
            created_at,
            report,
        }))
    }
}

impl ReportStore for ParquetReportStore {
    #[instrument(level = "debug", skip(self, report), fields(kind = kind.as_str()))]
    fn insert(&self, kind: ReportKind, report: &Value) -> Result<u64> {
        let mut next_id = self
            .next_id
            .lock()
            .map_err(|_| anyhow::anyhow!("report store mutex poisoned"))?;
        let id = *next_id;
        let ts_micros = Utc::now().timestamp_micros();

        // 1) build the single-row batch
        let schema = Self::schema();
        let body = serde_json::to_string(report).context("serializing report")?;
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(UInt64Array::from(vec![id])),
                Arc::new(StringArray::from(vec![kind.as_str()])),
                Arc::new(TimestampMicrosecondArray::from(vec![ts_micros])),
                Arc::new(StringArray::from(vec![body])),
            ],
        )
        .context("building report record batch")?;

        // 2) write to <name>.tmp
        let final_path = self.report_dir.join(Self::file_name(id, kind));
        let tmp_path = self
            .report_dir
            .join(format!("{}.tmp", Self::file_name(id, kind)));
        let tmp_file = File::create(&tmp_path)
            .with_context(|| format!("could not create `{}`", tmp_path.display()))?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let mut writer = ArrowWriter::try_new(BufWriter::new(tmp_file), schema, Some(props))
            .context("creating ArrowWriter for report")?;
        writer.write(&batch).context("writing report batch")?;
        writer.close().context("closing report writer")?;

        // 3) rename into place
        fs::rename(&tmp_path, &final_path).with_context(|| {
            format!(
                "renaming `{}` → `{}`",
                tmp_path.display(),
                final_path.display()
            )
        })?;

        *next_id += 1;
        info!(report_id = id, kind = kind.as_str(), "stored report");
        Ok(id)
    }
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, idx: usize) -> Result<&'a T> {
    batch
        .column(idx)
        .as_any()
        .downcast_ref::<T>()
        .with_context(|| format!("unexpected type for column #{}", idx))
}

/// `report---<id>---<kind>.parquet` → `(id, kind)`
fn parse_file_name(path: &Path) -> Option<(u64, ReportKind)> {
    let file_name = path.file_name()?.to_str()?;
    let stem = file_name.strip_suffix(".parquet")?;
    let parts: Vec<&str> = stem.split("---").collect();
    if parts.len() != 3 || parts[0] != "report" {
        return None;
    }
    let id = parts[1].parse().ok()?;
    let kind = ReportKind::from_str(parts[2])?;
    Some((id, kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn memory_store_assigns_increasing_ids() -> Result<()> {
        let store = MemoryReportStore::new();
        assert_eq!(store.insert(ReportKind::Dataset, &json!({"a": 1}))?, 1);
        assert_eq!(store.insert(ReportKind::Privacy, &json!({"b": 2}))?, 2);
        let reports = store.reports();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[1].kind, ReportKind::Privacy);
        Ok(())
    }

    #[test]
    fn parquet_store_round_trips_and_resumes_numbering() -> Result<()> {
        let dir = tempdir()?;
        let report = json!({"class_counts": {"0": 2, "1": 3}, "fairness_score": 0.9});

        let store = ParquetReportStore::new(dir.path())?;
        assert_eq!(store.insert(ReportKind::Dataset, &report)?, 1);
        assert_eq!(store.insert(ReportKind::Mitigation, &json!({"error": "x"}))?, 2);

        let loaded = store.load(1)?.expect("report 1 exists");
        assert_eq!(loaded.id, 1);
        assert_eq!(loaded.kind, ReportKind::Dataset);
        assert_eq!(loaded.report, report);
        assert!(store.load(99)?.is_none());

        let reopened = ParquetReportStore::new(dir.path())?;
        assert_eq!(reopened.insert(ReportKind::Privacy, &json!({}))?, 3);
        assert_eq!(reopened.load(3)?.map(|r| r.kind), Some(ReportKind::Privacy));
        Ok(())
    }

    #[test]
    fn concurrent_inserts_get_distinct_ids() -> Result<()> {
        let dir = tempdir()?;
        let store = Arc::new(ParquetReportStore::new(dir.path())?);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.insert(ReportKind::Dataset, &json!({ "n": i })))
            })
            .collect();
        let mut ids: Vec<u64> = handles
            .into_iter()
            .map(|h| h.join().expect("insert thread panicked"))
            .collect::<Result<_>>()?;
        ids.sort_unstable();
        assert_eq!(ids, (1..=8).collect::<Vec<u64>>());
        Ok(())
    }

    #[test]
    fn ignores_foreign_file_names() {
        assert_eq!(
            parse_file_name(Path::new("report---00000000000000000007---model.parquet")),
            Some((7, ReportKind::Model))
        );
        assert_eq!(parse_file_name(Path::new("report---7---model.parquet.tmp")), None);
        assert_eq!(parse_file_name(Path::new("notes.parquet")), None);
    }
}
