use anyhow::{bail, Context, Result};
use clap::Parser;
use ethics_auditor::{
    audit,
    config::AuditConfig,
    model::{load_model, Classifier},
    report::{ParquetReportStore, Report, ReportKind, ReportStore},
};
use glob::glob;
use rayon::prelude::*;
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{error, info, instrument, warn};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Run every dataset analyzer over each CSV matching a glob and store the reports"
)]
struct Args {
    /// e.g. "./uploads/**/*.csv"
    pattern: String,
    #[arg(long, default_value = "./reports")]
    store: PathBuf,
    #[arg(long)]
    config: Option<PathBuf>,
    /// Also run the model auditor, explainer and privacy probe with this model.
    #[arg(long)]
    model: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let args = Args::parse();
    let config = AuditConfig::load_or_default(args.config.as_deref())?;
    let store = ParquetReportStore::new(&args.store)?;
    let model: Option<Box<dyn Classifier>> = match &args.model {
        Some(path) => {
            let bytes = fs::read(path).with_context(|| format!("reading `{}`", path.display()))?;
            Some(load_model(&bytes).with_context(|| format!("loading model `{}`", path.display()))?)
        }
        None => None,
    };

    let paths: Vec<PathBuf> = glob(&args.pattern)
        .with_context(|| format!("Failed to parse glob pattern: {}", args.pattern))?
        .filter_map(|p| p.ok())
        .collect();
    if paths.is_empty() {
        bail!("No CSV files found matching pattern: {}", args.pattern);
    }
    info!("Found {} files matching pattern: {}", paths.len(), args.pattern);

    let failures: usize = paths
        .par_iter()
        .map(|path| match audit_file(path, &store, model.as_deref(), &config) {
            Ok(failed) => failed,
            Err(e) => {
                error!(path = %path.display(), error = %e, "could not audit file");
                1
            }
        })
        .sum();

    info!(
        files = paths.len(),
        failed_reports = failures,
        dir = %store.report_dir().display(),
        "done"
    );
    Ok(())
}

/// Returns how many of this file's reports were errors.
#[instrument(level = "info", skip(store, model, config), fields(path = %path.display()))]
fn audit_file(
    path: &Path,
    store: &ParquetReportStore,
    model: Option<&dyn Classifier>,
    config: &AuditConfig,
) -> Result<usize> {
    let bytes = fs::read(path).with_context(|| format!("reading `{}`", path.display()))?;

    let mut failed = 0;
    failed += record(store, ReportKind::Dataset, &audit::analyze_dataset_bias(&bytes))?;
    failed += record(store, ReportKind::Fairness, &audit::compute_fairness_metrics(&bytes))?;
    failed += record(
        store,
        ReportKind::Intersectional,
        &audit::compute_intersectional_fairness(&bytes),
    )?;
    failed += record(store, ReportKind::Mitigation, &audit::mitigate_bias(&bytes))?;

    if let Some(model) = model {
        failed += record(store, ReportKind::Model, &audit::analyze_model_bias(model, &bytes))?;
        failed += record(
            store,
            ReportKind::Explanation,
            &audit::explain_model(model, &bytes, &config.explain),
        )?;
        failed += record(
            store,
            ReportKind::Privacy,
            &audit::perform_privacy_tests(model, &bytes, &config.probe),
        )?;
    }
    Ok(failed)
}

fn record<T: Serialize>(store: &ParquetReportStore, kind: ReportKind, report: &Report<T>) -> Result<usize> {
    let id = store.insert(kind, &report.to_json())?;
    if let Some(e) = report.error() {
        warn!(report_id = id, kind = kind.as_str(), error = e, "stored error report");
        Ok(1)
    } else {
        Ok(0)
    }
}
