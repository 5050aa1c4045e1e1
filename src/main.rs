use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ethics_auditor::{
    audit,
    config::AuditConfig,
    model::{load_model, Classifier},
    privacy::DpParams,
    report::{MemoryReportStore, ParquetReportStore, Report, ReportKind, ReportStore},
};
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Audit datasets and classifiers for bias, privacy leakage and feature reliance"
)]
struct Args {
    /// YAML file with probe, explainer and store settings.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Persist every report as Parquet under this directory.
    #[arg(long, global = true)]
    store: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Class balance of the `label` column.
    Dataset { data: PathBuf },
    /// Accuracy per `sensitive` group, or per `sensitive_*` intersection.
    Fairness {
        data: PathBuf,
        #[arg(long)]
        intersectional: bool,
    },
    /// Append inverse-frequency weights to the table.
    Mitigate {
        data: PathBuf,
        /// Write the weighted CSV here as well.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Membership-inference probe against a probabilistic model.
    Privacy {
        #[arg(long)]
        model: PathBuf,
        #[arg(long)]
        train: PathBuf,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Accuracy, confusion matrix and group gap of a model on labelled data.
    Model {
        #[arg(long)]
        model: PathBuf,
        #[arg(long)]
        test: PathBuf,
    },
    /// Permutation feature importance.
    Explain {
        #[arg(long)]
        model: PathBuf,
        #[arg(long)]
        test: PathBuf,
        #[arg(long)]
        repeats: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// (ε, δ) for a DP-SGD training run.
    Epsilon {
        #[arg(long, default_value_t = 1.1)]
        noise_multiplier: f64,
        #[arg(long, default_value_t = 64)]
        batch_size: u64,
        #[arg(long)]
        dataset_size: u64,
        #[arg(long, default_value_t = 10)]
        epochs: u64,
    },
}

fn main() -> Result<ExitCode> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    // ─── 2) config & store ───────────────────────────────────────────
    let args = Args::parse();
    let mut config = AuditConfig::load_or_default(args.config.as_deref())?;
    let store: Box<dyn ReportStore> = match args.store.clone().or(config.report_dir.clone()) {
        Some(dir) => Box::new(ParquetReportStore::new(dir)?),
        None => Box::new(MemoryReportStore::new()),
    };

    // ─── 3) run one analyzer ─────────────────────────────────────────
    let failed = match args.command {
        Command::Dataset { data } => {
            let report = audit::analyze_dataset_bias(&read(&data)?);
            emit(store.as_ref(), ReportKind::Dataset, &report)?
        }
        Command::Fairness {
            data,
            intersectional,
        } => {
            let bytes = read(&data)?;
            if intersectional {
                let report = audit::compute_intersectional_fairness(&bytes);
                emit(store.as_ref(), ReportKind::Intersectional, &report)?
            } else {
                let report = audit::compute_fairness_metrics(&bytes);
                emit(store.as_ref(), ReportKind::Fairness, &report)?
            }
        }
        Command::Mitigate { data, output } => {
            let report = audit::mitigate_bias(&read(&data)?);
            if let (Some(path), Some(payload)) = (output, report.payload()) {
                fs::write(&path, &payload.mitigated_dataset)
                    .with_context(|| format!("writing `{}`", path.display()))?;
                info!(path = %path.display(), "wrote mitigated dataset");
            }
            emit(store.as_ref(), ReportKind::Mitigation, &report)?
        }
        Command::Privacy { model, train, seed } => {
            if seed.is_some() {
                config.probe.seed = seed;
            }
            let classifier = open_model(&model)?;
            let report = audit::perform_privacy_tests(classifier.as_ref(), &read(&train)?, &config.probe);
            emit(store.as_ref(), ReportKind::Privacy, &report)?
        }
        Command::Model { model, test } => {
            let classifier = open_model(&model)?;
            let report = audit::analyze_model_bias(classifier.as_ref(), &read(&test)?);
            emit(store.as_ref(), ReportKind::Model, &report)?
        }
        Command::Explain {
            model,
            test,
            repeats,
            seed,
        } => {
            if let Some(r) = repeats {
                config.explain.repeats = r;
            }
            if seed.is_some() {
                config.explain.seed = seed;
            }
            let classifier = open_model(&model)?;
            let report = audit::explain_model(classifier.as_ref(), &read(&test)?, &config.explain);
            emit(store.as_ref(), ReportKind::Explanation, &report)?
        }
        Command::Epsilon {
            noise_multiplier,
            batch_size,
            dataset_size,
            epochs,
        } => {
            let report = audit::estimate_privacy_budget(&DpParams {
                noise_multiplier,
                batch_size,
                dataset_size,
                epochs,
            });
            emit(store.as_ref(), ReportKind::Budget, &report)?
        }
    };

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("reading `{}`", path.display()))
}

fn open_model(path: &Path) -> Result<Box<dyn Classifier>> {
    load_model(&read(path)?).with_context(|| format!("loading model `{}`", path.display()))
}

/// Record the report, print it, and say whether it was an error.
fn emit<T: Serialize>(store: &dyn ReportStore, kind: ReportKind, report: &Report<T>) -> Result<bool> {
    let value = report.to_json();
    let id = store.insert(kind, &value)?;
    info!(report_id = id, kind = kind.as_str(), failed = report.is_error(), "report ready");
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(report.is_error())
}
