use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use program_ledger::app::normalize_use_case::NormalizeDocumentsUseCase;
use program_ledger::config::{EngineConfig, IntegrityMode, YearRoundPolicy};
use program_ledger::error::NormalizeError;
use program_ledger::infra::NdjsonRecordSetSink;
use program_ledger::logging;
use program_ledger::observability;
use program_ledger::pipeline::ingestion::{load_documents, validate_source_document};
use program_ledger::pipeline::NormalizationEngine;

#[derive(Parser)]
#[command(name = "program_ledger")]
#[command(about = "Normalize program document tables into relational record sets")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum YearRoundArg {
    Sentinel,
    Expand,
    ExpandWithSentinel,
}

impl From<YearRoundArg> for YearRoundPolicy {
    fn from(arg: YearRoundArg) -> Self {
        match arg {
            YearRoundArg::Sentinel => YearRoundPolicy::Sentinel,
            YearRoundArg::Expand => YearRoundPolicy::ExpandQuarters,
            YearRoundArg::ExpandWithSentinel => YearRoundPolicy::ExpandQuartersWithSentinel,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize a document, or every *.json document in a directory, in one run
    Normalize {
        /// Input file or directory
        #[arg(long)]
        input: PathBuf,
        /// Directory receiving the record-set files and reports
        #[arg(long)]
        output_dir: PathBuf,
        /// Engine configuration (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Fail the run on any integrity violation
        #[arg(long, conflicts_with = "lenient")]
        strict: bool,
        /// Log integrity violations and write the output anyway
        #[arg(long)]
        lenient: bool,
        /// How year-round schedule markers expand
        #[arg(long, value_enum)]
        year_round: Option<YearRoundArg>,
        /// Keep only the first N sub-projects of each document
        #[arg(long)]
        sample: Option<usize>,
        /// Verbose logging
        #[arg(long)]
        debug: bool,
        /// Write Prometheus metrics to this file when the run ends
        #[arg(long)]
        metrics_out: Option<PathBuf>,
    },
    /// Check a structured document against the input schema
    ValidateInput {
        #[arg(long)]
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Normalize {
            input,
            output_dir,
            config,
            strict,
            lenient,
            year_round,
            sample,
            debug,
            metrics_out,
        } => {
            let _guard = logging::init_logging("logs", debug);
            if metrics_out.is_some() {
                observability::init().context("Failed to install metrics recorder")?;
            }

            let mut engine_config = match &config {
                Some(path) => EngineConfig::load(path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => EngineConfig::default(),
            };
            if strict {
                engine_config = engine_config.with_integrity_mode(IntegrityMode::Strict);
            }
            if lenient {
                engine_config = engine_config.with_integrity_mode(IntegrityMode::Lenient);
            }
            if let Some(policy) = year_round {
                engine_config = engine_config.with_year_round_policy(policy.into());
            }
            engine_config.validate()?;
            info!("Engine configuration: {:?}", engine_config);

            let mut documents = load_documents(&input, &engine_config)
                .with_context(|| format!("Failed to load input {}", input.display()))?;
            if let Some(n) = sample {
                info!("Sampling the first {} sub-project(s) of each document", n);
                documents = documents.into_iter().map(|d| d.sample(n)).collect();
            }

            println!("🔄 Normalizing {} document(s)...", documents.len());
            let use_case = NormalizeDocumentsUseCase::new(
                NormalizationEngine::new(engine_config),
                Box::new(NdjsonRecordSetSink::new(&output_dir)),
            );

            let result = use_case.execute(&documents).await;
            if let Some(path) = &metrics_out {
                write_metrics(path)?;
            }

            match result {
                Ok(output) => {
                    let stats = &output.integrity_report.statistics;
                    println!("\n📊 Run {}:", output.run_id);
                    println!("   Sub-projects: {}", stats.sub_projects);
                    println!("   Raw records: {}", stats.raw_records);
                    println!("   Schedules: {}", stats.schedules);
                    println!("   Performances: {}", stats.performances);
                    println!("   Budgets: {}", stats.budgets);
                    println!("   Overviews: {}", stats.overviews);
                    println!("   Parse warnings: {}", output.parse_report.len());
                    println!(
                        "   Integrity: {} violation(s), {} warning(s)",
                        output.integrity_report.violation_count(),
                        output.integrity_report.warning_count()
                    );
                    println!("   Output: {}", output_dir.display());
                    if output.integrity_report.has_violations() {
                        warn!("Output written despite integrity violations (lenient mode)");
                    }
                }
                Err(e) => {
                    if let Some(NormalizeError::IntegrityViolation { report, .. }) = e.downcast_ref::<NormalizeError>() {
                        println!("❌ Run rejected; nothing was written. Issues:");
                        for issue in report.issues.iter().take(20) {
                            println!("   - [{}] {}", issue.kind.as_str(), issue.description);
                        }
                    }
                    error!("Normalization failed: {:#}", e);
                    return Err(e);
                }
            }
        }
        Commands::ValidateInput { input } => {
            let _guard = logging::init_logging("logs", false);
            let content = fs::read_to_string(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let value: serde_json::Value = serde_json::from_str(&content)
                .with_context(|| format!("{} is not valid JSON", input.display()))?;

            match validate_source_document(&value) {
                Ok(()) => println!("✅ {} matches the input schema", input.display()),
                Err(NormalizeError::Schema { errors }) => {
                    println!("❌ {} does not match the input schema:", input.display());
                    for e in &errors {
                        println!("   - {}", e);
                    }
                    anyhow::bail!("{} schema error(s)", errors.len());
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(())
}

fn write_metrics(path: &Path) -> Result<()> {
    let Some(rendered) = observability::render() else {
        warn!("Metrics recorder not installed; skipping {}", path.display());
        return Ok(());
    };
    fs::write(path, rendered).with_context(|| format!("Failed to write metrics to {}", path.display()))?;
    info!("Metrics written to {}", path.display());
    Ok(())
}
