use anyhow::{Context, Result};
use tracing::info;

use crate::app::ports::RecordSetSinkPort;
use crate::observability::metrics;
use crate::pipeline::ingestion::SourceDocument;
use crate::pipeline::{NormalizationEngine, RunOutput};

/// Use case for turning a batch of documents into loaded record sets
pub struct NormalizeDocumentsUseCase {
    engine: NormalizationEngine,
    sink: Box<dyn RecordSetSinkPort>,
}

impl NormalizeDocumentsUseCase {
    pub fn new(engine: NormalizationEngine, sink: Box<dyn RecordSetSinkPort>) -> Self {
        Self { engine, sink }
    }

    /// Run the engine and hand the output to the sink.
    ///
    /// A run rejected by the integrity check returns its error before the
    /// sink sees anything.
    pub async fn execute(&self, documents: &[SourceDocument]) -> Result<RunOutput> {
        let output = self
            .engine
            .run(documents)
            .context("Normalization run failed")?;

        self.sink
            .write_run(&output)
            .await
            .with_context(|| format!("Failed to write record sets for run {}", output.run_id))?;

        let sets = &output.record_sets;
        for (set, rows) in [
            ("sub_projects", sets.sub_projects.len()),
            ("raw_records", sets.raw_records.len()),
            ("normalized_schedules", sets.schedules.len()),
            ("normalized_performances", sets.performances.len()),
            ("normalized_budgets", sets.budgets.len()),
            ("normalized_overviews", sets.overviews.len()),
        ] {
            metrics::sink::rows_written(set, rows);
        }

        info!(
            "Run {} handed off: {} normalized row(s), {} integrity warning(s)",
            output.run_id,
            sets.normalized_len(),
            output.integrity_report.warning_count()
        );
        Ok(output)
    }
}
