use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::app::ports::RecordSetSinkPort;
use crate::pipeline::RunOutput;

pub const SUB_PROJECTS_FILE: &str = "sub_projects.ndjson";
pub const RAW_RECORDS_FILE: &str = "raw_records.ndjson";
pub const SCHEDULES_FILE: &str = "normalized_schedules.ndjson";
pub const PERFORMANCES_FILE: &str = "normalized_performances.ndjson";
pub const BUDGETS_FILE: &str = "normalized_budgets.ndjson";
pub const OVERVIEWS_FILE: &str = "normalized_overviews.ndjson";
pub const INTEGRITY_REPORT_FILE: &str = "integrity_report.json";
pub const PARSE_REPORT_FILE: &str = "parse_report.json";

/// File-based implementation of RecordSetSinkPort.
/// Writes each record set to its own NDJSON file plus the two run reports.
pub struct NdjsonRecordSetSink {
    output_dir: PathBuf,
}

impl NdjsonRecordSetSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn create(&self, name: &str) -> Result<BufWriter<File>> {
        let path = self.output_dir.join(name);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        Ok(BufWriter::new(file))
    }

    fn write_set<T: Serialize>(&self, name: &str, rows: &[T]) -> Result<()> {
        let mut writer = self.create(name)?;
        for row in rows {
            serde_json::to_writer(&mut writer, row)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        info!("  {}: {} row(s)", name, rows.len());
        Ok(())
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let mut writer = self.create(name)?;
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

#[async_trait]
impl RecordSetSinkPort for NdjsonRecordSetSink {
    async fn write_run(&self, output: &RunOutput) -> Result<()> {
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("Failed to create output directory {}", self.output_dir.display()))?;

        info!("Writing run {} to {}:", output.run_id, self.output_dir.display());
        let sets = &output.record_sets;
        self.write_set(SUB_PROJECTS_FILE, &sets.sub_projects)?;
        self.write_set(RAW_RECORDS_FILE, &sets.raw_records)?;
        self.write_set(SCHEDULES_FILE, &sets.schedules)?;
        self.write_set(PERFORMANCES_FILE, &sets.performances)?;
        self.write_set(BUDGETS_FILE, &sets.budgets)?;
        self.write_set(OVERVIEWS_FILE, &sets.overviews)?;
        self.write_json(INTEGRITY_REPORT_FILE, &output.integrity_report)?;
        self.write_json(PARSE_REPORT_FILE, &output.parse_report)?;
        Ok(())
    }
}

/// Keeps every run in memory; clones share the same store
#[derive(Clone, Default)]
pub struct InMemoryRecordSetSink {
    runs: Arc<Mutex<Vec<RunOutput>>>,
}

impl InMemoryRecordSetSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn runs(&self) -> Vec<RunOutput> {
        self.runs.lock().await.clone()
    }
}

#[async_trait]
impl RecordSetSinkPort for InMemoryRecordSetSink {
    async fn write_run(&self, output: &RunOutput) -> Result<()> {
        self.runs.lock().await.push(output.clone());
        Ok(())
    }
}
