use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::{EngineConfig, IntegrityMode};
use crate::domain::{NormalizedRecord, RawRecord, RawRecordId, RecordCategory, RecordSets, SubProjectId};
use crate::error::{NormalizeError, Result};
use crate::observability::metrics;
use crate::pipeline::ingestion::{RawTable, SourceDocument};
use crate::pipeline::processing::integrity::{IntegrityReport, IntegrityValidator};
use crate::pipeline::processing::normalize::normalizers::{Admission, NormalizerUtils, PerformanceNormalizer};
use crate::pipeline::processing::normalize::{
    NormalizationContext, NormalizationRegistry, ParseReport, ParseWarningKind,
};
use crate::pipeline::processing::registry::SubProjectRegistry;

/// Everything a run produces, ready for the loader
#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub record_sets: RecordSets,
    pub parse_report: ParseReport,
    pub integrity_report: IntegrityReport,
}

/// Drives documents through the registry, the normalizers and the validator
pub struct NormalizationEngine {
    config: EngineConfig,
    normalizers: NormalizationRegistry,
}

impl NormalizationEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            normalizers: NormalizationRegistry::new(),
        }
    }

    pub fn with_normalizers(config: EngineConfig, normalizers: NormalizationRegistry) -> Self {
        Self { config, normalizers }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Normalize every table of one document into `sets`.
    ///
    /// Each table is stored verbatim as a raw record before its normalized
    /// rows, so every row can point back at its source.
    #[instrument(skip_all, fields(document_id = %document.document_id))]
    pub fn normalize_document(
        &self,
        registry: &mut SubProjectRegistry,
        document: &SourceDocument,
        sets: &mut RecordSets,
        report: &mut ParseReport,
    ) -> Result<()> {
        let started = Instant::now();
        let before = sets.normalized_len();

        for section in &document.sub_projects {
            let year = section.document_year.unwrap_or(document.document_year);
            let sub_project_id = registry.resolve(&section.name, section.parent_name.as_deref(), year);
            debug!("Section '{}' resolved to sub-project {}", section.name, sub_project_id);

            for category in RecordCategory::ALL {
                for table in section.tables(category) {
                    self.normalize_table(sub_project_id, year, category, table, sets, report)?;
                }
            }
        }

        let elapsed = started.elapsed().as_secs_f64();
        metrics::normalize::document_duration(elapsed);
        info!(
            "Normalized '{}': {} sub-project section(s), {} table(s), {} row(s) in {:.3}s",
            document.document_id,
            document.sub_projects.len(),
            document.table_count(),
            sets.normalized_len() - before,
            elapsed
        );
        Ok(())
    }

    fn normalize_table(
        &self,
        sub_project_id: SubProjectId,
        document_year: i32,
        category: RecordCategory,
        table: &RawTable,
        sets: &mut RecordSets,
        report: &mut ParseReport,
    ) -> Result<()> {
        let payload = serde_json::to_value(&table.rows)?;
        let content_sha256 = NormalizerUtils::payload_sha256(&payload);
        let raw_record_id = sets.push_raw(RawRecord {
            id: RawRecordId::default(),
            sub_project_id,
            category,
            data_year: table.data_year,
            payload,
            page_index: table.page_index,
            table_index: table.table_index,
            content_sha256,
        });

        let ctx = NormalizationContext {
            sub_project_id,
            raw_record_id,
            document_year,
            data_year: table.data_year,
            config: &self.config,
        };

        let records = self.normalizers.normalize(category, &ctx, table, report)?;
        metrics::ingest::table_processed(category.as_str());
        debug!(
            "{} table p{} t{} -> {} record(s)",
            category,
            table.page_index,
            table.table_index,
            records.len()
        );

        for record in records {
            Self::accept(record, &ctx, sets, report);
        }
        Ok(())
    }

    /// Store one normalized record, applying the per-sub-project uniqueness
    /// rules for performance indicators and overviews
    fn accept(
        record: NormalizedRecord,
        ctx: &NormalizationContext<'_>,
        sets: &mut RecordSets,
        report: &mut ParseReport,
    ) {
        match record {
            NormalizedRecord::Performance(performance) => {
                match PerformanceNormalizer::admit(sets, &performance) {
                    Admission::New => {
                        sets.push(NormalizedRecord::Performance(performance));
                        metrics::normalize::record_emitted("normalized_performances");
                    }
                    Admission::Duplicate => {
                        report.push(ctx.warning(
                            ParseWarningKind::DuplicateIndicator,
                            format!(
                                "Skipping repeated {} {} = {}",
                                performance.indicator_category.as_str(),
                                performance.indicator_type.as_str(),
                                performance.value
                            ),
                        ));
                    }
                    Admission::Conflict { kept } => {
                        report.push(ctx.warning(
                            ParseWarningKind::ConflictingIndicator,
                            format!(
                                "{} {} for {:?} is both {} and {}; keeping {}",
                                performance.indicator_category.as_str(),
                                performance.indicator_type.as_str(),
                                performance.source_year,
                                kept,
                                performance.value,
                                kept
                            ),
                        ));
                    }
                }
            }
            NormalizedRecord::Overview(overview) => match sets.overview_for_mut(overview.sub_project_id) {
                Some(existing) => {
                    for field in existing.merge_from(&overview) {
                        report.push(ctx.warning(
                            ParseWarningKind::OverviewConflict,
                            format!("Overview field {} differs between tables; keeping the first", field),
                        ));
                    }
                }
                None => {
                    sets.push(NormalizedRecord::Overview(overview));
                    metrics::normalize::record_emitted("normalized_overviews");
                }
            },
            other => {
                let set = other.set_name();
                sets.push(other);
                metrics::normalize::record_emitted(set);
            }
        }
    }

    /// Normalize a batch of documents against one fresh registry, validate
    /// the union and apply the configured integrity mode.
    #[instrument(skip_all, fields(documents = documents.len()))]
    pub fn run(&self, documents: &[SourceDocument]) -> Result<RunOutput> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!("Starting run {} over {} document(s)", run_id, documents.len());

        let mut registry = SubProjectRegistry::with_code_prefix(&self.config.project_code_prefix);
        let mut sets = RecordSets::new();
        let mut parse_report = ParseReport::new();

        for document in documents {
            self.normalize_document(&mut registry, document, &mut sets, &mut parse_report)?;
        }

        registry.verify()?;
        sets.set_sub_projects(registry.snapshot());

        let integrity_report = IntegrityValidator::new(self.config.budget_year_window).validate(&sets);
        if integrity_report.has_violations() {
            match self.config.integrity_mode {
                IntegrityMode::Strict => {
                    metrics::integrity::run_rejected();
                    error!(
                        "Run {} rejected: {} integrity violation(s)",
                        run_id,
                        integrity_report.violation_count()
                    );
                    return Err(NormalizeError::IntegrityViolation {
                        violations: integrity_report.violation_count(),
                        report: Box::new(integrity_report),
                    });
                }
                IntegrityMode::Lenient => {
                    warn!(
                        "Run {} continuing with {} integrity violation(s) (lenient mode)",
                        run_id,
                        integrity_report.violation_count()
                    );
                }
            }
        }

        let finished_at = Utc::now();
        info!(
            "Run {} finished: {} sub-project(s), {} raw record(s), {} normalized row(s), {} parse warning(s)",
            run_id,
            sets.sub_projects.len(),
            sets.raw_records.len(),
            sets.normalized_len(),
            parse_report.len()
        );

        Ok(RunOutput {
            run_id,
            started_at,
            finished_at,
            record_sets: sets,
            parse_report,
            integrity_report,
        })
    }
}

impl Default for NormalizationEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
