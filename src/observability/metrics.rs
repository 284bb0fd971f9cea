//! Metrics for the normalization pipeline
//!
//! Recording goes through the `metrics` facade; without an installed recorder
//! every call is a no-op, so the library can record unconditionally. The CLI
//! installs a Prometheus recorder with [`init`] and renders it at exit.

use std::fmt;
use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Enum representing all metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Ingestion metrics
    IngestDocumentsLoaded,
    IngestDocumentsRejected,
    IngestTablesProcessed,

    // Registry metrics
    RegistrySubProjectsCreated,
    RegistrySubProjectsReused,

    // Normalize metrics
    NormalizeRecordsEmitted,
    NormalizeWarnings,
    NormalizeDocumentDuration,

    // Integrity metrics
    IntegrityIssuesDetected,
    IntegrityRunsRejected,

    // Sink metrics
    SinkRowsWritten,
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::IngestDocumentsLoaded => "ledger_ingest_documents_loaded_total",
            MetricName::IngestDocumentsRejected => "ledger_ingest_documents_rejected_total",
            MetricName::IngestTablesProcessed => "ledger_ingest_tables_processed_total",

            MetricName::RegistrySubProjectsCreated => "ledger_registry_sub_projects_created_total",
            MetricName::RegistrySubProjectsReused => "ledger_registry_sub_projects_reused_total",

            MetricName::NormalizeRecordsEmitted => "ledger_normalize_records_emitted_total",
            MetricName::NormalizeWarnings => "ledger_normalize_warnings_total",
            MetricName::NormalizeDocumentDuration => "ledger_normalize_document_duration_seconds",

            MetricName::IntegrityIssuesDetected => "ledger_integrity_issues_detected_total",
            MetricName::IntegrityRunsRejected => "ledger_integrity_runs_rejected_total",

            MetricName::SinkRowsWritten => "ledger_sink_rows_written_total",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        use MetricName::*;
        [
            IngestDocumentsLoaded,
            IngestDocumentsRejected,
            IngestTablesProcessed,
            RegistrySubProjectsCreated,
            RegistrySubProjectsReused,
            NormalizeRecordsEmitted,
            NormalizeWarnings,
            NormalizeDocumentDuration,
            IntegrityIssuesDetected,
            IntegrityRunsRejected,
            SinkRowsWritten,
        ]
        .into_iter()
    }
}

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Safe to call more than once.
pub fn init() -> anyhow::Result<()> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;
    METRICS_HANDLE.set(handle).ok();
    info!("Metrics system initialized");
    Ok(())
}

/// Current metrics in Prometheus text format, if a recorder is installed
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(|handle| handle.render())
}

// ============================================================================
// Ingestion Metrics
// ============================================================================

pub mod ingest {
    use super::MetricName;

    pub fn document_loaded(format: &str) {
        ::metrics::counter!(MetricName::IngestDocumentsLoaded.as_str(), "format" => format.to_string())
            .increment(1);
    }

    pub fn document_rejected(reason: &str) {
        ::metrics::counter!(MetricName::IngestDocumentsRejected.as_str(), "reason" => reason.to_string())
            .increment(1);
    }

    pub fn table_processed(category: &str) {
        ::metrics::counter!(MetricName::IngestTablesProcessed.as_str(), "category" => category.to_string())
            .increment(1);
    }
}

// ============================================================================
// Registry Metrics
// ============================================================================

pub mod registry {
    use super::MetricName;

    /// Record a resolve call; `created` is false when an existing id was reused
    pub fn record_resolved(created: bool) {
        let name = if created {
            MetricName::RegistrySubProjectsCreated
        } else {
            MetricName::RegistrySubProjectsReused
        };
        ::metrics::counter!(name.as_str()).increment(1);
    }
}

// ============================================================================
// Normalize Metrics
// ============================================================================

pub mod normalize {
    use super::MetricName;

    pub fn record_emitted(set: &str) {
        ::metrics::counter!(MetricName::NormalizeRecordsEmitted.as_str(), "set" => set.to_string())
            .increment(1);
    }

    pub fn warning_logged(kind: &str) {
        ::metrics::counter!(MetricName::NormalizeWarnings.as_str(), "warning_type" => kind.to_string())
            .increment(1);
    }

    pub fn document_duration(secs: f64) {
        ::metrics::histogram!(MetricName::NormalizeDocumentDuration.as_str()).record(secs);
    }
}

// ============================================================================
// Integrity Metrics
// ============================================================================

pub mod integrity {
    use super::MetricName;

    pub fn issue_detected(kind: &str, severity: &str) {
        ::metrics::counter!(MetricName::IntegrityIssuesDetected.as_str(),
            "issue_type" => kind.to_string(),
            "severity" => severity.to_string()
        )
        .increment(1);
    }

    pub fn run_rejected() {
        ::metrics::counter!(MetricName::IntegrityRunsRejected.as_str()).increment(1);
    }
}

// ============================================================================
// Sink Metrics
// ============================================================================

pub mod sink {
    use super::MetricName;

    pub fn rows_written(set: &str, rows: usize) {
        ::metrics::counter!(MetricName::SinkRowsWritten.as_str(), "set" => set.to_string())
            .increment(rows as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn metric_names_are_unique_and_prefixed() {
        let names: Vec<&str> = MetricName::all_metrics().map(|m| m.as_str()).collect();
        let unique: HashSet<&str> = names.iter().copied().collect();
        assert_eq!(names.len(), unique.len());
        assert!(names.iter().all(|n| n.starts_with("ledger_")));
    }

    #[test]
    fn recording_without_recorder_is_harmless() {
        normalize::record_emitted("normalized_schedules");
        registry::record_resolved(true);
        integrity::issue_detected("orphan_sub_project", "violation");
    }
}
