use tracing::debug;

use super::base::NormalizerUtils;
use crate::domain::{NormalizedRecord, NormalizedSchedule};
use crate::pipeline::ingestion::RawTable;
use crate::pipeline::processing::normalize::{NormalizationContext, ParseReport, ParseWarningKind};
use crate::pipeline::processing::parser::PeriodSplitter;

/// Normalizer for plan schedule tables.
/// Rows are `[period, task, detail...]`; one output row per atomic period.
pub struct ScheduleNormalizer;

impl ScheduleNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize_table(
        &self,
        ctx: &NormalizationContext<'_>,
        table: &RawTable,
        report: &mut ParseReport,
    ) -> Vec<NormalizedRecord> {
        let rows = NormalizerUtils::text_rows(table);
        let year = ctx.plan_year();

        // The first row is a header unless it already carries a period
        let header = rows
            .first()
            .filter(|row| !row.first().is_some_and(|c| PeriodSplitter::has_period_marker(c)))
            .and_then(|row| row.first().cloned());
        let skip = usize::from(header.is_some());

        let mut records = Vec::new();
        for row in rows.iter().skip(skip) {
            let period = row.first().map(String::as_str).unwrap_or("");
            if period.is_empty() || NormalizerUtils::is_header_marker_row(row) {
                continue;
            }
            // Header repeated after a page break
            if header.as_deref() == Some(period) {
                continue;
            }

            let task = row.get(1).cloned().unwrap_or_default();
            let detail = row
                .get(2..)
                .map(NormalizerUtils::row_line)
                .filter(|d| !d.is_empty());

            let split = PeriodSplitter::split(period, year, ctx.config.year_round_policy);
            if !split.is_parsed() {
                report.push(ctx.warning(
                    ParseWarningKind::UnparsedPeriod,
                    format!("Unrecognized period '{}' for task '{}'", period, task),
                ));
            }

            for atomic in &split.periods {
                records.push(NormalizedRecord::Schedule(NormalizedSchedule {
                    id: 0,
                    sub_project_id: ctx.sub_project_id,
                    raw_record_id: ctx.raw_record_id,
                    year,
                    quarter: atomic.quarter,
                    month_start: atomic.month_start,
                    month_end: atomic.month_end,
                    start_date: atomic.start_date,
                    end_date: atomic.end_date,
                    task_category: NormalizerUtils::task_category(&task),
                    task_description: task.clone(),
                    detail: detail.clone(),
                    original_period: split.original.clone(),
                    period_parsed: split.is_parsed(),
                }));
            }
        }

        debug!(
            "Schedule table p{} t{}: {} row(s)",
            table.page_index,
            table.table_index,
            records.len()
        );
        records
    }
}

impl Default for ScheduleNormalizer {
    fn default() -> Self {
        Self::new()
    }
}
