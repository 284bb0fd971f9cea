use tracing::debug;

use super::base::{CategoryNormalizer, NormalizerUtils};
use super::budget::BudgetNormalizer;
use super::schedule::ScheduleNormalizer;
use crate::domain::{NormalizedRecord, RecordCategory};
use crate::pipeline::ingestion::RawTable;
use crate::pipeline::processing::classify::{PlanTableKind, TableClassifier};
use crate::pipeline::processing::normalize::{NormalizationContext, ParseReport, ParseWarningKind};

/// Normalizer for plan-section tables: routes each table to the schedule or
/// budget normalizer by its content.
pub struct PlanNormalizer {
    schedule: ScheduleNormalizer,
    budget: BudgetNormalizer,
}

impl PlanNormalizer {
    pub fn new() -> Self {
        Self {
            schedule: ScheduleNormalizer::new(),
            budget: BudgetNormalizer::new(),
        }
    }
}

impl Default for PlanNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl CategoryNormalizer for PlanNormalizer {
    fn category(&self) -> RecordCategory {
        RecordCategory::Plan
    }

    fn normalize(
        &self,
        ctx: &NormalizationContext<'_>,
        table: &RawTable,
        report: &mut ParseReport,
    ) -> Vec<NormalizedRecord> {
        let kind = TableClassifier::classify_plan_table(&NormalizerUtils::text_rows(table));
        debug!(
            "Plan table p{} t{} classified as {:?}",
            table.page_index, table.table_index, kind
        );

        match kind {
            PlanTableKind::Schedule => self.schedule.normalize_table(ctx, table, report),
            PlanTableKind::Budget => self.budget.normalize_table(ctx, table, report),
            PlanTableKind::Unknown => {
                report.push(ctx.warning(
                    ParseWarningKind::UnknownTableType,
                    format!(
                        "Plan table p{} t{} is neither a schedule nor a budget",
                        table.page_index, table.table_index
                    ),
                ));
                Vec::new()
            }
        }
    }
}
