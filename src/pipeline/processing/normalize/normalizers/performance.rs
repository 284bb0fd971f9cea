use tracing::debug;

use super::base::{CategoryNormalizer, NormalizerUtils};
pub use crate::domain::Admission;
use crate::domain::{IndicatorType, NormalizedPerformance, NormalizedRecord, RecordCategory, RecordSets};
use crate::pipeline::ingestion::RawTable;
use crate::pipeline::processing::classify::IndicatorClassifier;
use crate::pipeline::processing::normalize::{NormalizationContext, ParseReport, ParseWarningKind};
use crate::pipeline::processing::parser::{NumberParseError, TextNumberParser};

/// Normalizer for performance indicator tables.
/// Each row is a labelled line; every numeric value becomes one row.
pub struct PerformanceNormalizer;

impl PerformanceNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize_table(
        &self,
        ctx: &NormalizationContext<'_>,
        table: &RawTable,
        report: &mut ParseReport,
    ) -> Vec<NormalizedRecord> {
        let source_year = ctx.performance_year();
        let mut records = Vec::new();
        // Category cell of the row a merged block hangs under
        let mut category_prefix = String::new();

        for row in NormalizerUtils::text_rows(table) {
            if NormalizerUtils::is_header_marker_row(&row) {
                continue;
            }
            let first_cell = row.first().map(String::as_str).unwrap_or("");
            if !first_cell.is_empty() {
                category_prefix = TextNumberParser::parse_line(first_cell).label();
            }

            let extraction = TextNumberParser::parse_cells(&row);
            for rejected in &extraction.rejected {
                let kind = match rejected.reason {
                    NumberParseError::Negative(_) => ParseWarningKind::NegativeValue,
                    _ => ParseWarningKind::UnparsedNumber,
                };
                report.push(ctx.warning(
                    kind,
                    format!("Dropped '{}' in '{}': {}", rejected.token, NormalizerUtils::row_line(&row), rejected.reason),
                ));
            }
            if extraction.values.is_empty() {
                continue;
            }

            // A blank first cell sits under a merged category cell; only that
            // cell carries down, never the labels of sibling rows
            let label = if first_cell.is_empty() {
                format!("{} {}", category_prefix, extraction.label()).trim().to_string()
            } else {
                extraction.label()
            };

            let original_text = NormalizerUtils::row_line(&row);
            let classes = IndicatorClassifier::classify_line(&label, extraction.values.len());

            for (number, (category, indicator_type)) in extraction.values.iter().zip(classes) {
                let unit = match indicator_type {
                    IndicatorType::Unclassified => number.unit.clone().unwrap_or_default(),
                    known => IndicatorClassifier::unit_for(known).to_string(),
                };
                if indicator_type == IndicatorType::Unclassified {
                    report.push(ctx.warning(
                        ParseWarningKind::UnclassifiedIndicator,
                        format!("No indicator for value {} in '{}'", number.value, original_text),
                    ));
                }

                records.push(NormalizedRecord::Performance(NormalizedPerformance {
                    id: 0,
                    sub_project_id: ctx.sub_project_id,
                    raw_record_id: ctx.raw_record_id,
                    indicator_category: category,
                    indicator_type,
                    value: number.value,
                    unit,
                    source_year,
                    original_text: original_text.clone(),
                }));
            }
        }

        debug!(
            "Performance table p{} t{}: {} value(s)",
            table.page_index,
            table.table_index,
            records.len()
        );
        records
    }

    /// Check a row against the rows already stored for its sub-project
    pub fn admit(sets: &RecordSets, candidate: &NormalizedPerformance) -> Admission {
        sets.admit_performance(candidate)
    }
}

impl Default for PerformanceNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl CategoryNormalizer for PerformanceNormalizer {
    fn category(&self) -> RecordCategory {
        RecordCategory::Performance
    }

    fn normalize(
        &self,
        ctx: &NormalizationContext<'_>,
        table: &RawTable,
        report: &mut ParseReport,
    ) -> Vec<NormalizedRecord> {
        self.normalize_table(ctx, table, report)
    }
}
