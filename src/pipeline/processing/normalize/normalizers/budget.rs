use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::base::NormalizerUtils;
use crate::domain::{BudgetType, NormalizedBudget, NormalizedRecord};
use crate::pipeline::ingestion::RawTable;
use crate::pipeline::processing::normalize::{NormalizationContext, ParseReport, ParseWarningKind};
use crate::pipeline::processing::parser::{contains_any, NumberParseError, TextNumberParser};

// A label that starts with a four-digit year: "2024", "2023(실적)", "2025년"
static YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*((?:19|20)\d{2})(?:\D|$)").expect("year pattern compiles"));

const TOTAL_KEYWORDS: &[&str] = &["합계", "소계", "총계", "총예산", "총사업비", "total"];
const ACTUAL_KEYWORDS: &[&str] = &["실적", "집행", "actual"];
const PLANNED_KEYWORDS: &[&str] = &["계획", "예산", "plan"];

const TYPE_KEYWORDS: &[(BudgetType, &[&str])] = &[
    (BudgetType::Government, &["정부", "국비", "government"]),
    (BudgetType::Private, &["민간", "private"]),
    (BudgetType::Local, &["지방", "local"]),
    (BudgetType::Other, &["기타", "other"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Orientation {
    /// First column holds years, header cells name budget types
    YearsAsRows,
    /// Header cells hold years, first column names budget types
    YearsAsColumns,
}

#[derive(Debug)]
struct YearLine<'a> {
    index: usize,
    label: &'a str,
    year: i32,
}

#[derive(Debug)]
struct TypeLine<'a> {
    index: usize,
    label: &'a str,
    budget_type: BudgetType,
}

/// Normalizer for multi-year budget tables.
/// Fans a year x type grid out into one row per populated cell.
pub struct BudgetNormalizer;

impl BudgetNormalizer {
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

        // A unit caption such as "(단위: 백만원)" may sit above the header
        let layout = (0..rows.len().min(2))
            .find_map(|start| Self::orientation(&rows[start..]).map(|o| (start, o)));
        let Some((start, orientation)) = layout else {
            report.push(ctx.warning(
                ParseWarningKind::UnrecognizedBudgetLayout,
                format!(
                    "No year axis in budget table p{} t{}",
                    table.page_index, table.table_index
                ),
            ));
            return Vec::new();
        };
        let grid = &rows[start..];
        let header = &grid[0];

        let (years, types) = match orientation {
            Orientation::YearsAsRows => (
                Self::year_lines(grid.iter().enumerate().skip(1).map(|(i, r)| (i, first(r)))),
                Self::type_lines(header.iter().enumerate().skip(1).map(|(i, c)| (i, c.as_str()))),
            ),
            Orientation::YearsAsColumns => (
                Self::year_lines(header.iter().enumerate().skip(1).map(|(i, c)| (i, c.as_str()))),
                Self::type_lines(grid.iter().enumerate().skip(1).map(|(i, r)| (i, first(r)))),
            ),
        };

        let plan_year = ctx.plan_year();
        let window = ctx.config.budget_year_window as i32;
        let mut records = Vec::new();

        for year_line in &years {
            if (year_line.year - ctx.document_year).abs() > window {
                report.push(ctx.warning(
                    ParseWarningKind::BudgetYearOutOfRange,
                    format!(
                        "Budget year {} is outside {} ± {}",
                        year_line.year, ctx.document_year, window
                    ),
                ));
                continue;
            }
            let is_actual = Self::is_actual(year_line.label, year_line.year, plan_year);

            for type_line in &types {
                let cell = match orientation {
                    Orientation::YearsAsRows => grid[year_line.index].get(type_line.index),
                    Orientation::YearsAsColumns => grid[type_line.index].get(year_line.index),
                };
                let Some(cell) = cell else { continue };

                let amount = match TextNumberParser::parse_value(cell) {
                    Ok(number) => number.value,
                    Err(NumberParseError::Empty) | Err(NumberParseError::NotApplicable) => continue,
                    Err(NumberParseError::Negative(_)) => {
                        report.push(ctx.warning(
                            ParseWarningKind::NegativeValue,
                            format!("Negative budget '{}' for {} {}", cell, year_line.year, type_line.label),
                        ));
                        continue;
                    }
                    Err(reason) => {
                        report.push(ctx.warning(
                            ParseWarningKind::UnparsedNumber,
                            format!("Budget cell for {} {}: {}", year_line.year, type_line.label, reason),
                        ));
                        continue;
                    }
                };

                records.push(NormalizedRecord::Budget(NormalizedBudget {
                    id: 0,
                    sub_project_id: ctx.sub_project_id,
                    raw_record_id: ctx.raw_record_id,
                    budget_year: year_line.year,
                    budget_type: type_line.budget_type,
                    amount,
                    unit: ctx.config.budget_unit.clone(),
                    is_actual,
                    original_text: format!("{} | {} | {}", year_line.label, type_line.label, cell),
                }));
            }
        }

        debug!(
            "Budget table p{} t{} ({:?}): {} row(s)",
            table.page_index,
            table.table_index,
            orientation,
            records.len()
        );
        records
    }

    fn orientation(rows: &[Vec<String>]) -> Option<Orientation> {
        let header = rows.first()?;
        if header.iter().skip(1).all(|c| c.is_empty()) {
            return None;
        }
        if rows.iter().skip(1).any(|r| YEAR.is_match(first(r))) {
            Some(Orientation::YearsAsRows)
        } else if header.iter().skip(1).any(|c| YEAR.is_match(c)) {
            Some(Orientation::YearsAsColumns)
        } else {
            None
        }
    }

    fn year_lines<'a>(labels: impl Iterator<Item = (usize, &'a str)>) -> Vec<YearLine<'a>> {
        labels
            .filter_map(|(index, label)| {
                let year = YEAR.captures(label)?.get(1)?.as_str().parse().ok()?;
                Some(YearLine { index, label, year })
            })
            .collect()
    }

    /// Budget types for the non-total lines. Unknown labels fall back to
    /// their position: 1 government, 2 private, 3 local, then other.
    fn type_lines<'a>(labels: impl Iterator<Item = (usize, &'a str)>) -> Vec<TypeLine<'a>> {
        labels
            .filter(|(_, label)| !label.is_empty() && !Self::is_total(label))
            .enumerate()
            .map(|(position, (index, label))| TypeLine {
                index,
                label,
                budget_type: Self::budget_type(label).unwrap_or(match position {
                    0 => BudgetType::Government,
                    1 => BudgetType::Private,
                    2 => BudgetType::Local,
                    _ => BudgetType::Other,
                }),
            })
            .collect()
    }

    pub fn budget_type(label: &str) -> Option<BudgetType> {
        TYPE_KEYWORDS
            .iter()
            .find(|(_, keywords)| contains_any(label, keywords))
            .map(|(t, _)| *t)
    }

    pub fn is_total(label: &str) -> bool {
        label.trim() == "계" || contains_any(label, TOTAL_KEYWORDS)
    }

    /// Explicit 실적/계획 markers win; otherwise years before the plan year
    /// are executed figures.
    pub fn is_actual(label: &str, year: i32, plan_year: i32) -> bool {
        if contains_any(label, ACTUAL_KEYWORDS) {
            true
        } else if contains_any(label, PLANNED_KEYWORDS) {
            false
        } else {
            year < plan_year
        }
    }
}

impl Default for BudgetNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

fn first(row: &[String]) -> &str {
    row.first().map(String::as_str).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::domain::{NumericValue, RawRecordId, SubProjectId};
    use serde_json::json;

    fn run(config: &EngineConfig, rows: serde_json::Value) -> (Vec<NormalizedBudget>, ParseReport) {
        let ctx = NormalizationContext {
            sub_project_id: SubProjectId(1),
            raw_record_id: RawRecordId(5),
            document_year: 2024,
            data_year: Some(2024),
            config,
        };
        let table = RawTable {
            page_index: 4,
            table_index: 1,
            data_year: Some(2024),
            rows: serde_json::from_value(rows).unwrap(),
        };
        let mut report = ParseReport::new();
        let records = BudgetNormalizer::new().normalize_table(&ctx, &table, &mut report);
        let rows = records
            .into_iter()
            .map(|r| match r {
                NormalizedRecord::Budget(b) => b,
                other => panic!("unexpected record {:?}", other),
            })
            .collect();
        (rows, report)
    }

    #[test]
    fn years_as_rows_fan_out_and_skip_totals() {
        let config = EngineConfig::default();
        let (rows, report) = run(
            &config,
            json!([
                ["연도", "총예산", "정부", "민간", "지방비"],
                ["2023(실적)", "45,200", "35,000", "8,200", "2,000"],
                ["2024(계획)", "52,300", "40,000", "10,300", "2,000"],
                ["2025", "58,500", "44,000", "12,500", "2,000"]
            ]),
        );

        assert!(report.is_empty());
        assert_eq!(rows.len(), 9);
        assert_eq!(rows[0].budget_year, 2023);
        assert_eq!(rows[0].budget_type, BudgetType::Government);
        assert_eq!(rows[0].amount, NumericValue::Integer(35_000));
        assert!(rows[0].is_actual);
        assert!(!rows[3].is_actual);
        assert!(!rows[8].is_actual);
        assert_eq!(rows[2].budget_type, BudgetType::Local);
        assert_eq!(rows[0].unit, "백만원");
        assert_eq!(rows[0].original_text, "2023(실적) | 정부 | 35,000");
    }

    #[test]
    fn years_as_columns_are_supported() {
        let config = EngineConfig::default();
        let (rows, _) = run(
            &config,
            json!([
                ["구분", "2022", "2023", "2024"],
                ["국비", "100", "200", "300"],
                ["민간", "10", "-", "0"],
                ["계", "110", "200", "300"]
            ]),
        );

        assert_eq!(rows.len(), 5);
        let private: Vec<_> = rows.iter().filter(|r| r.budget_type == BudgetType::Private).collect();
        assert_eq!(private.len(), 2);
        assert_eq!(private[1].amount, NumericValue::Integer(0));
        // Without markers, years before the plan year are actuals
        assert!(rows.iter().filter(|r| r.budget_year < 2024).all(|r| r.is_actual));
    }

    #[test]
    fn unknown_type_headers_fall_back_by_position() {
        let config = EngineConfig::default();
        let (rows, _) = run(
            &config,
            json!([["연도", "A", "B", "C", "D", "E"], ["2024", "1", "2", "3", "4", "5"]]),
        );
        let types: Vec<_> = rows.iter().map(|r| r.budget_type).collect();
        assert_eq!(
            types,
            vec![
                BudgetType::Government,
                BudgetType::Private,
                BudgetType::Local,
                BudgetType::Other,
                BudgetType::Other
            ]
        );
    }

    #[test]
    fn out_of_window_years_and_bad_cells_are_reported() {
        let config = EngineConfig::default();
        let (rows, report) = run(
            &config,
            json!([
                ["(단위: 백만원)"],
                ["연도", "정부"],
                ["1990", "100"],
                ["2024", "-50"],
                ["2025", "abc"],
                ["2026", "N/A"]
            ]),
        );
        assert!(rows.is_empty());
        assert_eq!(report.count(ParseWarningKind::BudgetYearOutOfRange), 1);
        assert_eq!(report.count(ParseWarningKind::NegativeValue), 1);
        assert_eq!(report.count(ParseWarningKind::UnparsedNumber), 1);
    }

    #[test]
    fn table_without_years_is_flagged() {
        let config = EngineConfig::default();
        let (rows, report) = run(&config, json!([["구분", "정부"], ["합계", "100"]]));
        assert!(rows.is_empty());
        assert_eq!(report.count(ParseWarningKind::UnrecognizedBudgetLayout), 1);
    }
}
