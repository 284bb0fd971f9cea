use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::domain::{RawRecordId, RecordCategory, RecordSetStatistics, RecordSets, SubProject, SubProjectId};
use crate::observability::metrics;

/// Severity of an integrity issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    /// Breaks referential or uniqueness guarantees; fails a strict run
    Violation,
    /// Suspicious but loadable
    Warning,
}

impl IssueSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueSeverity::Violation => "violation",
            IssueSeverity::Warning => "warning",
        }
    }
}

/// Types of integrity issues the validator detects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityIssueKind {
    /// A row whose sub-project id resolves to no SubProject
    OrphanSubProject,
    /// A row whose raw-record id resolves to no RawRecord
    OrphanRawRecord,
    /// A row whose raw record belongs to another sub-project
    RawRecordMismatch,
    /// More than one overview for a sub-project
    DuplicateOverview,
    /// The same surrogate id twice within one set
    DuplicateId,
    /// Raw data in a category with no normalized rows for it
    MissingNormalizedData,
    /// A value outside its valid range
    OutOfRange,
}

impl IntegrityIssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrityIssueKind::OrphanSubProject => "orphan_sub_project",
            IntegrityIssueKind::OrphanRawRecord => "orphan_raw_record",
            IntegrityIssueKind::RawRecordMismatch => "raw_record_mismatch",
            IntegrityIssueKind::DuplicateOverview => "duplicate_overview",
            IntegrityIssueKind::DuplicateId => "duplicate_id",
            IntegrityIssueKind::MissingNormalizedData => "missing_normalized_data",
            IntegrityIssueKind::OutOfRange => "out_of_range",
        }
    }

    pub fn severity(&self) -> IssueSeverity {
        match self {
            IntegrityIssueKind::OrphanSubProject
            | IntegrityIssueKind::OrphanRawRecord
            | IntegrityIssueKind::RawRecordMismatch
            | IntegrityIssueKind::DuplicateOverview
            | IntegrityIssueKind::DuplicateId => IssueSeverity::Violation,
            IntegrityIssueKind::MissingNormalizedData | IntegrityIssueKind::OutOfRange => {
                IssueSeverity::Warning
            }
        }
    }

    fn is_orphan(&self) -> bool {
        matches!(
            self,
            IntegrityIssueKind::OrphanSubProject
                | IntegrityIssueKind::OrphanRawRecord
                | IntegrityIssueKind::RawRecordMismatch
        )
    }
}

/// Individual integrity issue found during validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityIssue {
    pub kind: IntegrityIssueKind,
    pub severity: IssueSeverity,
    /// Name of the record set the offending row lives in
    pub record_set: String,
    /// Surrogate id of the offending row, when it has one
    pub record_id: Option<u64>,
    pub sub_project_id: Option<SubProjectId>,
    /// Human-readable description of the issue
    pub description: String,
}

/// Result of validating one run's record sets. Issues are collected, never raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub validated_at: DateTime<Utc>,
    pub issues: Vec<IntegrityIssue>,
    pub statistics: RecordSetStatistics,
}

impl IntegrityReport {
    pub fn orphan_count(&self) -> usize {
        self.issues.iter().filter(|i| i.kind.is_orphan()).count()
    }

    pub fn duplicate_overview_count(&self) -> usize {
        self.count(IntegrityIssueKind::DuplicateOverview)
    }

    pub fn count(&self, kind: IntegrityIssueKind) -> usize {
        self.issues.iter().filter(|i| i.kind == kind).count()
    }

    pub fn violation_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Violation)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Warning)
            .count()
    }

    pub fn has_violations(&self) -> bool {
        self.violation_count() > 0
    }

    pub fn counts_by_kind(&self) -> BTreeMap<IntegrityIssueKind, usize> {
        let mut counts = BTreeMap::new();
        for issue in &self.issues {
            *counts.entry(issue.kind).or_insert(0) += 1;
        }
        counts
    }
}

/// Foreign keys of one normalized row
struct RowKeys {
    id: u64,
    sub_project_id: SubProjectId,
    raw_record_id: RawRecordId,
}

/// Post-run checks over the union of all record sets
pub struct IntegrityValidator {
    budget_year_window: u32,
}

impl IntegrityValidator {
    pub fn new(budget_year_window: u32) -> Self {
        Self { budget_year_window }
    }

    pub fn validate(&self, sets: &RecordSets) -> IntegrityReport {
        let mut issues = Vec::new();

        let sub_projects: HashMap<SubProjectId, &SubProject> =
            sets.sub_projects.iter().map(|s| (s.id, s)).collect();
        let raw_owner: HashMap<RawRecordId, SubProjectId> = sets
            .raw_records
            .iter()
            .map(|r| (r.id, r.sub_project_id))
            .collect();

        Self::check_unique_ids("sub_projects", sets.sub_projects.iter().map(|s| s.id.0), &mut issues);
        Self::check_unique_ids("raw_records", sets.raw_records.iter().map(|r| r.id.0), &mut issues);

        for raw in &sets.raw_records {
            if !sub_projects.contains_key(&raw.sub_project_id) {
                issues.push(issue(
                    IntegrityIssueKind::OrphanSubProject,
                    "raw_records",
                    Some(raw.id.0),
                    Some(raw.sub_project_id),
                    format!("Raw record {} references missing sub-project {}", raw.id, raw.sub_project_id),
                ));
            }
        }

        let normalized_sets: [(&str, Vec<RowKeys>); 4] = [
            (
                "normalized_schedules",
                sets.schedules
                    .iter()
                    .map(|r| RowKeys { id: r.id, sub_project_id: r.sub_project_id, raw_record_id: r.raw_record_id })
                    .collect(),
            ),
            (
                "normalized_performances",
                sets.performances
                    .iter()
                    .map(|r| RowKeys { id: r.id, sub_project_id: r.sub_project_id, raw_record_id: r.raw_record_id })
                    .collect(),
            ),
            (
                "normalized_budgets",
                sets.budgets
                    .iter()
                    .map(|r| RowKeys { id: r.id, sub_project_id: r.sub_project_id, raw_record_id: r.raw_record_id })
                    .collect(),
            ),
            (
                "normalized_overviews",
                sets.overviews
                    .iter()
                    .map(|r| RowKeys { id: r.id, sub_project_id: r.sub_project_id, raw_record_id: r.raw_record_id })
                    .collect(),
            ),
        ];

        for (set, rows) in &normalized_sets {
            Self::check_unique_ids(set, rows.iter().map(|r| r.id), &mut issues);
            for row in rows {
                Self::check_foreign_keys(set, row, &sub_projects, &raw_owner, &mut issues);
            }
        }

        self.check_overview_uniqueness(sets, &mut issues);
        self.check_completeness(sets, &mut issues);
        self.check_ranges(sets, &sub_projects, &mut issues);

        let report = IntegrityReport {
            validated_at: Utc::now(),
            issues,
            statistics: sets.statistics(),
        };

        for issue in &report.issues {
            metrics::integrity::issue_detected(issue.kind.as_str(), issue.severity.as_str());
            debug!(
                kind = issue.kind.as_str(),
                record_set = %issue.record_set,
                "{}",
                issue.description
            );
        }

        if report.has_violations() {
            warn!(
                "Integrity check found {} violation(s) and {} warning(s)",
                report.violation_count(),
                report.warning_count()
            );
        } else {
            info!(
                "Integrity check passed with {} warning(s) over {} normalized row(s)",
                report.warning_count(),
                sets.normalized_len()
            );
        }

        report
    }

    fn check_unique_ids(set: &str, ids: impl Iterator<Item = u64>, issues: &mut Vec<IntegrityIssue>) {
        let mut seen = HashSet::new();
        for id in ids {
            if !seen.insert(id) {
                issues.push(issue(
                    IntegrityIssueKind::DuplicateId,
                    set,
                    Some(id),
                    None,
                    format!("Id {} appears more than once in {}", id, set),
                ));
            }
        }
    }

    fn check_foreign_keys(
        set: &str,
        row: &RowKeys,
        sub_projects: &HashMap<SubProjectId, &SubProject>,
        raw_owner: &HashMap<RawRecordId, SubProjectId>,
        issues: &mut Vec<IntegrityIssue>,
    ) {
        if !sub_projects.contains_key(&row.sub_project_id) {
            issues.push(issue(
                IntegrityIssueKind::OrphanSubProject,
                set,
                Some(row.id),
                Some(row.sub_project_id),
                format!("Row {} references missing sub-project {}", row.id, row.sub_project_id),
            ));
        }

        match raw_owner.get(&row.raw_record_id) {
            None => issues.push(issue(
                IntegrityIssueKind::OrphanRawRecord,
                set,
                Some(row.id),
                Some(row.sub_project_id),
                format!("Row {} references missing raw record {}", row.id, row.raw_record_id),
            )),
            Some(owner) if *owner != row.sub_project_id => issues.push(issue(
                IntegrityIssueKind::RawRecordMismatch,
                set,
                Some(row.id),
                Some(row.sub_project_id),
                format!(
                    "Row {} belongs to sub-project {} but its raw record {} belongs to {}",
                    row.id, row.sub_project_id, row.raw_record_id, owner
                ),
            )),
            Some(_) => {}
        }
    }

    fn check_overview_uniqueness(&self, sets: &RecordSets, issues: &mut Vec<IntegrityIssue>) {
        let mut seen = HashSet::new();
        for overview in &sets.overviews {
            if !seen.insert(overview.sub_project_id) {
                issues.push(issue(
                    IntegrityIssueKind::DuplicateOverview,
                    "normalized_overviews",
                    Some(overview.id),
                    Some(overview.sub_project_id),
                    format!("Sub-project {} has more than one overview", overview.sub_project_id),
                ));
            }
        }
    }

    fn check_completeness(&self, sets: &RecordSets, issues: &mut Vec<IntegrityIssue>) {
        let mut with_raw: HashSet<(SubProjectId, RecordCategory)> = HashSet::new();
        for raw in &sets.raw_records {
            with_raw.insert((raw.sub_project_id, raw.category));
        }

        let mut with_rows: HashSet<(SubProjectId, RecordCategory)> = HashSet::new();
        with_rows.extend(sets.schedules.iter().map(|r| (r.sub_project_id, RecordCategory::Plan)));
        with_rows.extend(sets.budgets.iter().map(|r| (r.sub_project_id, RecordCategory::Plan)));
        with_rows.extend(
            sets.performances
                .iter()
                .map(|r| (r.sub_project_id, RecordCategory::Performance)),
        );
        with_rows.extend(sets.overviews.iter().map(|r| (r.sub_project_id, RecordCategory::Overview)));

        let mut missing: Vec<_> = with_raw.difference(&with_rows).copied().collect();
        missing.sort();
        for (sub_project_id, category) in missing {
            issues.push(issue(
                IntegrityIssueKind::MissingNormalizedData,
                "raw_records",
                None,
                Some(sub_project_id),
                format!(
                    "Sub-project {} has {} raw data but no normalized rows for it",
                    sub_project_id, category
                ),
            ));
        }
    }

    fn check_ranges(
        &self,
        sets: &RecordSets,
        sub_projects: &HashMap<SubProjectId, &SubProject>,
        issues: &mut Vec<IntegrityIssue>,
    ) {
        for schedule in &sets.schedules {
            if let Some(quarter) = schedule.quarter {
                if quarter.value() > 4 {
                    issues.push(issue(
                        IntegrityIssueKind::OutOfRange,
                        "normalized_schedules",
                        Some(schedule.id),
                        Some(schedule.sub_project_id),
                        format!("Quarter {} is outside 0..=4", quarter.value()),
                    ));
                }
            }
            if let (Some(start), Some(end)) = (schedule.month_start, schedule.month_end) {
                // A span such as November to February runs into the next year
                let crosses_year = matches!(
                    (schedule.start_date, schedule.end_date),
                    (Some(a), Some(b)) if a.year() < b.year()
                );
                if (start > end && !crosses_year) || !(1..=12).contains(&start) || !(1..=12).contains(&end) {
                    issues.push(issue(
                        IntegrityIssueKind::OutOfRange,
                        "normalized_schedules",
                        Some(schedule.id),
                        Some(schedule.sub_project_id),
                        format!("Month span {}..{} is not a valid range", start, end),
                    ));
                }
            }
        }

        for performance in &sets.performances {
            if performance.value.is_negative() {
                issues.push(issue(
                    IntegrityIssueKind::OutOfRange,
                    "normalized_performances",
                    Some(performance.id),
                    Some(performance.sub_project_id),
                    format!("Negative performance value {}", performance.value),
                ));
            }
        }

        let window = self.budget_year_window as i32;
        for budget in &sets.budgets {
            if budget.amount.is_negative() {
                issues.push(issue(
                    IntegrityIssueKind::OutOfRange,
                    "normalized_budgets",
                    Some(budget.id),
                    Some(budget.sub_project_id),
                    format!("Negative budget amount {}", budget.amount),
                ));
            }
            if let Some(sub_project) = sub_projects.get(&budget.sub_project_id) {
                if (budget.budget_year - sub_project.document_year).abs() > window {
                    issues.push(issue(
                        IntegrityIssueKind::OutOfRange,
                        "normalized_budgets",
                        Some(budget.id),
                        Some(budget.sub_project_id),
                        format!(
                            "Budget year {} is outside {} ± {}",
                            budget.budget_year, sub_project.document_year, window
                        ),
                    ));
                }
            }
        }
    }
}

fn issue(
    kind: IntegrityIssueKind,
    record_set: &str,
    record_id: Option<u64>,
    sub_project_id: Option<SubProjectId>,
    description: String,
) -> IntegrityIssue {
    IntegrityIssue {
        kind,
        severity: kind.severity(),
        record_set: record_set.to_string(),
        record_id,
        sub_project_id,
        description,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        BudgetType, NormalizedBudget, NormalizedOverview, NormalizedPerformance, NormalizedRecord,
        NormalizedSchedule, NumericValue, Quarter, RawRecord, IndicatorCategory, IndicatorType,
    };

    fn sub_project(id: u64) -> SubProject {
        SubProject {
            id: SubProjectId(id),
            project_code: format!("SUB-2024-{:03}", id),
            name: format!("Sub-project {}", id),
            parent_name: None,
            document_year: 2024,
        }
    }

    fn raw(sub: u64, category: RecordCategory) -> RawRecord {
        RawRecord {
            id: RawRecordId::default(),
            sub_project_id: SubProjectId(sub),
            category,
            data_year: None,
            payload: serde_json::json!([]),
            page_index: 1,
            table_index: 0,
            content_sha256: String::new(),
        }
    }

    fn schedule(sub: u64, raw: RawRecordId) -> NormalizedSchedule {
        NormalizedSchedule {
            id: 0,
            sub_project_id: SubProjectId(sub),
            raw_record_id: raw,
            year: 2024,
            quarter: Quarter::new(1),
            month_start: Some(1),
            month_end: Some(3),
            start_date: None,
            end_date: None,
            task_category: String::new(),
            task_description: "task".to_string(),
            detail: None,
            original_period: "1/4분기".to_string(),
            period_parsed: true,
        }
    }

    fn budget(sub: u64, raw: RawRecordId, year: i32) -> NormalizedBudget {
        NormalizedBudget {
            id: 0,
            sub_project_id: SubProjectId(sub),
            raw_record_id: raw,
            budget_year: year,
            budget_type: BudgetType::Government,
            amount: NumericValue::Integer(100),
            unit: "백만원".to_string(),
            is_actual: false,
            original_text: String::new(),
        }
    }

    fn overview(sub: u64, raw: RawRecordId) -> NormalizedOverview {
        NormalizedOverview {
            sub_project_id: SubProjectId(sub),
            raw_record_id: raw,
            objectives: Some("goal".to_string()),
            ..Default::default()
        }
    }

    fn valid_sets() -> RecordSets {
        let mut sets = RecordSets::new();
        sets.set_sub_projects(vec![sub_project(1)]);
        let plan = sets.push_raw(raw(1, RecordCategory::Plan));
        let over = sets.push_raw(raw(1, RecordCategory::Overview));
        sets.push(NormalizedRecord::Schedule(schedule(1, plan)));
        sets.push(NormalizedRecord::Budget(budget(1, plan, 2024)));
        sets.push(NormalizedRecord::Overview(overview(1, over)));
        sets
    }

    #[test]
    fn clean_sets_have_no_issues() {
        let report = IntegrityValidator::new(10).validate(&valid_sets());
        assert!(report.issues.is_empty(), "{:?}", report.issues);
        assert_eq!(report.statistics.schedules, 1);
        assert_eq!(report.statistics.overviews, 1);
    }

    #[test]
    fn orphans_are_violations() {
        let mut sets = valid_sets();
        sets.push(NormalizedRecord::Schedule(schedule(9, RawRecordId(1))));
        sets.push(NormalizedRecord::Budget(budget(1, RawRecordId(42), 2024)));

        let report = IntegrityValidator::new(10).validate(&sets);
        assert_eq!(report.count(IntegrityIssueKind::OrphanSubProject), 1);
        assert_eq!(report.count(IntegrityIssueKind::OrphanRawRecord), 1);
        // The schedule for sub-project 9 also points at sub-project 1's raw record
        assert_eq!(report.count(IntegrityIssueKind::RawRecordMismatch), 1);
        assert_eq!(report.orphan_count(), 3);
        assert!(report.has_violations());
    }

    #[test]
    fn second_overview_is_a_violation() {
        let mut sets = valid_sets();
        sets.push(NormalizedRecord::Overview(overview(1, RawRecordId(2))));

        let report = IntegrityValidator::new(10).validate(&sets);
        assert_eq!(report.duplicate_overview_count(), 1);
        assert_eq!(report.violation_count(), 1);
    }

    #[test]
    fn duplicate_ids_are_violations() {
        let mut sets = valid_sets();
        let mut copy = sets.schedules[0].clone();
        copy.quarter = Quarter::new(2);
        sets.schedules.push(copy);

        let report = IntegrityValidator::new(10).validate(&sets);
        assert_eq!(report.count(IntegrityIssueKind::DuplicateId), 1);
    }

    #[test]
    fn missing_normalized_rows_are_warnings() {
        let mut sets = valid_sets();
        sets.push_raw(raw(1, RecordCategory::Performance));

        let report = IntegrityValidator::new(10).validate(&sets);
        assert_eq!(report.count(IntegrityIssueKind::MissingNormalizedData), 1);
        assert!(!report.has_violations());
        assert_eq!(report.warning_count(), 1);
    }

    #[test]
    fn range_checks_flag_values() {
        let mut sets = valid_sets();
        sets.push(NormalizedRecord::Budget(budget(1, RawRecordId(1), 2040)));
        let perf_raw = sets.push_raw(raw(1, RecordCategory::Performance));
        sets.push(NormalizedRecord::Performance(NormalizedPerformance {
            id: 0,
            sub_project_id: SubProjectId(1),
            raw_record_id: perf_raw,
            indicator_category: IndicatorCategory::Papers,
            indicator_type: IndicatorType::Scie,
            value: NumericValue::Decimal(-1.5),
            unit: "편".to_string(),
            source_year: Some(2023),
            original_text: String::new(),
        }));

        let report = IntegrityValidator::new(10).validate(&sets);
        assert_eq!(report.count(IntegrityIssueKind::OutOfRange), 2);
        assert!(!report.has_violations());
    }

    #[test]
    fn month_spans_into_the_next_year_are_in_range() {
        let mut sets = valid_sets();
        let plan = sets.raw_records[0].id;
        let mut winter = schedule(1, plan);
        winter.quarter = None;
        winter.month_start = Some(11);
        winter.month_end = Some(2);
        winter.start_date = chrono::NaiveDate::from_ymd_opt(2023, 11, 1);
        winter.end_date = chrono::NaiveDate::from_ymd_opt(2024, 2, 29);
        sets.push(NormalizedRecord::Schedule(winter.clone()));

        let report = IntegrityValidator::new(10).validate(&sets);
        assert_eq!(report.count(IntegrityIssueKind::OutOfRange), 0);

        winter.end_date = chrono::NaiveDate::from_ymd_opt(2023, 2, 28);
        sets.push(NormalizedRecord::Schedule(winter));
        let report = IntegrityValidator::new(10).validate(&sets);
        assert_eq!(report.count(IntegrityIssueKind::OutOfRange), 1);
    }
}
