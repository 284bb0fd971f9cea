use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::domain::{RawRecordId, SubProjectId};
use crate::observability::metrics;

/// Types of non-fatal data-quality notes raised while normalizing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseWarningKind {
    /// A numeric-looking token that could not be parsed
    UnparsedNumber,
    /// A negative figure where only non-negative values are valid
    NegativeValue,
    /// A schedule period that matched no known form
    UnparsedPeriod,
    /// A performance value whose label or position names no indicator
    UnclassifiedIndicator,
    /// Same indicator key seen again with the same value
    DuplicateIndicator,
    /// Same indicator key seen again with a different value
    ConflictingIndicator,
    BudgetYearOutOfRange,
    /// A budget table whose year axis could not be found
    UnrecognizedBudgetLayout,
    /// A plan table that is neither a schedule nor a budget
    UnknownTableType,
    /// Two overview tables disagree on a field
    OverviewConflict,
}

impl ParseWarningKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseWarningKind::UnparsedNumber => "unparsed_number",
            ParseWarningKind::NegativeValue => "negative_value",
            ParseWarningKind::UnparsedPeriod => "unparsed_period",
            ParseWarningKind::UnclassifiedIndicator => "unclassified_indicator",
            ParseWarningKind::DuplicateIndicator => "duplicate_indicator",
            ParseWarningKind::ConflictingIndicator => "conflicting_indicator",
            ParseWarningKind::BudgetYearOutOfRange => "budget_year_out_of_range",
            ParseWarningKind::UnrecognizedBudgetLayout => "unrecognized_budget_layout",
            ParseWarningKind::UnknownTableType => "unknown_table_type",
            ParseWarningKind::OverviewConflict => "overview_conflict",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseWarning {
    pub kind: ParseWarningKind,
    pub sub_project_id: Option<SubProjectId>,
    pub raw_record_id: Option<RawRecordId>,
    pub detail: String,
}

/// Every warning raised during a run, in the order raised
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParseReport {
    pub warnings: Vec<ParseWarning>,
}

impl ParseReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, warning: ParseWarning) {
        warn!(
            kind = warning.kind.as_str(),
            sub_project_id = warning.sub_project_id.map(|id| id.0),
            raw_record_id = warning.raw_record_id.map(|id| id.0),
            "{}",
            warning.detail
        );
        metrics::normalize::warning_logged(warning.kind.as_str());
        self.warnings.push(warning);
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn count(&self, kind: ParseWarningKind) -> usize {
        self.warnings.iter().filter(|w| w.kind == kind).count()
    }

    pub fn counts_by_kind(&self) -> BTreeMap<ParseWarningKind, usize> {
        let mut counts = BTreeMap::new();
        for warning in &self.warnings {
            *counts.entry(warning.kind).or_insert(0) += 1;
        }
        counts
    }

    pub fn extend(&mut self, other: ParseReport) {
        self.warnings.extend(other.warnings);
    }
}
