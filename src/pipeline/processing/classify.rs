//! Closed keyword tables for indicator and plan-table classification.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::{IndicatorCategory, IndicatorType};
use crate::pipeline::processing::parser::{contains_any, PeriodSplitter};

struct CategoryEntry {
    category: IndicatorCategory,
    keywords: &'static [&'static str],
    /// Indicator type by value position within a line
    positions: &'static [IndicatorType],
    /// Label keywords that name one type outright
    explicit: &'static [(&'static str, IndicatorType)],
}

// Checked in order; technology transfer goes first so "기술이전" is not read
// through a broader keyword.
static CATEGORIES: &[CategoryEntry] = &[
    CategoryEntry {
        category: IndicatorCategory::TechnologyTransfer,
        keywords: &["기술이전", "기술료", "technology transfer", "transfer"],
        positions: &[IndicatorType::TransferCount, IndicatorType::TransferAmount],
        explicit: &[
            ("기술료", IndicatorType::TransferAmount),
            ("금액", IndicatorType::TransferAmount),
            ("amount", IndicatorType::TransferAmount),
            ("건수", IndicatorType::TransferCount),
            ("count", IndicatorType::TransferCount),
        ],
    },
    CategoryEntry {
        category: IndicatorCategory::Patents,
        keywords: &["특허", "출원", "등록", "patent"],
        positions: &[
            IndicatorType::DomesticFiled,
            IndicatorType::DomesticRegistered,
            IndicatorType::ForeignFiled,
            IndicatorType::ForeignRegistered,
        ],
        explicit: &[
            ("국내출원", IndicatorType::DomesticFiled),
            ("국내등록", IndicatorType::DomesticRegistered),
            ("국외출원", IndicatorType::ForeignFiled),
            ("해외출원", IndicatorType::ForeignFiled),
            ("국외등록", IndicatorType::ForeignRegistered),
            ("해외등록", IndicatorType::ForeignRegistered),
        ],
    },
    CategoryEntry {
        category: IndicatorCategory::Papers,
        keywords: &["논문", "scie", "if10", "if20", "paper"],
        positions: &[
            IndicatorType::Scie,
            IndicatorType::ScieIf10,
            IndicatorType::ScieIf20,
            IndicatorType::NonScie,
        ],
        explicit: &[
            ("if20", IndicatorType::ScieIf20),
            ("if10", IndicatorType::ScieIf10),
            ("비scie", IndicatorType::NonScie),
            ("non-scie", IndicatorType::NonScie),
            ("scie", IndicatorType::Scie),
        ],
    },
    CategoryEntry {
        category: IndicatorCategory::HumanResources,
        keywords: &["박사", "석사", "인력", "참여", "human resource"],
        positions: &[
            IndicatorType::PhdGraduates,
            IndicatorType::MasterGraduates,
            IndicatorType::Participants,
        ],
        explicit: &[
            ("박사", IndicatorType::PhdGraduates),
            ("phd", IndicatorType::PhdGraduates),
            ("석사", IndicatorType::MasterGraduates),
            ("master", IndicatorType::MasterGraduates),
            ("참여", IndicatorType::Participants),
        ],
    },
];

/// Maps a performance line's label and value position to an indicator
pub struct IndicatorClassifier;

impl IndicatorClassifier {
    pub fn category_of(label: &str) -> IndicatorCategory {
        Self::entry(label)
            .map(|e| e.category)
            .unwrap_or(IndicatorCategory::Unclassified)
    }

    /// Classify the value at `position` (0-based) of a line labelled `label`.
    /// Never discards a value: unknown labels and surplus positions come back
    /// as unclassified.
    pub fn classify(label: &str, position: usize) -> (IndicatorCategory, IndicatorType) {
        match Self::entry(label) {
            Some(entry) => (
                entry.category,
                entry
                    .positions
                    .get(position)
                    .copied()
                    .unwrap_or(IndicatorType::Unclassified),
            ),
            None => (IndicatorCategory::Unclassified, IndicatorType::Unclassified),
        }
    }

    /// A type named outright in the label, e.g. "국내등록" or "IF10이상"
    pub fn explicit_type(label: &str) -> Option<IndicatorType> {
        let entry = Self::entry(label)?;
        let compacted = compact(label);
        entry
            .explicit
            .iter()
            .find(|(keyword, _)| compacted.contains(&compact(keyword)))
            .map(|(_, t)| *t)
    }

    /// Classify every value of a line. A line with a single value and an
    /// explicit type keyword is pinned to that type.
    pub fn classify_line(label: &str, value_count: usize) -> Vec<(IndicatorCategory, IndicatorType)> {
        if value_count == 1 {
            if let Some(pinned) = Self::explicit_type(label) {
                return vec![(Self::category_of(label), pinned)];
            }
        }
        (0..value_count).map(|i| Self::classify(label, i)).collect()
    }

    pub fn unit_for(indicator_type: IndicatorType) -> &'static str {
        match indicator_type {
            IndicatorType::DomesticFiled
            | IndicatorType::DomesticRegistered
            | IndicatorType::ForeignFiled
            | IndicatorType::ForeignRegistered
            | IndicatorType::TransferCount => "건",
            IndicatorType::Scie
            | IndicatorType::ScieIf10
            | IndicatorType::ScieIf20
            | IndicatorType::NonScie => "편",
            IndicatorType::TransferAmount => "백만원",
            IndicatorType::PhdGraduates
            | IndicatorType::MasterGraduates
            | IndicatorType::Participants => "명",
            IndicatorType::Unclassified => "",
        }
    }

    fn entry(label: &str) -> Option<&'static CategoryEntry> {
        let compacted = compact(label);
        CATEGORIES
            .iter()
            .find(|entry| entry.keywords.iter().any(|k| compacted.contains(&compact(k))))
    }
}

/// Lowercased with all whitespace removed, so "IF 10" and "if10" compare equal
fn compact(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTableKind {
    Schedule,
    Budget,
    Unknown,
}

const BUDGET_KEYWORDS: &[&str] = &["예산", "사업비", "백만원", "budget", "정부", "국비", "민간"];
const SCHEDULE_KEYWORDS: &[&str] = &["분기", "일정", "추진", "schedule", "quarter", "연중"];

static YEAR_CELL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(19|20)\d{2}").expect("year cell pattern compiles"));

/// Decides what a plan-section table holds
pub struct TableClassifier;

impl TableClassifier {
    pub fn classify_plan_table(rows: &[Vec<String>]) -> PlanTableKind {
        let Some(header) = rows.first() else {
            return PlanTableKind::Unknown;
        };
        let first_column: Vec<&str> = rows
            .iter()
            .filter_map(|r| r.first().map(|c| c.as_str()))
            .collect();

        // A period marker in the first column settles it
        if first_column
            .iter()
            .skip(1)
            .any(|c| PeriodSplitter::has_period_marker(c))
        {
            return PlanTableKind::Schedule;
        }

        let mut text = header.join(" ");
        text.push(' ');
        text.push_str(&first_column.join(" "));

        let year_axis = first_column.iter().skip(1).any(|c| YEAR_CELL.is_match(c))
            || header.iter().skip(1).any(|c| YEAR_CELL.is_match(c));

        if contains_any(&text, BUDGET_KEYWORDS) || (year_axis && !contains_any(&text, SCHEDULE_KEYWORDS)) {
            PlanTableKind::Budget
        } else if contains_any(&text, SCHEDULE_KEYWORDS) {
            PlanTableKind::Schedule
        } else {
            PlanTableKind::Unknown
        }
    }
}
