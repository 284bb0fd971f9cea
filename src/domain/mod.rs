//! Record shapes shared by the normalizers, the validator and the sinks.
//!
//! Every normalized record carries an explicit surrogate id and foreign keys to
//! its owning [`SubProject`] and the [`RawRecord`] it was derived from, so the
//! sets can be inserted into relational tables with cascading deletes on the
//! sub-project key.

pub mod record_sets;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use record_sets::{AbsorbOutcome, Admission, IdAllocator, RecordSetStatistics, RecordSets};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubProjectId(pub u64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecordId(pub u64);

impl fmt::Display for SubProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RawRecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Section of a program document a raw table came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordCategory {
    Overview,
    Performance,
    Plan,
}

impl RecordCategory {
    pub const ALL: [RecordCategory; 3] = [
        RecordCategory::Overview,
        RecordCategory::Performance,
        RecordCategory::Plan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordCategory::Overview => "overview",
            RecordCategory::Performance => "performance",
            RecordCategory::Plan => "plan",
        }
    }
}

impl fmt::Display for RecordCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The grouping entity all normalized data hangs off
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubProject {
    pub id: SubProjectId,
    pub project_code: String,
    pub name: String,
    pub parent_name: Option<String>,
    pub document_year: i32,
}

/// Verbatim audit copy of a source table. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: RawRecordId,
    pub sub_project_id: SubProjectId,
    pub category: RecordCategory,
    pub data_year: Option<i32>,
    pub payload: serde_json::Value,
    pub page_index: u32,
    pub table_index: u32,
    /// Hex SHA-256 of the payload's JSON serialization
    pub content_sha256: String,
}

/// A non-negative number extracted from source text.
///
/// Integers stay integers so thousands-separated counts survive exactly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericValue {
    Integer(u64),
    Decimal(f64),
}

impl NumericValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            NumericValue::Integer(v) => *v as f64,
            NumericValue::Decimal(v) => *v,
        }
    }

    pub fn is_negative(&self) -> bool {
        matches!(self, NumericValue::Decimal(v) if *v < 0.0)
    }
}

impl fmt::Display for NumericValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericValue::Integer(v) => write!(f, "{}", v),
            // Keep a fractional part so the text re-parses as a decimal
            NumericValue::Decimal(v) if v.fract() == 0.0 => write!(f, "{:.1}", v),
            NumericValue::Decimal(v) => write!(f, "{}", v),
        }
    }
}

/// Quarter of a year, or the year-round sentinel 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Quarter(u8);

impl Quarter {
    pub const YEAR_ROUND: Quarter = Quarter(0);

    /// A calendar quarter, 1 through 4
    pub fn new(quarter: u8) -> Option<Self> {
        (1..=4).contains(&quarter).then_some(Quarter(quarter))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn is_year_round(&self) -> bool {
        self.0 == 0
    }

    pub fn month_start(&self) -> u32 {
        if self.is_year_round() {
            1
        } else {
            (self.0 as u32 - 1) * 3 + 1
        }
    }

    pub fn month_end(&self) -> u32 {
        if self.is_year_round() {
            12
        } else {
            self.0 as u32 * 3
        }
    }

    /// First and last calendar day covered in `year`
    pub fn date_bounds(&self, year: i32) -> Option<(NaiveDate, NaiveDate)> {
        let start = NaiveDate::from_ymd_opt(year, self.month_start(), 1)?;
        let end_month = self.month_end();
        let end = if end_month == 12 {
            NaiveDate::from_ymd_opt(year, 12, 31)?
        } else {
            NaiveDate::from_ymd_opt(year, end_month + 1, 1)?.pred_opt()?
        };
        Some((start, end))
    }
}

impl TryFrom<u8> for Quarter {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value <= 4 {
            Ok(Quarter(value))
        } else {
            Err(format!("quarter {} is outside 0..=4", value))
        }
    }
}

impl From<Quarter> for u8 {
    fn from(quarter: Quarter) -> Self {
        quarter.0
    }
}

/// One atomic period of planned work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSchedule {
    /// Assigned when the record is pushed into [`RecordSets`]
    pub id: u64,
    pub sub_project_id: SubProjectId,
    pub raw_record_id: RawRecordId,
    pub year: i32,
    /// `None` when the period text could not be parsed
    pub quarter: Option<Quarter>,
    pub month_start: Option<u32>,
    pub month_end: Option<u32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub task_category: String,
    pub task_description: String,
    pub detail: Option<String>,
    pub original_period: String,
    pub period_parsed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndicatorCategory {
    Patents,
    Papers,
    TechnologyTransfer,
    HumanResources,
    Unclassified,
}

impl IndicatorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorCategory::Patents => "patents",
            IndicatorCategory::Papers => "papers",
            IndicatorCategory::TechnologyTransfer => "technology-transfer",
            IndicatorCategory::HumanResources => "human-resources",
            IndicatorCategory::Unclassified => "unclassified",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IndicatorType {
    #[serde(rename = "domestic-filed")]
    DomesticFiled,
    #[serde(rename = "domestic-registered")]
    DomesticRegistered,
    #[serde(rename = "foreign-filed")]
    ForeignFiled,
    #[serde(rename = "foreign-registered")]
    ForeignRegistered,
    #[serde(rename = "SCIE")]
    Scie,
    #[serde(rename = "IF10-above")]
    ScieIf10,
    #[serde(rename = "IF20-above")]
    ScieIf20,
    #[serde(rename = "non-SCIE")]
    NonScie,
    #[serde(rename = "transfer-count")]
    TransferCount,
    #[serde(rename = "transfer-amount")]
    TransferAmount,
    #[serde(rename = "phd-graduates")]
    PhdGraduates,
    #[serde(rename = "master-graduates")]
    MasterGraduates,
    #[serde(rename = "participants")]
    Participants,
    #[serde(rename = "unclassified")]
    Unclassified,
}

impl IndicatorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorType::DomesticFiled => "domestic-filed",
            IndicatorType::DomesticRegistered => "domestic-registered",
            IndicatorType::ForeignFiled => "foreign-filed",
            IndicatorType::ForeignRegistered => "foreign-registered",
            IndicatorType::Scie => "SCIE",
            IndicatorType::ScieIf10 => "IF10-above",
            IndicatorType::ScieIf20 => "IF20-above",
            IndicatorType::NonScie => "non-SCIE",
            IndicatorType::TransferCount => "transfer-count",
            IndicatorType::TransferAmount => "transfer-amount",
            IndicatorType::PhdGraduates => "phd-graduates",
            IndicatorType::MasterGraduates => "master-graduates",
            IndicatorType::Participants => "participants",
            IndicatorType::Unclassified => "unclassified",
        }
    }
}

/// One measured indicator value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPerformance {
    pub id: u64,
    pub sub_project_id: SubProjectId,
    pub raw_record_id: RawRecordId,
    pub indicator_category: IndicatorCategory,
    pub indicator_type: IndicatorType,
    pub value: NumericValue,
    pub unit: String,
    pub source_year: Option<i32>,
    pub original_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetType {
    Government,
    Private,
    Local,
    Other,
}

impl BudgetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetType::Government => "government",
            BudgetType::Private => "private",
            BudgetType::Local => "local",
            BudgetType::Other => "other",
        }
    }
}

/// One (year, type) budget figure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBudget {
    pub id: u64,
    pub sub_project_id: SubProjectId,
    pub raw_record_id: RawRecordId,
    pub budget_year: i32,
    pub budget_type: BudgetType,
    pub amount: NumericValue,
    pub unit: String,
    /// true for executed/historical figures, false for planned ones
    pub is_actual: bool,
    pub original_text: String,
}

/// Descriptive fields of a sub-project; at most one per sub-project
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalizedOverview {
    pub id: u64,
    pub sub_project_id: SubProjectId,
    pub raw_record_id: RawRecordId,
    pub managing_organization: Option<String>,
    pub supervising_organization: Option<String>,
    pub project_type: Option<String>,
    pub research_period: Option<String>,
    pub total_budget_text: Option<String>,
    pub representative_field: Option<String>,
    pub objectives: Option<String>,
    pub content: Option<String>,
}

impl NormalizedOverview {
    /// Fill empty fields from `other`. Returns the names of fields where both
    /// sides carry different values; those keep the existing value.
    pub fn merge_from(&mut self, other: &NormalizedOverview) -> Vec<&'static str> {
        let mut conflicts = Vec::new();
        let pairs: [(&'static str, &mut Option<String>, &Option<String>); 8] = [
            ("managing_organization", &mut self.managing_organization, &other.managing_organization),
            ("supervising_organization", &mut self.supervising_organization, &other.supervising_organization),
            ("project_type", &mut self.project_type, &other.project_type),
            ("research_period", &mut self.research_period, &other.research_period),
            ("total_budget_text", &mut self.total_budget_text, &other.total_budget_text),
            ("representative_field", &mut self.representative_field, &other.representative_field),
            ("objectives", &mut self.objectives, &other.objectives),
            ("content", &mut self.content, &other.content),
        ];

        for (name, mine, theirs) in pairs {
            match (mine.as_ref(), theirs.as_ref()) {
                (None, Some(value)) => *mine = Some(value.clone()),
                (Some(a), Some(b)) if a != b => conflicts.push(name),
                _ => {}
            }
        }

        conflicts
    }

    pub fn is_empty(&self) -> bool {
        self.managing_organization.is_none()
            && self.supervising_organization.is_none()
            && self.project_type.is_none()
            && self.research_period.is_none()
            && self.total_budget_text.is_none()
            && self.representative_field.is_none()
            && self.objectives.is_none()
            && self.content.is_none()
    }
}

/// The normalized entities a category normalizer can emit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NormalizedRecord {
    Schedule(NormalizedSchedule),
    Performance(NormalizedPerformance),
    Budget(NormalizedBudget),
    Overview(NormalizedOverview),
}

impl NormalizedRecord {
    pub fn sub_project_id(&self) -> SubProjectId {
        match self {
            NormalizedRecord::Schedule(r) => r.sub_project_id,
            NormalizedRecord::Performance(r) => r.sub_project_id,
            NormalizedRecord::Budget(r) => r.sub_project_id,
            NormalizedRecord::Overview(r) => r.sub_project_id,
        }
    }

    pub fn set_name(&self) -> &'static str {
        match self {
            NormalizedRecord::Schedule(_) => "normalized_schedules",
            NormalizedRecord::Performance(_) => "normalized_performances",
            NormalizedRecord::Budget(_) => "normalized_budgets",
            NormalizedRecord::Overview(_) => "normalized_overviews",
        }
    }
}
