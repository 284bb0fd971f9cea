use super::base::{CategoryNormalizer, NormalizerUtils};
use crate::domain::{NormalizedOverview, NormalizedRecord, RecordCategory};
use crate::pipeline::ingestion::RawTable;
use crate::pipeline::processing::normalize::{NormalizationContext, ParseReport, ParseWarningKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OverviewField {
    ManagingOrganization,
    SupervisingOrganization,
    ProjectType,
    ResearchPeriod,
    TotalBudget,
    RepresentativeField,
    Objectives,
    Content,
}

// Matched against keys with spaces removed
const FIELD_KEYWORDS: &[(&str, OverviewField)] = &[
    ("주관기관", OverviewField::ManagingOrganization),
    ("관리기관", OverviewField::SupervisingOrganization),
    ("전문기관", OverviewField::SupervisingOrganization),
    ("사업성격", OverviewField::ProjectType),
    ("연구기간", OverviewField::ResearchPeriod),
    ("총연구비", OverviewField::TotalBudget),
    ("총사업비", OverviewField::TotalBudget),
    ("대표분야", OverviewField::RepresentativeField),
    ("사업목표", OverviewField::Objectives),
    ("사업내용", OverviewField::Content),
];

impl OverviewField {
    fn from_key(key: &str) -> Option<Self> {
        let compact: String = key.chars().filter(|c| !c.is_whitespace()).collect();
        FIELD_KEYWORDS
            .iter()
            .find(|(keyword, _)| compact.contains(keyword))
            .map(|(_, field)| *field)
    }

    fn name(&self) -> &'static str {
        match self {
            OverviewField::ManagingOrganization => "managing_organization",
            OverviewField::SupervisingOrganization => "supervising_organization",
            OverviewField::ProjectType => "project_type",
            OverviewField::ResearchPeriod => "research_period",
            OverviewField::TotalBudget => "total_budget_text",
            OverviewField::RepresentativeField => "representative_field",
            OverviewField::Objectives => "objectives",
            OverviewField::Content => "content",
        }
    }

    fn slot<'a>(&self, overview: &'a mut NormalizedOverview) -> &'a mut Option<String> {
        match self {
            OverviewField::ManagingOrganization => &mut overview.managing_organization,
            OverviewField::SupervisingOrganization => &mut overview.supervising_organization,
            OverviewField::ProjectType => &mut overview.project_type,
            OverviewField::ResearchPeriod => &mut overview.research_period,
            OverviewField::TotalBudget => &mut overview.total_budget_text,
            OverviewField::RepresentativeField => &mut overview.representative_field,
            OverviewField::Objectives => &mut overview.objectives,
            OverviewField::Content => &mut overview.content,
        }
    }
}

/// Normalizer for key/value overview tables (`key, value[, key, value]`).
/// Keys with no mapped field stay only in the raw record.
pub struct OverviewNormalizer;

impl OverviewNormalizer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OverviewNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl CategoryNormalizer for OverviewNormalizer {
    fn category(&self) -> RecordCategory {
        RecordCategory::Overview
    }

    fn normalize(
        &self,
        ctx: &NormalizationContext<'_>,
        table: &RawTable,
        report: &mut ParseReport,
    ) -> Vec<NormalizedRecord> {
        let mut overview = NormalizedOverview {
            sub_project_id: ctx.sub_project_id,
            raw_record_id: ctx.raw_record_id,
            ..Default::default()
        };

        for row in NormalizerUtils::text_rows(table) {
            for pair in row.chunks(2) {
                let [key, value] = pair else { continue };
                if value.is_empty() {
                    continue;
                }
                let Some(field) = OverviewField::from_key(key) else {
                    continue;
                };

                let slot = field.slot(&mut overview);
                if slot.is_none() {
                    *slot = Some(value.clone());
                } else if slot.as_deref() != Some(value.as_str()) {
                    report.push(ctx.warning(
                        ParseWarningKind::OverviewConflict,
                        format!(
                            "{} given as both '{}' and '{}'; keeping the first",
                            field.name(),
                            slot.as_deref().unwrap_or_default(),
                            value
                        ),
                    ));
                }
            }
        }

        if overview.is_empty() {
            return Vec::new();
        }
        vec![NormalizedRecord::Overview(overview)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::domain::{RawRecordId, SubProjectId};
    use serde_json::json;

    fn run(rows: serde_json::Value) -> (Vec<NormalizedRecord>, ParseReport) {
        let config = EngineConfig::default();
        let ctx = NormalizationContext {
            sub_project_id: SubProjectId(1),
            raw_record_id: RawRecordId(1),
            document_year: 2024,
            data_year: None,
            config: &config,
        };
        let table = RawTable {
            page_index: 2,
            table_index: 0,
            data_year: None,
            rows: serde_json::from_value(rows).unwrap(),
        };
        let mut report = ParseReport::new();
        let records = OverviewNormalizer::new().normalize(&ctx, &table, &mut report);
        (records, report)
    }

    #[test]
    fn maps_two_and_four_column_rows() {
        let (records, report) = run(json!([
            ["구분", "내용"],
            ["사업목표", "뇌과학 원천기술 확보"],
            ["주관기관", "한국뇌연구원", "전문기관", "한국연구재단"],
            ["총 연구비", "1,200억원", "연구기간", "2020~2027"],
            ["담당부처", "과학기술정보통신부"]
        ]));

        assert!(report.is_empty());
        let NormalizedRecord::Overview(overview) = &records[0] else {
            panic!("expected an overview");
        };
        assert_eq!(overview.objectives.as_deref(), Some("뇌과학 원천기술 확보"));
        assert_eq!(overview.managing_organization.as_deref(), Some("한국뇌연구원"));
        assert_eq!(overview.supervising_organization.as_deref(), Some("한국연구재단"));
        assert_eq!(overview.total_budget_text.as_deref(), Some("1,200억원"));
        assert_eq!(overview.research_period.as_deref(), Some("2020~2027"));
        assert!(overview.content.is_none());
    }

    #[test]
    fn conflicting_keys_keep_first_value() {
        let (records, report) = run(json!([
            ["주관기관", "A기관"],
            ["주관기관", "B기관"]
        ]));
        let NormalizedRecord::Overview(overview) = &records[0] else {
            panic!("expected an overview");
        };
        assert_eq!(overview.managing_organization.as_deref(), Some("A기관"));
        assert_eq!(report.count(ParseWarningKind::OverviewConflict), 1);
    }

    #[test]
    fn table_without_known_keys_emits_nothing() {
        let (records, _) = run(json!([["담당부처", "과학기술정보통신부"]]));
        assert!(records.is_empty());
    }
}
