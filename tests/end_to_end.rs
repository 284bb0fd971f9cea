use std::path::PathBuf;

use program_ledger::app::normalize_use_case::NormalizeDocumentsUseCase;
use program_ledger::config::{EngineConfig, IntegrityMode, YearRoundPolicy};
use program_ledger::domain::{
    BudgetType, IndicatorCategory, IndicatorType, NumericValue, Quarter, RecordCategory,
};
use program_ledger::infra::NdjsonRecordSetSink;
use program_ledger::pipeline::ingestion::{document_from_value, load_document, load_documents, SourceDocument};
use program_ledger::pipeline::{NormalizationEngine, RunOutput};
use serde_json::Value;
use tempfile::TempDir;

fn resource(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("resources")
        .join(name)
}

fn structured() -> SourceDocument {
    let value: Value = serde_json::from_str(include_str!("resources/structured_document.json")).unwrap();
    document_from_value("structured", value, &EngineConfig::default()).unwrap()
}

fn run(config: EngineConfig, documents: &[SourceDocument]) -> RunOutput {
    NormalizationEngine::new(config).run(documents).unwrap()
}

#[test]
fn structured_document_produces_all_six_sets() {
    let output = run(EngineConfig::default(), &[structured()]);
    let sets = &output.record_sets;

    assert_eq!(sets.sub_projects.len(), 2);
    assert_eq!(sets.raw_records.len(), 7);
    assert_eq!(sets.schedules.len(), 4);
    assert_eq!(sets.performances.len(), 3);
    assert_eq!(sets.budgets.len(), 5);
    assert_eq!(sets.overviews.len(), 2);

    assert!(output.parse_report.is_empty(), "{:?}", output.parse_report.warnings);
    assert!(output.integrity_report.issues.is_empty(), "{:?}", output.integrity_report.issues);
    assert_eq!(output.integrity_report.statistics.schedules, 4);
}

#[test]
fn patent_line_becomes_one_typed_row() {
    let output = run(EngineConfig::default(), &[structured()]);
    let patents: Vec<_> = output
        .record_sets
        .performances
        .iter()
        .filter(|p| p.indicator_category == IndicatorCategory::Patents)
        .collect();

    assert_eq!(patents.len(), 1);
    assert_eq!(patents[0].indicator_type, IndicatorType::DomesticFiled);
    assert_eq!(patents[0].value, NumericValue::Integer(1001));
    assert_eq!(patents[0].unit, "건");
    assert_eq!(patents[0].source_year, Some(2023));
}

#[test]
fn quarter_range_fans_out_with_original_text() {
    let output = run(EngineConfig::default(), &[structured()]);
    let mapping: Vec<_> = output
        .record_sets
        .schedules
        .iter()
        .filter(|s| s.task_description == "brain-mapping construction")
        .collect();

    assert_eq!(mapping.len(), 2);
    assert_eq!(mapping[0].quarter, Quarter::new(1));
    assert_eq!(mapping[1].quarter, Quarter::new(2));
    assert!(mapping.iter().all(|s| s.original_period == "1/4분기~2/4분기"));
    assert!(mapping.iter().all(|s| s.detail.as_deref() == Some("1단계")));
    assert_eq!(mapping[1].month_start, Some(4));
    assert_eq!(mapping[1].month_end, Some(6));
}

#[test]
fn repeated_sub_project_names_share_one_id() {
    let output = run(EngineConfig::default(), &[structured()]);
    let sets = &output.record_sets;

    let next_gen: Vec<_> = sets
        .sub_projects
        .iter()
        .filter(|s| s.name == "Next-Gen Bio")
        .collect();
    assert_eq!(next_gen.len(), 1);
    let id = next_gen[0].id;

    let overview = sets.overviews.iter().find(|o| o.sub_project_id == id).unwrap();
    assert_eq!(overview.research_period.as_deref(), Some("2022~2026"));
    assert_eq!(overview.content.as_deref(), Some("플랫폼 고도화"));
    assert_eq!(
        sets.raw_records.iter().filter(|r| r.sub_project_id == id).count(),
        3
    );

    assert_eq!(output.integrity_report.orphan_count(), 0);
    assert_eq!(output.integrity_report.duplicate_overview_count(), 0);
}

#[test]
fn budget_table_skips_totals_and_blank_cells() {
    let output = run(EngineConfig::default(), &[structured()]);
    let budgets = &output.record_sets.budgets;

    assert_eq!(budgets.len(), 5);
    assert!(budgets.iter().all(|b| b.unit == "백만원"));

    let actual_2023: Vec<_> = budgets.iter().filter(|b| b.budget_year == 2023).collect();
    assert_eq!(actual_2023.len(), 2);
    assert!(actual_2023.iter().all(|b| b.is_actual));

    let planned_2025: Vec<_> = budgets.iter().filter(|b| b.budget_year == 2025).collect();
    assert_eq!(planned_2025.len(), 1);
    assert_eq!(planned_2025[0].budget_type, BudgetType::Government);
    assert_eq!(planned_2025[0].amount, NumericValue::Integer(200));
    assert!(!planned_2025[0].is_actual);
}

#[test]
fn year_round_policy_controls_fan_out() {
    let count = |policy: YearRoundPolicy| {
        let output = run(EngineConfig::default().with_year_round_policy(policy), &[structured()]);
        output
            .record_sets
            .schedules
            .iter()
            .filter(|s| s.original_period == "연중")
            .map(|s| s.quarter.map(|q| q.value()))
            .collect::<Vec<_>>()
    };

    assert_eq!(count(YearRoundPolicy::Sentinel), vec![Some(0)]);
    assert_eq!(
        count(YearRoundPolicy::ExpandQuarters),
        vec![Some(1), Some(2), Some(3), Some(4)]
    );
    assert_eq!(
        count(YearRoundPolicy::ExpandQuartersWithSentinel),
        vec![Some(1), Some(2), Some(3), Some(4), Some(0)]
    );
}

#[test]
fn page_document_is_read_and_normalized() {
    let document = load_document(&resource("page_document.json"), &EngineConfig::default()).unwrap();
    assert_eq!(document.document_id, "page_document");
    assert_eq!(document.document_year, 2024);
    assert_eq!(document.sub_projects.len(), 1);
    assert_eq!(document.sub_projects[0].parent_name.as_deref(), Some("뇌과학 원천기술개발"));

    let output = run(EngineConfig::default(), &[document]);
    let sets = &output.record_sets;

    assert_eq!(sets.raw_records.len(), 4);
    assert_eq!(
        sets.raw_records.iter().filter(|r| r.category == RecordCategory::Plan).count(),
        2
    );

    // Four positional patent values plus two human-resource values
    assert_eq!(sets.performances.len(), 6);
    assert!(sets.performances.iter().all(|p| p.source_year == Some(2023)));
    assert_eq!(
        sets.performances
            .iter()
            .filter(|p| p.indicator_category == IndicatorCategory::Patents)
            .count(),
        4
    );

    let quarters: Vec<_> = sets.schedules.iter().map(|s| s.quarter.map(|q| q.value())).collect();
    assert_eq!(quarters, vec![Some(1), Some(2), Some(3)]);

    assert_eq!(sets.budgets.len(), 3);
    assert_eq!(sets.overviews.len(), 1);
    assert_eq!(sets.overviews[0].managing_organization.as_deref(), Some("한국뇌연구원"));
}

#[test]
fn directory_input_runs_every_document() {
    let temp = TempDir::new().unwrap();
    std::fs::copy(resource("structured_document.json"), temp.path().join("a.json")).unwrap();
    std::fs::copy(resource("page_document.json"), temp.path().join("b.json")).unwrap();
    std::fs::write(temp.path().join("notes.txt"), "ignored").unwrap();

    let documents = load_documents(temp.path(), &EngineConfig::default()).unwrap();
    assert_eq!(documents.len(), 2);

    let output = run(EngineConfig::default(), &documents);
    assert_eq!(output.record_sets.sub_projects.len(), 3);
    assert!(!output.integrity_report.has_violations());
}

#[test]
fn sampling_keeps_leading_sub_projects() {
    let output = run(EngineConfig::default(), &[structured().sample(1)]);
    assert_eq!(output.record_sets.sub_projects.len(), 1);
    assert_eq!(output.record_sets.sub_projects[0].name, "차세대 바이오");
}

#[tokio::test]
async fn strict_and_lenient_runs_write_output() {
    for mode in [IntegrityMode::Strict, IntegrityMode::Lenient] {
        let temp = TempDir::new().unwrap();
        let use_case = NormalizeDocumentsUseCase::new(
            NormalizationEngine::new(EngineConfig::default().with_integrity_mode(mode)),
            Box::new(NdjsonRecordSetSink::new(temp.path())),
        );

        let output = use_case.execute(&[structured()]).await.unwrap();
        let budgets = std::fs::read_to_string(temp.path().join("normalized_budgets.ndjson")).unwrap();
        assert_eq!(budgets.lines().count(), output.record_sets.budgets.len());

        let report: Value =
            serde_json::from_str(&std::fs::read_to_string(temp.path().join("integrity_report.json")).unwrap())
                .unwrap();
        assert_eq!(report["statistics"]["budgets"], 5);
    }
}
