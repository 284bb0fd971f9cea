//! Reader for the page/table JSON written by the PDF extraction step.
//!
//! The extractor knows nothing about sub-projects: it emits pages with their
//! full text and the tables found on them. Category and sub-project context
//! are recovered here from section headings and name rows, carried forward
//! from page to page.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::document::{RawTable, SourceDocument, SubProjectSection};
use crate::domain::RecordCategory;
use crate::error::Result;
use crate::pipeline::processing::parser::cell_text;

static DOCUMENT_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})년도").expect("document year pattern compiles"));
static PERFORMANCE_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4})년도\s*(?:주요)?\s*추진실적").expect("performance year pattern compiles")
});
static PLAN_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})년도\s*추진계획").expect("plan year pattern compiles"));
static SUB_PROJECT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"내역사업명\s*[:：]\s*([^\n]+)").expect("sub-project line pattern compiles")
});
static PARENT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"세부사업명\s*[:：]\s*([^\n]+)").expect("parent line pattern compiles"));

#[derive(Debug, Deserialize)]
struct PageDocument {
    pages: Vec<Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    page_number: Option<u32>,
    #[serde(default)]
    full_text: String,
    #[serde(default)]
    tables: Vec<PageTable>,
}

#[derive(Debug, Deserialize)]
struct PageTable {
    #[serde(default)]
    data: Vec<Vec<Value>>,
}

/// Section heading state carried across pages
#[derive(Debug, Clone, Copy)]
struct SectionState {
    category: RecordCategory,
    data_year: Option<i32>,
}

pub struct PageReader {
    default_document_year: i32,
}

impl PageReader {
    pub fn new(default_document_year: i32) -> Self {
        Self {
            default_document_year,
        }
    }

    pub fn read(&self, document_id: &str, value: Value) -> Result<SourceDocument> {
        let document: PageDocument = serde_json::from_value(value)?;
        let document_year = document
            .pages
            .iter()
            .find_map(|p| capture_year(&DOCUMENT_YEAR, &p.full_text))
            .unwrap_or(self.default_document_year);

        let mut sections: Vec<SubProjectSection> = Vec::new();
        let mut current: Option<usize> = None;
        let mut parent: Option<String> = None;
        let mut state = SectionState {
            category: RecordCategory::Overview,
            data_year: None,
        };
        let mut skipped = 0usize;

        for (position, page) in document.pages.iter().enumerate() {
            let page_index = page.page_number.unwrap_or(position as u32 + 1);
            state = Self::section_state(&page.full_text, state);

            if let Some(name) = first_capture(&PARENT_LINE, &page.full_text) {
                parent = Some(name);
            }
            if let Some(name) = first_capture(&SUB_PROJECT_LINE, &page.full_text) {
                current = Some(open_section(&mut sections, &name, parent.as_deref()));
            }

            for (table_index, table) in page.tables.iter().enumerate() {
                if table.data.is_empty() {
                    continue;
                }

                if let Some((name, table_parent)) = Self::sub_project_header(&table.data) {
                    if table_parent.is_some() {
                        parent = table_parent;
                    }
                    if let Some(name) = name {
                        current = Some(open_section(&mut sections, &name, parent.as_deref()));
                    }
                    continue;
                }

                let Some(index) = current else {
                    skipped += 1;
                    debug!(
                        "Skipping table {} on page {}: no sub-project opened yet",
                        table_index, page_index
                    );
                    continue;
                };

                sections[index].tables_mut(state.category).push(RawTable {
                    page_index,
                    table_index: table_index as u32,
                    data_year: state.data_year,
                    rows: table.data.clone(),
                });
            }
        }

        if skipped > 0 {
            info!(
                "Document '{}': skipped {} table(s) appearing before the first sub-project",
                document_id, skipped
            );
        }

        Ok(SourceDocument {
            document_id: document_id.to_string(),
            document_year,
            sub_projects: sections,
        })
    }

    fn section_state(text: &str, previous: SectionState) -> SectionState {
        if text.contains("(1)") && text.contains("사업개요") {
            SectionState {
                category: RecordCategory::Overview,
                data_year: None,
            }
        } else if text.contains("(2)") && text.contains("추진실적") {
            SectionState {
                category: RecordCategory::Performance,
                data_year: capture_year(&PERFORMANCE_YEAR, text),
            }
        } else if text.contains("(3)") && text.contains("추진계획") {
            SectionState {
                category: RecordCategory::Plan,
                data_year: capture_year(&PLAN_YEAR, text),
            }
        } else {
            previous
        }
    }

    /// A name table: rows keyed by 내역사업명 / 세부사업명.
    /// Returns `None` when the table is not one.
    fn sub_project_header(rows: &[Vec<Value>]) -> Option<(Option<String>, Option<String>)> {
        let mut name = None;
        let mut parent = None;
        for row in rows {
            let Some(key) = row.first().map(cell_text) else {
                continue;
            };
            let value = row
                .iter()
                .skip(1)
                .map(cell_text)
                .find(|v| !v.is_empty());
            if key.contains("내역사업명") {
                name = value.or(name);
            } else if key.contains("세부사업명") {
                parent = value.or(parent);
            }
        }
        (name.is_some() || parent.is_some()).then_some((name, parent))
    }
}

fn open_section(sections: &mut Vec<SubProjectSection>, name: &str, parent: Option<&str>) -> usize {
    let name = name.trim();
    if let Some(index) = sections
        .iter()
        .position(|s| s.name == name && s.parent_name.as_deref() == parent)
    {
        return index;
    }
    sections.push(SubProjectSection::new(name, parent));
    sections.len() - 1
}

fn capture_year(pattern: &Regex, text: &str) -> Option<i32> {
    pattern.captures(text)?.get(1)?.as_str().parse().ok()
}

fn first_capture(pattern: &Regex, text: &str) -> Option<String> {
    let value = pattern.captures(text)?.get(1)?.as_str().trim().to_string();
    (!value.is_empty()).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_pages() -> Value {
        json!({
            "pages": [
                {
                    "page_number": 1,
                    "full_text": "2024년도 생명공학육성시행계획",
                    "tables": [{ "data": [["구분", "내용"], ["비고", "표지"]] }]
                },
                {
                    "page_number": 2,
                    "full_text": "(1) 사업개요",
                    "tables": [
                        { "data": [["세부사업명", "바이오·의료기술개발"], ["내역사업명", "뇌연구"]] },
                        { "data": [["구분", "내용"], ["주관기관", "한국뇌연구원"]] }
                    ]
                },
                {
                    "page_number": 3,
                    "full_text": "(2) 2023년도 주요 추진실적",
                    "tables": [{ "data": [["특허", "국내출원", "1,001"]] }]
                },
                {
                    "page_number": 4,
                    "full_text": "(3) 2024년도 추진계획",
                    "tables": [{ "data": [["추진일정", "과제명"], ["1/4분기", "구축"]] }]
                },
                {
                    "page_number": 5,
                    "full_text": "계속",
                    "tables": [{ "data": [["연도", "정부"], ["2024", "100"]] }]
                }
            ]
        })
    }

    #[test]
    fn recovers_sections_from_headings() {
        let doc = PageReader::new(2020).read("sample", sample_pages()).unwrap();
        assert_eq!(doc.document_year, 2024);
        assert_eq!(doc.sub_projects.len(), 1);

        let section = &doc.sub_projects[0];
        assert_eq!(section.name, "뇌연구");
        assert_eq!(section.parent_name.as_deref(), Some("바이오·의료기술개발"));
        assert_eq!(section.overview.len(), 1);
        assert_eq!(section.overview[0].page_index, 2);
        assert_eq!(section.overview[0].table_index, 1);

        assert_eq!(section.performance.len(), 1);
        assert_eq!(section.performance[0].data_year, Some(2023));

        // Page 5 has no heading, so the plan section continues
        assert_eq!(section.plan.len(), 2);
        assert_eq!(section.plan[1].data_year, Some(2024));
    }

    #[test]
    fn performance_heading_without_the_qualifier_keeps_its_year() {
        let doc = PageReader::new(2026)
            .read(
                "plain",
                json!({
                    "pages": [
                        { "full_text": "2026년도 시행계획\n내역사업명: 뇌연구", "tables": [] },
                        {
                            "full_text": "(2) 2021년도 추진실적",
                            "tables": [{ "data": [["특허", "국내출원", "3"]] }]
                        }
                    ]
                }),
            )
            .unwrap();
        let section = &doc.sub_projects[0];
        assert_eq!(section.performance.len(), 1);
        assert_eq!(section.performance[0].data_year, Some(2021));
        assert_eq!(capture_year(&PERFORMANCE_YEAR, "(2) 2022년도 주요 추진실적"), Some(2022));
        assert_eq!(capture_year(&PERFORMANCE_YEAR, "2020년도 주 추진실적"), None);
    }

    #[test]
    fn falls_back_to_default_year() {
        let doc = PageReader::new(2022)
            .read("bare", json!({ "pages": [{ "full_text": "내역사업명: 뇌연구", "tables": [] }] }))
            .unwrap();
        assert_eq!(doc.document_year, 2022);
        assert_eq!(doc.sub_projects[0].name, "뇌연구");
    }
}
