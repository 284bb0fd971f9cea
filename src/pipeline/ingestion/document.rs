use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::RecordCategory;

/// One program document as handed to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Filled from the file stem when the document does not name itself
    #[serde(default)]
    pub document_id: String,
    pub document_year: i32,
    pub sub_projects: Vec<SubProjectSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubProjectSection {
    pub name: String,
    #[serde(default)]
    pub parent_name: Option<String>,
    /// Overrides the document year for this sub-project
    #[serde(default)]
    pub document_year: Option<i32>,
    #[serde(default)]
    pub overview: Vec<RawTable>,
    #[serde(default)]
    pub performance: Vec<RawTable>,
    #[serde(default)]
    pub plan: Vec<RawTable>,
}

/// A table exactly as the extraction step produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub page_index: u32,
    pub table_index: u32,
    #[serde(default)]
    pub data_year: Option<i32>,
    pub rows: Vec<Vec<Value>>,
}

impl SourceDocument {
    /// Keep only the first `n` sub-projects
    pub fn sample(mut self, n: usize) -> Self {
        self.sub_projects.truncate(n);
        self
    }

    pub fn table_count(&self) -> usize {
        self.sub_projects
            .iter()
            .map(|s| s.overview.len() + s.performance.len() + s.plan.len())
            .sum()
    }
}

impl SubProjectSection {
    pub fn new(name: &str, parent_name: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            parent_name: parent_name.map(|p| p.to_string()),
            document_year: None,
            overview: Vec::new(),
            performance: Vec::new(),
            plan: Vec::new(),
        }
    }

    pub fn tables(&self, category: RecordCategory) -> &[RawTable] {
        match category {
            RecordCategory::Overview => &self.overview,
            RecordCategory::Performance => &self.performance,
            RecordCategory::Plan => &self.plan,
        }
    }

    pub fn tables_mut(&mut self, category: RecordCategory) -> &mut Vec<RawTable> {
        match category {
            RecordCategory::Overview => &mut self.overview,
            RecordCategory::Performance => &mut self.performance,
            RecordCategory::Plan => &mut self.plan,
        }
    }
}
