// Pipeline ingestion: input documents, format detection and schema checks

pub mod document;
pub mod page_reader;
pub mod schema;

pub use document::{RawTable, SourceDocument, SubProjectSection};
pub use page_reader::PageReader;
pub use schema::validate_source_document;

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{NormalizeError, Result};
use crate::observability::metrics;

/// The two input shapes the loader understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// `{ "document_year", "sub_projects": [...] }`
    Structured,
    /// `{ "pages": [ { "full_text", "tables" } ] }` from the extraction step
    Pages,
}

impl InputFormat {
    pub fn detect(value: &Value) -> Option<Self> {
        if value.get("sub_projects").is_some() {
            Some(InputFormat::Structured)
        } else if value.get("pages").is_some() {
            Some(InputFormat::Pages)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InputFormat::Structured => "structured",
            InputFormat::Pages => "pages",
        }
    }
}

/// Parse an in-memory JSON value into a document
pub fn document_from_value(document_id: &str, value: Value, config: &EngineConfig) -> Result<SourceDocument> {
    let format = InputFormat::detect(&value).ok_or_else(|| {
        metrics::ingest::document_rejected("unknown_format");
        NormalizeError::UnsupportedInput(format!(
            "'{}' has neither 'sub_projects' nor 'pages'",
            document_id
        ))
    })?;

    let document = match format {
        InputFormat::Structured => {
            if let Err(e) = validate_source_document(&value) {
                metrics::ingest::document_rejected("schema");
                return Err(e);
            }
            let mut document: SourceDocument = serde_json::from_value(value)?;
            if document.document_id.is_empty() {
                document.document_id = document_id.to_string();
            }
            document
        }
        InputFormat::Pages => PageReader::new(config.default_document_year).read(document_id, value)?,
    };

    metrics::ingest::document_loaded(format.as_str());
    debug!(
        "Loaded '{}' ({}): {} sub-project(s), {} table(s)",
        document.document_id,
        format.as_str(),
        document.sub_projects.len(),
        document.table_count()
    );
    Ok(document)
}

/// Load one JSON file
pub fn load_document(path: &Path, config: &EngineConfig) -> Result<SourceDocument> {
    let content = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)?;
    let document_id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document")
        .to_string();
    document_from_value(&document_id, value, config)
}

/// Load a file, or every `*.json` file in a directory in name order
pub fn load_documents(input: &Path, config: &EngineConfig) -> Result<Vec<SourceDocument>> {
    if input.is_file() {
        return Ok(vec![load_document(input, config)?]);
    }
    if !input.is_dir() {
        return Err(NormalizeError::UnsupportedInput(format!(
            "input '{}' does not exist",
            input.display()
        )));
    }

    let mut paths: Vec<PathBuf> = fs::read_dir(input)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    paths.sort();

    if paths.is_empty() {
        warn!("No JSON documents found in {}", input.display());
    }

    let documents = paths
        .iter()
        .map(|p| load_document(p, config))
        .collect::<Result<Vec<_>>>()?;
    info!("Loaded {} document(s) from {}", documents.len(), input.display());
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_input_format() {
        assert_eq!(
            InputFormat::detect(&json!({"sub_projects": []})),
            Some(InputFormat::Structured)
        );
        assert_eq!(InputFormat::detect(&json!({"pages": []})), Some(InputFormat::Pages));
        assert_eq!(InputFormat::detect(&json!({"rows": []})), None);
    }

    #[test]
    fn structured_document_takes_file_stem_as_id() {
        let doc = document_from_value(
            "bio_2024",
            json!({ "document_year": 2024, "sub_projects": [] }),
            &EngineConfig::default(),
        )
        .unwrap();
        assert_eq!(doc.document_id, "bio_2024");
    }

    #[test]
    fn schema_failures_stop_loading() {
        let result = document_from_value(
            "broken",
            json!({ "sub_projects": [{ "name": "A" }] }),
            &EngineConfig::default(),
        );
        assert!(matches!(result, Err(NormalizeError::Schema { .. })));
    }

    #[test]
    fn directory_loads_json_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("b.json"),
            r#"{"document_year": 2024, "sub_projects": [{"name": "B"}]}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("a.json"),
            r#"{"document_year": 2024, "sub_projects": [{"name": "A"}]}"#,
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let docs = load_documents(dir.path(), &EngineConfig::default()).unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.document_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
