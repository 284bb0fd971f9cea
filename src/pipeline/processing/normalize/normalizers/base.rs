use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::domain::{NormalizedRecord, RecordCategory};
use crate::pipeline::ingestion::RawTable;
use crate::pipeline::processing::normalize::{NormalizationContext, ParseReport};
use crate::pipeline::processing::parser::row_texts;

/// Trait for turning one raw table of a category into normalized records.
///
/// Normalizers never fail: anything they cannot interpret is reported to the
/// [`ParseReport`] and the raw table stays available as its audit copy.
pub trait CategoryNormalizer: Send + Sync {
    fn category(&self) -> RecordCategory;

    fn normalize(
        &self,
        ctx: &NormalizationContext<'_>,
        table: &RawTable,
        report: &mut ParseReport,
    ) -> Vec<NormalizedRecord>;
}

/// Common helpers for the category normalizers
pub struct NormalizerUtils;

impl NormalizerUtils {
    /// Table rows as trimmed text, with fully blank rows removed
    pub fn text_rows(table: &RawTable) -> Vec<Vec<String>> {
        table
            .rows
            .iter()
            .map(|row| row_texts(row))
            .filter(|row| row.iter().any(|c| !c.is_empty()))
            .collect()
    }

    /// Non-empty cells joined with single spaces
    pub fn row_line(row: &[String]) -> String {
        row.iter()
            .filter(|c| !c.is_empty())
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Rows marked with a 구분 cell are header rows
    pub fn is_header_marker_row(row: &[String]) -> bool {
        row.iter().any(|c| c == "구분")
    }

    /// Text before the first '-' of a task, trimmed; empty when there is none
    pub fn task_category(task: &str) -> String {
        match task.split_once('-') {
            Some((head, _)) => head.trim().to_string(),
            None => String::new(),
        }
    }

    /// Hex SHA-256 of a payload's JSON serialization
    pub fn payload_sha256(payload: &Value) -> String {
        let bytes = serde_json::to_vec(payload).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }
}
