//! Text-level parsers shared by the category normalizers.

pub mod numbers;
pub mod period;

pub use numbers::{ExtractedNumber, LineExtraction, NumberParseError, TextNumberParser};
pub use period::{AtomicPeriod, PeriodKind, PeriodSplit, PeriodSplitter};

use serde_json::Value;

/// Render a table cell as trimmed text. Null cells become empty strings.
pub fn cell_text(cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

pub fn row_texts(row: &[Value]) -> Vec<String> {
    row.iter().map(cell_text).collect()
}

/// Case-insensitive keyword containment
pub fn contains_any(text: &str, keywords: &[&str]) -> bool {
    let lowered = text.to_lowercase();
    keywords.iter().any(|k| lowered.contains(&k.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cells_render_as_trimmed_text() {
        assert_eq!(cell_text(&json!("  특허 ")), "특허");
        assert_eq!(cell_text(&json!(1001)), "1001");
        assert_eq!(cell_text(&json!(null)), "");
    }

    #[test]
    fn keyword_match_ignores_ascii_case() {
        assert!(contains_any("SCIE 논문", &["scie"]));
        assert!(!contains_any("특허", &["논문"]));
    }
}
