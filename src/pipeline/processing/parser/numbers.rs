use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::domain::NumericValue;

/// Unit suffixes seen after figures in program tables, longest first so that
/// "백만원" is not read as "원".
pub const UNIT_SUFFIXES: &[&str] = &["백만원", "천원", "억원", "원", "건", "편", "명", "개", "%"];

/// Cell contents meaning "not applicable"
const NOT_APPLICABLE: &[&str] = &["-", "–", "—", "n/a", "na", "해당없음", "해당 없음", "없음"];

static PARENTHETICAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([^)]*)\)").expect("parenthetical pattern compiles"));

// Either a properly grouped number ("1,001", "12,345.6") or a plain one ("1001", "3.5")
static WELL_FORMED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?$").expect("number pattern compiles")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NumberParseError {
    #[error("empty cell")]
    Empty,
    #[error("not-applicable marker")]
    NotApplicable,
    #[error("negative value '{0}'")]
    Negative(String),
    #[error("malformed number '{0}'")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedNumber {
    pub value: NumericValue,
    pub unit: Option<String>,
    /// The token as it appeared in the source
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RejectedToken {
    pub token: String,
    pub reason: NumberParseError,
}

/// Result of scanning one line: numbers in order, label text, and tokens that
/// looked numeric but could not be parsed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineExtraction {
    pub values: Vec<ExtractedNumber>,
    pub labels: Vec<String>,
    pub rejected: Vec<RejectedToken>,
}

impl LineExtraction {
    pub fn label(&self) -> String {
        self.labels.join(" ")
    }

    fn absorb(&mut self, other: LineExtraction) {
        self.values.extend(other.values);
        self.labels.extend(other.labels);
        self.rejected.extend(other.rejected);
    }
}

/// Extracts numeric values from loosely formatted table text
pub struct TextNumberParser;

impl TextNumberParser {
    pub fn is_not_applicable(text: &str) -> bool {
        let lowered = text.trim().to_lowercase();
        NOT_APPLICABLE.contains(&lowered.as_str())
    }

    /// Parse a single cell or token into a value.
    pub fn parse_value(token: &str) -> Result<ExtractedNumber, NumberParseError> {
        let raw = token.trim();
        if raw.is_empty() {
            return Err(NumberParseError::Empty);
        }
        if Self::is_not_applicable(raw) {
            return Err(NumberParseError::NotApplicable);
        }

        let mut unit = None;
        for caps in PARENTHETICAL.captures_iter(raw) {
            let inner = caps[1].trim();
            if UNIT_SUFFIXES.contains(&inner) {
                unit = Some(inner.to_string());
            }
        }
        let stripped = PARENTHETICAL.replace_all(raw, "");
        let mut text = stripped.trim();

        for suffix in UNIT_SUFFIXES {
            if let Some(rest) = text.strip_suffix(suffix) {
                unit = Some(suffix.to_string());
                text = rest.trim_end();
                break;
            }
        }

        if let Some(rest) = text.strip_prefix('-').or_else(|| text.strip_prefix('−')) {
            if rest.chars().any(|c| c.is_ascii_digit()) {
                return Err(NumberParseError::Negative(raw.to_string()));
            }
        }
        let text = text.strip_prefix('+').unwrap_or(text);

        if !WELL_FORMED.is_match(text) {
            return Err(NumberParseError::Malformed(raw.to_string()));
        }

        let digits = text.replace(',', "");
        let value = if digits.contains('.') {
            digits
                .parse::<f64>()
                .map(NumericValue::Decimal)
                .map_err(|_| NumberParseError::Malformed(raw.to_string()))?
        } else {
            digits
                .parse::<u64>()
                .map(NumericValue::Integer)
                .map_err(|_| NumberParseError::Malformed(raw.to_string()))?
        };

        Ok(ExtractedNumber {
            value,
            unit,
            raw: raw.to_string(),
        })
    }

    /// Scan a whitespace-separated text line.
    pub fn parse_line(line: &str) -> LineExtraction {
        let cleaned = PARENTHETICAL.replace_all(line, " ");
        let mut extraction = LineExtraction::default();

        for token in cleaned.split_whitespace() {
            if Self::is_not_applicable(token) {
                continue;
            }
            if !Self::looks_numeric(token) {
                extraction.labels.push(token.to_string());
                continue;
            }
            match Self::parse_value(token) {
                Ok(number) => extraction.values.push(number),
                Err(reason) => extraction.rejected.push(RejectedToken {
                    token: token.to_string(),
                    reason,
                }),
            }
        }

        extraction
    }

    /// Scan the cells of a table row in order. A cell that parses as a whole
    /// (e.g. "1,234 (건)") yields one value; anything else is scanned as a line.
    pub fn parse_cells<S: AsRef<str>>(cells: &[S]) -> LineExtraction {
        let mut extraction = LineExtraction::default();

        for cell in cells {
            let text = cell.as_ref().trim();
            if text.is_empty() || Self::is_not_applicable(text) {
                continue;
            }
            if Self::looks_numeric(text) {
                if let Ok(number) = Self::parse_value(text) {
                    extraction.values.push(number);
                    continue;
                }
            }
            extraction.absorb(Self::parse_line(text));
        }

        extraction
    }

    /// Numeric candidates start with a digit, optionally behind a sign
    fn looks_numeric(token: &str) -> bool {
        let body = token
            .strip_prefix('+')
            .or_else(|| token.strip_prefix('-'))
            .or_else(|| token.strip_prefix('−'))
            .unwrap_or(token);
        body.chars().next().is_some_and(|c| c.is_ascii_digit())
    }
}
