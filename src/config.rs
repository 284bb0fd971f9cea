use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{NormalizeError, Result};

/// How a year-round schedule marker expands into atomic periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum YearRoundPolicy {
    /// One row with quarter sentinel 0 spanning the whole year
    #[default]
    Sentinel,
    /// One row per quarter 1..=4
    ExpandQuarters,
    /// One row per quarter 1..=4 followed by the sentinel row
    ExpandQuartersWithSentinel,
}

/// Whether integrity violations abort a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityMode {
    /// Any violation fails the run before record sets are handed off
    #[default]
    Strict,
    /// Violations are logged and the run proceeds
    Lenient,
}

/// Immutable engine configuration supplied by the caller.
///
/// The engine never reads files or the environment on its own; the CLI builds
/// one of these from a TOML file plus flags and passes it in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub year_round_policy: YearRoundPolicy,
    pub integrity_mode: IntegrityMode,
    /// Accepted distance in years between a budget year and the document year
    pub budget_year_window: u32,
    /// Offset from the document year for performance figures; `None` leaves
    /// the source year null unless the table states one
    pub performance_year_offset: Option<i32>,
    /// Offset from the document year for plan tables (schedules, budgets)
    pub plan_year_offset: i32,
    /// Document year assumed by the page reader when the text names none
    pub default_document_year: i32,
    /// Unit recorded on budget rows
    pub budget_unit: String,
    /// Prefix of generated sub-project codes
    pub project_code_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            year_round_policy: YearRoundPolicy::Sentinel,
            integrity_mode: IntegrityMode::Strict,
            budget_year_window: 10,
            performance_year_offset: Some(-1),
            plan_year_offset: 0,
            default_document_year: 2024,
            budget_unit: "백만원".to_string(),
            project_code_prefix: "SUB".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            NormalizeError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.budget_year_window > 100 {
            return Err(NormalizeError::Config(format!(
                "budget_year_window {} is not a sane window",
                self.budget_year_window
            )));
        }
        if self.project_code_prefix.trim().is_empty() {
            return Err(NormalizeError::Config(
                "project_code_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_year_round_policy(mut self, policy: YearRoundPolicy) -> Self {
        self.year_round_policy = policy;
        self
    }

    pub fn with_integrity_mode(mut self, mode: IntegrityMode) -> Self {
        self.integrity_mode = mode;
        self
    }

    pub fn plan_year(&self, document_year: i32) -> i32 {
        document_year + self.plan_year_offset
    }

    pub fn performance_year(&self, document_year: i32) -> Option<i32> {
        self.performance_year_offset.map(|offset| document_year + offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_strict_with_sentinel_year_round() {
        let config = EngineConfig::default();
        assert_eq!(config.integrity_mode, IntegrityMode::Strict);
        assert_eq!(config.year_round_policy, YearRoundPolicy::Sentinel);
        assert_eq!(config.plan_year(2024), 2024);
        assert_eq!(config.performance_year(2024), Some(2023));
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            year_round_policy = "expand_quarters"
            integrity_mode = "lenient"
            budget_year_window = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.year_round_policy, YearRoundPolicy::ExpandQuarters);
        assert_eq!(config.integrity_mode, IntegrityMode::Lenient);
        assert_eq!(config.budget_year_window, 5);
        assert_eq!(config.budget_unit, "백만원");
    }

    #[test]
    fn rejects_empty_code_prefix() {
        let result = EngineConfig::from_toml_str("project_code_prefix = \"  \"");
        assert!(matches!(result, Err(NormalizeError::Config(_))));
    }

    #[test]
    fn rejects_unknown_policy() {
        let result = EngineConfig::from_toml_str("year_round_policy = \"monthly\"");
        assert!(matches!(result, Err(NormalizeError::Toml(_))));
    }
}
