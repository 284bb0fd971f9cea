use thiserror::Error;

use crate::pipeline::processing::integrity::IntegrityReport;

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Input document does not match schema: {}", .errors.join("; "))]
    Schema { errors: Vec<String> },

    #[error("Unsupported input document: {0}")]
    UnsupportedInput(String),

    #[error("Registry conflict: {message}")]
    RegistryConflict { message: String },

    #[error("Integrity check failed with {violations} violation(s)")]
    IntegrityViolation {
        violations: usize,
        report: Box<IntegrityReport>,
    },
}

pub type Result<T> = std::result::Result<T, NormalizeError>;
