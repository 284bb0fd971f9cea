// Normalization pipeline: ingestion, processing, and the per-run engine

pub mod engine;
pub mod ingestion;
pub mod processing;

// Re-export key types from each stage
pub use engine::{NormalizationEngine, RunOutput};
pub use processing::parser;
