// Pipeline processing: text parsing, classification, identity, normalization and integrity

pub mod classify;
pub mod integrity;
pub mod normalize;
pub mod parser;
pub mod registry;

pub use classify::{IndicatorClassifier, PlanTableKind, TableClassifier};
pub use integrity::{IntegrityReport, IntegrityValidator};
pub use normalize::{NormalizationRegistry, ParseReport, ParseWarning, ParseWarningKind};
pub use registry::SubProjectRegistry;
