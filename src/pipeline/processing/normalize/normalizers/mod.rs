// Base trait and utilities for category normalizers
pub mod base;

// Individual normalizer implementations
pub mod budget;
pub mod overview;
pub mod performance;
pub mod plan;
pub mod schedule;

// Re-export the main components
pub use base::{CategoryNormalizer, NormalizerUtils};
pub use budget::BudgetNormalizer;
pub use overview::OverviewNormalizer;
pub use performance::{Admission, PerformanceNormalizer};
pub use plan::PlanNormalizer;
pub use schedule::ScheduleNormalizer;
