use std::collections::HashMap;

use super::normalizers::{CategoryNormalizer, OverviewNormalizer, PerformanceNormalizer, PlanNormalizer};
use super::{NormalizationContext, ParseReport};
use crate::domain::{NormalizedRecord, RecordCategory};
use crate::error::{NormalizeError, Result};
use crate::pipeline::ingestion::RawTable;

/// Registry of category-specific normalization strategies
pub struct NormalizationRegistry {
    normalizers: HashMap<RecordCategory, Box<dyn CategoryNormalizer>>,
}

impl NormalizationRegistry {
    /// Create a registry with the built-in normalizer for every category
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(OverviewNormalizer::new()));
        registry.register(Box::new(PerformanceNormalizer::new()));
        registry.register(Box::new(PlanNormalizer::new()));
        registry
    }

    pub fn empty() -> Self {
        Self {
            normalizers: HashMap::new(),
        }
    }

    /// Register a normalizer, replacing any previous one for its category
    pub fn register(&mut self, normalizer: Box<dyn CategoryNormalizer>) {
        self.normalizers.insert(normalizer.category(), normalizer);
    }

    pub fn get_normalizer(&self, category: RecordCategory) -> Option<&dyn CategoryNormalizer> {
        self.normalizers.get(&category).map(|n| n.as_ref())
    }

    /// Normalize a table with the normalizer registered for `category`
    pub fn normalize(
        &self,
        category: RecordCategory,
        ctx: &NormalizationContext<'_>,
        table: &RawTable,
        report: &mut ParseReport,
    ) -> Result<Vec<NormalizedRecord>> {
        let normalizer = self.get_normalizer(category).ok_or_else(|| {
            NormalizeError::UnsupportedInput(format!("No normalizer registered for category: {}", category))
        })?;
        Ok(normalizer.normalize(ctx, table, report))
    }

    pub fn list_categories(&self) -> Vec<RecordCategory> {
        let mut categories: Vec<_> = self.normalizers.keys().copied().collect();
        categories.sort();
        categories
    }
}

impl Default for NormalizationRegistry {
    fn default() -> Self {
        Self::new()
    }
}
