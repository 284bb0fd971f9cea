//! Category normalizers: raw tables in, typed [`NormalizedRecord`](crate::domain::NormalizedRecord)s out.

pub mod normalizers;
pub mod registry;
pub mod report;

pub use normalizers::CategoryNormalizer;
pub use registry::NormalizationRegistry;
pub use report::{ParseReport, ParseWarning, ParseWarningKind};

use crate::config::EngineConfig;
use crate::domain::{RawRecordId, SubProjectId};

/// Everything a normalizer knows about the table it is working on
#[derive(Debug, Clone, Copy)]
pub struct NormalizationContext<'a> {
    pub sub_project_id: SubProjectId,
    pub raw_record_id: RawRecordId,
    /// Year of the owning sub-project
    pub document_year: i32,
    /// Year the table itself states, if any
    pub data_year: Option<i32>,
    pub config: &'a EngineConfig,
}

impl<'a> NormalizationContext<'a> {
    pub fn warning(&self, kind: ParseWarningKind, detail: impl Into<String>) -> ParseWarning {
        ParseWarning {
            kind,
            sub_project_id: Some(self.sub_project_id),
            raw_record_id: Some(self.raw_record_id),
            detail: detail.into(),
        }
    }

    /// Year for schedule and budget rows
    pub fn plan_year(&self) -> i32 {
        self.data_year
            .unwrap_or_else(|| self.config.plan_year(self.document_year))
    }

    /// Year for performance rows; `None` when neither the table nor the
    /// configuration supplies one
    pub fn performance_year(&self) -> Option<i32> {
        self.data_year
            .or_else(|| self.config.performance_year(self.document_year))
    }
}
