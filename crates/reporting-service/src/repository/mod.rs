mod report_repository;

use async_trait::async_trait;
use reporting_core::AppError;

pub use report_repository::{RedisReportRepository, ReportEntry, ReportKind, ReportStatus};

/// Storage for report entries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReportRepository: Send + Sync {
    /// Insert the entry, replacing an entry with the same key unless the
    /// stored one carries a later timestamp.
    async fn upsert(&self, entry: ReportEntry) -> Result<(), AppError>;
}
