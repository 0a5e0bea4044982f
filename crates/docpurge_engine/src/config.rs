//! Engine configuration.

/// Upper bound on the contact batch size, and its starting value.
pub const CONTACT_BATCH_SIZE: usize = 1000;

/// Ceiling on documents processed per batch across secondary lookups.
pub const MAX_BATCH_SIZE: usize = 20_000;

/// Days a terminal task is kept before becoming purgeable.
pub const TASK_RETENTION_DAYS: u64 = 60;

/// Months an aggregate target document is kept before becoming purgeable.
pub const TARGET_RETENTION_MONTHS: u32 = 6;

/// Tunable parameters for a purge run.
///
/// Defaults match the behaviour of the hosted deployments; tests shrink
/// the batch limits to exercise the adaptive paging.
#[derive(Debug, Clone)]
pub struct PurgeConfig {
    /// Name of the source database, used to derive purge store names.
    pub db_name: String,
    /// Starting (and maximum) number of contacts fetched per batch.
    pub contact_batch_size: usize,
    /// Hard ceiling on relevant documents handled in one batch.
    pub max_batch_size: usize,
    /// Terminal-task retention window, in days.
    pub task_retention_days: u64,
    /// Target-document retention window, in months.
    pub target_retention_months: u32,
}

impl PurgeConfig {
    /// Creates a configuration with default limits for a source database.
    pub fn new(db_name: impl Into<String>) -> Self {
        Self {
            db_name: db_name.into(),
            contact_batch_size: CONTACT_BATCH_SIZE,
            max_batch_size: MAX_BATCH_SIZE,
            task_retention_days: TASK_RETENTION_DAYS,
            target_retention_months: TARGET_RETENTION_MONTHS,
        }
    }

    /// Overrides the contact batch size.
    pub fn with_contact_batch_size(mut self, size: usize) -> Self {
        self.contact_batch_size = size;
        self
    }

    /// Overrides the per-batch document ceiling.
    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    /// Overrides the task retention window.
    pub fn with_task_retention_days(mut self, days: u64) -> Self {
        self.task_retention_days = days;
        self
    }

    /// Overrides the target retention window.
    pub fn with_target_retention_months(mut self, months: u32) -> Self {
        self.target_retention_months = months;
        self
    }

    /// Threshold below which a batch is considered underfilled and the
    /// batch size may grow again.
    pub fn grow_threshold(&self) -> usize {
        self.max_batch_size / 4
    }
}
