mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{build_pool, PgMeasurementStore};

use crate::aggregate::TimeWindow;
use crate::bucket::Granularity;
use crate::error::StoreError;
use crate::measurement::{Measurement, NewMeasurement};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Grouped sum for one truncated period, as returned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodSum {
    pub period_start: DateTime<Utc>,
    pub value: f64,
}

#[async_trait]
pub trait MeasurementStore: Send + Sync {
    /// Persists `batch` in slice order as a single write. Returns rows written.
    async fn insert_batch(&self, batch: &[NewMeasurement]) -> Result<u64, StoreError>;

    /// Measurements of `metric_id` inside `window`, oldest first.
    async fn fetch_range(
        &self,
        metric_id: &str,
        window: &TimeWindow,
    ) -> Result<Vec<Measurement>, StoreError>;

    /// Sums of `metric_id` inside `window` grouped by UTC period, oldest period first.
    async fn sum_by_period(
        &self,
        metric_id: &str,
        granularity: Granularity,
        window: &TimeWindow,
    ) -> Result<Vec<PeriodSum>, StoreError>;
}
