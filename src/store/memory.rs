use super::{MeasurementStore, PeriodSum};
use crate::aggregate::{sum_buckets, TimeWindow};
use crate::bucket::Granularity;
use crate::error::StoreError;
use crate::measurement::{Measurement, NewMeasurement};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Process-local store. Keeps every write call's size and can be told to fail
/// a specific write or all reads.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<Measurement>>,
    batch_sizes: Mutex<Vec<usize>>,
    fail_write_number: Mutex<Option<usize>>,
    fail_reads: Mutex<bool>,
    read_calls: AtomicU64,
    inflight_writes: AtomicUsize,
    max_inflight_writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the `n`-th write call (1-based) fail. Earlier writes succeed.
    pub fn fail_write_number(&self, n: usize) {
        if let Ok(mut guard) = self.fail_write_number.lock() {
            *guard = Some(n);
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        if let Ok(mut guard) = self.fail_reads.lock() {
            *guard = fail;
        }
    }

    /// Sizes of the successful and failed write calls, in call order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn rows(&self) -> Vec<Measurement> {
        self.rows
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn read_calls(&self) -> u64 {
        self.read_calls.load(Ordering::Relaxed)
    }

    /// Highest number of write calls observed running at the same time.
    pub fn max_inflight_writes(&self) -> usize {
        self.max_inflight_writes.load(Ordering::Relaxed)
    }

    fn lock_error() -> StoreError {
        StoreError::Operation("memory store lock poisoned".to_string())
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        self.read_calls.fetch_add(1, Ordering::Relaxed);
        let fail = *self.fail_reads.lock().map_err(|_| Self::lock_error())?;
        if fail {
            return Err(StoreError::Operation("read failure".to_string()));
        }
        Ok(())
    }

    fn matching(&self, metric_id: &str, window: &TimeWindow) -> Result<Vec<Measurement>, StoreError> {
        let rows = self.rows.lock().map_err(|_| Self::lock_error())?;
        let mut matched = rows
            .iter()
            .filter(|row| row.metric_id == metric_id && window.contains(row.datetime))
            .cloned()
            .collect::<Vec<_>>();
        matched.sort_by(|a, b| a.datetime.cmp(&b.datetime).then(a.id.cmp(&b.id)));
        Ok(matched)
    }

    fn write_batch(&self, batch: &[NewMeasurement]) -> Result<u64, StoreError> {
        let call_number = {
            let mut sizes = self.batch_sizes.lock().map_err(|_| Self::lock_error())?;
            sizes.push(batch.len());
            sizes.len()
        };
        let fail_at = *self.fail_write_number.lock().map_err(|_| Self::lock_error())?;
        if fail_at == Some(call_number) {
            return Err(StoreError::Operation(format!("write {call_number} rejected")));
        }

        let mut rows = self.rows.lock().map_err(|_| Self::lock_error())?;
        let mut next_id = rows.last().map(|row| row.id).unwrap_or(0);
        for item in batch {
            next_id += 1;
            rows.push(Measurement {
                id: next_id,
                metric_id: item.metric_id.clone(),
                value: item.value,
                datetime: item.datetime,
            });
        }
        Ok(batch.len() as u64)
    }
}

#[async_trait]
impl MeasurementStore for MemoryStore {
    async fn insert_batch(&self, batch: &[NewMeasurement]) -> Result<u64, StoreError> {
        let inflight = self.inflight_writes.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_inflight_writes.fetch_max(inflight, Ordering::SeqCst);
        tokio::task::yield_now().await;

        let result = self.write_batch(batch);

        self.inflight_writes.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn fetch_range(
        &self,
        metric_id: &str,
        window: &TimeWindow,
    ) -> Result<Vec<Measurement>, StoreError> {
        self.check_reads()?;
        self.matching(metric_id, window)
    }

    async fn sum_by_period(
        &self,
        metric_id: &str,
        granularity: Granularity,
        window: &TimeWindow,
    ) -> Result<Vec<PeriodSum>, StoreError> {
        self.check_reads()?;
        let matched = self.matching(metric_id, window)?;
        Ok(sum_buckets(&matched, granularity)
            .into_iter()
            .map(|(key, value)| PeriodSum {
                period_start: key.period_start_utc(),
                value,
            })
            .collect())
    }
}
