use crate::aggregate::{self, AggregationRequest, SeriesPoint};
use crate::error::MetricsResult;
use crate::ingest::{import_rows, CsvRowSource, ImportSummary, RowSource, DEFAULT_BATCH_SIZE};
use crate::report::{assemble_rows, ReportRow, ReportSheet};
use crate::store::MeasurementStore;
use std::path::Path;
use std::sync::Arc;

/// Entry points for callers: CSV import, series aggregation and report rows.
pub struct MetricsService<S: ?Sized> {
    store: Arc<S>,
    batch_size: usize,
}

impl<S: ?Sized> Clone for MetricsService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            batch_size: self.batch_size,
        }
    }
}

impl<S> MetricsService<S>
where
    S: MeasurementStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self::with_batch_size(store, DEFAULT_BATCH_SIZE)
    }

    pub fn with_batch_size(store: Arc<S>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    pub async fn import_measurements<R>(&self, rows: R) -> MetricsResult<ImportSummary>
    where
        R: RowSource,
    {
        import_rows(self.store.as_ref(), rows, self.batch_size).await
    }

    pub async fn import_csv_file(&self, path: &Path) -> MetricsResult<ImportSummary> {
        tracing::info!(path = %path.display(), batch_size = self.batch_size, "importing csv");
        let source = CsvRowSource::from_path(path)?;
        self.import_measurements(source).await
    }

    pub async fn aggregate_metrics(
        &self,
        request: &AggregationRequest,
    ) -> MetricsResult<Vec<SeriesPoint>> {
        aggregate::aggregate_metrics(self.store.as_ref(), request).await
    }

    pub async fn build_report_rows(
        &self,
        request: &AggregationRequest,
    ) -> MetricsResult<Vec<ReportRow>> {
        let (query, days) = aggregate::report_aggregates(self.store.as_ref(), request).await?;
        Ok(assemble_rows(&query.metric_id, &days))
    }

    pub async fn build_report(&self, request: &AggregationRequest) -> MetricsResult<ReportSheet> {
        Ok(ReportSheet::new(self.build_report_rows(request).await?))
    }
}
