use super::validate::validate_row;
use crate::error::{MetricsError, MetricsResult, RejectReason};
use crate::measurement::{NewMeasurement, RawRow, COLUMN_DATE_TIME, COLUMN_METRIC_ID, COLUMN_VALUE};
use crate::store::MeasurementStore;
use serde::Serialize;
use std::time::Instant;

pub const DEFAULT_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    #[serde(rename = "importedCount")]
    pub imported: u64,
    pub rejected: u64,
    pub batches: usize,
}

/// Accumulates validated measurements and writes them in fixed-size batches.
///
/// A batch is written as soon as the buffer reaches `batch_size`, and the
/// remainder on [`BatchImporter::finish`]. Each write is awaited before the next
/// row is accepted, so at most one batch is pending at a time. A failed write
/// ends the import; batches written before it stay in the store.
pub struct BatchImporter<'a, S: ?Sized> {
    store: &'a S,
    batch_size: usize,
    buffer: Vec<NewMeasurement>,
    summary: ImportSummary,
}

impl<'a, S> BatchImporter<'a, S>
where
    S: MeasurementStore + ?Sized,
{
    pub fn new(store: &'a S, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            store,
            batch_size,
            buffer: Vec::with_capacity(batch_size),
            summary: ImportSummary::default(),
        }
    }

    pub async fn accept(&mut self, row: &RawRow) -> MetricsResult<()> {
        match validate_row(row) {
            Ok(measurement) => {
                self.buffer.push(measurement);
                if self.buffer.len() >= self.batch_size {
                    self.flush().await?;
                }
            }
            Err(reason) => self.reject(row, reason),
        }
        Ok(())
    }

    pub async fn finish(mut self) -> MetricsResult<ImportSummary> {
        self.flush().await?;
        Ok(self.summary)
    }

    pub fn summary(&self) -> ImportSummary {
        self.summary
    }

    fn reject(&mut self, row: &RawRow, reason: RejectReason) {
        self.summary.rejected += 1;
        tracing::warn!(
            line = row.line,
            reason = %reason,
            metric_id = raw_field(row, COLUMN_METRIC_ID),
            date_time = raw_field(row, COLUMN_DATE_TIME),
            value = raw_field(row, COLUMN_VALUE),
            "skipping csv row"
        );
    }

    async fn flush(&mut self) -> MetricsResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let started = Instant::now();
        let items = std::mem::take(&mut self.buffer);
        let len = items.len();
        let batch = self.summary.batches + 1;

        match self.store.insert_batch(&items).await {
            Ok(written) => {
                if written != len as u64 {
                    tracing::warn!(batch, len, written, "store wrote a different row count than sent");
                }
                self.summary.batches = batch;
                self.summary.imported += written;
                self.buffer = items;
                self.buffer.clear();
                let micros = started.elapsed().as_micros() as u64;
                tracing::debug!(batch, len, written, micros, "flushed measurement batch");
                Ok(())
            }
            Err(err) => {
                tracing::error!(
                    error = %err,
                    batch,
                    len,
                    committed = self.summary.imported,
                    "failed to flush measurement batch"
                );
                Err(MetricsError::StoreWrite {
                    batch,
                    committed: self.summary.imported,
                    source: err,
                })
            }
        }
    }
}

fn raw_field<'r>(row: &'r RawRow, name: &str) -> &'r str {
    row.fields.get(name).map(String::as_str).unwrap_or("")
}

/// Drains `rows` through the validator into `store`.
///
/// A read error from the source stops the import before any further batch is
/// written; measurements still buffered at that point are discarded.
pub async fn import_rows<S, I>(store: &S, rows: I, batch_size: usize) -> MetricsResult<ImportSummary>
where
    S: MeasurementStore + ?Sized,
    I: IntoIterator<Item = MetricsResult<RawRow>>,
{
    let started = Instant::now();
    let mut importer = BatchImporter::new(store, batch_size);
    for row in rows {
        let row = match row {
            Ok(row) => row,
            Err(err) => {
                let summary = importer.summary();
                tracing::error!(
                    error = %err,
                    committed = summary.imported,
                    "row source failed; aborting import"
                );
                return Err(err);
            }
        };
        importer.accept(&row).await?;
    }

    let summary = importer.finish().await?;
    tracing::info!(
        imported = summary.imported,
        rejected = summary.rejected,
        batches = summary.batches,
        millis = started.elapsed().as_millis() as u64,
        "csv import completed"
    );
    Ok(summary)
}
