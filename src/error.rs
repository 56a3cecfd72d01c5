use thiserror::Error;

/// Why a single CSV row was not turned into a measurement.
///
/// Row-level rejections are diagnostics: the importer logs and counts them and
/// moves on to the next row.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    #[error("incomplete row")]
    IncompleteRow,
    #[error("invalid date format")]
    InvalidDateFormat,
    #[error("invalid value")]
    InvalidValue,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store operation failed: {0}")]
    Operation(String),
}

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("invalid aggregation type: {0:?}")]
    InvalidAggregationType(String),

    #[error("invalid date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("invalid date range: {date_initial} is after {final_date}")]
    InvalidDateRange {
        date_initial: chrono::NaiveDate,
        final_date: chrono::NaiveDate,
    },

    /// A batch write failed. Batches written before it stay committed.
    #[error("failed to write measurement batch {batch} ({committed} measurements already committed): {source}")]
    StoreWrite {
        batch: usize,
        committed: u64,
        #[source]
        source: StoreError,
    },

    #[error("failed to read measurements: {0}")]
    StoreRead(#[source] StoreError),

    #[error("failed to read row source at line {line}: {message}")]
    SourceRead { line: u64, message: String },
}

pub type MetricsResult<T> = Result<T, MetricsError>;
