use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

pub const COLUMN_METRIC_ID: &str = "metricId";
pub const COLUMN_DATE_TIME: &str = "dateTime";
pub const COLUMN_VALUE: &str = "value";

/// A validated observation that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMeasurement {
    pub metric_id: String,
    pub value: f64,
    pub datetime: DateTime<Utc>,
}

/// A persisted observation. `id` is assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub id: i64,
    pub metric_id: String,
    pub value: f64,
    pub datetime: DateTime<Utc>,
}

/// One data row from a row source, keyed by (sanitized) header name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    /// 1-based line in the source, for diagnostics.
    pub line: u64,
    pub fields: HashMap<String, String>,
}

impl RawRow {
    pub fn new(line: u64) -> Self {
        Self {
            line,
            fields: HashMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Field text trimmed of surrounding whitespace; `None` when absent or blank.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }
}
