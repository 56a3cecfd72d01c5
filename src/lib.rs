pub mod aggregate;
pub mod bucket;
pub mod cli;
pub mod config;
pub mod error;
pub mod ingest;
pub mod measurement;
pub mod report;
pub mod service;
pub mod store;

pub use aggregate::{AggregationRequest, SeriesPoint};
pub use error::{MetricsError, MetricsResult};
pub use service::MetricsService;
