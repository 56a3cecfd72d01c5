mod importer;
mod source;
mod validate;

pub use importer::{import_rows, BatchImporter, ImportSummary, DEFAULT_BATCH_SIZE};
pub use source::{sanitize_header, CsvRowSource, RowSource, FIELD_SEPARATOR};
pub use validate::{parse_date_time, validate_row};
