use crate::error::{MetricsError, MetricsResult};
use crate::measurement::RawRow;
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub const FIELD_SEPARATOR: u8 = b';';

/// Sequential, one-shot producer of data rows. A read error ends the stream.
pub trait RowSource: Iterator<Item = MetricsResult<RawRow>> {}

impl<T> RowSource for T where T: Iterator<Item = MetricsResult<RawRow>> {}

/// `;`-separated CSV with a header line. Header names are sanitized before
/// they are used as row keys.
pub struct CsvRowSource<R: Read> {
    headers: Vec<String>,
    records: csv::StringRecordsIntoIter<R>,
    failed: bool,
}

impl CsvRowSource<File> {
    pub fn from_path(path: &Path) -> MetricsResult<Self> {
        let file = File::open(path).map_err(|err| MetricsError::SourceRead {
            line: 0,
            message: format!("open '{}': {err}", path.display()),
        })?;
        Self::from_reader(file)
    }
}

impl<R: Read> CsvRowSource<R> {
    pub fn from_reader(reader: R) -> MetricsResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(FIELD_SEPARATOR)
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let headers = reader
            .headers()
            .map_err(|err| source_error(&err, 1))?
            .iter()
            .map(sanitize_header)
            .collect::<Vec<_>>();
        tracing::debug!(headers = ?headers, "read csv header");

        Ok(Self {
            headers,
            records: reader.into_records(),
            failed: false,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }
}

impl<R: Read> Iterator for CsvRowSource<R> {
    type Item = MetricsResult<RawRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(err) => {
                self.failed = true;
                return Some(Err(source_error(&err, 0)));
            }
        };

        let line = record.position().map(|pos| pos.line()).unwrap_or(0);
        let mut row = RawRow::new(line);
        for (name, value) in self.headers.iter().zip(record.iter()) {
            row.fields.insert(name.clone(), value.to_string());
        }
        Some(Ok(row))
    }
}

/// Strips quote characters, a leading byte-order mark and surrounding whitespace.
pub fn sanitize_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}')
        .replace('"', "")
        .trim()
        .to_string()
}

fn source_error(err: &csv::Error, fallback_line: u64) -> MetricsError {
    let line = err
        .position()
        .map(|pos| pos.line())
        .unwrap_or(fallback_line);
    MetricsError::SourceRead {
        line,
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::{COLUMN_DATE_TIME, COLUMN_METRIC_ID, COLUMN_VALUE};
    use std::io::Write;

    #[test]
    fn sanitizes_quoted_and_padded_headers() {
        assert_eq!(sanitize_header(" \"metricId\" "), "metricId");
        assert_eq!(sanitize_header("\u{feff}\"dateTime\""), "dateTime");
        assert_eq!(sanitize_header("value"), "value");
    }

    #[test]
    fn reads_semicolon_rows_keyed_by_header() {
        let data = " \"metricId\";\"dateTime\" ;value\nm1;01/01/2024 00:00;10\nm1;01/01/2024 12:00;5\n";
        let source = CsvRowSource::from_reader(data.as_bytes()).unwrap();
        assert_eq!(source.headers(), ["metricId", "dateTime", "value"]);

        let rows = source.collect::<MetricsResult<Vec<_>>>().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[0].field(COLUMN_METRIC_ID), Some("m1"));
        assert_eq!(rows[1].field(COLUMN_DATE_TIME), Some("01/01/2024 12:00"));
        assert_eq!(rows[1].field(COLUMN_VALUE), Some("5"));
    }

    #[test]
    fn short_rows_leave_fields_absent() {
        let data = "metricId;dateTime;value\nm1;01/01/2024 00:00\n";
        let rows = CsvRowSource::from_reader(data.as_bytes())
            .unwrap()
            .collect::<MetricsResult<Vec<_>>>()
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].field(COLUMN_VALUE), None);
    }

    #[test]
    fn empty_input_yields_no_rows() {
        let source = CsvRowSource::from_reader("".as_bytes()).unwrap();
        assert_eq!(source.count(), 0);
    }

    #[test]
    fn header_only_yields_no_rows() {
        let source = CsvRowSource::from_reader("metricId;dateTime;value\n".as_bytes()).unwrap();
        assert_eq!(source.count(), 0);
    }

    #[test]
    fn invalid_utf8_stops_the_stream() {
        let mut data = b"metricId;dateTime;value\nm1;01/01/2024 00:00;1\n".to_vec();
        data.extend_from_slice(b"m\xff;01/01/2024 00:00;1\nm1;02/01/2024 00:00;1\n");
        let mut source = CsvRowSource::from_reader(data.as_slice()).unwrap();

        assert!(source.next().unwrap().is_ok());
        assert!(matches!(
            source.next(),
            Some(Err(MetricsError::SourceRead { .. }))
        ));
        assert!(source.next().is_none());
    }

    #[test]
    fn opens_files_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "metricId;dateTime;value").unwrap();
        writeln!(file, "m1;05/03/2024 10:15;12.5").unwrap();
        let rows = CsvRowSource::from_path(file.path())
            .unwrap()
            .collect::<MetricsResult<Vec<_>>>()
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].field(COLUMN_VALUE), Some("12.5"));
    }

    #[test]
    fn missing_file_is_a_source_error() {
        let result = CsvRowSource::from_path(Path::new("/nonexistent/metrics.csv"));
        assert!(matches!(
            result,
            Err(MetricsError::SourceRead { line: 0, .. })
        ));
    }
}
