//! Report rows and the sheet layout handed to a spreadsheet writer.

use crate::aggregate::DayAggregate;
use serde::Serialize;
use std::io::Write;

pub const REPORT_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const REPORT_FILENAME: &str = "metrics_report.xlsx";
pub const REPORT_SHEET_NAME: &str = "Metrics Report";

const REPORT_DATE_FORMAT: &str = "%d/%m/%Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportColumn {
    pub header: &'static str,
    pub key: &'static str,
}

pub const REPORT_COLUMNS: [ReportColumn; 5] = [
    ReportColumn {
        header: "metricId",
        key: "metricId",
    },
    ReportColumn {
        header: "DateTime",
        key: "dateTime",
    },
    ReportColumn {
        header: "AggDay",
        key: "aggDay",
    },
    ReportColumn {
        header: "AggMonth",
        key: "aggMonth",
    },
    ReportColumn {
        header: "AggYear",
        key: "aggYear",
    },
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub metric_id: String,
    pub date_time: String,
    pub agg_day: f64,
    pub agg_month: f64,
    pub agg_year: f64,
}

/// One row per day aggregate, in the order given.
pub fn assemble_rows(metric_id: &str, days: &[DayAggregate]) -> Vec<ReportRow> {
    days.iter()
        .map(|day| ReportRow {
            metric_id: metric_id.to_string(),
            date_time: day.day.format(REPORT_DATE_FORMAT).to_string(),
            agg_day: day.agg_day,
            agg_month: day.agg_month,
            agg_year: day.agg_year,
        })
        .collect()
}

/// Sheet layout plus the download metadata a binary writer attaches.
///
/// Serializing the sheet yields its layout only; `content_type` and
/// `filename` describe the xlsx download and are left out.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSheet {
    pub sheet_name: &'static str,
    #[serde(skip_serializing)]
    pub content_type: &'static str,
    #[serde(skip_serializing)]
    pub filename: &'static str,
    pub columns: Vec<ReportColumn>,
    pub rows: Vec<ReportRow>,
}

impl ReportSheet {
    pub fn new(rows: Vec<ReportRow>) -> Self {
        Self {
            sheet_name: REPORT_SHEET_NAME,
            content_type: REPORT_CONTENT_TYPE,
            filename: REPORT_FILENAME,
            columns: REPORT_COLUMNS.to_vec(),
            rows,
        }
    }

    pub fn content_disposition(&self) -> String {
        format!("attachment; filename={}", self.filename)
    }
}

/// Receives a finished sheet and serializes it somewhere.
pub trait SpreadsheetSink {
    type Error;

    fn write_sheet(&mut self, sheet: &ReportSheet) -> Result<(), Self::Error>;
}

/// Writes a pretty JSON preview of the sheet: name, columns and rows.
pub struct JsonSheetSink<W: Write> {
    out: W,
}

impl<W: Write> JsonSheetSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> SpreadsheetSink for JsonSheetSink<W> {
    type Error = serde_json::Error;

    fn write_sheet(&mut self, sheet: &ReportSheet) -> Result<(), Self::Error> {
        serde_json::to_writer_pretty(&mut self.out, sheet)?;
        self.out.write_all(b"\n").map_err(serde_json::Error::io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(y: i32, m: u32, d: u32, agg_day: f64, agg_month: f64, agg_year: f64) -> DayAggregate {
        DayAggregate {
            day: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            agg_day,
            agg_month,
            agg_year,
        }
    }

    #[test]
    fn rows_are_formatted_day_first_in_input_order() {
        let rows = assemble_rows(
            "m1",
            &[day(2024, 3, 5, 12.5, 20.0, 40.0), day(2024, 1, 9, 1.0, 2.0, 40.0)],
        );
        assert_eq!(
            rows,
            vec![
                ReportRow {
                    metric_id: "m1".to_string(),
                    date_time: "05/03/2024".to_string(),
                    agg_day: 12.5,
                    agg_month: 20.0,
                    agg_year: 40.0,
                },
                ReportRow {
                    metric_id: "m1".to_string(),
                    date_time: "09/01/2024".to_string(),
                    agg_day: 1.0,
                    agg_month: 2.0,
                    agg_year: 40.0,
                },
            ]
        );
    }

    #[test]
    fn sheet_uses_fixed_columns_and_download_metadata() {
        let sheet = ReportSheet::new(Vec::new());
        let headers = sheet.columns.iter().map(|c| c.header).collect::<Vec<_>>();
        assert_eq!(headers, ["metricId", "DateTime", "AggDay", "AggMonth", "AggYear"]);
        assert_eq!(
            sheet.content_type,
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        );
        assert_eq!(
            sheet.content_disposition(),
            "attachment; filename=metrics_report.xlsx"
        );
    }

    #[test]
    fn row_keys_match_column_keys() {
        let row = assemble_rows("m1", &[day(2024, 1, 1, 1.0, 1.0, 1.0)]).remove(0);
        let value = serde_json::to_value(&row).unwrap();
        for column in REPORT_COLUMNS {
            assert!(value.get(column.key).is_some(), "{}", column.key);
        }
    }

    #[test]
    fn json_sink_writes_the_sheet() {
        let mut sink = JsonSheetSink::new(Vec::new());
        let sheet = ReportSheet::new(assemble_rows("m1", &[day(2024, 1, 1, 3.0, 3.0, 3.0)]));
        sink.write_sheet(&sheet).unwrap();

        let written: serde_json::Value = serde_json::from_slice(&sink.into_inner()).unwrap();
        assert_eq!(written["sheetName"], "Metrics Report");
        assert_eq!(written["columns"][1]["header"], "DateTime");
        assert_eq!(written["rows"][0]["dateTime"], "01/01/2024");
        assert_eq!(written["rows"][0]["aggDay"], 3.0);
    }

    #[test]
    fn json_preview_leaves_out_xlsx_download_metadata() {
        let mut sink = JsonSheetSink::new(Vec::new());
        sink.write_sheet(&ReportSheet::new(Vec::new())).unwrap();

        let written: serde_json::Value = serde_json::from_slice(&sink.into_inner()).unwrap();
        assert!(written.get("contentType").is_none());
        assert!(written.get("filename").is_none());
    }
}
