use crate::error::RejectReason;
use crate::measurement::{NewMeasurement, RawRow, COLUMN_DATE_TIME, COLUMN_METRIC_ID, COLUMN_VALUE};
use chrono::{DateTime, NaiveDate, Utc};

/// Turns one raw row into a measurement.
///
/// Checks run in a fixed order: presence of all three columns, then the
/// `DD/MM/YYYY HH:mm` timestamp, then the numeric value. The first failure wins.
pub fn validate_row(row: &RawRow) -> Result<NewMeasurement, RejectReason> {
    let (Some(metric_id), Some(date_time), Some(value)) = (
        row.field(COLUMN_METRIC_ID),
        row.field(COLUMN_DATE_TIME),
        row.field(COLUMN_VALUE),
    ) else {
        return Err(RejectReason::IncompleteRow);
    };

    let datetime = parse_date_time(date_time).ok_or(RejectReason::InvalidDateFormat)?;
    let value = parse_value(value).ok_or(RejectReason::InvalidValue)?;

    Ok(NewMeasurement {
        metric_id: metric_id.to_string(),
        value,
        datetime,
    })
}

/// Parses `DD/MM/YYYY HH:mm` as a UTC wall-clock instant with zero seconds.
pub fn parse_date_time(raw: &str) -> Option<DateTime<Utc>> {
    let bytes = raw.as_bytes();
    if bytes.len() != 16 {
        return None;
    }
    for (idx, byte) in bytes.iter().copied().enumerate() {
        let ok = match idx {
            2 | 5 => byte == b'/',
            10 => byte == b' ',
            13 => byte == b':',
            _ => byte.is_ascii_digit(),
        };
        if !ok {
            return None;
        }
    }

    let day = raw[0..2].parse::<u32>().ok()?;
    let month = raw[3..5].parse::<u32>().ok()?;
    let year = raw[6..10].parse::<i32>().ok()?;
    let hour = raw[11..13].parse::<u32>().ok()?;
    let minute = raw[14..16].parse::<u32>().ok()?;

    NaiveDate::from_ymd_opt(year, month, day)?
        .and_hms_opt(hour, minute, 0)
        .map(|naive| naive.and_utc())
}

fn parse_value(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|value| value.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(metric_id: &str, date_time: &str, value: &str) -> RawRow {
        RawRow::new(2)
            .with_field(COLUMN_METRIC_ID, metric_id)
            .with_field(COLUMN_DATE_TIME, date_time)
            .with_field(COLUMN_VALUE, value)
    }

    #[test]
    fn accepts_well_formed_row() {
        let measurement = validate_row(&row("m1", "05/03/2024 10:15", "12.5")).unwrap();
        assert_eq!(measurement.metric_id, "m1");
        assert_eq!(measurement.value, 12.5);
        assert_eq!(
            measurement.datetime,
            Utc.with_ymd_and_hms(2024, 3, 5, 10, 15, 0).unwrap()
        );
    }

    #[test]
    fn validation_is_deterministic() {
        let raw = row("m1", "31/12/2023 23:59", "-4");
        assert_eq!(validate_row(&raw), validate_row(&raw));
        let bad = row("m1", "31/02/2023 23:59", "-4");
        assert_eq!(validate_row(&bad), validate_row(&bad));
    }

    #[test]
    fn missing_or_blank_fields_are_incomplete() {
        assert_eq!(
            validate_row(&row("", "05/03/2024 10:15", "1")),
            Err(RejectReason::IncompleteRow)
        );
        assert_eq!(
            validate_row(&row("m1", "   ", "1")),
            Err(RejectReason::IncompleteRow)
        );
        let no_value = RawRow::new(3)
            .with_field(COLUMN_METRIC_ID, "m1")
            .with_field(COLUMN_DATE_TIME, "05/03/2024 10:15");
        assert_eq!(validate_row(&no_value), Err(RejectReason::IncompleteRow));
    }

    #[test]
    fn incomplete_wins_over_other_failures() {
        assert_eq!(
            validate_row(&row("m1", "not a date", "")),
            Err(RejectReason::IncompleteRow)
        );
    }

    #[test]
    fn rejects_bad_layouts_and_calendar_fields() {
        for raw in [
            "2024-03-05 10:15",
            "5/3/2024 10:15",
            "05/03/2024 10:15:00",
            "05/03/2024T10:15",
            "32/01/2024 10:00",
            "29/02/2023 10:00",
            "01/13/2024 10:00",
            "01/01/2024 24:00",
            "01/01/2024 10:60",
        ] {
            assert_eq!(
                validate_row(&row("m1", raw, "1")),
                Err(RejectReason::InvalidDateFormat),
                "{raw}"
            );
        }
    }

    #[test]
    fn accepts_leap_day() {
        assert!(parse_date_time("29/02/2024 00:00").is_some());
    }

    #[test]
    fn rejects_non_finite_or_non_numeric_values() {
        for raw in ["abc", "12.5abc", "NaN", "inf", "1,5"] {
            assert_eq!(
                validate_row(&row("m1", "05/03/2024 10:15", raw)),
                Err(RejectReason::InvalidValue),
                "{raw}"
            );
        }
    }

    #[test]
    fn date_checked_before_value() {
        assert_eq!(
            validate_row(&row("m1", "bad", "bad")),
            Err(RejectReason::InvalidDateFormat)
        );
    }
}
