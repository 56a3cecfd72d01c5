//! Calendar bucketing of measurement timestamps.
//!
//! Buckets are computed from UTC calendar fields. A [`BucketKey`] is a plain
//! `(year, month, day)` triple with the fields finer than the granularity pinned
//! to 1, so keys order chronologically and map back to the period start.

use crate::error::MetricsError;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Granularity {
    Day,
    Month,
    Year,
}

impl Granularity {
    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::Day => "DAY",
            Granularity::Month => "MONTH",
            Granularity::Year => "YEAR",
        }
    }

    /// Unit name understood by Postgres `date_trunc`.
    pub(crate) fn sql_unit(self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Month => "month",
            Granularity::Year => "year",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = MetricsError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "DAY" => Ok(Granularity::Day),
            "MONTH" => Ok(Granularity::Month),
            "YEAR" => Ok(Granularity::Year),
            other => Err(MetricsError::InvalidAggregationType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketKey {
    pub granularity: Granularity,
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl BucketKey {
    pub fn period_start(&self) -> NaiveDate {
        // Fields come from a valid date with finer fields pinned to 1, so the
        // fallback is unreachable in practice.
        NaiveDate::from_ymd_opt(self.year, self.month, self.day).unwrap_or(NaiveDate::MIN)
    }

    pub fn period_start_utc(&self) -> DateTime<Utc> {
        self.period_start().and_time(chrono::NaiveTime::MIN).and_utc()
    }
}

pub fn bucket_key(datetime: DateTime<Utc>, granularity: Granularity) -> BucketKey {
    let year = datetime.year();
    let (month, day) = match granularity {
        Granularity::Day => (datetime.month(), datetime.day()),
        Granularity::Month => (datetime.month(), 1),
        Granularity::Year => (1, 1),
    };
    BucketKey {
        granularity,
        year,
        month,
        day,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn parses_only_the_three_upper_case_names() {
        assert_eq!("DAY".parse::<Granularity>().unwrap(), Granularity::Day);
        assert_eq!("MONTH".parse::<Granularity>().unwrap(), Granularity::Month);
        assert_eq!("YEAR".parse::<Granularity>().unwrap(), Granularity::Year);
        for bad in ["WEEK", "day", "", " DAY"] {
            assert!(matches!(
                bad.parse::<Granularity>(),
                Err(MetricsError::InvalidAggregationType(ref raw)) if raw == bad
            ));
        }
    }

    #[test]
    fn same_day_shares_a_key() {
        let a = bucket_key(at(2024, 1, 1, 0, 0), Granularity::Day);
        let b = bucket_key(at(2024, 1, 1, 23, 59), Granularity::Day);
        let c = bucket_key(at(2024, 1, 2, 0, 0), Granularity::Day);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a < c);
    }

    #[test]
    fn coarser_granularities_pin_finer_fields() {
        let ts = at(2024, 7, 19, 8, 30);
        let month = bucket_key(ts, Granularity::Month);
        assert_eq!((month.year, month.month, month.day), (2024, 7, 1));
        assert_eq!(month, bucket_key(at(2024, 7, 1, 0, 0), Granularity::Month));

        let year = bucket_key(ts, Granularity::Year);
        assert_eq!((year.year, year.month, year.day), (2024, 1, 1));
        assert_eq!(year, bucket_key(at(2024, 12, 31, 23, 59), Granularity::Year));
    }

    #[test]
    fn keys_order_across_year_boundaries() {
        let dec = bucket_key(at(2023, 12, 31, 12, 0), Granularity::Month);
        let jan = bucket_key(at(2024, 1, 1, 12, 0), Granularity::Month);
        assert!(dec < jan);
    }

    #[test]
    fn period_start_is_midnight_utc() {
        let key = bucket_key(at(2024, 3, 5, 10, 15), Granularity::Month);
        assert_eq!(key.period_start_utc(), at(2024, 3, 1, 0, 0));
        assert_eq!(key.period_start().format("%Y-%m-%d").to_string(), "2024-03-01");
    }
}
