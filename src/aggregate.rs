use crate::bucket::{bucket_key, BucketKey, Granularity};
use crate::error::{MetricsError, MetricsResult};
use crate::measurement::Measurement;
use crate::store::MeasurementStore;
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

const SERIES_DATE_FORMAT: &str = "%Y-%m-%d";

/// Aggregation request as received from a caller, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationRequest {
    pub metric_id: String,
    pub agg_type: String,
    pub date_initial: String,
    pub final_date: String,
}

/// A validated request: known granularity and an inclusive UTC window.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationQuery {
    pub metric_id: String,
    pub granularity: Granularity,
    pub window: TimeWindow,
}

/// Half-open `[start, end)` instant range covering whole UTC days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Start of `first` up to, not including, the start of the day after `last`.
    pub fn for_days(first: NaiveDate, last: NaiveDate) -> Self {
        let end = match last.succ_opt() {
            Some(next) => next.and_time(NaiveTime::MIN).and_utc(),
            None => DateTime::<Utc>::MAX_UTC,
        };
        Self {
            start: first.and_time(NaiveTime::MIN).and_utc(),
            end,
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

impl AggregationRequest {
    pub fn new(
        metric_id: impl Into<String>,
        agg_type: impl Into<String>,
        date_initial: impl Into<String>,
        final_date: impl Into<String>,
    ) -> Self {
        Self {
            metric_id: metric_id.into(),
            agg_type: agg_type.into(),
            date_initial: date_initial.into(),
            final_date: final_date.into(),
        }
    }

    pub fn validate(&self) -> MetricsResult<AggregationQuery> {
        let granularity = self.agg_type.parse::<Granularity>()?;
        let date_initial = parse_request_date(&self.date_initial)?;
        let final_date = parse_request_date(&self.final_date)?;
        if date_initial > final_date {
            return Err(MetricsError::InvalidDateRange {
                date_initial,
                final_date,
            });
        }
        Ok(AggregationQuery {
            metric_id: self.metric_id.clone(),
            granularity,
            window: TimeWindow::for_days(date_initial, final_date),
        })
    }
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp (its UTC date is used).
fn parse_request_date(raw: &str) -> MetricsResult<NaiveDate> {
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, SERIES_DATE_FORMAT) {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.with_timezone(&Utc).date_naive())
        .map_err(|_| MetricsError::InvalidDate(raw.to_string()))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub date: String,
    pub value: f64,
}

/// Summed series for one metric, one point per period, oldest first.
///
/// Grouping and summing run inside the store.
pub async fn aggregate_metrics<S>(
    store: &S,
    request: &AggregationRequest,
) -> MetricsResult<Vec<SeriesPoint>>
where
    S: MeasurementStore + ?Sized,
{
    let query = request.validate()?;
    let sums = store
        .sum_by_period(&query.metric_id, query.granularity, &query.window)
        .await
        .map_err(MetricsError::StoreRead)?;

    tracing::debug!(
        metric_id = %query.metric_id,
        granularity = %query.granularity,
        buckets = sums.len(),
        "aggregated metric series"
    );

    Ok(sums
        .into_iter()
        .map(|sum| {
            let key = bucket_key(sum.period_start, query.granularity);
            SeriesPoint {
                date: key.period_start().format(SERIES_DATE_FORMAT).to_string(),
                value: sum.value,
            }
        })
        .collect())
}

/// In-memory grouped sums, ordered by bucket.
pub fn sum_buckets(measurements: &[Measurement], granularity: Granularity) -> Vec<(BucketKey, f64)> {
    let mut sums: BTreeMap<BucketKey, f64> = BTreeMap::new();
    for measurement in measurements {
        *sums
            .entry(bucket_key(measurement.datetime, granularity))
            .or_insert(0.0) += measurement.value;
    }
    sums.into_iter().collect()
}

/// One day present in the data with its day, month and year totals.
#[derive(Debug, Clone, PartialEq)]
pub struct DayAggregate {
    pub day: NaiveDate,
    pub agg_day: f64,
    pub agg_month: f64,
    pub agg_year: f64,
}

/// Day rows in order of first appearance in `measurements`.
///
/// `agg_month` sums every measurement sharing the day's month-of-year,
/// whatever its year, so January 2023 and January 2024 land in the same
/// total when both are in range. `agg_year` sums every measurement of the
/// day's calendar year.
pub fn aggregate_report(measurements: &[Measurement]) -> Vec<DayAggregate> {
    let mut day_index: HashMap<BucketKey, usize> = HashMap::new();
    let mut days: Vec<(NaiveDate, f64)> = Vec::new();
    let mut month_totals: HashMap<u32, f64> = HashMap::new();
    let mut year_totals: HashMap<i32, f64> = HashMap::new();

    for measurement in measurements {
        let key = bucket_key(measurement.datetime, Granularity::Day);
        let idx = *day_index.entry(key).or_insert_with(|| {
            days.push((key.period_start(), 0.0));
            days.len() - 1
        });
        days[idx].1 += measurement.value;
        *month_totals.entry(key.month).or_insert(0.0) += measurement.value;
        *year_totals.entry(key.year).or_insert(0.0) += measurement.value;
    }

    days.into_iter()
        .map(|(day, agg_day)| DayAggregate {
            day,
            agg_day,
            agg_month: month_totals.get(&day.month()).copied().unwrap_or(0.0),
            agg_year: year_totals.get(&day.year()).copied().unwrap_or(0.0),
        })
        .collect()
}

/// Validates `request`, fetches its rows and computes the per-day report aggregates.
pub async fn report_aggregates<S>(
    store: &S,
    request: &AggregationRequest,
) -> MetricsResult<(AggregationQuery, Vec<DayAggregate>)>
where
    S: MeasurementStore + ?Sized,
{
    let query = request.validate()?;
    let measurements = store
        .fetch_range(&query.metric_id, &query.window)
        .await
        .map_err(MetricsError::StoreRead)?;
    let days = aggregate_report(&measurements);
    tracing::debug!(
        metric_id = %query.metric_id,
        measurements = measurements.len(),
        days = days.len(),
        "computed report aggregates"
    );
    Ok((query, days))
}
