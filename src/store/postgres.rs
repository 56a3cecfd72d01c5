use super::{MeasurementStore, PeriodSum};
use crate::aggregate::TimeWindow;
use crate::bucket::Granularity;
use crate::error::StoreError;
use crate::measurement::{Measurement, NewMeasurement};
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, QueryBuilder};
use std::time::Instant;

// Postgres caps bind parameters at 65535 per statement; each row binds three.
const MAX_ROWS_PER_STATEMENT: usize = 65535 / 3;

pub async fn build_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

#[derive(Clone)]
pub struct PgMeasurementStore {
    pool: PgPool,
}

impl PgMeasurementStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the `measurements` table and its lookup index when missing.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS measurements (
                id bigserial primary key,
                metric_id text not null,
                value double precision not null,
                datetime timestamptz not null
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS measurements_metric_id_datetime_idx
            ON measurements (metric_id, datetime)
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct PeriodSumRow {
    period: NaiveDateTime,
    value: f64,
}

#[async_trait]
impl MeasurementStore for PgMeasurementStore {
    async fn insert_batch(&self, batch: &[NewMeasurement]) -> Result<u64, StoreError> {
        if batch.is_empty() {
            return Ok(0);
        }

        let started = Instant::now();
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;
        for chunk in batch.chunks(MAX_ROWS_PER_STATEMENT) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO measurements (metric_id, value, datetime) ");
            builder.push_values(chunk.iter(), |mut b, measurement| {
                b.push_bind(&measurement.metric_id)
                    .push_bind(measurement.value)
                    .push_bind(measurement.datetime);
            });
            inserted += builder.build().execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;

        let micros = started.elapsed().as_micros() as u64;
        tracing::debug!(len = batch.len(), inserted, micros, "inserted measurement batch");
        Ok(inserted)
    }

    async fn fetch_range(
        &self,
        metric_id: &str,
        window: &TimeWindow,
    ) -> Result<Vec<Measurement>, StoreError> {
        let rows = sqlx::query_as::<_, Measurement>(
            r#"
            SELECT id, metric_id, value, datetime
            FROM measurements
            WHERE metric_id = $1
              AND datetime >= $2
              AND datetime < $3
            ORDER BY datetime ASC, id ASC
            "#,
        )
        .bind(metric_id)
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn sum_by_period(
        &self,
        metric_id: &str,
        granularity: Granularity,
        window: &TimeWindow,
    ) -> Result<Vec<PeriodSum>, StoreError> {
        let rows = sqlx::query_as::<_, PeriodSumRow>(
            r#"
            SELECT
                date_trunc($1, datetime AT TIME ZONE 'UTC') AS period,
                SUM(value) AS value
            FROM measurements
            WHERE metric_id = $2
              AND datetime >= $3
              AND datetime < $4
            GROUP BY period
            ORDER BY period ASC
            "#,
        )
        .bind(granularity.sql_unit())
        .bind(metric_id)
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| PeriodSum {
                period_start: row.period.and_utc(),
                value: row.value,
            })
            .collect())
    }
}
