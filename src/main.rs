use anyhow::Result;
use clap::Parser;
use metrics_aggregator::cli::{Args, Command, QueryArgs};
use metrics_aggregator::config::Config;
use metrics_aggregator::report::{JsonSheetSink, SpreadsheetSink};
use metrics_aggregator::store::{build_pool, PgMeasurementStore};
use metrics_aggregator::{AggregationRequest, MetricsService};
use std::io::Write;
use std::sync::Arc;

const SERVICE_NAME: &str = "metrics-aggregator";
const OTLP_TRACES_PATH: &str = "/v1/traces";

/// Log to stderr and, when an OTLP endpoint is configured, export spans too.
fn init_tracing(config: &Config) -> Result<()> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,metrics_aggregator=info".into());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr);
    let otel_layer = config
        .otlp_endpoint
        .as_deref()
        .map(otlp_tracer)
        .transpose()?
        .map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()?;
    Ok(())
}

fn otlp_tracer(endpoint: &str) -> Result<opentelemetry_sdk::trace::Tracer> {
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::{runtime::Tokio, trace::Config as TraceConfig, Resource};

    let exporter = opentelemetry_otlp::new_exporter()
        .http()
        .with_endpoint(traces_endpoint(endpoint));
    let resource = Resource::new(vec![KeyValue::new("service.name", SERVICE_NAME)]);
    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(TraceConfig::default().with_resource(resource))
        .install_batch(Tokio)?;
    Ok(tracer)
}

/// The HTTP exporter posts to the endpoint verbatim, so append the traces path.
fn traces_endpoint(base: &str) -> String {
    let base = base.trim().trim_end_matches('/');
    if base.ends_with(OTLP_TRACES_PATH) {
        base.to_string()
    } else {
        format!("{base}{OTLP_TRACES_PATH}")
    }
}

fn request_from(query: QueryArgs) -> AggregationRequest {
    AggregationRequest::new(
        query.metric_id,
        query.agg_type,
        query.date_initial,
        query.final_date,
    )
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    out.write_all(b"\n")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::from_env()?;
    init_tracing(&config)?;

    let pool = build_pool(&config.database_url, config.db_pool_size).await?;
    let store = PgMeasurementStore::new(pool);
    store.ensure_schema().await?;
    let service = MetricsService::with_batch_size(Arc::new(store), config.batch_size);

    match args.command {
        Command::Import { file } => {
            let path = file.unwrap_or_else(|| config.import_path.clone());
            let summary = service.import_csv_file(&path).await?;
            print_json(&summary)?;
        }
        Command::Aggregate(query) => {
            let series = service.aggregate_metrics(&request_from(query)).await?;
            print_json(&series)?;
        }
        Command::Report(query) => {
            let sheet = service.build_report(&request_from(query)).await?;
            tracing::info!(
                rows = sheet.rows.len(),
                filename = sheet.filename,
                "report assembled"
            );
            let mut sink = JsonSheetSink::new(std::io::stdout().lock());
            sink.write_sheet(&sheet)?;
        }
    }

    Ok(())
}
