use crate::ingest::DEFAULT_BATCH_SIZE;
use anyhow::{Context, Result};
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

const DEFAULT_IMPORT_PATH: &str = "src/media/METRICS_IMPORT.csv";
const DEFAULT_DB_POOL_SIZE: u32 = 10;
const DEFAULT_DB_PORT: u16 = 5432;

#[derive(Debug, Clone, Default, Deserialize)]
struct SetupConfigOverrides {
    #[serde(default)]
    database_url: Option<String>,
    #[serde(default)]
    batch_size: Option<usize>,
    #[serde(default)]
    db_pool_size: Option<u32>,
    #[serde(default)]
    import_path: Option<String>,
}

fn load_setup_config_overrides() -> Option<SetupConfigOverrides> {
    let path = env_value("METRICS_SETUP_CONFIG_PATH").map(PathBuf::from)?;
    if !path.exists() {
        return None;
    }
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "metrics-aggregator failed to read setup config; using env defaults"
            );
            return None;
        }
    };
    parse_setup_overrides(contents).or_else(|| {
        tracing::warn!(
            path = %path.display(),
            "metrics-aggregator failed to parse setup config; using env defaults"
        );
        None
    })
}

fn parse_setup_overrides(contents: String) -> Option<SetupConfigOverrides> {
    let mut bytes = contents.into_bytes();
    simd_json::serde::from_slice(&mut bytes).ok()
}

fn env_value(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_value(key).and_then(|value| value.parse::<T>().ok())
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub db_pool_size: u32,
    pub batch_size: usize,
    pub import_path: PathBuf,
    pub otlp_endpoint: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let overrides = load_setup_config_overrides().unwrap_or_default();

        let database_url = env_value("METRICS_DATABASE_URL")
            .or_else(|| env_value("DATABASE_URL"))
            .or_else(database_url_from_parts)
            .or_else(|| {
                overrides
                    .database_url
                    .as_deref()
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .map(str::to_string)
            })
            .context("METRICS_DATABASE_URL, DATABASE_URL or DB_HOST/DB_DATABASE is required (or database_url in the setup config)")?;

        let db_pool_size = env_parse::<u32>("METRICS_DB_POOL_SIZE")
            .or(overrides.db_pool_size)
            .filter(|v| *v != 0)
            .unwrap_or(DEFAULT_DB_POOL_SIZE);
        let batch_size = env_parse::<usize>("METRICS_BATCH_SIZE")
            .or(overrides.batch_size)
            .filter(|v| *v != 0)
            .unwrap_or(DEFAULT_BATCH_SIZE);
        let import_path = env_value("METRICS_IMPORT_PATH")
            .or(overrides.import_path)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_IMPORT_PATH));
        let otlp_endpoint = env_value("OTEL_EXPORTER_OTLP_ENDPOINT");

        Ok(Self {
            database_url,
            db_pool_size,
            batch_size,
            import_path,
            otlp_endpoint,
        })
    }
}

fn database_url_from_parts() -> Option<String> {
    let host = env_value("DB_HOST")?;
    let database = env_value("DB_DATABASE")?;
    let port = env_parse::<u16>("DB_PORT").unwrap_or(DEFAULT_DB_PORT);
    Some(compose_database_url(
        &host,
        port,
        &database,
        env_value("DB_USERNAME").as_deref(),
        env_value("DB_PASSWORD").as_deref(),
    ))
}

/// `postgresql://[user[:password]@]host:port/database`
fn compose_database_url(
    host: &str,
    port: u16,
    database: &str,
    username: Option<&str>,
    password: Option<&str>,
) -> String {
    let credentials = match (username, password) {
        (Some(user), Some(password)) => format!("{user}:{password}@"),
        (Some(user), None) => format!("{user}@"),
        _ => String::new(),
    };
    format!("postgresql://{credentials}{host}:{port}/{database}")
}
