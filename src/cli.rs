use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "metrics-aggregator",
    version,
    about = "Metric CSV import and time-bucketed aggregation"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Import a `;` separated CSV file of measurements.
    Import {
        /// Defaults to METRICS_IMPORT_PATH.
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Print the summed series for one metric.
    Aggregate(QueryArgs),
    /// Print the day/month/year report sheet for one metric.
    Report(QueryArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct QueryArgs {
    #[arg(long)]
    pub metric_id: String,
    /// DAY, MONTH or YEAR.
    #[arg(long)]
    pub agg_type: String,
    #[arg(long)]
    pub date_initial: String,
    #[arg(long)]
    pub final_date: String,
}
