// ⚙️ Configuration - command line flags with environment fallbacks

use crate::metrics::{DEFAULT_FORECAST_YEAR, DEFAULT_REFERENCE_YEAR};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Fixed years the engine projects to and reads unemployment from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Args)]
pub struct EngineSettings {
    /// Year the employment trend is forecast to
    #[arg(long, env = "IMPACT_FORECAST_YEAR", default_value_t = DEFAULT_FORECAST_YEAR)]
    pub forecast_year: i32,

    /// Year both unemployment aggregates are read from
    #[arg(long, env = "IMPACT_REFERENCE_YEAR", default_value_t = DEFAULT_REFERENCE_YEAR)]
    pub reference_year: i32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            forecast_year: DEFAULT_FORECAST_YEAR,
            reference_year: DEFAULT_REFERENCE_YEAR,
        }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "impact-server")]
#[command(about = "What-if industry impact API for U.S. states and counties")]
#[command(version)]
pub struct ServerConfig {
    /// SQLite fact database
    #[arg(long, env = "IMPACT_DATABASE", default_value = "data.sqlite")]
    pub database: PathBuf,

    /// State boundaries (GeoJSON FeatureCollection)
    #[arg(long, env = "IMPACT_STATES", default_value = "geo/cb_2021_us_state_500k.geojson")]
    pub states: PathBuf,

    /// County boundaries (GeoJSON FeatureCollection)
    #[arg(long, env = "IMPACT_COUNTIES", default_value = "geo/cb_2021_us_county_500k.geojson")]
    pub counties: PathBuf,

    /// Address to listen on
    #[arg(long, env = "IMPACT_BIND", default_value = "0.0.0.0:3000")]
    pub bind: String,

    /// Per-request timeout in seconds
    #[arg(long, env = "IMPACT_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    #[command(flatten)]
    pub engine: EngineSettings,

    /// Enable debug logging when RUST_LOG is unset
    #[arg(short, long)]
    pub verbose: bool,
}

impl ServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Parser)]
#[command(name = "industry-impact")]
#[command(about = "Build the fact database and run impact scenarios")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging when RUST_LOG is unset
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load the fact CSVs of a directory into the database
    Import {
        /// Directory holding state.csv, industry.csv, county.csv,
        /// county_metric.csv and county_industry_metric.csv
        #[arg(long)]
        data_dir: PathBuf,

        #[arg(long, env = "IMPACT_DATABASE", default_value = "data.sqlite")]
        database: PathBuf,
    },

    /// Run every computation for one scenario and print it as JSON
    Scenario {
        #[arg(long, env = "IMPACT_DATABASE", default_value = "data.sqlite")]
        database: PathBuf,

        /// "US" for the whole country, or a state postal code
        state_code: String,

        industry_code: i64,

        /// Percentage reduction of the industry
        #[arg(allow_hyphen_values = true)]
        reduction: i32,

        #[command(flatten)]
        engine: EngineSettings,
    },
}
