// Industry Impact - Core Library
// What-if analysis of industry job losses for U.S. states and counties.
// Exposes all modules for use in the CLI, API server, and tests

pub mod config;
pub mod db;
pub mod error;
pub mod geography;
pub mod join;
pub mod logging;
pub mod metrics;
pub mod scope;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use config::{Cli, Command, EngineSettings, ServerConfig};
pub use db::{
    count_rows, import_directory, list_industries, list_states, open_read_only, setup_database, FactTable, ImportSummary,
    IndustryRecord, RegionKey, StateRecord,
};
pub use error::{ImpactError, Result};
pub use geography::{join_to_geography, Boundary, BoundarySet, GeoJoin, GeographyReference};
pub use join::{inner_join, JoinOutcome};
pub use logging::init_logging;
pub use metrics::{
    employment_share, employment_trend, income_impact, unemployment_rate, EmploymentShareReport,
    EmploymentShareRow, IncomeReport, IncomeRow, RegionRow, TrendPoint, UnemploymentReport, UnemploymentRow,
};
pub use scope::{Level, Scope};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
