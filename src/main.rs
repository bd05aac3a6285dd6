use anyhow::{Context, Result};
use clap::Parser;
use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;
use tracing::info;

use industry_impact::{
    count_rows, employment_share, employment_trend, import_directory, income_impact, init_logging, open_read_only,
    setup_database, unemployment_rate, Cli, Command, EmploymentShareReport, FactTable, EngineSettings, IncomeReport, Scope,
    TrendPoint, UnemploymentReport,
};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Import { data_dir, database } => run_import(&data_dir, &database),
        Command::Scenario {
            database,
            state_code,
            industry_code,
            reduction,
            engine,
        } => run_scenario(&database, &state_code, industry_code, reduction, engine),
    }
}

fn run_import(data_dir: &Path, db_path: &Path) -> Result<()> {
    info!(data_dir = %data_dir.display(), database = %db_path.display(), "importing fact tables");

    let mut conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    setup_database(&conn)?;

    let summary = import_directory(&mut conn, data_dir)?;

    println!("✓ States:                  {}", summary.states);
    println!("✓ Industries:              {}", summary.industries);
    println!("✓ Counties:                {}", summary.counties);
    println!("✓ County metrics:          {}", summary.county_metrics);
    println!("✓ County industry metrics: {}", summary.county_industry_metrics);

    println!();
    println!("Rows in store:");
    for table in FactTable::ALL {
        println!("  {:<24} {}", table.as_str(), count_rows(&conn, table)?);
    }

    Ok(())
}

#[derive(Serialize)]
struct ScenarioOutput {
    employment_share: EmploymentShareReport,
    employment_trend: Vec<TrendPoint>,
    unemployment: UnemploymentReport,
    income: IncomeReport,
}

fn run_scenario(
    db_path: &Path,
    state_code: &str,
    industry_code: i64,
    reduction: i32,
    engine: EngineSettings,
) -> Result<()> {
    if !db_path.exists() {
        anyhow::bail!(
            "Database not found at {} (run `industry-impact import` first)",
            db_path.display()
        );
    }

    let conn = open_read_only(db_path)?;
    let scope = Scope::parse(state_code);

    let output = ScenarioOutput {
        employment_share: employment_share(&conn, &scope, industry_code, reduction)
            .context("employment share")?,
        employment_trend: employment_trend(&conn, &scope, industry_code, reduction, engine.forecast_year)
            .context("employment trend")?,
        unemployment: unemployment_rate(&conn, &scope, industry_code, reduction, engine.reference_year)
            .context("unemployment rate")?,
        income: income_impact(&conn, &scope, industry_code, reduction).context("income impact")?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
