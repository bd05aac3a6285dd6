// 🗄️ Fact Store - SQLite tables of annual county facts
//
// Read path: aggregate queries grouped by state, county, area name or year.
// Write path: CSV import only, used to build the database offline.

use crate::error::Result;
use crate::scope::Scope;
use anyhow::Context;
use rusqlite::{params, Connection, OpenFlags, Row};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

// ============================================================================
// REFERENCE RECORDS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    pub state_code: String,
    pub state_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndustryRecord {
    pub industry_code: i64,
    pub industry_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountyRecord {
    pub county_fips: String,
    pub county_name: String,
    pub state_code: String,
}

/// One row of `county_metric.csv`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountyMetricRecord {
    pub county_fips: String,
    pub year: i32,
    pub bls_labor_force: Option<f64>,
    pub bls_employed: Option<f64>,
    pub bea_total_income: Option<f64>,
    pub population: Option<f64>,
}

/// One row of `county_industry_metric.csv`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountyIndustryMetricRecord {
    pub county_fips: String,
    pub industry_code: i64,
    pub year: i32,
    pub bls_annual_employment: Option<f64>,
    pub bls_total_annual_wages: Option<f64>,
}

// ============================================================================
// AGGREGATE ROWS
// ============================================================================

/// Region identifier: a state, or a county within a state
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionKey {
    pub state_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub county_name: Option<String>,
}

impl RegionKey {
    pub fn state(state_code: &str) -> Self {
        RegionKey {
            state_code: state_code.to_string(),
            county_name: None,
        }
    }

    pub fn county(state_code: &str, county_name: &str) -> Self {
        RegionKey {
            state_code: state_code.to_string(),
            county_name: Some(county_name.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionTotal {
    pub region: RegionKey,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionIndustryIncome {
    pub region: RegionKey,
    pub industry_wage: f64,
    pub industry_employment: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionIncome {
    pub region: RegionKey,
    pub total_income: f64,
    pub population: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct YearTotal {
    pub year: i32,
    pub total: f64,
}

/// Area-keyed rows feed the unemployment join; the name may be absent in
/// malformed data and is checked before joining.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaTotal {
    pub area_name: Option<String>,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AreaLabor {
    pub area_name: Option<String>,
    pub labor_force: f64,
    pub employment: f64,
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // In-memory databases answer "memory" instead of "wal"
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS state (
            state_code TEXT PRIMARY KEY,
            state_name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS industry (
            industry_code INTEGER PRIMARY KEY,
            industry_name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS county (
            county_fips TEXT PRIMARY KEY,
            county_name TEXT NOT NULL,
            state_code TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS county_metric (
            county_fips TEXT NOT NULL,
            year INTEGER NOT NULL,
            bls_labor_force REAL,
            bls_employed REAL,
            bea_total_income REAL,
            population REAL,
            PRIMARY KEY (county_fips, year)
        );

        CREATE TABLE IF NOT EXISTS county_industry_metric (
            county_fips TEXT NOT NULL,
            industry_code INTEGER NOT NULL,
            year INTEGER NOT NULL,
            bls_annual_employment REAL,
            bls_total_annual_wages REAL,
            PRIMARY KEY (county_fips, industry_code, year)
        );

        CREATE INDEX IF NOT EXISTS idx_county_state ON county(state_code);
        CREATE INDEX IF NOT EXISTS idx_cm_year ON county_metric(year);
        CREATE INDEX IF NOT EXISTS idx_cim_year ON county_industry_metric(year);
        CREATE INDEX IF NOT EXISTS idx_cim_industry ON county_industry_metric(industry_code, year);",
    )?;

    Ok(())
}

/// Open an existing fact database for a single request
pub fn open_read_only(path: &Path) -> Result<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    Ok(conn)
}

// ============================================================================
// IMPORT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportSummary {
    pub states: usize,
    pub industries: usize,
    pub counties: usize,
    pub county_metrics: usize,
    pub county_industry_metrics: usize,
}

fn read_csv<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open CSV file {}", path.display()))?;

    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let row: T = result.with_context(|| format!("Failed to deserialize row in {}", path.display()))?;
        rows.push(row);
    }

    Ok(rows)
}

/// Load every fact CSV from `dir` in one transaction.
///
/// Rows replace existing rows with the same key, so importing the same
/// directory twice leaves the database unchanged.
pub fn import_directory(conn: &mut Connection, dir: &Path) -> anyhow::Result<ImportSummary> {
    let states: Vec<StateRecord> = read_csv(&dir.join("state.csv"))?;
    let industries: Vec<IndustryRecord> = read_csv(&dir.join("industry.csv"))?;
    let counties: Vec<CountyRecord> = read_csv(&dir.join("county.csv"))?;
    let county_metrics: Vec<CountyMetricRecord> = read_csv(&dir.join("county_metric.csv"))?;
    let industry_metrics: Vec<CountyIndustryMetricRecord> =
        read_csv(&dir.join("county_industry_metric.csv"))?;

    let tx = conn.transaction()?;
    insert_states(&tx, &states)?;
    insert_industries(&tx, &industries)?;
    insert_counties(&tx, &counties)?;
    insert_county_metrics(&tx, &county_metrics)?;
    insert_county_industry_metrics(&tx, &industry_metrics)?;
    tx.commit().context("Failed to commit import")?;

    let summary = ImportSummary {
        states: states.len(),
        industries: industries.len(),
        counties: counties.len(),
        county_metrics: county_metrics.len(),
        county_industry_metrics: industry_metrics.len(),
    };
    info!(?summary, dir = %dir.display(), "imported fact tables");

    Ok(summary)
}

pub fn insert_states(conn: &Connection, rows: &[StateRecord]) -> Result<()> {
    let mut stmt = conn.prepare("INSERT OR REPLACE INTO state (state_code, state_name) VALUES (?1, ?2)")?;
    for row in rows {
        stmt.execute(params![row.state_code, row.state_name])?;
    }
    Ok(())
}

pub fn insert_industries(conn: &Connection, rows: &[IndustryRecord]) -> Result<()> {
    let mut stmt =
        conn.prepare("INSERT OR REPLACE INTO industry (industry_code, industry_name) VALUES (?1, ?2)")?;
    for row in rows {
        stmt.execute(params![row.industry_code, row.industry_name])?;
    }
    Ok(())
}

pub fn insert_counties(conn: &Connection, rows: &[CountyRecord]) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT OR REPLACE INTO county (county_fips, county_name, state_code) VALUES (?1, ?2, ?3)",
    )?;
    for row in rows {
        stmt.execute(params![row.county_fips, row.county_name, row.state_code])?;
    }
    Ok(())
}

pub fn insert_county_metrics(conn: &Connection, rows: &[CountyMetricRecord]) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT OR REPLACE INTO county_metric (
            county_fips, year, bls_labor_force, bls_employed, bea_total_income, population
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for row in rows {
        stmt.execute(params![
            row.county_fips,
            row.year,
            row.bls_labor_force,
            row.bls_employed,
            row.bea_total_income,
            row.population,
        ])?;
    }
    Ok(())
}

pub fn insert_county_industry_metrics(conn: &Connection, rows: &[CountyIndustryMetricRecord]) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT OR REPLACE INTO county_industry_metric (
            county_fips, industry_code, year, bls_annual_employment, bls_total_annual_wages
        ) VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for row in rows {
        stmt.execute(params![
            row.county_fips,
            row.industry_code,
            row.year,
            row.bls_annual_employment,
            row.bls_total_annual_wages,
        ])?;
    }
    Ok(())
}

pub fn count_rows(conn: &Connection, table: FactTable) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", table.as_str());
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(count)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactTable {
    State,
    Industry,
    County,
    CountyMetric,
    CountyIndustryMetric,
}

impl FactTable {
    pub const ALL: [FactTable; 5] = [
        FactTable::State,
        FactTable::Industry,
        FactTable::County,
        FactTable::CountyMetric,
        FactTable::CountyIndustryMetric,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FactTable::State => "state",
            FactTable::Industry => "industry",
            FactTable::County => "county",
            FactTable::CountyMetric => "county_metric",
            FactTable::CountyIndustryMetric => "county_industry_metric",
        }
    }
}

// ============================================================================
// REFERENCE QUERIES
// ============================================================================

pub fn list_states(conn: &Connection) -> Result<Vec<StateRecord>> {
    let mut stmt = conn.prepare("SELECT state_code, state_name FROM state ORDER BY state_code")?;

    let states = stmt
        .query_map([], |row| {
            Ok(StateRecord {
                state_code: row.get(0)?,
                state_name: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(states)
}

pub fn list_industries(conn: &Connection) -> Result<Vec<IndustryRecord>> {
    let mut stmt = conn.prepare("SELECT industry_code, industry_name FROM industry ORDER BY industry_code")?;

    let industries = stmt
        .query_map([], |row| {
            Ok(IndustryRecord {
                industry_code: row.get(0)?,
                industry_name: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(industries)
}

// ============================================================================
// AGGREGATE QUERIES
// ============================================================================

/// Latest year of `county_industry_metric`, `None` when the table is empty
pub fn latest_industry_year(conn: &Connection) -> Result<Option<i32>> {
    let year = conn.query_row("SELECT MAX(year) FROM county_industry_metric", [], |row| row.get(0))?;
    debug!(?year, "resolved latest industry year");
    Ok(year)
}

/// Latest year of `county_metric`, `None` when the table is empty
pub fn latest_metric_year(conn: &Connection) -> Result<Option<i32>> {
    let year = conn.query_row("SELECT MAX(year) FROM county_metric", [], |row| row.get(0))?;
    debug!(?year, "resolved latest county metric year");
    Ok(year)
}

// SUM over only NULLs is NULL; it flows on as NaN like any other missing value
fn sum_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<f64> {
    Ok(row.get::<_, Option<f64>>(idx)?.unwrap_or(f64::NAN))
}

fn region_at(row: &Row<'_>, scope: &Scope) -> rusqlite::Result<RegionKey> {
    let state_code: String = row.get(0)?;
    let county_name = match scope {
        Scope::Country => None,
        Scope::State(_) => Some(row.get(1)?),
    };
    Ok(RegionKey {
        state_code,
        county_name,
    })
}

/// Column list and GROUP BY for region-keyed aggregates. Value columns
/// always start at `value_offset(scope)`.
fn region_columns(scope: &Scope) -> &'static str {
    match scope {
        Scope::Country => "c.state_code",
        Scope::State(_) => "c.state_code, c.county_name",
    }
}

fn value_offset(scope: &Scope) -> usize {
    match scope {
        Scope::Country => 1,
        Scope::State(_) => 2,
    }
}

/// Employment summed per region for `year`; `industry_code = None` sums all
/// industries.
pub fn employment_by_region(
    conn: &Connection,
    scope: &Scope,
    industry_code: Option<i64>,
    year: i32,
) -> Result<Vec<RegionTotal>> {
    let cols = region_columns(scope);
    let sql = format!(
        "SELECT {cols}, SUM(cim.bls_annual_employment)
           FROM county_industry_metric cim
                INNER JOIN county c ON c.county_fips = cim.county_fips
          WHERE cim.year = ?1
            AND (?2 IS NULL OR cim.industry_code = ?2)
            AND (?3 IS NULL OR c.state_code = ?3)
          GROUP BY {cols}
          ORDER BY {cols}"
    );

    let offset = value_offset(scope);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![year, industry_code, scope.state_code()], |row| {
            Ok(RegionTotal {
                region: region_at(row, scope)?,
                total: sum_at(row, offset)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    debug!(%scope, ?industry_code, year, rows = rows.len(), "employment by region");
    Ok(rows)
}

pub fn industry_income_by_region(
    conn: &Connection,
    scope: &Scope,
    industry_code: i64,
    year: i32,
) -> Result<Vec<RegionIndustryIncome>> {
    let cols = region_columns(scope);
    let sql = format!(
        "SELECT {cols},
                SUM(cim.bls_total_annual_wages),
                SUM(cim.bls_annual_employment)
           FROM county_industry_metric cim
                INNER JOIN county c ON c.county_fips = cim.county_fips
          WHERE cim.year = ?1
            AND cim.industry_code = ?2
            AND (?3 IS NULL OR c.state_code = ?3)
          GROUP BY {cols}
          ORDER BY {cols}"
    );

    let offset = value_offset(scope);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![year, industry_code, scope.state_code()], |row| {
            Ok(RegionIndustryIncome {
                region: region_at(row, scope)?,
                industry_wage: sum_at(row, offset)?,
                industry_employment: sum_at(row, offset + 1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    debug!(%scope, industry_code, year, rows = rows.len(), "industry income by region");
    Ok(rows)
}

pub fn income_by_region(conn: &Connection, scope: &Scope, year: i32) -> Result<Vec<RegionIncome>> {
    let cols = region_columns(scope);
    let sql = format!(
        "SELECT {cols},
                SUM(m.bea_total_income),
                SUM(m.population)
           FROM county_metric m
                INNER JOIN county c ON c.county_fips = m.county_fips
          WHERE m.year = ?1
            AND (?2 IS NULL OR c.state_code = ?2)
          GROUP BY {cols}
          ORDER BY {cols}"
    );

    let offset = value_offset(scope);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![year, scope.state_code()], |row| {
            Ok(RegionIncome {
                region: region_at(row, scope)?,
                total_income: sum_at(row, offset)?,
                population: sum_at(row, offset + 1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    debug!(%scope, year, rows = rows.len(), "income by region");
    Ok(rows)
}

/// Industry employment per year, every year on record, ascending.
///
/// At country scope every fact row counts, including FIPS codes the county
/// table does not know (statewide "unallocated" codes such as 06999).
pub fn industry_employment_by_year(
    conn: &Connection,
    scope: &Scope,
    industry_code: i64,
) -> Result<Vec<YearTotal>> {
    let mut stmt = conn.prepare(
        "SELECT cim.year, SUM(cim.bls_annual_employment)
           FROM county_industry_metric cim
                LEFT JOIN county c ON c.county_fips = cim.county_fips
          WHERE cim.industry_code = ?1
            AND (?2 IS NULL OR c.state_code = ?2)
          GROUP BY cim.year
          ORDER BY cim.year",
    )?;

    let rows = stmt
        .query_map(params![industry_code, scope.state_code()], |row| {
            Ok(YearTotal {
                year: row.get(0)?,
                total: sum_at(row, 1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    debug!(%scope, industry_code, rows = rows.len(), "industry employment by year");
    Ok(rows)
}

/// Area name is the state name for the whole country, the county name
/// within a state. Counties whose state is not on record drop out.
fn area_columns(scope: &Scope) -> (&'static str, &'static str) {
    match scope {
        Scope::Country => ("s.state_name", "INNER JOIN state s ON s.state_code = c.state_code"),
        Scope::State(_) => ("c.county_name", ""),
    }
}

pub fn industry_employment_by_area(
    conn: &Connection,
    scope: &Scope,
    industry_code: i64,
    year: i32,
) -> Result<Vec<AreaTotal>> {
    let (area, join) = area_columns(scope);
    let sql = format!(
        "SELECT {area}, SUM(cim.bls_annual_employment)
           FROM county_industry_metric cim
                INNER JOIN county c ON c.county_fips = cim.county_fips
                {join}
          WHERE cim.industry_code = ?1
            AND cim.year = ?2
            AND (?3 IS NULL OR c.state_code = ?3)
          GROUP BY {area}
          ORDER BY {area}"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![industry_code, year, scope.state_code()], |row| {
            Ok(AreaTotal {
                area_name: row.get(0)?,
                total: sum_at(row, 1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    debug!(%scope, industry_code, year, rows = rows.len(), "industry employment by area");
    Ok(rows)
}

pub fn labor_force_by_area(conn: &Connection, scope: &Scope, year: i32) -> Result<Vec<AreaLabor>> {
    let (area, join) = area_columns(scope);
    let sql = format!(
        "SELECT {area}, SUM(m.bls_labor_force), SUM(m.bls_employed)
           FROM county_metric m
                INNER JOIN county c ON c.county_fips = m.county_fips
                {join}
          WHERE m.year = ?1
            AND (?2 IS NULL OR c.state_code = ?2)
          GROUP BY {area}
          ORDER BY {area}"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![year, scope.state_code()], |row| {
            Ok(AreaLabor {
                area_name: row.get(0)?,
                labor_force: sum_at(row, 1)?,
                employment: sum_at(row, 2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    debug!(%scope, year, rows = rows.len(), "labor force by area");
    Ok(rows)
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

/// Small two-state fact set shared by the engine tests.
///
/// Latest industry year 2022: CA total 100 / industry 1011 = 10,
/// TX total 200 / industry 1011 = 20. Dallas has no 1011 activity.
#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub(crate) fn cim(fips: &str, industry: i64, year: i32, emp: f64, wages: f64) -> CountyIndustryMetricRecord {
        CountyIndustryMetricRecord {
            county_fips: fips.to_string(),
            industry_code: industry,
            year,
            bls_annual_employment: Some(emp),
            bls_total_annual_wages: Some(wages),
        }
    }

    pub(crate) fn cm(fips: &str, year: i32, lf: f64, emp: f64, income: f64, pop: f64) -> CountyMetricRecord {
        CountyMetricRecord {
            county_fips: fips.to_string(),
            year,
            bls_labor_force: Some(lf),
            bls_employed: Some(emp),
            bea_total_income: Some(income),
            population: Some(pop),
        }
    }

    pub(crate) fn seeded_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        seed(&conn);
        conn
    }

    pub(crate) fn seed(conn: &Connection) {
        setup_database(conn).unwrap();

        insert_states(
            conn,
            &[
                StateRecord { state_code: "CA".into(), state_name: "California".into() },
                StateRecord { state_code: "TX".into(), state_name: "Texas".into() },
            ],
        )
        .unwrap();

        insert_industries(
            conn,
            &[
                IndustryRecord { industry_code: 1011, industry_name: "Natural resources and mining".into() },
                IndustryRecord { industry_code: 1012, industry_name: "Construction".into() },
            ],
        )
        .unwrap();

        insert_counties(
            conn,
            &[
                CountyRecord { county_fips: "06001".into(), county_name: "Alameda".into(), state_code: "CA".into() },
                CountyRecord { county_fips: "06037".into(), county_name: "Los Angeles".into(), state_code: "CA".into() },
                CountyRecord { county_fips: "48201".into(), county_name: "Harris".into(), state_code: "TX".into() },
                CountyRecord { county_fips: "48113".into(), county_name: "Dallas".into(), state_code: "TX".into() },
            ],
        )
        .unwrap();

        insert_county_industry_metrics(
            conn,
            &[
                cim("06001", 1011, 2020, 3.0, 300.0),
                cim("06001", 1011, 2021, 5.0, 500.0),
                cim("48201", 1011, 2021, 25.0, 2500.0),
                cim("06001", 1011, 2022, 4.0, 400.0),
                cim("06001", 1012, 2022, 36.0, 1800.0),
                cim("06037", 1011, 2022, 6.0, 600.0),
                cim("06037", 1012, 2022, 54.0, 2700.0),
                cim("48201", 1011, 2022, 20.0, 2000.0),
                cim("48201", 1012, 2022, 100.0, 5000.0),
                cim("48113", 1012, 2022, 80.0, 4000.0),
            ],
        )
        .unwrap();

        insert_county_metrics(
            conn,
            &[
                cm("06001", 2022, 50.0, 45.0, 5000.0, 100.0),
                cm("06037", 2022, 70.0, 66.0, 7000.0, 140.0),
                cm("48201", 2022, 130.0, 120.0, 12000.0, 300.0),
                cm("48113", 2022, 90.0, 85.0, 8000.0, 200.0),
            ],
        )
        .unwrap();
    }
}
