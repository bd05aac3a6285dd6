// 📉 Unemployment rate impact
//
// Joins industry employment with labor force figures by area name for a
// fixed reference year and projects the unemployment rate if the removed
// industry jobs became unemployed.

use super::{removed_fraction, warn_non_finite, warn_unmatched};
use crate::db::{self, AreaLabor, AreaTotal};
use crate::error::{ImpactError, Result};
use crate::join::inner_join;
use crate::scope::Scope;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Year both unemployment aggregates are taken from
pub const DEFAULT_REFERENCE_YEAR: i32 = 2022;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnemploymentRow {
    pub area_name: String,
    pub industry_employment: f64,
    pub labor_force: f64,
    pub employment: f64,
    pub unemployment_rate: f64,
    /// Rate over the whole joined region set, identical on every row
    pub average_unemployment_rate: f64,
    pub forecasted_unemployment_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnemploymentReport {
    pub year: i32,
    pub rows: Vec<UnemploymentRow>,
    pub unmatched_industry_areas: usize,
    pub unmatched_labor_areas: usize,
}

fn require_area_names<'a>(label: &str, names: impl Iterator<Item = &'a Option<String>>) -> Result<()> {
    for name in names {
        match name {
            Some(n) if !n.trim().is_empty() => {}
            _ => {
                return Err(ImpactError::validation(format!(
                    "area_name not found in {} aggregate",
                    label
                )))
            }
        }
    }
    Ok(())
}

fn rate(labor_force: f64, employment: f64) -> f64 {
    100.0 * (labor_force - employment) / labor_force
}

/// Join both aggregates on area name and derive the rates.
///
/// Every row of both inputs must carry an area name before the join is
/// attempted.
pub fn compute_unemployment(
    industry: Vec<AreaTotal>,
    labor: Vec<AreaLabor>,
    reduction: i32,
    year: i32,
) -> Result<UnemploymentReport> {
    if industry.is_empty() {
        return Err(ImpactError::no_data("no industry employment for this scope"));
    }
    if labor.is_empty() {
        return Err(ImpactError::no_data("no labor force data for this scope"));
    }

    require_area_names("industry employment", industry.iter().map(|r| &r.area_name))?;
    require_area_names("labor force", labor.iter().map(|r| &r.area_name))?;

    let removed = removed_fraction(reduction);
    let outcome = inner_join(
        industry,
        labor,
        |i| i.area_name.clone(),
        |l| l.area_name.clone(),
        |ind, lab| UnemploymentRow {
            area_name: ind.area_name.unwrap_or_default(),
            industry_employment: ind.total,
            labor_force: lab.labor_force,
            employment: lab.employment,
            unemployment_rate: rate(lab.labor_force, lab.employment),
            average_unemployment_rate: 0.0,
            forecasted_unemployment_rate: rate(lab.labor_force, lab.employment - removed * ind.total),
        },
    );

    warn_unmatched("unemployment_rate", "industry_employment", "labor_force", &outcome);

    let mut rows = outcome.matched;
    let labor_force: f64 = rows.iter().map(|r| r.labor_force).sum();
    let employment: f64 = rows.iter().map(|r| r.employment).sum();
    let average = rate(labor_force, employment);
    for row in &mut rows {
        row.average_unemployment_rate = average;
    }

    warn_non_finite("unemployment_rate", &rows, |r| {
        vec![r.unemployment_rate, r.average_unemployment_rate, r.forecasted_unemployment_rate]
    });

    Ok(UnemploymentReport {
        year,
        rows,
        unmatched_industry_areas: outcome.unmatched_left,
        unmatched_labor_areas: outcome.unmatched_right,
    })
}

pub fn unemployment_rate(
    conn: &Connection,
    scope: &Scope,
    industry_code: i64,
    reduction: i32,
    reference_year: i32,
) -> Result<UnemploymentReport> {
    let industry = db::industry_employment_by_area(conn, scope, industry_code, reference_year)?;
    let labor = db::labor_force_by_area(conn, scope, reference_year)?;

    let report = compute_unemployment(industry, labor, reduction, reference_year)?;
    debug!(%scope, industry_code, reduction, reference_year, rows = report.rows.len(), "computed unemployment rate");
    Ok(report)
}
