// 💵 Income impact
//
// The industry wage table and the income table resolve their latest year
// independently, so the two years can differ. Both are reported and a
// mismatch is logged; they are not unified.

use super::{removed_fraction, warn_non_finite, warn_unmatched, RegionRow};
use crate::db::{self, RegionIncome, RegionIndustryIncome, RegionKey};
use crate::error::{ImpactError, Result};
use crate::join::inner_join;
use crate::scope::Scope;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeRow {
    pub state_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub county_name: Option<String>,
    pub total_income: f64,
    pub population: f64,
    pub industry_wage: f64,
    pub industry_employment: f64,
    pub per_capita_income: f64,
    pub per_capita_industry_wage: f64,
    pub total_reduced_income: f64,
    pub per_capita_reduced_income: f64,
    /// Percent change from `per_capita_income` to `per_capita_reduced_income`
    pub change_in_per_capita_income: f64,
}

impl RegionRow for IncomeRow {
    fn region(&self) -> RegionKey {
        RegionKey {
            state_code: self.state_code.clone(),
            county_name: self.county_name.clone(),
        }
    }
}

impl IncomeRow {
    pub fn derive(income: RegionIncome, industry: RegionIndustryIncome, reduction: i32) -> Self {
        let per_capita_income = income.total_income / income.population;
        let total_reduced_income = income.total_income - removed_fraction(reduction) * industry.industry_wage;
        let per_capita_reduced_income = total_reduced_income / income.population;

        IncomeRow {
            state_code: income.region.state_code,
            county_name: income.region.county_name,
            total_income: income.total_income,
            population: income.population,
            industry_wage: industry.industry_wage,
            industry_employment: industry.industry_employment,
            per_capita_income,
            per_capita_industry_wage: industry.industry_wage / industry.industry_employment,
            total_reduced_income,
            per_capita_reduced_income,
            change_in_per_capita_income: 100.0 * (per_capita_reduced_income - per_capita_income) / per_capita_income,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncomeReport {
    pub scope: Scope,
    pub industry_code: i64,
    pub reduction: i32,
    /// Latest year of the industry wage table
    pub industry_year: i32,
    /// Latest year of the income and population table
    pub income_year: i32,
    pub rows: Vec<IncomeRow>,
    pub unmatched_income_regions: usize,
    pub unmatched_industry_regions: usize,
}

impl IncomeReport {
    pub fn years_match(&self) -> bool {
        self.industry_year == self.income_year
    }
}

/// Join income with industry wages per region; returns the rows and the
/// unmatched (income, industry) counts.
pub fn compute_income_impact(
    income: Vec<RegionIncome>,
    industry: Vec<RegionIndustryIncome>,
    reduction: i32,
) -> (Vec<IncomeRow>, usize, usize) {
    let outcome = inner_join(
        income,
        industry,
        |i| i.region.clone(),
        |w| w.region.clone(),
        |inc, wage| IncomeRow::derive(inc, wage, reduction),
    );

    warn_unmatched("income_impact", "income", "industry_wage", &outcome);

    (outcome.matched, outcome.unmatched_left, outcome.unmatched_right)
}

pub fn income_impact(conn: &Connection, scope: &Scope, industry_code: i64, reduction: i32) -> Result<IncomeReport> {
    let industry_year = db::latest_industry_year(conn)?
        .ok_or_else(|| ImpactError::no_data("county_industry_metric is empty"))?;
    let income_year = db::latest_metric_year(conn)?
        .ok_or_else(|| ImpactError::no_data("county_metric is empty"))?;

    let industry = db::industry_income_by_region(conn, scope, industry_code, industry_year)?;
    if industry.is_empty() {
        return Err(ImpactError::no_data(format!(
            "no wages recorded for industry {} in {} for {}",
            industry_code, scope, industry_year
        )));
    }
    let income = db::income_by_region(conn, scope, income_year)?;

    let (rows, unmatched_income_regions, unmatched_industry_regions) =
        compute_income_impact(income, industry, reduction);

    warn_non_finite("income_impact", &rows, |r| {
        vec![
            r.per_capita_income,
            r.per_capita_industry_wage,
            r.per_capita_reduced_income,
            r.change_in_per_capita_income,
        ]
    });
    debug!(%scope, industry_code, reduction, industry_year, income_year, rows = rows.len(), "computed income impact");

    let report = IncomeReport {
        scope: scope.clone(),
        industry_code,
        reduction,
        industry_year,
        income_year,
        rows,
        unmatched_income_regions,
        unmatched_industry_regions,
    };

    if !report.years_match() {
        warn!(industry_year, income_year, "income impact mixes latest years from two tables");
    }

    Ok(report)
}
