// 👷 Employment share and employment trend

use super::{removed_fraction, retained_fraction, warn_non_finite, warn_unmatched, RegionRow};
use crate::db::{self, RegionKey, RegionTotal, YearTotal};
use crate::error::{ImpactError, Result};
use crate::join::inner_join;
use crate::scope::Scope;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Year the employment trend is projected to
pub const DEFAULT_FORECAST_YEAR: i32 = 2030;

// ============================================================================
// EMPLOYMENT SHARE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmploymentShareRow {
    pub state_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub county_name: Option<String>,
    pub total_employment: f64,
    pub industry_employment: f64,
    pub current_industry_share: f64,
    pub reduced_industry_share: f64,
}

impl RegionRow for EmploymentShareRow {
    fn region(&self) -> RegionKey {
        RegionKey {
            state_code: self.state_code.clone(),
            county_name: self.county_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmploymentShareReport {
    pub scope: Scope,
    pub industry_code: i64,
    pub reduction: i32,
    /// Latest year of the industry fact table, resolved once for the call
    pub year: i32,
    pub rows: Vec<EmploymentShareRow>,
    /// Regions with employment on record but none in this industry
    pub regions_without_industry: usize,
}

/// Current and reduced industry share of total employment, in percent.
///
/// With `r` the retained fraction, the reduced share is
/// `100 * r * industry / (total - (1 - r) * industry)`: the removed jobs
/// leave both the industry and the total.
pub fn industry_shares(total_employment: f64, industry_employment: f64, reduction: i32) -> (f64, f64) {
    let current = 100.0 * industry_employment / total_employment;
    let reduced = 100.0 * (retained_fraction(reduction) * industry_employment)
        / (total_employment - removed_fraction(reduction) * industry_employment);
    (current, reduced)
}

/// Join region totals with industry totals and derive both shares.
///
/// Regions with no industry row are dropped; the second value counts them.
pub fn compute_employment_share(
    totals: Vec<RegionTotal>,
    industry: Vec<RegionTotal>,
    reduction: i32,
) -> (Vec<EmploymentShareRow>, usize) {
    let outcome = inner_join(
        totals,
        industry,
        |t| t.region.clone(),
        |i| i.region.clone(),
        |total, ind| {
            let (current, reduced) = industry_shares(total.total, ind.total, reduction);
            EmploymentShareRow {
                state_code: total.region.state_code,
                county_name: total.region.county_name,
                total_employment: total.total,
                industry_employment: ind.total,
                current_industry_share: current,
                reduced_industry_share: reduced,
            }
        },
    );

    warn_unmatched("employment_share", "total_employment", "industry_employment", &outcome);

    (outcome.matched, outcome.unmatched_left)
}

pub fn employment_share(
    conn: &Connection,
    scope: &Scope,
    industry_code: i64,
    reduction: i32,
) -> Result<EmploymentShareReport> {
    let year = db::latest_industry_year(conn)?
        .ok_or_else(|| ImpactError::no_data("county_industry_metric is empty"))?;

    let totals = db::employment_by_region(conn, scope, None, year)?;
    let industry = db::employment_by_region(conn, scope, Some(industry_code), year)?;
    if industry.is_empty() {
        return Err(ImpactError::no_data(format!(
            "no employment recorded for industry {} in {} for {}",
            industry_code, scope, year
        )));
    }

    let (rows, regions_without_industry) = compute_employment_share(totals, industry, reduction);
    warn_non_finite("employment_share", &rows, |r| {
        vec![r.current_industry_share, r.reduced_industry_share]
    });
    debug!(%scope, industry_code, reduction, year, rows = rows.len(), "computed employment share");

    Ok(EmploymentShareReport {
        scope: scope.clone(),
        industry_code,
        reduction,
        year,
        rows,
        regions_without_industry,
    })
}

// ============================================================================
// EMPLOYMENT TREND
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub year: i32,
    pub metric: f64,
}

impl From<YearTotal> for TrendPoint {
    fn from(total: YearTotal) -> Self {
        TrendPoint {
            year: total.year,
            metric: total.total,
        }
    }
}

/// Sort history by year and append the forecast for `forecast_year`, which
/// keeps `(100 - reduction)%` of the most recent value.
///
/// The forecast is always last, even if `forecast_year` is not after the
/// history.
pub fn forecast_trend(mut history: Vec<TrendPoint>, reduction: i32, forecast_year: i32) -> Result<Vec<TrendPoint>> {
    history.sort_by_key(|p| p.year);

    let latest = history
        .last()
        .map(|p| p.metric)
        .ok_or_else(|| ImpactError::no_data("no employment history to forecast from"))?;

    history.push(TrendPoint {
        year: forecast_year,
        metric: latest * retained_fraction(reduction),
    });

    Ok(history)
}

pub fn employment_trend(
    conn: &Connection,
    scope: &Scope,
    industry_code: i64,
    reduction: i32,
    forecast_year: i32,
) -> Result<Vec<TrendPoint>> {
    let history: Vec<TrendPoint> = db::industry_employment_by_year(conn, scope, industry_code)?
        .into_iter()
        .map(TrendPoint::from)
        .collect();

    let trend = forecast_trend(history, reduction, forecast_year)?;
    debug!(%scope, industry_code, reduction, points = trend.len(), "computed employment trend");
    Ok(trend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::seeded_connection;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn total(state: &str, value: f64) -> RegionTotal {
        RegionTotal {
            region: RegionKey::state(state),
            total: value,
        }
    }

    #[test]
    fn test_share_scenario_two_states() {
        let totals = vec![total("CA", 100.0), total("TX", 200.0)];
        let industry = vec![total("CA", 10.0), total("TX", 20.0)];

        let (rows, dropped) = compute_employment_share(totals, industry, 15);

        assert_eq!(dropped, 0);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].current_industry_share, 10.0);
        assert_eq!(rows[1].current_industry_share, 10.0);
        assert!(approx(rows[0].reduced_industry_share, 850.0 / 98.5));
        assert!(approx(rows[1].reduced_industry_share, 1700.0 / 197.0));
    }

    #[test]
    fn test_zero_reduction_is_noop() {
        for (t, i) in [(100.0, 10.0), (37.0, 5.0), (1.0, 1.0)] {
            let (current, reduced) = industry_shares(t, i, 0);
            assert_eq!(current, reduced);
        }
    }

    #[test]
    fn test_reduced_share_keeps_sign() {
        let pairs = [(200.0, 20.0), (100.0, 100.0), (37.0, 5.0), (1.0, 1.0), (1000.0, 999.0), (50.0, 0.5)];
        for (total, industry) in pairs {
            for reduction in [0, 15, 50, 99, 100] {
                if total <= removed_fraction(reduction) * industry {
                    continue;
                }
                let (current, reduced) = industry_shares(total, industry, reduction);
                assert!(current > 0.0);
                assert!(reduced >= 0.0, "({}, {}) at {}% gave {}", total, industry, reduction, reduced);
            }
        }
    }

    #[test]
    fn test_trend_at_i32_limits_does_not_overflow() {
        let history = vec![TrendPoint { year: 2022, metric: 10.0 }];

        let trend = forecast_trend(history.clone(), i32::MIN, 2030).unwrap();
        assert!(trend[1].metric.is_finite());
        assert!(trend[1].metric > 0.0);

        let trend = forecast_trend(history, i32::MAX, 2030).unwrap();
        assert!(trend[1].metric.is_finite());
        assert!(trend[1].metric < 0.0);
    }

    #[test]
    fn test_regions_without_industry_are_dropped() {
        let totals = vec![total("CA", 100.0), total("NV", 40.0)];
        let industry = vec![total("CA", 10.0)];

        let (rows, dropped) = compute_employment_share(totals, industry, 15);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].state_code, "CA");
        assert_eq!(dropped, 1);
    }

    #[test]
    fn test_empty_industry_drops_every_region() {
        let (rows, dropped) = compute_employment_share(vec![total("CA", 1.0), total("TX", 2.0)], vec![], 15);
        assert!(rows.is_empty());
        assert_eq!(dropped, 2);
    }

    #[test]
    fn test_zero_total_propagates_non_finite() {
        let (current, reduced) = industry_shares(0.0, 0.0, 15);
        assert!(current.is_nan());
        assert!(reduced.is_nan());
    }

    #[test]
    fn test_employment_share_from_store() {
        let conn = seeded_connection();

        let report = employment_share(&conn, &Scope::Country, 1011, 15).unwrap();
        assert_eq!(report.year, 2022);
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0].state_code, "CA");
        assert_eq!(report.rows[0].total_employment, 100.0);
        assert_eq!(report.rows[0].industry_employment, 10.0);
        assert!(approx(report.rows[1].reduced_industry_share, 1700.0 / 197.0));
    }

    #[test]
    fn test_employment_share_county_scope_drops_inactive_county() {
        let conn = seeded_connection();

        let report = employment_share(&conn, &Scope::State("TX".into()), 1011, 15).unwrap();
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].county_name.as_deref(), Some("Harris"));
        assert_eq!(report.regions_without_industry, 1);
    }

    #[test]
    fn test_employment_share_unknown_industry() {
        let conn = seeded_connection();
        let err = employment_share(&conn, &Scope::Country, 9999, 15).unwrap_err();
        assert!(matches!(err, ImpactError::NoData(_)));
        assert!(err.to_string().contains("9999"));
    }

    #[test]
    fn test_trend_scenario() {
        let history = vec![
            TrendPoint { year: 2019, metric: 50.0 },
            TrendPoint { year: 2020, metric: 40.0 },
            TrendPoint { year: 2021, metric: 60.0 },
        ];

        let trend = forecast_trend(history, 20, DEFAULT_FORECAST_YEAR).unwrap();

        assert_eq!(trend.len(), 4);
        assert_eq!(trend[3], TrendPoint { year: 2030, metric: 48.0 });
        assert_eq!(trend[2], TrendPoint { year: 2021, metric: 60.0 });
    }

    #[test]
    fn test_trend_sorts_before_forecasting() {
        let history = vec![
            TrendPoint { year: 2021, metric: 60.0 },
            TrendPoint { year: 2019, metric: 50.0 },
        ];

        let trend = forecast_trend(history, 50, 2030).unwrap();

        let years: Vec<i32> = trend.iter().map(|p| p.year).collect();
        assert_eq!(years, vec![2019, 2021, 2030]);
        assert_eq!(trend[2].metric, 30.0);
    }

    #[test]
    fn test_trend_forecast_is_last_even_when_earlier() {
        let history = vec![TrendPoint { year: 2040, metric: 10.0 }];
        let trend = forecast_trend(history, 0, 2030).unwrap();
        assert_eq!(trend.last().unwrap().year, 2030);
        assert_eq!(trend.last().unwrap().metric, 10.0);
    }

    #[test]
    fn test_trend_empty_is_no_data() {
        let err = forecast_trend(vec![], 20, 2030).unwrap_err();
        assert!(matches!(err, ImpactError::NoData(_)));
    }

    #[test]
    fn test_employment_trend_from_store() {
        let conn = seeded_connection();

        let trend = employment_trend(&conn, &Scope::Country, 1011, 20, 2030).unwrap();
        assert_eq!(
            trend,
            vec![
                TrendPoint { year: 2020, metric: 3.0 },
                TrendPoint { year: 2021, metric: 30.0 },
                TrendPoint { year: 2022, metric: 30.0 },
                TrendPoint { year: 2030, metric: 24.0 },
            ]
        );

        let ca = employment_trend(&conn, &Scope::State("CA".into()), 1011, 0, 2030).unwrap();
        assert_eq!(ca.len(), 4);
        assert_eq!(ca[2].metric, 10.0);
        assert_eq!(ca[3].metric, 10.0);
    }

    #[test]
    fn test_employment_trend_unknown_state() {
        let conn = seeded_connection();
        let err = employment_trend(&conn, &Scope::State("ZZ".into()), 1011, 20, 2030).unwrap_err();
        assert!(matches!(err, ImpactError::NoData(_)));
    }
}
