// 📊 Metric Engine - what-if derivations over fact store aggregates
//
// Every operation takes (scope, industry_code, reduction_percent). The
// reduction is not range-checked: values outside 0..=100 give numerically
// valid but meaningless results.
//
// Division is not guarded. A zero denominator yields inf/NaN in the row,
// which serializes as JSON null; the count of affected rows is logged.

pub mod employment;
pub mod income;
pub mod unemployment;

pub use employment::{
    compute_employment_share, employment_share, employment_trend, forecast_trend, industry_shares,
    EmploymentShareReport, EmploymentShareRow, TrendPoint, DEFAULT_FORECAST_YEAR,
};
pub use income::{compute_income_impact, income_impact, IncomeReport, IncomeRow};
pub use unemployment::{
    compute_unemployment, unemployment_rate, UnemploymentReport, UnemploymentRow, DEFAULT_REFERENCE_YEAR,
};

use crate::db::RegionKey;
use crate::join::JoinOutcome;
use serde::Serialize;
use tracing::warn;

/// Share of an industry's figures kept after the reduction: (100 - p) / 100
pub fn retained_fraction(reduction: i32) -> f64 {
    (100.0 - reduction as f64) / 100.0
}

/// Share of an industry's figures removed by the reduction: p / 100
pub fn removed_fraction(reduction: i32) -> f64 {
    reduction as f64 / 100.0
}

/// A metric row that belongs to a state or county and can be drawn on a map
pub trait RegionRow: Serialize {
    fn region(&self) -> RegionKey;
}

/// Log rows whose derived values hit a zero denominator
pub(crate) fn warn_non_finite<T>(operation: &str, rows: &[T], values: impl Fn(&T) -> Vec<f64>) {
    let affected = rows
        .iter()
        .filter(|row| values(row).iter().any(|v| !v.is_finite()))
        .count();

    if affected > 0 {
        warn!(operation, affected, total = rows.len(), "rows contain non-finite values");
    }
}

/// Log regions that vanished in an inner join
pub(crate) fn warn_unmatched<T>(operation: &str, left: &str, right: &str, outcome: &JoinOutcome<T>) {
    if !outcome.is_lossless() {
        warn!(
            operation,
            unmatched_left = outcome.unmatched_left,
            unmatched_right = outcome.unmatched_right,
            left,
            right,
            "inner join dropped rows"
        );
    }
}
