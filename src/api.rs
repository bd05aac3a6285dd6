// 🌐 REST API - axum routes over the metric engine and geo joiner
//
// Each request opens its own read-only SQLite connection on the blocking
// pool. The only state shared between requests is the database path and the
// immutable geography reference.

use crate::config::EngineSettings;
use crate::db::{self, IndustryRecord, StateRecord};
use crate::error::ImpactError;
use crate::geography::{join_to_geography, GeographyReference};
use crate::metrics::{
    employment_share, employment_trend, income_impact, unemployment_rate, EmploymentShareRow, IncomeReport,
    TrendPoint, UnemploymentRow,
};
use crate::scope::Scope;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use geojson::FeatureCollection;
use rusqlite::Connection;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub database: Arc<PathBuf>,
    pub geography: Arc<GeographyReference>,
    pub settings: EngineSettings,
}

impl AppState {
    pub fn new(database: PathBuf, geography: GeographyReference, settings: EngineSettings) -> Self {
        AppState {
            database: Arc::new(database),
            geography: Arc::new(geography),
            settings,
        }
    }
}

/// Route parameters shared by every what-if endpoint
type ScenarioPath = Path<(String, i64, i32)>;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    Impact(ImpactError),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl From<ImpactError> for ApiError {
    fn from(err: ImpactError) -> Self {
        ApiError::Impact(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Impact(err) => {
                let status = match err {
                    ImpactError::NoData(_) => StatusCode::NOT_FOUND,
                    ImpactError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.to_string())
            }
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        if status.is_server_error() {
            error!(%status, %message, "request failed");
        } else {
            debug!(%status, %message, "request rejected");
        }

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Run `query` against a fresh read-only connection on the blocking pool
async fn with_connection<T, F>(state: &AppState, query: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T, ImpactError> + Send + 'static,
{
    let path = Arc::clone(&state.database);
    tokio::task::spawn_blocking(move || {
        let conn = db::open_read_only(&path)?;
        query(&conn)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("query task failed: {}", e)))?
    .map_err(ApiError::from)
}

// ============================================================================
// API HANDLERS
// ============================================================================

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

/// GET /api/health
async fn health_check() -> impl IntoResponse {
    Json(Health { status: "OK" })
}

/// GET /api/v1.0/get_states
async fn get_states(State(state): State<AppState>) -> ApiResult<Json<Vec<StateRecord>>> {
    let states = with_connection(&state, db::list_states).await?;
    Ok(Json(states))
}

/// GET /api/v1.0/get_industries
async fn get_industries(State(state): State<AppState>) -> ApiResult<Json<Vec<IndustryRecord>>> {
    let industries = with_connection(&state, db::list_industries).await?;
    Ok(Json(industries))
}

/// GET /api/v1.0/get_employment_map/:state_code/:industry_code/:reduction
async fn get_employment_map(
    State(state): State<AppState>,
    Path((state_code, industry_code, reduction)): ScenarioPath,
) -> ApiResult<Json<FeatureCollection>> {
    let scope = Scope::parse(&state_code);
    let query_scope = scope.clone();
    let report = with_connection(&state, move |conn| {
        employment_share(conn, &query_scope, industry_code, reduction)
    })
    .await?;

    let joined = join_to_geography(&report.rows, state.geography.boundaries(scope.level()))?;
    debug!(%scope, features = joined.collection.features.len(), unmatched_rows = joined.unmatched_rows, "employment map");
    Ok(Json(joined.collection))
}

/// GET /api/v1.0/get_employment_share/:state_code/:industry_code/:reduction
async fn get_employment_share(
    State(state): State<AppState>,
    Path((state_code, industry_code, reduction)): ScenarioPath,
) -> ApiResult<Json<Vec<EmploymentShareRow>>> {
    let scope = Scope::parse(&state_code);
    let report = with_connection(&state, move |conn| {
        employment_share(conn, &scope, industry_code, reduction)
    })
    .await?;
    Ok(Json(report.rows))
}

/// GET /api/v1.0/get_employment_trend/:state_code/:industry_code/:reduction
async fn get_employment_trend(
    State(state): State<AppState>,
    Path((state_code, industry_code, reduction)): ScenarioPath,
) -> ApiResult<Json<Vec<TrendPoint>>> {
    let scope = Scope::parse(&state_code);
    let forecast_year = state.settings.forecast_year;
    let trend = with_connection(&state, move |conn| {
        employment_trend(conn, &scope, industry_code, reduction, forecast_year)
    })
    .await?;
    Ok(Json(trend))
}

/// GET /api/v1.0/get_unemployment_rate/:state_code/:industry_code/:reduction
async fn get_unemployment_rate(
    State(state): State<AppState>,
    Path((state_code, industry_code, reduction)): ScenarioPath,
) -> ApiResult<Json<Vec<UnemploymentRow>>> {
    let scope = Scope::parse(&state_code);
    let reference_year = state.settings.reference_year;
    let report = with_connection(&state, move |conn| {
        unemployment_rate(conn, &scope, industry_code, reduction, reference_year)
    })
    .await?;
    Ok(Json(report.rows))
}

/// GET /api/v1.0/get_income_map/:state_code/:industry_code/:reduction
async fn get_income_map(
    State(state): State<AppState>,
    Path((state_code, industry_code, reduction)): ScenarioPath,
) -> ApiResult<Json<FeatureCollection>> {
    let scope = Scope::parse(&state_code);
    let query_scope = scope.clone();
    let report = with_connection(&state, move |conn| {
        income_impact(conn, &query_scope, industry_code, reduction)
    })
    .await?;

    let joined = join_to_geography(&report.rows, state.geography.boundaries(scope.level()))?;
    debug!(%scope, features = joined.collection.features.len(), unmatched_rows = joined.unmatched_rows, "income map");
    Ok(Json(joined.collection))
}

/// GET /api/v1.0/get_income/:state_code/:industry_code/:reduction
async fn get_income(
    State(state): State<AppState>,
    Path((state_code, industry_code, reduction)): ScenarioPath,
) -> ApiResult<Json<IncomeReport>> {
    let scope = Scope::parse(&state_code);
    let report = with_connection(&state, move |conn| {
        income_impact(conn, &scope, industry_code, reduction)
    })
    .await?;
    Ok(Json(report))
}

const EXAMPLE: &str = "US/1011/15";
const SCENARIO_ROUTES: [(&str, &str); 6] = [
    ("get_employment_map", "employment map (GeoJSON)"),
    ("get_employment_share", "employment share records"),
    ("get_employment_trend", "employment trend"),
    ("get_unemployment_rate", "unemployment rate"),
    ("get_income_map", "income map (GeoJSON)"),
    ("get_income", "income records"),
];

/// GET / - list the available routes
async fn welcome() -> Html<String> {
    let mut page = String::from("Available Routes:<br/>");
    page.push_str(r#"<a href="/api/v1.0/get_states">/api/v1.0/get_states</a> - return list of states<br/>"#);
    page.push_str(
        r#"<a href="/api/v1.0/get_industries">/api/v1.0/get_industries</a> - return list of industries<br/>"#,
    );
    for (route, description) in SCENARIO_ROUTES {
        page.push_str(&format!(
            "<a href=\"/api/v1.0/{route}/{EXAMPLE}\">/api/v1.0/{route}/&lt;string:state_code&gt;/&lt;int:industry_code&gt;/&lt;int:reduction&gt;</a> - return {description}<br/>"
        ));
    }
    Html(page)
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn build_router(state: AppState, timeout: Duration) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/v1.0/get_states", get(get_states))
        .route("/v1.0/get_industries", get(get_industries))
        .route("/v1.0/get_employment_map/:state_code/:industry_code/:reduction", get(get_employment_map))
        .route("/v1.0/get_employment_share/:state_code/:industry_code/:reduction", get(get_employment_share))
        .route("/v1.0/get_employment_trend/:state_code/:industry_code/:reduction", get(get_employment_trend))
        .route("/v1.0/get_unemployment_rate/:state_code/:industry_code/:reduction", get(get_unemployment_rate))
        .route("/v1.0/get_income_map/:state_code/:industry_code/:reduction", get(get_income_map))
        .route("/v1.0/get_income/:state_code/:industry_code/:reduction", get(get_income))
        .with_state(state);

    Router::new()
        .route("/", get(welcome))
        .nest("/api", api_routes)
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
