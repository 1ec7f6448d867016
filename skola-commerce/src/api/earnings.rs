//! Teacher earnings endpoints

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::models::{EarningsRecord, EarningsSummary};
use crate::AppState;

/// Calculate earnings request body
#[derive(Debug, Deserialize)]
pub struct CalculateRequest {
    /// Absent means every course the teacher owns
    pub course_id: Option<String>,
    pub year: i32,
    pub month: u32,
}

/// Query parameters for listing earnings records
#[derive(Debug, Default, Deserialize)]
pub struct EarningsQuery {
    pub year: Option<i32>,
}

/// POST /teachers/:id/earnings/calculate
///
/// Recompute a month from source data. Safe to repeat; each run replaces
/// the stored record.
pub async fn calculate_earnings(
    State(state): State<AppState>,
    Path(teacher_id): Path<String>,
    Json(req): Json<CalculateRequest>,
) -> ApiResult<Json<Vec<EarningsRecord>>> {
    let records = match req.course_id {
        Some(course_id) => vec![
            state
                .earnings
                .calculate_monthly(&teacher_id, &course_id, req.year, req.month)
                .await?,
        ],
        None => {
            state
                .earnings
                .calculate_all_courses(&teacher_id, req.year, req.month)
                .await?
        }
    };
    Ok(Json(records))
}

/// GET /teachers/:id/earnings?year=2026
pub async fn list_earnings(
    State(state): State<AppState>,
    Path(teacher_id): Path<String>,
    Query(query): Query<EarningsQuery>,
) -> ApiResult<Json<Vec<EarningsRecord>>> {
    Ok(Json(
        state.earnings.monthly_records(&teacher_id, query.year).await?,
    ))
}

/// GET /teachers/:id/earnings/summary
///
/// Lifetime, paid, pending, and available balance in one shot.
pub async fn earnings_summary(
    State(state): State<AppState>,
    Path(teacher_id): Path<String>,
) -> ApiResult<Json<EarningsSummary>> {
    Ok(Json(state.earnings.summary(&teacher_id).await?))
}

/// Build earnings routes
pub fn earnings_routes() -> Router<AppState> {
    Router::new()
        .route("/teachers/:id/earnings", get(list_earnings))
        .route("/teachers/:id/earnings/calculate", post(calculate_earnings))
        .route("/teachers/:id/earnings/summary", get(earnings_summary))
}
