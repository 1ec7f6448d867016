//! Payout request and decision endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::models::{PayoutRequest, PayoutStatus};
use crate::services::NewPayout;
use crate::AppState;

/// Request payout body
#[derive(Debug, Deserialize)]
pub struct RequestPayoutRequest {
    /// Absent means the full available balance
    pub amount_minor: Option<i64>,
    pub method: String,
    pub details: Option<serde_json::Value>,
}

/// Query parameters for listing a teacher's payouts
#[derive(Debug, Default, Deserialize)]
pub struct PayoutListQuery {
    pub status: Option<PayoutStatus>,
}

/// Approve payout body
#[derive(Debug, Deserialize)]
pub struct ApprovePayoutRequest {
    pub admin_id: String,
    pub external_tx_id: Option<String>,
}

/// Reject payout body
#[derive(Debug, Deserialize)]
pub struct RejectPayoutRequest {
    pub admin_id: String,
    pub reason: String,
}

/// POST /teachers/:id/payouts
pub async fn request_payout(
    State(state): State<AppState>,
    Path(teacher_id): Path<String>,
    Json(req): Json<RequestPayoutRequest>,
) -> ApiResult<(StatusCode, Json<PayoutRequest>)> {
    let payout = state
        .payouts
        .request_payout(NewPayout {
            teacher_id,
            amount_minor: req.amount_minor,
            method: req.method,
            details: req.details,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(payout)))
}

/// GET /teachers/:id/payouts?status=PENDING
pub async fn list_teacher_payouts(
    State(state): State<AppState>,
    Path(teacher_id): Path<String>,
    Query(query): Query<PayoutListQuery>,
) -> ApiResult<Json<Vec<PayoutRequest>>> {
    Ok(Json(
        state.payouts.list_for_teacher(&teacher_id, query.status).await?,
    ))
}

/// GET /payouts/pending
///
/// Admin queue, oldest request first.
pub async fn list_pending_payouts(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<PayoutRequest>>> {
    Ok(Json(state.payouts.list_pending().await?))
}

/// GET /payouts/:id
pub async fn get_payout(
    State(state): State<AppState>,
    Path(payout_id): Path<String>,
) -> ApiResult<Json<PayoutRequest>> {
    Ok(Json(state.payouts.get(&payout_id).await?))
}

/// POST /payouts/:id/approve
pub async fn approve_payout(
    State(state): State<AppState>,
    Path(payout_id): Path<String>,
    Json(req): Json<ApprovePayoutRequest>,
) -> ApiResult<Json<PayoutRequest>> {
    Ok(Json(
        state
            .payouts
            .approve(&payout_id, &req.admin_id, req.external_tx_id)
            .await?,
    ))
}

/// POST /payouts/:id/reject
pub async fn reject_payout(
    State(state): State<AppState>,
    Path(payout_id): Path<String>,
    Json(req): Json<RejectPayoutRequest>,
) -> ApiResult<Json<PayoutRequest>> {
    Ok(Json(
        state
            .payouts
            .reject(&payout_id, &req.admin_id, &req.reason)
            .await?,
    ))
}

/// Build payout routes
pub fn payout_routes() -> Router<AppState> {
    Router::new()
        .route("/teachers/:id/payouts", post(request_payout).get(list_teacher_payouts))
        .route("/payouts/pending", get(list_pending_payouts))
        .route("/payouts/:id", get(get_payout))
        .route("/payouts/:id/approve", post(approve_payout))
        .route("/payouts/:id/reject", post(reject_payout))
}
