//! Payment endpoints
//!
//! Create, confirm, cancel, and list payments. Confirm and cancel are
//! idempotent replays: repeating a request returns the stored record
//! without side effects.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::models::{Payment, PaymentTargetKind};
use crate::services::NewPayment;
use crate::AppState;

/// Create payment request body
#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub payer_id: String,
    pub target_type: PaymentTargetKind,
    pub target_id: String,
    /// List price before any discount
    pub amount_minor: i64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub provider: String,
    pub coupon_code: Option<String>,
}

/// Confirm payment request body
#[derive(Debug, Default, Deserialize)]
pub struct ConfirmPaymentRequest {
    pub external_tx_id: Option<String>,
}

/// POST /payments
///
/// Create a PENDING payment. The discount is re-priced server-side.
pub async fn create_payment(
    State(state): State<AppState>,
    Json(req): Json<CreatePaymentRequest>,
) -> ApiResult<(StatusCode, Json<Payment>)> {
    let payment = state
        .payments
        .create(NewPayment {
            payer_id: req.payer_id,
            target_type: req.target_type,
            target_id: req.target_id,
            amount_minor: req.amount_minor,
            currency: req.currency,
            provider: req.provider,
            coupon_code: req.coupon_code,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// GET /payments/:id
pub async fn get_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> ApiResult<Json<Payment>> {
    Ok(Json(state.payments.get(&payment_id).await?))
}

/// POST /payments/:id/confirm
///
/// Settle a payment: flips the status, redeems the coupon, and credits
/// teacher earnings in one transaction.
pub async fn confirm_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
    Json(req): Json<ConfirmPaymentRequest>,
) -> ApiResult<Json<Payment>> {
    Ok(Json(
        state.payments.confirm(&payment_id, req.external_tx_id).await?,
    ))
}

/// POST /payments/:id/cancel
pub async fn cancel_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> ApiResult<Json<Payment>> {
    Ok(Json(state.payments.cancel(&payment_id).await?))
}

/// GET /users/:id/payments
///
/// Payment history for a payer, newest first.
pub async fn list_user_payments(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Vec<Payment>>> {
    Ok(Json(state.payments.list_for_payer(&user_id).await?))
}

/// Build payment routes
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/payments", post(create_payment))
        .route("/payments/:id", get(get_payment))
        .route("/payments/:id/confirm", post(confirm_payment))
        .route("/payments/:id/cancel", post(cancel_payment))
        .route("/users/:id/payments", get(list_user_payments))
}
