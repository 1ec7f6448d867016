//! Coupon administration and pricing endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::models::{Coupon, CouponQuote, CouponScope, CouponType, PaymentTargetKind};
use crate::services::NewCoupon;
use crate::AppState;

/// Create coupon request body
#[derive(Debug, Deserialize)]
pub struct CreateCouponRequest {
    /// Explicit code; generated when absent
    pub code: Option<String>,
    pub coupon_type: CouponType,
    pub value: i64,
    #[serde(default)]
    pub min_purchase_minor: i64,
    pub max_discount_minor: Option<i64>,
    pub usage_limit: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub applies_to: CouponScope,
    pub scope_id: Option<String>,
}

/// Price preview request body
#[derive(Debug, Deserialize)]
pub struct PriceRequest {
    pub amount_minor: i64,
    pub target_type: Option<PaymentTargetKind>,
    pub target_id: Option<String>,
}

/// POST /coupons
pub async fn create_coupon(
    State(state): State<AppState>,
    Json(req): Json<CreateCouponRequest>,
) -> ApiResult<(StatusCode, Json<Coupon>)> {
    let coupon = state
        .coupons
        .create_coupon(NewCoupon {
            code: req.code,
            coupon_type: req.coupon_type,
            value: req.value,
            min_purchase_minor: req.min_purchase_minor,
            max_discount_minor: req.max_discount_minor,
            usage_limit: req.usage_limit,
            expires_at: req.expires_at,
            applies_to: req.applies_to,
            scope_id: req.scope_id,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(coupon)))
}

/// GET /coupons
pub async fn list_coupons(State(state): State<AppState>) -> ApiResult<Json<Vec<Coupon>>> {
    Ok(Json(state.coupons.list_coupons().await?))
}

/// GET /coupons/:code
pub async fn get_coupon(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<Coupon>> {
    Ok(Json(state.coupons.get_coupon(&code).await?))
}

/// POST /coupons/:code/price
///
/// Pure pricing preview; never consumes a use. An unusable coupon comes
/// back as a 200 with `valid: false` and the reason.
pub async fn price_coupon(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(req): Json<PriceRequest>,
) -> ApiResult<Json<CouponQuote>> {
    let target = match (req.target_type, req.target_id) {
        (Some(kind), Some(target_id)) => Some((kind, target_id)),
        _ => None,
    };
    Ok(Json(
        state
            .coupons
            .price_for_target(&code, req.amount_minor, target)
            .await?,
    ))
}

/// Build coupon routes
pub fn coupon_routes() -> Router<AppState> {
    Router::new()
        .route("/coupons", post(create_coupon).get(list_coupons))
        .route("/coupons/:code", get(get_coupon))
        .route("/coupons/:code/price", post(price_coupon))
}
