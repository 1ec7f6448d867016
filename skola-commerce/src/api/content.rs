//! Content access and monetization policy endpoints

use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;

use crate::error::{ApiResult, CommerceError};
use crate::models::{
    AccessDecision, AccessRequirements, ContentPolicy, ContentType, MonetizationType,
};
use crate::services::PolicyUpdate;
use crate::AppState;

/// Query parameters for access checks
#[derive(Debug, Deserialize)]
pub struct AccessQuery {
    pub user_id: String,
}

/// Set policy request body
#[derive(Debug, Deserialize)]
pub struct SetPolicyRequest {
    pub monetization_type: MonetizationType,
    pub price_minor: Option<i64>,
    pub currency: Option<String>,
    pub subscription_tier: Option<String>,
}

fn parse_content_type(raw: &str) -> Result<ContentType, CommerceError> {
    raw.parse().map_err(CommerceError::Validation)
}

/// GET /content/:type/:id/access?user_id=...
pub async fn check_access(
    State(state): State<AppState>,
    Path((content_type, content_id)): Path<(String, String)>,
    Query(query): Query<AccessQuery>,
) -> ApiResult<Json<AccessDecision>> {
    let content_type = parse_content_type(&content_type)?;
    Ok(Json(
        state
            .entitlements
            .can_access(&query.user_id, content_type, &content_id)
            .await?,
    ))
}

/// GET /content/:type/:id/requirements
///
/// What a user would need to access this content. Public, no user in
/// the question.
pub async fn get_requirements(
    State(state): State<AppState>,
    Path((content_type, content_id)): Path<(String, String)>,
) -> ApiResult<Json<AccessRequirements>> {
    let content_type = parse_content_type(&content_type)?;
    Ok(Json(
        state
            .entitlements
            .requirements(content_type, &content_id)
            .await?,
    ))
}

/// PUT /content/:type/:id/policy
pub async fn set_policy(
    State(state): State<AppState>,
    Path((content_type, content_id)): Path<(String, String)>,
    Json(req): Json<SetPolicyRequest>,
) -> ApiResult<Json<ContentPolicy>> {
    let content_type = parse_content_type(&content_type)?;
    Ok(Json(
        state
            .entitlements
            .set_policy(
                content_type,
                &content_id,
                PolicyUpdate {
                    monetization_type: req.monetization_type,
                    price_minor: req.price_minor,
                    currency: req.currency,
                    subscription_tier: req.subscription_tier,
                },
            )
            .await?,
    ))
}

/// Build content routes
pub fn content_routes() -> Router<AppState> {
    Router::new()
        .route("/content/:type/:id/access", get(check_access))
        .route("/content/:type/:id/requirements", get(get_requirements))
        .route("/content/:type/:id/policy", put(set_policy))
}
