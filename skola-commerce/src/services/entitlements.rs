//! Entitlement decisions
//!
//! Turns a content monetization policy into an allow/deny answer for one
//! user. Content without a policy row is free. SUBSCRIPTION consults the
//! subscription seam; PREMIUM looks for a completed payment covering the
//! content, either directly or through a bundle of its course.

use std::sync::Arc;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use crate::db;
use crate::error::{CommerceError, Result};
use crate::models::{
    AccessDecision, AccessRequirements, ContentPolicy, ContentType, MonetizationType,
    PaymentTargetKind,
};
use crate::services::providers::SubscriptionProvider;

/// Admin input for setting a content policy
#[derive(Debug, Clone)]
pub struct PolicyUpdate {
    pub monetization_type: MonetizationType,
    pub price_minor: Option<i64>,
    pub currency: Option<String>,
    pub subscription_tier: Option<String>,
}

#[derive(Clone)]
pub struct EntitlementService {
    db: SqlitePool,
    subscriptions: Arc<dyn SubscriptionProvider>,
}

impl EntitlementService {
    pub fn new(db: SqlitePool, subscriptions: Arc<dyn SubscriptionProvider>) -> Self {
        Self { db, subscriptions }
    }

    /// May `user_id` access this content right now?
    pub async fn can_access(
        &self,
        user_id: &str,
        content_type: ContentType,
        content_id: &str,
    ) -> Result<AccessDecision> {
        let policy = db::policies::get_policy(&self.db, content_type, content_id).await?;
        let Some(policy) = policy else {
            return Ok(AccessDecision::allowed(MonetizationType::Free));
        };

        match policy.monetization_type {
            MonetizationType::Free => Ok(AccessDecision::allowed(MonetizationType::Free)),

            MonetizationType::Subscription => {
                let subscribed = self
                    .subscriptions
                    .has_active(user_id, policy.subscription_tier.as_deref())
                    .await?;
                if subscribed {
                    Ok(AccessDecision::allowed(MonetizationType::Subscription))
                } else {
                    let reason = match &policy.subscription_tier {
                        Some(tier) => format!("Requires an active '{}' subscription", tier),
                        None => "Requires an active subscription".to_string(),
                    };
                    Ok(AccessDecision::denied(MonetizationType::Subscription, &reason))
                }
            }

            MonetizationType::Premium => {
                if self.owns_premium(user_id, content_type, content_id).await? {
                    Ok(AccessDecision::allowed(MonetizationType::Premium))
                } else {
                    Ok(AccessDecision::denied(
                        MonetizationType::Premium,
                        "Requires a one-time purchase",
                    ))
                }
            }
        }
    }

    /// Completed purchase covering the content: a direct payment for a
    /// module, or a bundle purchase of the containing course.
    async fn owns_premium(
        &self,
        user_id: &str,
        content_type: ContentType,
        content_id: &str,
    ) -> Result<bool> {
        match content_type {
            ContentType::Module => {
                let direct = db::payments::find_completed(
                    &self.db,
                    user_id,
                    PaymentTargetKind::Module,
                    content_id,
                )
                .await?
                .is_some();
                if direct {
                    return Ok(true);
                }
                db::payments::has_bundle_payment_for_module(&self.db, user_id, content_id).await
            }
            // Program content is sold through its course bundles
            ContentType::Program => {
                db::payments::has_bundle_payment_for_course(&self.db, user_id, content_id).await
            }
        }
    }

    /// What a client must present to unlock this content
    pub async fn requirements(
        &self,
        content_type: ContentType,
        content_id: &str,
    ) -> Result<AccessRequirements> {
        let policy = db::policies::get_policy(&self.db, content_type, content_id).await?;

        Ok(match policy {
            None => AccessRequirements::free(),
            Some(p) => AccessRequirements {
                monetization_type: p.monetization_type,
                price_minor: p.price_minor,
                currency: Some(p.currency),
                subscription_tier: p.subscription_tier,
            },
        })
    }

    /// Admin upsert of a content policy. PREMIUM requires a positive price.
    pub async fn set_policy(
        &self,
        content_type: ContentType,
        content_id: &str,
        update: PolicyUpdate,
    ) -> Result<ContentPolicy> {
        if matches!(update.price_minor, Some(price) if price < 0) {
            return Err(CommerceError::Validation(
                "Price cannot be negative".to_string(),
            ));
        }
        if update.monetization_type == MonetizationType::Premium
            && !matches!(update.price_minor, Some(price) if price > 0)
        {
            return Err(CommerceError::Validation(
                "PREMIUM content requires a positive price".to_string(),
            ));
        }

        let policy = ContentPolicy {
            content_type,
            content_id: content_id.to_string(),
            monetization_type: update.monetization_type,
            price_minor: update.price_minor,
            currency: update.currency.unwrap_or_else(|| "USD".to_string()),
            subscription_tier: update.subscription_tier,
            updated_at: Utc::now(),
        };
        db::policies::upsert_policy(&self.db, &policy).await?;

        info!(
            content_type = %content_type.as_str(),
            content_id = %content_id,
            monetization_type = %policy.monetization_type.as_str(),
            "content policy set"
        );

        Ok(policy)
    }
}
