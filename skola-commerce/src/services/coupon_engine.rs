//! Coupon engine
//!
//! The single pricing authority for discounts. Pricing never mutates
//! state; `usage_count` moves only through [`CouponEngine::redeem`] inside
//! a payment confirmation transaction.

use chrono::{DateTime, Utc};
use rand::Rng;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use crate::db;
use crate::error::{CommerceError, Result};
use crate::models::{
    Coupon, CouponQuote, CouponScope, CouponType, PaymentTargetKind, PurchaseContext,
};

/// Characters used for generated codes; ambiguous glyphs excluded
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Admin input for creating a coupon
#[derive(Debug, Clone)]
pub struct NewCoupon {
    /// Explicit code; generated when absent
    pub code: Option<String>,
    pub coupon_type: CouponType,
    pub value: i64,
    pub min_purchase_minor: i64,
    pub max_discount_minor: Option<i64>,
    pub usage_limit: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub applies_to: CouponScope,
    pub scope_id: Option<String>,
}

#[derive(Clone)]
pub struct CouponEngine {
    db: SqlitePool,
}

impl CouponEngine {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Price an amount against a coupon code. Pure query; an unknown or
    /// deactivated code yields an invalid quote with "Coupon not found".
    pub async fn price(
        &self,
        code: &str,
        amount_minor: i64,
        context: Option<&PurchaseContext>,
    ) -> Result<CouponQuote> {
        if amount_minor <= 0 {
            return Err(CommerceError::Validation(
                "Amount must be positive".to_string(),
            ));
        }

        let normalized = normalize_code(code);
        let quote = match db::coupons::get_coupon(&self.db, &normalized).await? {
            Some(coupon) if coupon.is_active => coupon.quote(amount_minor, Utc::now(), context),
            _ => CouponQuote::invalid(amount_minor, "Coupon not found"),
        };

        Ok(quote)
    }

    /// Price against an optional purchase target, resolving the target's
    /// course for scope checks. Used by the pricing preview endpoint.
    pub async fn price_for_target(
        &self,
        code: &str,
        amount_minor: i64,
        target: Option<(PaymentTargetKind, String)>,
    ) -> Result<CouponQuote> {
        let context = match target {
            Some((kind, target_id)) => {
                let mut conn = self.db.acquire().await?;
                let attribution = db::catalog::resolve_target(&mut conn, kind, &target_id).await?;
                Some(PurchaseContext {
                    kind,
                    target_id,
                    course_id: attribution.map(|a| a.course_id),
                })
            }
            None => None,
        };

        self.price(code, amount_minor, context.as_ref()).await
    }

    /// Consume one use inside the caller's transaction.
    ///
    /// Fails with a conflict when the limit was exhausted between pricing
    /// and confirmation; the caller rolls back everything.
    pub async fn redeem(&self, conn: &mut SqliteConnection, code: &str) -> Result<()> {
        let updated = db::coupons::increment_usage(conn, code).await?;
        if updated == 0 {
            return Err(CommerceError::Conflict("Usage limit reached".to_string()));
        }
        Ok(())
    }

    /// Admin: create a coupon, generating a code when none is supplied
    pub async fn create_coupon(&self, new: NewCoupon) -> Result<Coupon> {
        if new.value <= 0 {
            return Err(CommerceError::Validation(
                "Coupon value must be positive".to_string(),
            ));
        }
        if new.coupon_type == CouponType::Percentage && new.value > 100 {
            return Err(CommerceError::Validation(
                "Percentage discount cannot exceed 100".to_string(),
            ));
        }
        if new.min_purchase_minor < 0 {
            return Err(CommerceError::Validation(
                "Minimum purchase cannot be negative".to_string(),
            ));
        }
        if matches!(new.max_discount_minor, Some(cap) if cap <= 0) {
            return Err(CommerceError::Validation(
                "Maximum discount must be positive".to_string(),
            ));
        }
        if matches!(new.usage_limit, Some(limit) if limit <= 0) {
            return Err(CommerceError::Validation(
                "Usage limit must be positive".to_string(),
            ));
        }
        if matches!(new.expires_at, Some(expiry) if expiry <= Utc::now()) {
            return Err(CommerceError::Validation(
                "Expiry must be in the future".to_string(),
            ));
        }
        if new.scope_id.is_some()
            && !matches!(new.applies_to, CouponScope::Course | CouponScope::Bundle)
        {
            return Err(CommerceError::Validation(
                "scope_id requires COURSE or BUNDLE applicability".to_string(),
            ));
        }

        let explicit_code = match &new.code {
            Some(code) => {
                let normalized = normalize_code(code);
                if normalized.len() < 3 {
                    return Err(CommerceError::Validation(
                        "Coupon code must be at least 3 characters".to_string(),
                    ));
                }
                Some(normalized)
            }
            None => None,
        };

        let code_length = db::settings::coupon_code_length(&self.db).await?;

        // Generated codes can collide; retry a couple of times before
        // surfacing the conflict.
        let attempts = if explicit_code.is_some() { 1 } else { 3 };
        let mut last_err = None;
        for _ in 0..attempts {
            let code = match &explicit_code {
                Some(code) => code.clone(),
                None => generate_code(code_length),
            };

            let coupon = Coupon {
                code,
                coupon_type: new.coupon_type,
                value: new.value,
                min_purchase_minor: new.min_purchase_minor,
                max_discount_minor: new.max_discount_minor,
                usage_limit: new.usage_limit,
                usage_count: 0,
                expires_at: new.expires_at,
                applies_to: new.applies_to,
                scope_id: new.scope_id.clone(),
                is_active: true,
                created_at: Utc::now(),
            };

            match db::coupons::insert_coupon(&self.db, &coupon).await {
                Ok(()) => {
                    info!(code = %coupon.code, coupon_type = %coupon.coupon_type.as_str(), "coupon created");
                    return Ok(coupon);
                }
                Err(e @ CommerceError::Conflict(_)) => last_err = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_err
            .unwrap_or_else(|| CommerceError::Internal("coupon creation failed".to_string())))
    }

    pub async fn get_coupon(&self, code: &str) -> Result<Coupon> {
        db::coupons::get_coupon(&self.db, &normalize_code(code))
            .await?
            .ok_or_else(|| CommerceError::NotFound(format!("Coupon not found: {}", code)))
    }

    pub async fn list_coupons(&self) -> Result<Vec<Coupon>> {
        db::coupons::list_coupons(&self.db).await
    }
}

pub(crate) fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

fn generate_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..CODE_ALPHABET.len());
            CODE_ALPHABET[idx] as char
        })
        .collect()
}
