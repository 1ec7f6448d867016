//! Coupon model and pure pricing logic
//!
//! `Coupon::quote` is the single pricing authority: the same code path
//! prices preview requests and server-side re-pricing at payment
//! creation, so a client can never submit a discount the engine would
//! not have computed itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use skola_common::money::{clamp_discount, percentage_of};

use crate::models::payment::PaymentTargetKind;

/// How the discount is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CouponType {
    /// `value` is a percentage of the base amount (0-100)
    Percentage,
    /// `value` is an absolute discount in minor units
    Fixed,
}

impl CouponType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponType::Percentage => "PERCENTAGE",
            CouponType::Fixed => "FIXED",
        }
    }
}

impl FromStr for CouponType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PERCENTAGE" => Ok(CouponType::Percentage),
            "FIXED" => Ok(CouponType::Fixed),
            other => Err(format!("unknown coupon type: {}", other)),
        }
    }
}

/// What a coupon can be redeemed against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CouponScope {
    /// Any purchase
    All,
    /// Course content: modules, lessons, bookings (optionally one course)
    Course,
    /// Bundle purchases (optionally one bundle)
    Bundle,
    /// Subscription sign-up; never valid for the content purchases here
    Subscription,
}

impl CouponScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponScope::All => "ALL",
            CouponScope::Course => "COURSE",
            CouponScope::Bundle => "BUNDLE",
            CouponScope::Subscription => "SUBSCRIPTION",
        }
    }
}

impl FromStr for CouponScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ALL" => Ok(CouponScope::All),
            "COURSE" => Ok(CouponScope::Course),
            "BUNDLE" => Ok(CouponScope::Bundle),
            "SUBSCRIPTION" => Ok(CouponScope::Subscription),
            other => Err(format!("unknown coupon scope: {}", other)),
        }
    }
}

/// What is being bought, for applicability checks
#[derive(Debug, Clone)]
pub struct PurchaseContext {
    pub kind: PaymentTargetKind,
    pub target_id: String,
    /// Course the target belongs to, when resolvable
    pub course_id: Option<String>,
}

/// Coupon record; the uppercase code is the natural key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coupon {
    pub code: String,
    pub coupon_type: CouponType,
    /// Percent (0-100) for PERCENTAGE, minor units for FIXED
    pub value: i64,
    pub min_purchase_minor: i64,
    /// Cap on PERCENTAGE discounts, in minor units
    pub max_discount_minor: Option<i64>,
    pub usage_limit: Option<i64>,
    pub usage_count: i64,
    pub expires_at: Option<DateTime<Utc>>,
    pub applies_to: CouponScope,
    /// Narrows COURSE/BUNDLE scope to one course or bundle id
    pub scope_id: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Outcome of pricing a purchase against a coupon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouponQuote {
    pub valid: bool,
    pub discount_minor: i64,
    pub final_minor: i64,
    /// Set when `valid` is false
    pub reason: Option<String>,
}

impl CouponQuote {
    pub fn invalid(amount_minor: i64, reason: &str) -> Self {
        CouponQuote {
            valid: false,
            discount_minor: 0,
            final_minor: amount_minor,
            reason: Some(reason.to_string()),
        }
    }
}

impl Coupon {
    /// Price `amount_minor` against this coupon.
    ///
    /// Checks run in a fixed order so a coupon failing several rules
    /// always reports the same reason: expiry, then usage limit, then
    /// minimum purchase, then applicability. The caller handles unknown
    /// or deactivated codes before this point.
    pub fn quote(
        &self,
        amount_minor: i64,
        now: DateTime<Utc>,
        context: Option<&PurchaseContext>,
    ) -> CouponQuote {
        if let Some(expires_at) = self.expires_at {
            if now >= expires_at {
                return CouponQuote::invalid(amount_minor, "Coupon expired");
            }
        }

        if let Some(limit) = self.usage_limit {
            if self.usage_count >= limit {
                return CouponQuote::invalid(amount_minor, "Usage limit reached");
            }
        }

        if amount_minor < self.min_purchase_minor {
            return CouponQuote::invalid(amount_minor, "Minimum purchase not met");
        }

        if !self.applies(context) {
            return CouponQuote::invalid(amount_minor, "Coupon not applicable");
        }

        let raw = match self.coupon_type {
            CouponType::Percentage => {
                let discount = percentage_of(amount_minor, self.value);
                match self.max_discount_minor {
                    Some(cap) => discount.min(cap),
                    None => discount,
                }
            }
            CouponType::Fixed => self.value,
        };
        let discount = clamp_discount(raw, amount_minor);

        CouponQuote {
            valid: true,
            discount_minor: discount,
            final_minor: amount_minor - discount,
            reason: None,
        }
    }

    fn applies(&self, context: Option<&PurchaseContext>) -> bool {
        match self.applies_to {
            CouponScope::All => true,
            CouponScope::Course => {
                let Some(ctx) = context else { return false };
                let is_course_content = matches!(
                    ctx.kind,
                    PaymentTargetKind::Module
                        | PaymentTargetKind::Lesson
                        | PaymentTargetKind::Booking
                );
                if !is_course_content {
                    return false;
                }
                match &self.scope_id {
                    Some(course) => ctx.course_id.as_deref() == Some(course.as_str()),
                    None => true,
                }
            }
            CouponScope::Bundle => {
                let Some(ctx) = context else { return false };
                if ctx.kind != PaymentTargetKind::Bundle {
                    return false;
                }
                match &self.scope_id {
                    Some(bundle) => ctx.target_id == *bundle,
                    None => true,
                }
            }
            // Subscription coupons are redeemed at sign-up, outside this flow
            CouponScope::Subscription => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn base_coupon() -> Coupon {
        Coupon {
            code: "WELCOME20".to_string(),
            coupon_type: CouponType::Percentage,
            value: 20,
            min_purchase_minor: 0,
            max_discount_minor: None,
            usage_limit: None,
            usage_count: 0,
            expires_at: None,
            applies_to: CouponScope::All,
            scope_id: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn percentage_discount_with_cap() {
        let mut coupon = base_coupon();
        coupon.max_discount_minor = Some(1000);

        // 20% of 10_000 = 2000, capped at 1000
        let quote = coupon.quote(10_000, Utc::now(), None);
        assert!(quote.valid);
        assert_eq!(quote.discount_minor, 1000);
        assert_eq!(quote.final_minor, 9000);

        // 20% of 4000 = 800, under the cap
        let quote = coupon.quote(4000, Utc::now(), None);
        assert_eq!(quote.discount_minor, 800);
        assert_eq!(quote.final_minor, 3200);
    }

    #[test]
    fn fixed_discount_clamps_to_amount() {
        let mut coupon = base_coupon();
        coupon.coupon_type = CouponType::Fixed;
        coupon.value = 5000;

        let quote = coupon.quote(3000, Utc::now(), None);
        assert!(quote.valid);
        assert_eq!(quote.discount_minor, 3000);
        assert_eq!(quote.final_minor, 0);
    }

    #[test]
    fn percentage_floors_fractional_minor_units() {
        let mut coupon = base_coupon();
        coupon.value = 33;

        // 33% of 100 = 33; 33% of 10 = 3.3 → 3
        assert_eq!(coupon.quote(10, Utc::now(), None).discount_minor, 3);
    }

    #[test]
    fn expired_coupon_rejected() {
        let mut coupon = base_coupon();
        coupon.expires_at = Some(Utc::now() - Duration::hours(1));

        let quote = coupon.quote(10_000, Utc::now(), None);
        assert!(!quote.valid);
        assert_eq!(quote.reason.as_deref(), Some("Coupon expired"));
        assert_eq!(quote.final_minor, 10_000);
    }

    #[test]
    fn exhausted_coupon_rejected() {
        let mut coupon = base_coupon();
        coupon.usage_limit = Some(100);
        coupon.usage_count = 100;

        let quote = coupon.quote(10_000, Utc::now(), None);
        assert!(!quote.valid);
        assert_eq!(quote.reason.as_deref(), Some("Usage limit reached"));
    }

    #[test]
    fn minimum_purchase_enforced() {
        let mut coupon = base_coupon();
        coupon.min_purchase_minor = 5000;

        let quote = coupon.quote(4999, Utc::now(), None);
        assert!(!quote.valid);
        assert_eq!(quote.reason.as_deref(), Some("Minimum purchase not met"));

        assert!(coupon.quote(5000, Utc::now(), None).valid);
    }

    #[test]
    fn expiry_reported_before_minimum_purchase() {
        let mut coupon = base_coupon();
        coupon.expires_at = Some(Utc::now() - Duration::hours(1));
        coupon.min_purchase_minor = 5000;

        let quote = coupon.quote(100, Utc::now(), None);
        assert_eq!(quote.reason.as_deref(), Some("Coupon expired"));
    }

    #[test]
    fn course_scope_matches_course_content() {
        let mut coupon = base_coupon();
        coupon.applies_to = CouponScope::Course;
        coupon.scope_id = Some("course-1".to_string());

        let matching = PurchaseContext {
            kind: PaymentTargetKind::Module,
            target_id: "mod-1".to_string(),
            course_id: Some("course-1".to_string()),
        };
        assert!(coupon.quote(1000, Utc::now(), Some(&matching)).valid);

        let other_course = PurchaseContext {
            course_id: Some("course-2".to_string()),
            ..matching.clone()
        };
        let quote = coupon.quote(1000, Utc::now(), Some(&other_course));
        assert_eq!(quote.reason.as_deref(), Some("Coupon not applicable"));

        // Without a narrowing scope_id any course content qualifies
        coupon.scope_id = None;
        assert!(coupon.quote(1000, Utc::now(), Some(&other_course)).valid);

        // But a bundle purchase is not course content
        let bundle = PurchaseContext {
            kind: PaymentTargetKind::Bundle,
            target_id: "bundle-1".to_string(),
            course_id: Some("course-1".to_string()),
        };
        assert!(!coupon.quote(1000, Utc::now(), Some(&bundle)).valid);
    }

    #[test]
    fn bundle_scope_matches_target_id() {
        let mut coupon = base_coupon();
        coupon.applies_to = CouponScope::Bundle;
        coupon.scope_id = Some("bundle-1".to_string());

        let matching = PurchaseContext {
            kind: PaymentTargetKind::Bundle,
            target_id: "bundle-1".to_string(),
            course_id: Some("course-1".to_string()),
        };
        assert!(coupon.quote(1000, Utc::now(), Some(&matching)).valid);

        let other = PurchaseContext {
            target_id: "bundle-2".to_string(),
            ..matching
        };
        assert!(!coupon.quote(1000, Utc::now(), Some(&other)).valid);
    }

    #[test]
    fn scoped_coupon_needs_context() {
        let mut coupon = base_coupon();
        coupon.applies_to = CouponScope::Course;

        let quote = coupon.quote(1000, Utc::now(), None);
        assert!(!quote.valid);
        assert_eq!(quote.reason.as_deref(), Some("Coupon not applicable"));

        // ALL-scope coupons price fine without any context
        coupon.applies_to = CouponScope::All;
        assert!(coupon.quote(1000, Utc::now(), None).valid);
    }

    #[test]
    fn subscription_scope_never_applies_to_content() {
        let mut coupon = base_coupon();
        coupon.applies_to = CouponScope::Subscription;

        let ctx = PurchaseContext {
            kind: PaymentTargetKind::Module,
            target_id: "mod-1".to_string(),
            course_id: Some("course-1".to_string()),
        };
        assert!(!coupon.quote(1000, Utc::now(), Some(&ctx)).valid);
    }
}
