//! Payment ledger
//!
//! Owns the payment lifecycle. Confirmation is the settlement moment: the
//! status flip, the coupon usage increment, and the earnings delta commit
//! in one transaction or not at all. Events fire only after commit.

use chrono::{Datelike, Utc};
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use skola_common::events::{CommerceEvent, EventBus};
use skola_common::money::apply_bps;

use crate::db;
use crate::error::{CommerceError, Result};
use crate::models::{Payment, PaymentStatus, PaymentTargetKind, PurchaseContext};
use crate::services::coupon_engine::normalize_code;
use crate::services::CouponEngine;

/// Input for creating a payment
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub payer_id: String,
    pub target_type: PaymentTargetKind,
    pub target_id: String,
    /// List price before any discount
    pub amount_minor: i64,
    pub currency: String,
    pub provider: String,
    pub coupon_code: Option<String>,
}

#[derive(Clone)]
pub struct PaymentLedger {
    db: SqlitePool,
    coupons: CouponEngine,
    events: EventBus,
}

impl PaymentLedger {
    pub fn new(db: SqlitePool, coupons: CouponEngine, events: EventBus) -> Self {
        Self {
            db,
            coupons,
            events,
        }
    }

    /// Create a PENDING payment.
    ///
    /// The target must exist in the catalog, the payer must not already
    /// hold a completed payment for it, and any coupon is re-priced here;
    /// client-supplied discounts are ignored.
    pub async fn create(&self, new: NewPayment) -> Result<Payment> {
        if new.amount_minor <= 0 {
            return Err(CommerceError::Validation(
                "Payment amount must be positive".to_string(),
            ));
        }
        if new.payer_id.trim().is_empty() {
            return Err(CommerceError::Validation(
                "payer_id is required".to_string(),
            ));
        }

        let attribution = {
            let mut conn = self.db.acquire().await?;
            db::catalog::resolve_target(&mut conn, new.target_type, &new.target_id).await?
        };
        let Some(attribution) = attribution else {
            return Err(CommerceError::NotFound(format!(
                "Payment target not found: {} {}",
                new.target_type.as_str(),
                new.target_id
            )));
        };

        // One completed purchase per payer and target
        if let Some(prior) =
            db::payments::find_completed(&self.db, &new.payer_id, new.target_type, &new.target_id)
                .await?
        {
            return Err(CommerceError::Conflict(format!(
                "Already purchased (payment {})",
                prior.id
            )));
        }

        let (coupon_code, discount_minor) = match &new.coupon_code {
            Some(code) => {
                let context = PurchaseContext {
                    kind: new.target_type,
                    target_id: new.target_id.clone(),
                    course_id: Some(attribution.course_id.clone()),
                };
                let quote = self
                    .coupons
                    .price(code, new.amount_minor, Some(&context))
                    .await?;
                if !quote.valid {
                    let reason = quote.reason.unwrap_or_else(|| "Coupon rejected".to_string());
                    return Err(coupon_rejection(reason));
                }
                (Some(normalize_code(code)), quote.discount_minor)
            }
            None => (None, 0),
        };

        let charged = new.amount_minor - discount_minor;
        if charged <= 0 {
            return Err(CommerceError::Validation(
                "Discounted amount must be positive".to_string(),
            ));
        }

        let currency = if new.currency.trim().is_empty() {
            "USD".to_string()
        } else {
            new.currency
        };

        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            payer_id: new.payer_id,
            target_type: new.target_type,
            target_id: new.target_id,
            amount_minor: charged,
            currency,
            status: PaymentStatus::Pending,
            provider: new.provider,
            external_tx_id: None,
            coupon_code,
            discount_minor,
            created_at: Utc::now(),
            completed_at: None,
            cancelled_at: None,
        };

        db::payments::insert_payment(&self.db, &payment).await?;

        info!(
            payment_id = %payment.id,
            payer_id = %payment.payer_id,
            amount_minor = payment.amount_minor,
            discount_minor = payment.discount_minor,
            "payment created"
        );
        self.events.emit_lossy(CommerceEvent::PaymentCreated {
            payment_id: payment.id.clone(),
            payer_id: payment.payer_id.clone(),
            amount_minor: payment.amount_minor,
            timestamp: payment.created_at,
        });

        Ok(payment)
    }

    /// Confirm a PENDING payment.
    ///
    /// Idempotent on an already COMPLETED payment: returns the stored
    /// record without new side effects. Confirming a CANCELLED payment is
    /// a conflict.
    pub async fn confirm(
        &self,
        payment_id: &str,
        external_tx_id: Option<String>,
    ) -> Result<Payment> {
        let payment = db::payments::get_payment(&self.db, payment_id)
            .await?
            .ok_or_else(|| CommerceError::NotFound(format!("Payment not found: {}", payment_id)))?;

        match payment.status {
            PaymentStatus::Completed => return Ok(payment),
            PaymentStatus::Cancelled => {
                return Err(CommerceError::Conflict(
                    "Cancelled payment cannot be confirmed".to_string(),
                ))
            }
            PaymentStatus::Pending => {}
        }

        // Loaded before the transaction; nothing touches the pool while
        // the transaction is open.
        let policy = db::settings::load_earnings_policy(&self.db).await?;
        let now = Utc::now();

        let mut tx = self.db.begin().await?;

        let flipped =
            db::payments::mark_completed(&mut tx, payment_id, now, external_tx_id.as_deref())
                .await?;
        if flipped == 0 {
            // Lost a race with another confirm or a cancel
            tx.rollback().await?;
            let current = db::payments::get_payment(&self.db, payment_id)
                .await?
                .ok_or_else(|| {
                    CommerceError::NotFound(format!("Payment not found: {}", payment_id))
                })?;
            return match current.status {
                PaymentStatus::Completed => Ok(current),
                _ => Err(CommerceError::Conflict(
                    "Cancelled payment cannot be confirmed".to_string(),
                )),
            };
        }

        if let Some(code) = &payment.coupon_code {
            // A conflict here drops the transaction, rolling back the flip
            self.coupons.redeem(&mut tx, code).await?;
        }

        match db::catalog::resolve_target(&mut tx, payment.target_type, &payment.target_id).await? {
            Some(attr) => {
                let share = apply_bps(payment.amount_minor, policy.teacher_share_bps);
                db::earnings::apply_delta(
                    &mut tx,
                    &attr.teacher_id,
                    &attr.course_id,
                    now.year(),
                    now.month(),
                    payment.amount_minor,
                    share,
                    now,
                )
                .await?;
            }
            None => {
                warn!(
                    payment_id = %payment.id,
                    target_type = %payment.target_type.as_str(),
                    target_id = %payment.target_id,
                    "payment target no longer attributable; earnings delta skipped"
                );
            }
        }

        tx.commit().await?;

        info!(
            payment_id = %payment.id,
            amount_minor = payment.amount_minor,
            "payment confirmed"
        );
        self.events.emit_lossy(CommerceEvent::PaymentConfirmed {
            payment_id: payment.id.clone(),
            payer_id: payment.payer_id.clone(),
            amount_minor: payment.amount_minor,
            timestamp: now,
        });
        if let Some(code) = &payment.coupon_code {
            self.events.emit_lossy(CommerceEvent::CouponRedeemed {
                code: code.clone(),
                payment_id: payment.id.clone(),
                discount_minor: payment.discount_minor,
                timestamp: now,
            });
        }

        db::payments::get_payment(&self.db, payment_id)
            .await?
            .ok_or_else(|| CommerceError::Internal("payment missing after confirmation".to_string()))
    }

    /// Cancel a PENDING payment. Idempotent on an already CANCELLED one.
    pub async fn cancel(&self, payment_id: &str) -> Result<Payment> {
        let payment = db::payments::get_payment(&self.db, payment_id)
            .await?
            .ok_or_else(|| CommerceError::NotFound(format!("Payment not found: {}", payment_id)))?;

        match payment.status {
            PaymentStatus::Cancelled => return Ok(payment),
            PaymentStatus::Completed => {
                return Err(CommerceError::Conflict(
                    "Completed payment cannot be cancelled".to_string(),
                ))
            }
            PaymentStatus::Pending => {}
        }

        let now = Utc::now();
        let flipped = db::payments::mark_cancelled(&self.db, payment_id, now).await?;
        if flipped == 0 {
            let current = db::payments::get_payment(&self.db, payment_id)
                .await?
                .ok_or_else(|| {
                    CommerceError::NotFound(format!("Payment not found: {}", payment_id))
                })?;
            return match current.status {
                PaymentStatus::Cancelled => Ok(current),
                _ => Err(CommerceError::Conflict(
                    "Completed payment cannot be cancelled".to_string(),
                )),
            };
        }

        info!(payment_id = %payment.id, "payment cancelled");
        self.events.emit_lossy(CommerceEvent::PaymentCancelled {
            payment_id: payment.id.clone(),
            timestamp: now,
        });

        db::payments::get_payment(&self.db, payment_id)
            .await?
            .ok_or_else(|| CommerceError::Internal("payment missing after cancellation".to_string()))
    }

    pub async fn get(&self, payment_id: &str) -> Result<Payment> {
        db::payments::get_payment(&self.db, payment_id)
            .await?
            .ok_or_else(|| CommerceError::NotFound(format!("Payment not found: {}", payment_id)))
    }

    pub async fn list_for_payer(&self, payer_id: &str) -> Result<Vec<Payment>> {
        db::payments::list_payments_for_payer(&self.db, payer_id).await
    }
}

/// Map a pricing rejection to the error category a payment creation reports
fn coupon_rejection(reason: String) -> CommerceError {
    match reason.as_str() {
        "Coupon not found" => CommerceError::NotFound(reason),
        "Coupon expired" | "Usage limit reached" => CommerceError::Conflict(reason),
        _ => CommerceError::Validation(reason),
    }
}
