//! Payout workflow
//!
//! Teacher-initiated requests against the available balance and the admin
//! decision flow. Every balance check is atomic SQL, so approving can
//! never drive a teacher's available balance negative, even when earnings
//! were recomputed downward after the request was made.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use skola_common::events::{CommerceEvent, EventBus};

use crate::db;
use crate::error::{CommerceError, Result};
use crate::models::{PayoutRequest, PayoutStatus};

/// Input for requesting a payout
#[derive(Debug, Clone)]
pub struct NewPayout {
    pub teacher_id: String,
    /// Absent means the full available balance
    pub amount_minor: Option<i64>,
    pub method: String,
    pub details: Option<serde_json::Value>,
}

#[derive(Clone)]
pub struct PayoutWorkflow {
    db: SqlitePool,
    events: EventBus,
}

impl PayoutWorkflow {
    pub fn new(db: SqlitePool, events: EventBus) -> Self {
        Self { db, events }
    }

    /// Request a payout, reserving the amount against the available
    /// balance. The guarded insert revalidates the balance atomically.
    pub async fn request_payout(&self, new: NewPayout) -> Result<PayoutRequest> {
        if new.method.trim().is_empty() {
            return Err(CommerceError::Validation(
                "Payout method is required".to_string(),
            ));
        }

        let amount = match new.amount_minor {
            Some(amount) if amount <= 0 => {
                return Err(CommerceError::Validation(
                    "Payout amount must be positive".to_string(),
                ))
            }
            Some(amount) => amount,
            None => {
                let available = db::payouts::available_balance(&self.db, &new.teacher_id).await?;
                if available <= 0 {
                    return Err(CommerceError::Validation(
                        "No earnings available for payout".to_string(),
                    ));
                }
                available
            }
        };

        let payout = PayoutRequest {
            id: Uuid::new_v4().to_string(),
            teacher_id: new.teacher_id,
            amount_minor: amount,
            status: PayoutStatus::Pending,
            method: new.method,
            details: new.details,
            reason: None,
            external_tx_id: None,
            decided_by: None,
            created_at: Utc::now(),
            decided_at: None,
        };

        let inserted = db::payouts::insert_payout_guarded(&self.db, &payout).await?;
        if inserted == 0 {
            let available = db::payouts::available_balance(&self.db, &payout.teacher_id).await?;
            return Err(CommerceError::InsufficientFunds(format!(
                "Requested {} but only {} is available",
                amount,
                available.max(0)
            )));
        }

        info!(
            payout_id = %payout.id,
            teacher_id = %payout.teacher_id,
            amount_minor = payout.amount_minor,
            "payout requested"
        );
        self.events.emit_lossy(CommerceEvent::PayoutRequested {
            payout_id: payout.id.clone(),
            teacher_id: payout.teacher_id.clone(),
            amount_minor: payout.amount_minor,
            timestamp: payout.created_at,
        });

        Ok(payout)
    }

    /// Approve a pending payout.
    ///
    /// The update only lands while the amount is still covered by lifetime
    /// earnings minus every other reservation. Approving an already
    /// APPROVED payout is an idempotent no-op.
    pub async fn approve(
        &self,
        payout_id: &str,
        admin_id: &str,
        external_tx_id: Option<String>,
    ) -> Result<PayoutRequest> {
        if admin_id.trim().is_empty() {
            return Err(CommerceError::Validation(
                "admin_id is required".to_string(),
            ));
        }

        let now = Utc::now();
        let updated =
            db::payouts::approve_guarded(&self.db, payout_id, admin_id, external_tx_id.as_deref(), now)
                .await?;
        if updated == 0 {
            let current = db::payouts::get_payout(&self.db, payout_id)
                .await?
                .ok_or_else(|| {
                    CommerceError::NotFound(format!("Payout request not found: {}", payout_id))
                })?;
            return match current.status {
                // Still pending: earnings were recomputed downward and the
                // balance no longer covers the amount
                PayoutStatus::Pending => Err(CommerceError::InsufficientFunds(
                    "Available balance no longer covers this payout".to_string(),
                )),
                PayoutStatus::Approved => Ok(current),
                PayoutStatus::Rejected => Err(CommerceError::Conflict(
                    "Rejected payout cannot be approved".to_string(),
                )),
            };
        }

        let payout = db::payouts::get_payout(&self.db, payout_id)
            .await?
            .ok_or_else(|| CommerceError::Internal("payout missing after approval".to_string()))?;

        info!(payout_id = %payout.id, decided_by = %admin_id, "payout approved");
        self.events.emit_lossy(CommerceEvent::PayoutDecided {
            payout_id: payout.id.clone(),
            teacher_id: payout.teacher_id.clone(),
            amount_minor: payout.amount_minor,
            approved: true,
            timestamp: now,
        });

        Ok(payout)
    }

    /// Reject a pending payout, releasing its reservation back to the
    /// available balance. Idempotent on an already REJECTED payout.
    pub async fn reject(
        &self,
        payout_id: &str,
        admin_id: &str,
        reason: &str,
    ) -> Result<PayoutRequest> {
        if admin_id.trim().is_empty() {
            return Err(CommerceError::Validation(
                "admin_id is required".to_string(),
            ));
        }
        if reason.trim().is_empty() {
            return Err(CommerceError::Validation(
                "Rejection reason is required".to_string(),
            ));
        }

        let now = Utc::now();
        let updated = db::payouts::reject_pending(&self.db, payout_id, admin_id, reason, now).await?;
        if updated == 0 {
            let current = db::payouts::get_payout(&self.db, payout_id)
                .await?
                .ok_or_else(|| {
                    CommerceError::NotFound(format!("Payout request not found: {}", payout_id))
                })?;
            return match current.status {
                PayoutStatus::Rejected => Ok(current),
                PayoutStatus::Approved => Err(CommerceError::Conflict(
                    "Approved payout cannot be rejected".to_string(),
                )),
                PayoutStatus::Pending => Err(CommerceError::Internal(
                    "payout rejection affected no rows".to_string(),
                )),
            };
        }

        let payout = db::payouts::get_payout(&self.db, payout_id)
            .await?
            .ok_or_else(|| CommerceError::Internal("payout missing after rejection".to_string()))?;

        info!(payout_id = %payout.id, decided_by = %admin_id, "payout rejected");
        self.events.emit_lossy(CommerceEvent::PayoutDecided {
            payout_id: payout.id.clone(),
            teacher_id: payout.teacher_id.clone(),
            amount_minor: payout.amount_minor,
            approved: false,
            timestamp: now,
        });

        Ok(payout)
    }

    pub async fn get(&self, payout_id: &str) -> Result<PayoutRequest> {
        db::payouts::get_payout(&self.db, payout_id)
            .await?
            .ok_or_else(|| CommerceError::NotFound(format!("Payout request not found: {}", payout_id)))
    }

    pub async fn list_for_teacher(
        &self,
        teacher_id: &str,
        status: Option<PayoutStatus>,
    ) -> Result<Vec<PayoutRequest>> {
        db::payouts::list_for_teacher(&self.db, teacher_id, status).await
    }

    /// Admin queue, oldest request first
    pub async fn list_pending(&self) -> Result<Vec<PayoutRequest>> {
        db::payouts::list_pending(&self.db).await
    }
}
