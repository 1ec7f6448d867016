//! Payout request model
//!
//! A PENDING request reserves its amount against the teacher's available
//! balance. APPROVED and REJECTED are terminal; rejection releases the
//! reservation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Payout request state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PayoutStatus {
    /// Awaiting an admin decision; amount reserved
    Pending,
    /// Paid out; amount permanently deducted
    Approved,
    /// Declined; amount returned to available
    Rejected,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "PENDING",
            PayoutStatus::Approved => "APPROVED",
            PayoutStatus::Rejected => "REJECTED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PayoutStatus::Pending)
    }
}

impl FromStr for PayoutStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PayoutStatus::Pending),
            "APPROVED" => Ok(PayoutStatus::Approved),
            "REJECTED" => Ok(PayoutStatus::Rejected),
            other => Err(format!("unknown payout status: {}", other)),
        }
    }
}

impl std::fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payout request record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutRequest {
    pub id: String,
    pub teacher_id: String,
    pub amount_minor: i64,
    pub status: PayoutStatus,
    /// Opaque transfer method, e.g. "bank_transfer" or "paypal"
    pub method: String,
    /// Method-specific details (account numbers etc.), opaque JSON
    pub details: Option<serde_json::Value>,
    /// Rejection reason
    pub reason: Option<String>,
    /// Provider transaction id recorded at approval
    pub external_tx_id: Option<String>,
    pub decided_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}
