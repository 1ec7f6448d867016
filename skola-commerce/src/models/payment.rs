//! Payment lifecycle model
//!
//! A payment moves through exactly two legal transitions:
//! PENDING → COMPLETED and PENDING → CANCELLED. Both terminal states are
//! final; replaying the transition that produced a terminal state is an
//! idempotent no-op, every other transition is a conflict.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Payment state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    /// Created, awaiting provider confirmation
    Pending,
    /// Confirmed by the provider; money effects applied
    Completed,
    /// Abandoned before confirmation
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Cancelled => "CANCELLED",
        }
    }

    /// Terminal states accept no further transitions
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    /// Legal transitions: PENDING may complete or cancel, nothing else moves
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::Completed)
                | (PaymentStatus::Pending, PaymentStatus::Cancelled)
        )
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "COMPLETED" => Ok(PaymentStatus::Completed),
            "CANCELLED" => Ok(PaymentStatus::Cancelled),
            other => Err(format!("unknown payment status: {}", other)),
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a payment pays for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentTargetKind {
    /// Premium course module
    Module,
    /// Individual lesson
    Lesson,
    /// One-on-one lesson booking
    Booking,
    /// Course bundle
    Bundle,
}

impl PaymentTargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentTargetKind::Module => "module",
            PaymentTargetKind::Lesson => "lesson",
            PaymentTargetKind::Booking => "booking",
            PaymentTargetKind::Bundle => "bundle",
        }
    }
}

impl FromStr for PaymentTargetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "module" => Ok(PaymentTargetKind::Module),
            "lesson" => Ok(PaymentTargetKind::Lesson),
            "booking" => Ok(PaymentTargetKind::Booking),
            "bundle" => Ok(PaymentTargetKind::Bundle),
            other => Err(format!("unknown payment target type: {}", other)),
        }
    }
}

impl std::fmt::Display for PaymentTargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub payer_id: String,
    pub target_type: PaymentTargetKind,
    pub target_id: String,
    /// Amount actually charged, after any coupon discount
    pub amount_minor: i64,
    pub currency: String,
    pub status: PaymentStatus,
    /// Opaque provider name (e.g. "stripe"); no provider integration here
    pub provider: String,
    pub external_tx_id: Option<String>,
    pub coupon_code: Option<String>,
    pub discount_minor: i64,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}
