//! Event types for the Skola event system
//!
//! Provides the shared event definitions and the EventBus used to notify
//! in-process subscribers (notification dispatch, audit logging) about
//! commerce state changes. Emission is fire-and-forget: a commerce operation
//! never fails because nobody is listening.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Commerce event types
///
/// Events are broadcast via EventBus after the owning database transaction
/// has committed, so subscribers only ever observe durable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CommerceEvent {
    /// Payment record created (still PENDING)
    PaymentCreated {
        payment_id: String,
        payer_id: String,
        amount_minor: i64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Payment confirmed by the provider callback
    PaymentConfirmed {
        payment_id: String,
        payer_id: String,
        amount_minor: i64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Pending payment cancelled before confirmation
    PaymentCancelled {
        payment_id: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Lesson slot claimed by a student
    SlotBooked {
        booking_id: String,
        slot_id: String,
        student_id: String,
        teacher_id: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Active booking cancelled, slot reopened
    BookingCancelled {
        booking_id: String,
        slot_id: String,
        cancelled_by: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Coupon consumed one use at payment confirmation
    CouponRedeemed {
        code: String,
        payment_id: String,
        discount_minor: i64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Monthly earnings recomputed for a teacher/course
    EarningsComputed {
        teacher_id: String,
        course_id: String,
        year: i32,
        month: u32,
        gross_minor: i64,
        teacher_share_minor: i64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Teacher requested a payout (amount reserved)
    PayoutRequested {
        payout_id: String,
        teacher_id: String,
        amount_minor: i64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Payout approved or rejected by an admin
    PayoutDecided {
        payout_id: String,
        teacher_id: String,
        amount_minor: i64,
        approved: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl CommerceEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            CommerceEvent::PaymentCreated { .. } => "PaymentCreated",
            CommerceEvent::PaymentConfirmed { .. } => "PaymentConfirmed",
            CommerceEvent::PaymentCancelled { .. } => "PaymentCancelled",
            CommerceEvent::SlotBooked { .. } => "SlotBooked",
            CommerceEvent::BookingCancelled { .. } => "BookingCancelled",
            CommerceEvent::CouponRedeemed { .. } => "CouponRedeemed",
            CommerceEvent::EarningsComputed { .. } => "EarningsComputed",
            CommerceEvent::PayoutRequested { .. } => "PayoutRequested",
            CommerceEvent::PayoutDecided { .. } => "PayoutDecided",
        }
    }
}

/// Central event distribution bus for commerce events
///
/// Wraps tokio::broadcast, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CommerceEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<CommerceEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: CommerceEvent,
    ) -> Result<usize, broadcast::error::SendError<CommerceEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring whether anyone is listening
    ///
    /// Commerce operations use this after commit: the state change is
    /// already durable, so a missing subscriber is not an error.
    pub fn emit_lossy(&self, event: CommerceEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
