//! Booking ledger
//!
//! Slot allocation under concurrency. The conditional claim inside the
//! booking transaction decides exactly one winner per slot; the partial
//! unique index on active bookings backs it up at the schema level.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use skola_common::events::{CommerceEvent, EventBus};

use crate::db;
use crate::error::{CommerceError, Result};
use crate::models::{Booking, BookingStatus, LessonSlot};

/// Input for publishing a lesson slot
#[derive(Debug, Clone)]
pub struct NewSlot {
    pub teacher_id: String,
    pub course_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub price_minor: i64,
}

#[derive(Clone)]
pub struct BookingLedger {
    db: SqlitePool,
    events: EventBus,
}

impl BookingLedger {
    pub fn new(db: SqlitePool, events: EventBus) -> Self {
        Self { db, events }
    }

    /// Teacher publishes an open slot attached to one of their courses
    pub async fn create_slot(&self, new: NewSlot) -> Result<LessonSlot> {
        if new.end_time <= new.start_time {
            return Err(CommerceError::Validation(
                "Slot end must be after start".to_string(),
            ));
        }
        if new.price_minor < 0 {
            return Err(CommerceError::Validation(
                "Slot price cannot be negative".to_string(),
            ));
        }

        let owner = db::catalog::course_teacher(&self.db, &new.course_id)
            .await?
            .ok_or_else(|| {
                CommerceError::NotFound(format!("Course not found: {}", new.course_id))
            })?;
        if owner != new.teacher_id {
            return Err(CommerceError::Authorization(
                "Course does not belong to this teacher".to_string(),
            ));
        }

        let slot = LessonSlot {
            id: Uuid::new_v4().to_string(),
            teacher_id: new.teacher_id,
            course_id: new.course_id,
            start_time: new.start_time,
            end_time: new.end_time,
            price_minor: new.price_minor,
            is_available: true,
            is_booked: false,
            created_at: Utc::now(),
        };
        db::slots::insert_slot(&self.db, &slot).await?;

        info!(slot_id = %slot.id, teacher_id = %slot.teacher_id, "lesson slot published");
        Ok(slot)
    }

    pub async fn list_slots(&self, teacher_id: &str, only_open: bool) -> Result<Vec<LessonSlot>> {
        db::slots::list_slots_for_teacher(&self.db, teacher_id, only_open).await
    }

    /// Book a slot. Exactly one of N concurrent callers for the same slot
    /// succeeds; the rest get a conflict.
    pub async fn book_slot(
        &self,
        slot_id: &str,
        student_id: &str,
        note: Option<String>,
    ) -> Result<Booking> {
        if student_id.trim().is_empty() {
            return Err(CommerceError::Validation(
                "student_id is required".to_string(),
            ));
        }

        // Slot identity (teacher, course) never changes, so reading it
        // ahead of the claim is safe.
        let slot = db::slots::get_slot(&self.db, slot_id)
            .await?
            .ok_or_else(|| CommerceError::NotFound(format!("Slot not found: {}", slot_id)))?;

        let mut tx = self.db.begin().await?;

        let claimed = db::slots::claim_slot(&mut tx, slot_id).await?;
        if claimed == 0 {
            tx.rollback().await?;
            return Err(CommerceError::Conflict("Slot is not available".to_string()));
        }

        let booking = Booking {
            id: Uuid::new_v4().to_string(),
            slot_id: slot_id.to_string(),
            student_id: student_id.to_string(),
            teacher_id: slot.teacher_id.clone(),
            status: BookingStatus::Active,
            note,
            created_at: Utc::now(),
            cancelled_at: None,
        };
        db::bookings::insert_booking(&mut tx, &booking).await?;

        tx.commit().await?;

        info!(
            booking_id = %booking.id,
            slot_id = %slot_id,
            student_id = %student_id,
            "slot booked"
        );
        self.events.emit_lossy(CommerceEvent::SlotBooked {
            booking_id: booking.id.clone(),
            slot_id: booking.slot_id.clone(),
            student_id: booking.student_id.clone(),
            teacher_id: booking.teacher_id.clone(),
            timestamp: booking.created_at,
        });

        Ok(booking)
    }

    /// Cancel a booking and reopen its slot.
    ///
    /// Only the booking's student or the slot's teacher may cancel.
    /// Cancelling an already cancelled booking is an idempotent no-op that
    /// leaves the slot untouched.
    pub async fn cancel_booking(&self, booking_id: &str, actor_id: &str) -> Result<Booking> {
        let booking = db::bookings::get_booking(&self.db, booking_id)
            .await?
            .ok_or_else(|| CommerceError::NotFound(format!("Booking not found: {}", booking_id)))?;

        if actor_id != booking.student_id && actor_id != booking.teacher_id {
            return Err(CommerceError::Authorization(
                "Only the student or the teacher may cancel this booking".to_string(),
            ));
        }

        if booking.status == BookingStatus::Cancelled {
            return Ok(booking);
        }

        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let flipped = db::bookings::mark_booking_cancelled(&mut tx, booking_id, now).await?;
        if flipped == 0 {
            // Raced with another cancel of the same booking
            tx.rollback().await?;
            let current = db::bookings::get_booking(&self.db, booking_id)
                .await?
                .ok_or_else(|| {
                    CommerceError::NotFound(format!("Booking not found: {}", booking_id))
                })?;
            return match current.status {
                BookingStatus::Cancelled => Ok(current),
                BookingStatus::Active => Err(CommerceError::Internal(
                    "booking cancellation affected no rows".to_string(),
                )),
            };
        }

        db::slots::release_slot(&mut tx, &booking.slot_id).await?;

        tx.commit().await?;

        info!(booking_id = %booking_id, cancelled_by = %actor_id, "booking cancelled");
        self.events.emit_lossy(CommerceEvent::BookingCancelled {
            booking_id: booking.id.clone(),
            slot_id: booking.slot_id.clone(),
            cancelled_by: actor_id.to_string(),
            timestamp: now,
        });

        db::bookings::get_booking(&self.db, booking_id)
            .await?
            .ok_or_else(|| CommerceError::Internal("booking missing after cancellation".to_string()))
    }

    pub async fn get_booking(&self, booking_id: &str) -> Result<Booking> {
        db::bookings::get_booking(&self.db, booking_id)
            .await?
            .ok_or_else(|| CommerceError::NotFound(format!("Booking not found: {}", booking_id)))
    }
}
