//! Lesson slot and booking models
//!
//! A slot published by a teacher can hold at most one active booking.
//! The database enforces that with a partial unique index on
//! `bookings(slot_id) WHERE status = 'active'`; the models here only
//! carry the state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Booking state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Active,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Active => "active",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(BookingStatus::Active),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unknown booking status: {}", other)),
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bookable teaching window published by a teacher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonSlot {
    pub id: String,
    pub teacher_id: String,
    pub course_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub price_minor: i64,
    /// Teacher-controlled visibility; an unavailable slot cannot be booked
    pub is_available: bool,
    /// Set while an active booking holds the slot
    pub is_booked: bool,
    pub created_at: DateTime<Utc>,
}

/// A student's claim on a slot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub slot_id: String,
    pub student_id: String,
    /// Denormalized from the slot at booking time
    pub teacher_id: String,
    pub status: BookingStatus,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_status_round_trips() {
        for status in [BookingStatus::Active, BookingStatus::Cancelled] {
            assert_eq!(status.as_str().parse::<BookingStatus>().unwrap(), status);
        }
        assert!("expired".parse::<BookingStatus>().is_err());
    }
}
