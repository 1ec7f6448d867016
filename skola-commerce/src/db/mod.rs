//! Database access layer
//!
//! Free functions over the sqlx pool, one module per table group. Reads map
//! rows by hand; state transitions are conditional updates whose
//! `rows_affected()` the service layer classifies. Functions that run as one
//! step of a larger transaction take `&mut SqliteConnection` so the service
//! can pass `&mut *tx`.

pub mod bookings;
pub mod catalog;
pub mod coupons;
pub mod earnings;
pub mod payments;
pub mod payouts;
pub mod policies;
pub mod settings;
pub mod slots;

use chrono::{DateTime, Utc};

use crate::error::{CommerceError, Result};

/// Parse an RFC 3339 timestamp column into a UTC instant
pub(crate) fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            CommerceError::Internal(format!("invalid {} timestamp '{}': {}", column, value, e))
        })
}

pub(crate) fn parse_opt_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>> {
    value.map(|v| parse_timestamp(column, &v)).transpose()
}
