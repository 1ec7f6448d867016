//! Booking persistence

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::db::{parse_opt_timestamp, parse_timestamp};
use crate::error::{CommerceError, Result};
use crate::models::{Booking, BookingStatus};

fn booking_from_row(row: &SqliteRow) -> Result<Booking> {
    Ok(Booking {
        id: row.get("id"),
        slot_id: row.get("slot_id"),
        student_id: row.get("student_id"),
        teacher_id: row.get("teacher_id"),
        status: row
            .get::<String, _>("status")
            .parse::<BookingStatus>()
            .map_err(CommerceError::Internal)?,
        note: row.get("note"),
        created_at: parse_timestamp("created_at", &row.get::<String, _>("created_at"))?,
        cancelled_at: parse_opt_timestamp("cancelled_at", row.get("cancelled_at"))?,
    })
}

/// Insert the booking row inside the claim transaction
pub async fn insert_booking(conn: &mut SqliteConnection, booking: &Booking) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO bookings (
            id, slot_id, student_id, teacher_id, status, note, created_at, cancelled_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&booking.id)
    .bind(&booking.slot_id)
    .bind(&booking.student_id)
    .bind(&booking.teacher_id)
    .bind(booking.status.as_str())
    .bind(&booking.note)
    .bind(booking.created_at.to_rfc3339())
    .bind(booking.cancelled_at.map(|t| t.to_rfc3339()))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn get_booking(pool: &SqlitePool, booking_id: &str) -> Result<Option<Booking>> {
    let row = sqlx::query("SELECT * FROM bookings WHERE id = ?")
        .bind(booking_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(booking_from_row).transpose()
}

/// Conditional flip active → cancelled. Returns affected row count.
pub async fn mark_booking_cancelled(
    conn: &mut SqliteConnection,
    booking_id: &str,
    cancelled_at: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE bookings
        SET status = 'cancelled', cancelled_at = ?
        WHERE id = ? AND status = 'active'
        "#,
    )
    .bind(cancelled_at.to_rfc3339())
    .bind(booking_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}
