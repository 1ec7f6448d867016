//! Lesson slot persistence
//!
//! The claim/release pair backs the booking ledger: claiming is the
//! conditional update that serializes concurrent bookings of one slot.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::db::parse_timestamp;
use crate::error::Result;
use crate::models::LessonSlot;

fn slot_from_row(row: &SqliteRow) -> Result<LessonSlot> {
    Ok(LessonSlot {
        id: row.get("id"),
        teacher_id: row.get("teacher_id"),
        course_id: row.get("course_id"),
        start_time: parse_timestamp("start_time", &row.get::<String, _>("start_time"))?,
        end_time: parse_timestamp("end_time", &row.get::<String, _>("end_time"))?,
        price_minor: row.get("price_minor"),
        is_available: row.get::<i64, _>("is_available") != 0,
        is_booked: row.get::<i64, _>("is_booked") != 0,
        created_at: parse_timestamp("created_at", &row.get::<String, _>("created_at"))?,
    })
}

pub async fn insert_slot(pool: &SqlitePool, slot: &LessonSlot) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO lesson_slots (
            id, teacher_id, course_id, start_time, end_time,
            price_minor, is_available, is_booked, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&slot.id)
    .bind(&slot.teacher_id)
    .bind(&slot.course_id)
    .bind(slot.start_time.to_rfc3339())
    .bind(slot.end_time.to_rfc3339())
    .bind(slot.price_minor)
    .bind(slot.is_available as i64)
    .bind(slot.is_booked as i64)
    .bind(slot.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_slot(pool: &SqlitePool, slot_id: &str) -> Result<Option<LessonSlot>> {
    let row = sqlx::query("SELECT * FROM lesson_slots WHERE id = ?")
        .bind(slot_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(slot_from_row).transpose()
}

pub async fn list_slots_for_teacher(
    pool: &SqlitePool,
    teacher_id: &str,
    only_open: bool,
) -> Result<Vec<LessonSlot>> {
    let sql = if only_open {
        r#"
        SELECT * FROM lesson_slots
        WHERE teacher_id = ? AND is_available = 1 AND is_booked = 0
        ORDER BY start_time
        "#
    } else {
        "SELECT * FROM lesson_slots WHERE teacher_id = ? ORDER BY start_time"
    };

    let rows = sqlx::query(sql).bind(teacher_id).fetch_all(pool).await?;
    rows.iter().map(slot_from_row).collect()
}

/// Claim the slot for a booking: exactly one concurrent caller gets 1 row.
pub async fn claim_slot(conn: &mut SqliteConnection, slot_id: &str) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE lesson_slots
        SET is_booked = 1
        WHERE id = ? AND is_available = 1 AND is_booked = 0
        "#,
    )
    .bind(slot_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Reopen the slot after its active booking is cancelled
pub async fn release_slot(conn: &mut SqliteConnection, slot_id: &str) -> Result<u64> {
    let result = sqlx::query("UPDATE lesson_slots SET is_booked = 0 WHERE id = ?")
        .bind(slot_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}
