//! Teacher earnings persistence
//!
//! Two write paths share the `(teacher_id, course_id, year, month)` row:
//! confirmation-time deltas accumulate into it, and the monthly recompute
//! replaces it wholesale. The recompute is the source of truth.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::db::parse_timestamp;
use crate::error::Result;
use crate::models::EarningsRecord;

fn record_from_row(row: &SqliteRow) -> Result<EarningsRecord> {
    Ok(EarningsRecord {
        teacher_id: row.get("teacher_id"),
        course_id: row.get("course_id"),
        year: row.get::<i64, _>("year") as i32,
        month: row.get::<i64, _>("month") as u32,
        gross_minor: row.get("gross_minor"),
        teacher_share_minor: row.get("teacher_share_minor"),
        computed_at: parse_timestamp("computed_at", &row.get::<String, _>("computed_at"))?,
    })
}

/// Accumulate a confirmed payment into the month's row
pub async fn apply_delta(
    conn: &mut SqliteConnection,
    teacher_id: &str,
    course_id: &str,
    year: i32,
    month: u32,
    gross_delta: i64,
    share_delta: i64,
    computed_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO teacher_earnings (
            teacher_id, course_id, year, month, gross_minor, teacher_share_minor, computed_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(teacher_id, course_id, year, month) DO UPDATE SET
            gross_minor = gross_minor + excluded.gross_minor,
            teacher_share_minor = teacher_share_minor + excluded.teacher_share_minor,
            computed_at = excluded.computed_at
        "#,
    )
    .bind(teacher_id)
    .bind(course_id)
    .bind(year)
    .bind(month)
    .bind(gross_delta)
    .bind(share_delta)
    .bind(computed_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Replace the month's row with a recomputed record (idempotent)
pub async fn replace_record(conn: &mut SqliteConnection, record: &EarningsRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO teacher_earnings (
            teacher_id, course_id, year, month, gross_minor, teacher_share_minor, computed_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(teacher_id, course_id, year, month) DO UPDATE SET
            gross_minor = excluded.gross_minor,
            teacher_share_minor = excluded.teacher_share_minor,
            computed_at = excluded.computed_at
        "#,
    )
    .bind(&record.teacher_id)
    .bind(&record.course_id)
    .bind(record.year)
    .bind(record.month)
    .bind(record.gross_minor)
    .bind(record.teacher_share_minor)
    .bind(record.computed_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn get_record(
    pool: &SqlitePool,
    teacher_id: &str,
    course_id: &str,
    year: i32,
    month: u32,
) -> Result<Option<EarningsRecord>> {
    let row = sqlx::query(
        r#"
        SELECT * FROM teacher_earnings
        WHERE teacher_id = ? AND course_id = ? AND year = ? AND month = ?
        "#,
    )
    .bind(teacher_id)
    .bind(course_id)
    .bind(year)
    .bind(month)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(record_from_row).transpose()
}

/// Statement listing, newest month first
pub async fn list_records(
    pool: &SqlitePool,
    teacher_id: &str,
    year: Option<i32>,
) -> Result<Vec<EarningsRecord>> {
    let rows = match year {
        Some(year) => {
            sqlx::query(
                r#"
                SELECT * FROM teacher_earnings
                WHERE teacher_id = ? AND year = ?
                ORDER BY year DESC, month DESC, course_id
                "#,
            )
            .bind(teacher_id)
            .bind(year)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(
                r#"
                SELECT * FROM teacher_earnings
                WHERE teacher_id = ?
                ORDER BY year DESC, month DESC, course_id
                "#,
            )
            .bind(teacher_id)
            .fetch_all(pool)
            .await?
        }
    };

    rows.iter().map(record_from_row).collect()
}

/// Sum of teacher_share_minor over all earnings rows for the teacher
pub async fn lifetime_share(pool: &SqlitePool, teacher_id: &str) -> Result<i64> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(teacher_share_minor), 0) FROM teacher_earnings WHERE teacher_id = ?",
    )
    .bind(teacher_id)
    .fetch_one(pool)
    .await?;

    Ok(total)
}

/// Amounts of COMPLETED payments attributed to the course within the
/// half-open window, oldest first.
///
/// Attribution walks the catalog: module and lesson payments through their
/// module's course, bundle payments through the bundle's course, booking
/// payments through the slot. RFC 3339 strings with a fixed UTC offset
/// compare correctly as text.
pub async fn attributed_payment_amounts(
    conn: &mut SqliteConnection,
    course_id: &str,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Result<Vec<i64>> {
    let amounts: Vec<i64> = sqlx::query_scalar(
        r#"
        SELECT p.amount_minor
        FROM payments p
        LEFT JOIN course_modules m ON p.target_type = 'module' AND m.id = p.target_id
        LEFT JOIN lessons l ON p.target_type = 'lesson' AND l.id = p.target_id
        LEFT JOIN course_modules lm ON lm.id = l.module_id
        LEFT JOIN bundles bu ON p.target_type = 'bundle' AND bu.id = p.target_id
        LEFT JOIN bookings bk ON p.target_type = 'booking' AND bk.id = p.target_id
        LEFT JOIN lesson_slots s ON s.id = bk.slot_id
        WHERE p.status = 'COMPLETED'
          AND p.completed_at >= ?
          AND p.completed_at < ?
          AND COALESCE(m.course_id, lm.course_id, bu.course_id, s.course_id) = ?
        ORDER BY p.completed_at
        "#,
    )
    .bind(window_start.to_rfc3339())
    .bind(window_end.to_rfc3339())
    .bind(course_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(amounts)
}
