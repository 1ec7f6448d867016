//! Payment persistence
//!
//! Status flips are conditional updates: the WHERE clause carries the
//! expected prior state and zero affected rows means the precondition no
//! longer held. Classification of that case (missing / already terminal)
//! happens in the service layer from a fresh read.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::db::{parse_opt_timestamp, parse_timestamp};
use crate::error::{CommerceError, Result};
use crate::models::{Payment, PaymentStatus, PaymentTargetKind};

fn payment_from_row(row: &SqliteRow) -> Result<Payment> {
    Ok(Payment {
        id: row.get("id"),
        payer_id: row.get("payer_id"),
        target_type: row
            .get::<String, _>("target_type")
            .parse::<PaymentTargetKind>()
            .map_err(CommerceError::Internal)?,
        target_id: row.get("target_id"),
        amount_minor: row.get("amount_minor"),
        currency: row.get("currency"),
        status: row
            .get::<String, _>("status")
            .parse::<PaymentStatus>()
            .map_err(CommerceError::Internal)?,
        provider: row.get("provider"),
        external_tx_id: row.get("external_tx_id"),
        coupon_code: row.get("coupon_code"),
        discount_minor: row.get("discount_minor"),
        created_at: parse_timestamp("created_at", &row.get::<String, _>("created_at"))?,
        completed_at: parse_opt_timestamp("completed_at", row.get("completed_at"))?,
        cancelled_at: parse_opt_timestamp("cancelled_at", row.get("cancelled_at"))?,
    })
}

pub async fn insert_payment(pool: &SqlitePool, payment: &Payment) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO payments (
            id, payer_id, target_type, target_id, amount_minor, currency,
            status, provider, external_tx_id, coupon_code, discount_minor,
            created_at, completed_at, cancelled_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&payment.id)
    .bind(&payment.payer_id)
    .bind(payment.target_type.as_str())
    .bind(&payment.target_id)
    .bind(payment.amount_minor)
    .bind(&payment.currency)
    .bind(payment.status.as_str())
    .bind(&payment.provider)
    .bind(&payment.external_tx_id)
    .bind(&payment.coupon_code)
    .bind(payment.discount_minor)
    .bind(payment.created_at.to_rfc3339())
    .bind(payment.completed_at.map(|t| t.to_rfc3339()))
    .bind(payment.cancelled_at.map(|t| t.to_rfc3339()))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_payment(pool: &SqlitePool, payment_id: &str) -> Result<Option<Payment>> {
    let row = sqlx::query("SELECT * FROM payments WHERE id = ?")
        .bind(payment_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(payment_from_row).transpose()
}

pub async fn list_payments_for_payer(pool: &SqlitePool, payer_id: &str) -> Result<Vec<Payment>> {
    let rows = sqlx::query("SELECT * FROM payments WHERE payer_id = ? ORDER BY created_at DESC")
        .bind(payer_id)
        .fetch_all(pool)
        .await?;

    rows.iter().map(payment_from_row).collect()
}

/// Most recent COMPLETED payment by this payer for this target, if any
pub async fn find_completed(
    pool: &SqlitePool,
    payer_id: &str,
    target_type: PaymentTargetKind,
    target_id: &str,
) -> Result<Option<Payment>> {
    let row = sqlx::query(
        r#"
        SELECT * FROM payments
        WHERE payer_id = ? AND target_type = ? AND target_id = ? AND status = 'COMPLETED'
        ORDER BY completed_at DESC
        LIMIT 1
        "#,
    )
    .bind(payer_id)
    .bind(target_type.as_str())
    .bind(target_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(payment_from_row).transpose()
}

/// Does the payer hold a COMPLETED bundle payment covering the given module?
pub async fn has_bundle_payment_for_module(
    pool: &SqlitePool,
    payer_id: &str,
    module_id: &str,
) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1
            FROM payments p
            JOIN bundles b ON b.id = p.target_id
            JOIN course_modules m ON m.course_id = b.course_id
            WHERE p.payer_id = ?
              AND p.target_type = 'bundle'
              AND p.status = 'COMPLETED'
              AND m.id = ?
        )
        "#,
    )
    .bind(payer_id)
    .bind(module_id)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

/// Does the payer hold a COMPLETED bundle payment for any bundle of this course?
pub async fn has_bundle_payment_for_course(
    pool: &SqlitePool,
    payer_id: &str,
    course_id: &str,
) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1
            FROM payments p
            JOIN bundles b ON b.id = p.target_id
            WHERE p.payer_id = ?
              AND p.target_type = 'bundle'
              AND p.status = 'COMPLETED'
              AND b.course_id = ?
        )
        "#,
    )
    .bind(payer_id)
    .bind(course_id)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

/// Conditional flip PENDING → COMPLETED. Returns affected row count.
///
/// `external_tx_id` only overwrites when the caller supplies one.
pub async fn mark_completed(
    conn: &mut SqliteConnection,
    payment_id: &str,
    completed_at: DateTime<Utc>,
    external_tx_id: Option<&str>,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE payments
        SET status = 'COMPLETED',
            completed_at = ?,
            external_tx_id = COALESCE(?, external_tx_id)
        WHERE id = ? AND status = 'PENDING'
        "#,
    )
    .bind(completed_at.to_rfc3339())
    .bind(external_tx_id)
    .bind(payment_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Conditional flip PENDING → CANCELLED. Returns affected row count.
pub async fn mark_cancelled(
    pool: &SqlitePool,
    payment_id: &str,
    cancelled_at: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE payments
        SET status = 'CANCELLED', cancelled_at = ?
        WHERE id = ? AND status = 'PENDING'
        "#,
    )
    .bind(cancelled_at.to_rfc3339())
    .bind(payment_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
