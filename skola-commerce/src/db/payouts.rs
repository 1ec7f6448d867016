//! Payout request persistence
//!
//! Balance checks are atomic SQL. The request insert and the approval
//! update each embed the available-balance computation, so no
//! read-then-write window exists in application code.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::db::{parse_opt_timestamp, parse_timestamp};
use crate::error::{CommerceError, Result};
use crate::models::{PayoutRequest, PayoutStatus};

fn payout_from_row(row: &SqliteRow) -> Result<PayoutRequest> {
    let details: Option<String> = row.get("details");
    let details = details
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| CommerceError::Internal(format!("invalid payout details JSON: {}", e)))?;

    Ok(PayoutRequest {
        id: row.get("id"),
        teacher_id: row.get("teacher_id"),
        amount_minor: row.get("amount_minor"),
        status: row
            .get::<String, _>("status")
            .parse::<PayoutStatus>()
            .map_err(CommerceError::Internal)?,
        method: row.get("method"),
        details,
        reason: row.get("reason"),
        external_tx_id: row.get("external_tx_id"),
        decided_by: row.get("decided_by"),
        created_at: parse_timestamp("created_at", &row.get::<String, _>("created_at"))?,
        decided_at: parse_opt_timestamp("decided_at", row.get("decided_at"))?,
    })
}

/// Available balance: lifetime share minus (PENDING + APPROVED) payout amounts
pub async fn available_balance(pool: &SqlitePool, teacher_id: &str) -> Result<i64> {
    let available: i64 = sqlx::query_scalar(
        r#"
        SELECT
            (SELECT COALESCE(SUM(teacher_share_minor), 0)
               FROM teacher_earnings WHERE teacher_id = ?)
            -
            (SELECT COALESCE(SUM(amount_minor), 0)
               FROM payout_requests
              WHERE teacher_id = ? AND status IN ('PENDING', 'APPROVED'))
        "#,
    )
    .bind(teacher_id)
    .bind(teacher_id)
    .fetch_one(pool)
    .await?;

    Ok(available)
}

/// Sums of APPROVED and PENDING payout amounts for the teacher
pub async fn paid_and_pending(pool: &SqlitePool, teacher_id: &str) -> Result<(i64, i64)> {
    let sums: (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COALESCE(SUM(CASE WHEN status = 'APPROVED' THEN amount_minor ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN status = 'PENDING' THEN amount_minor ELSE 0 END), 0)
        FROM payout_requests
        WHERE teacher_id = ?
        "#,
    )
    .bind(teacher_id)
    .fetch_one(pool)
    .await?;

    Ok(sums)
}

/// Insert the request only if the amount fits the available balance.
/// Returns affected row count; zero means insufficient funds.
pub async fn insert_payout_guarded(pool: &SqlitePool, payout: &PayoutRequest) -> Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO payout_requests (
            id, teacher_id, amount_minor, status, method, details, created_at
        )
        SELECT ?, ?, ?, 'PENDING', ?, ?, ?
        WHERE ? <= (
            (SELECT COALESCE(SUM(teacher_share_minor), 0)
               FROM teacher_earnings WHERE teacher_id = ?)
            -
            (SELECT COALESCE(SUM(amount_minor), 0)
               FROM payout_requests
              WHERE teacher_id = ? AND status IN ('PENDING', 'APPROVED'))
        )
        "#,
    )
    .bind(&payout.id)
    .bind(&payout.teacher_id)
    .bind(payout.amount_minor)
    .bind(&payout.method)
    .bind(payout.details.as_ref().map(|v| v.to_string()))
    .bind(payout.created_at.to_rfc3339())
    .bind(payout.amount_minor)
    .bind(&payout.teacher_id)
    .bind(&payout.teacher_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Approve only while PENDING and while the amount is still covered by
/// lifetime share minus every other PENDING/APPROVED request.
/// Returns affected row count.
pub async fn approve_guarded(
    pool: &SqlitePool,
    payout_id: &str,
    admin_id: &str,
    external_tx_id: Option<&str>,
    decided_at: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE payout_requests
        SET status = 'APPROVED', decided_by = ?, decided_at = ?, external_tx_id = ?
        WHERE id = ? AND status = 'PENDING'
          AND amount_minor <= (
              (SELECT COALESCE(SUM(e.teacher_share_minor), 0)
                 FROM teacher_earnings e
                WHERE e.teacher_id = payout_requests.teacher_id)
              -
              (SELECT COALESCE(SUM(p2.amount_minor), 0)
                 FROM payout_requests p2
                WHERE p2.teacher_id = payout_requests.teacher_id
                  AND p2.status IN ('PENDING', 'APPROVED')
                  AND p2.id != payout_requests.id)
          )
        "#,
    )
    .bind(admin_id)
    .bind(decided_at.to_rfc3339())
    .bind(external_tx_id)
    .bind(payout_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Conditional flip PENDING → REJECTED; the reservation is released.
/// Returns affected row count.
pub async fn reject_pending(
    pool: &SqlitePool,
    payout_id: &str,
    admin_id: &str,
    reason: &str,
    decided_at: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE payout_requests
        SET status = 'REJECTED', decided_by = ?, decided_at = ?, reason = ?
        WHERE id = ? AND status = 'PENDING'
        "#,
    )
    .bind(admin_id)
    .bind(decided_at.to_rfc3339())
    .bind(reason)
    .bind(payout_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn get_payout(pool: &SqlitePool, payout_id: &str) -> Result<Option<PayoutRequest>> {
    let row = sqlx::query("SELECT * FROM payout_requests WHERE id = ?")
        .bind(payout_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(payout_from_row).transpose()
}

pub async fn list_for_teacher(
    pool: &SqlitePool,
    teacher_id: &str,
    status: Option<PayoutStatus>,
) -> Result<Vec<PayoutRequest>> {
    let rows = match status {
        Some(status) => {
            sqlx::query(
                r#"
                SELECT * FROM payout_requests
                WHERE teacher_id = ? AND status = ?
                ORDER BY created_at DESC
                "#,
            )
            .bind(teacher_id)
            .bind(status.as_str())
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(
                "SELECT * FROM payout_requests WHERE teacher_id = ? ORDER BY created_at DESC",
            )
            .bind(teacher_id)
            .fetch_all(pool)
            .await?
        }
    };

    rows.iter().map(payout_from_row).collect()
}

/// Admin queue, oldest request first
pub async fn list_pending(pool: &SqlitePool) -> Result<Vec<PayoutRequest>> {
    let rows =
        sqlx::query("SELECT * FROM payout_requests WHERE status = 'PENDING' ORDER BY created_at")
            .fetch_all(pool)
            .await?;

    rows.iter().map(payout_from_row).collect()
}
