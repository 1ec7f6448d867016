//! Coupon persistence
//!
//! `usage_count` only ever moves through [`increment_usage`], inside the
//! payment confirmation transaction. Pricing reads never touch it.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::db::{parse_opt_timestamp, parse_timestamp};
use crate::error::{CommerceError, Result};
use crate::models::{Coupon, CouponScope, CouponType};

fn coupon_from_row(row: &SqliteRow) -> Result<Coupon> {
    Ok(Coupon {
        code: row.get("code"),
        coupon_type: row
            .get::<String, _>("coupon_type")
            .parse::<CouponType>()
            .map_err(CommerceError::Internal)?,
        value: row.get("value"),
        min_purchase_minor: row.get("min_purchase_minor"),
        max_discount_minor: row.get("max_discount_minor"),
        usage_limit: row.get("usage_limit"),
        usage_count: row.get("usage_count"),
        expires_at: parse_opt_timestamp("expires_at", row.get("expires_at"))?,
        applies_to: row
            .get::<String, _>("applies_to")
            .parse::<CouponScope>()
            .map_err(CommerceError::Internal)?,
        scope_id: row.get("scope_id"),
        is_active: row.get::<i64, _>("is_active") != 0,
        created_at: parse_timestamp("created_at", &row.get::<String, _>("created_at"))?,
    })
}

pub async fn insert_coupon(pool: &SqlitePool, coupon: &Coupon) -> Result<()> {
    let result = sqlx::query(
        r#"
        INSERT INTO coupons (
            code, coupon_type, value, min_purchase_minor, max_discount_minor,
            usage_limit, usage_count, expires_at, applies_to, scope_id,
            is_active, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&coupon.code)
    .bind(coupon.coupon_type.as_str())
    .bind(coupon.value)
    .bind(coupon.min_purchase_minor)
    .bind(coupon.max_discount_minor)
    .bind(coupon.usage_limit)
    .bind(coupon.usage_count)
    .bind(coupon.expires_at.map(|t| t.to_rfc3339()))
    .bind(coupon.applies_to.as_str())
    .bind(&coupon.scope_id)
    .bind(coupon.is_active as i64)
    .bind(coupon.created_at.to_rfc3339())
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
            CommerceError::Conflict(format!("Coupon code already exists: {}", coupon.code)),
        ),
        Err(e) => Err(e.into()),
    }
}

pub async fn get_coupon(pool: &SqlitePool, code: &str) -> Result<Option<Coupon>> {
    let row = sqlx::query("SELECT * FROM coupons WHERE code = ?")
        .bind(code)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(coupon_from_row).transpose()
}

pub async fn list_coupons(pool: &SqlitePool) -> Result<Vec<Coupon>> {
    let rows = sqlx::query("SELECT * FROM coupons ORDER BY created_at DESC")
        .fetch_all(pool)
        .await?;

    rows.iter().map(coupon_from_row).collect()
}

/// Consume one use, guarded by the usage limit.
///
/// Zero affected rows means the limit was exhausted between pricing and
/// confirmation; the caller rolls back the surrounding transaction.
pub async fn increment_usage(conn: &mut SqliteConnection, code: &str) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE coupons
        SET usage_count = usage_count + 1
        WHERE code = ? AND (usage_limit IS NULL OR usage_count < usage_limit)
        "#,
    )
    .bind(code)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}
