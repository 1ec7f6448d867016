//! Content policy persistence

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::db::parse_timestamp;
use crate::error::{CommerceError, Result};
use crate::models::{ContentPolicy, ContentType, MonetizationType};

fn policy_from_row(row: &SqliteRow) -> Result<ContentPolicy> {
    Ok(ContentPolicy {
        content_type: row
            .get::<String, _>("content_type")
            .parse::<ContentType>()
            .map_err(CommerceError::Internal)?,
        content_id: row.get("content_id"),
        monetization_type: row
            .get::<String, _>("monetization_type")
            .parse::<MonetizationType>()
            .map_err(CommerceError::Internal)?,
        price_minor: row.get("price_minor"),
        currency: row.get("currency"),
        subscription_tier: row.get("subscription_tier"),
        updated_at: parse_timestamp("updated_at", &row.get::<String, _>("updated_at"))?,
    })
}

pub async fn get_policy(
    pool: &SqlitePool,
    content_type: ContentType,
    content_id: &str,
) -> Result<Option<ContentPolicy>> {
    let row = sqlx::query(
        "SELECT * FROM content_policies WHERE content_type = ? AND content_id = ?",
    )
    .bind(content_type.as_str())
    .bind(content_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(policy_from_row).transpose()
}

pub async fn upsert_policy(pool: &SqlitePool, policy: &ContentPolicy) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO content_policies (
            content_type, content_id, monetization_type, price_minor,
            currency, subscription_tier, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(content_type, content_id) DO UPDATE SET
            monetization_type = excluded.monetization_type,
            price_minor = excluded.price_minor,
            currency = excluded.currency,
            subscription_tier = excluded.subscription_tier,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(policy.content_type.as_str())
    .bind(&policy.content_id)
    .bind(policy.monetization_type.as_str())
    .bind(policy.price_minor)
    .bind(&policy.currency)
    .bind(&policy.subscription_tier)
    .bind(policy.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}
