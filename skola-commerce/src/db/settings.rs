//! Typed access to commerce settings
//!
//! Raw key/value plumbing lives in `skola_common::db::settings`; this
//! module parses the commerce policy keys into their domain shapes.
//! Keys are seeded at init, so a missing key only happens on databases
//! created by older builds; those fall back to the seeded defaults.

use sqlx::SqlitePool;

use skola_common::db::init::{
    DEFAULT_ACTIVITY_TIERS_JSON, DEFAULT_COUPON_CODE_LENGTH, DEFAULT_PER_STUDENT_RATE_MINOR,
    DEFAULT_TEACHER_SHARE_BPS,
};
use skola_common::db::settings::get_setting;
use skola_common::Error;

use crate::error::Result;
use crate::models::{ActivityTier, EarningsPolicy};

/// Load the earnings policy from the settings table.
///
/// Malformed tier JSON is a configuration error surfaced to the caller,
/// never a panic.
pub async fn load_earnings_policy(pool: &SqlitePool) -> Result<EarningsPolicy> {
    let per_student_rate_minor = get_setting::<i64>(pool, "earnings_per_student_rate_minor")
        .await?
        .unwrap_or(DEFAULT_PER_STUDENT_RATE_MINOR);

    let teacher_share_bps = get_setting::<i64>(pool, "earnings_teacher_share_bps")
        .await?
        .unwrap_or(DEFAULT_TEACHER_SHARE_BPS);

    let tiers_json = get_setting::<String>(pool, "earnings_activity_tiers")
        .await?
        .unwrap_or_else(|| DEFAULT_ACTIVITY_TIERS_JSON.to_string());

    let mut tiers: Vec<ActivityTier> = serde_json::from_str(&tiers_json).map_err(|e| {
        Error::Config(format!("invalid earnings_activity_tiers setting: {}", e))
    })?;

    // fraction_for assumes descending min_days
    tiers.sort_by(|a, b| b.min_days.cmp(&a.min_days));

    Ok(EarningsPolicy {
        per_student_rate_minor,
        tiers,
        teacher_share_bps,
    })
}

/// Length of generated coupon codes, clamped to a sane range
pub async fn coupon_code_length(pool: &SqlitePool) -> Result<usize> {
    let length = get_setting::<i64>(pool, "coupon_code_length")
        .await?
        .unwrap_or(DEFAULT_COUPON_CODE_LENGTH);

    Ok(length.clamp(4, 32) as usize)
}
