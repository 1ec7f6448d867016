//! Database initialization
//!
//! Creates the SQLite database on first run and brings the schema up
//! idempotently: every `CREATE TABLE IF NOT EXISTS` and default setting is
//! safe to run on every startup.
//!
//! Two groups of tables live here:
//! - commerce tables owned by this service (payments, bookings, coupons,
//!   content policies, earnings, payouts)
//! - catalog and collaborator tables written by the wider platform and read
//!   here for attribution and entitlement checks (courses, modules, lessons,
//!   bundles, subscriptions, enrollments, activity)

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::{info, warn};

/// Default commerce policy values, seeded into the settings table on init
/// and used as fallbacks when a key is missing at read time.
pub const DEFAULT_PER_STUDENT_RATE_MINOR: i64 = 1500;
pub const DEFAULT_ACTIVITY_TIERS_JSON: &str =
    r#"[{"min_days":15,"fraction_bps":10000},{"min_days":5,"fraction_bps":5000}]"#;
pub const DEFAULT_TEACHER_SHARE_BPS: i64 = 8000;
pub const DEFAULT_COUPON_CODE_LENGTH: i64 = 8;

/// Initialize the database connection pool and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(20)
        .min_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    // WAL allows concurrent readers with one writer, which matters for
    // conditional-update contention on payments and slots
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    init_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and default settings (idempotent)
///
/// Split out of [`init_database`] so tests can run the real schema against
/// an in-memory pool.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;

    // Catalog tables (written by the wider platform, seeded here in tests)
    create_courses_table(pool).await?;
    create_course_modules_table(pool).await?;
    create_lessons_table(pool).await?;
    create_bundles_table(pool).await?;

    // Commerce tables
    create_content_policies_table(pool).await?;
    create_payments_table(pool).await?;
    create_lesson_slots_table(pool).await?;
    create_bookings_table(pool).await?;
    create_coupons_table(pool).await?;
    create_teacher_earnings_table(pool).await?;
    create_payout_requests_table(pool).await?;

    // Collaborator tables (read through provider seams)
    create_subscriptions_table(pool).await?;
    create_enrollments_table(pool).await?;
    create_course_activity_table(pool).await?;

    init_default_settings(pool).await?;

    Ok(())
}

/// Create the settings table
///
/// Stores runtime-tunable configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_courses_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS courses (
            id TEXT PRIMARY KEY,
            teacher_id TEXT NOT NULL,
            title TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_courses_teacher ON courses(teacher_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_course_modules_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS course_modules (
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_course_modules_course ON course_modules(course_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_lessons_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS lessons (
            id TEXT PRIMARY KEY,
            module_id TEXT NOT NULL REFERENCES course_modules(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_lessons_module ON lessons(module_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_bundles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bundles (
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_bundles_course ON bundles(course_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the content_policies table
///
/// One row per piece of monetized content; absence of a row means FREE.
pub async fn create_content_policies_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS content_policies (
            content_type TEXT NOT NULL CHECK (content_type IN ('module', 'program')),
            content_id TEXT NOT NULL,
            monetization_type TEXT NOT NULL CHECK (monetization_type IN ('FREE', 'SUBSCRIPTION', 'PREMIUM')),
            price_minor INTEGER,
            currency TEXT NOT NULL DEFAULT 'USD',
            subscription_tier TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (content_type, content_id),
            CHECK (price_minor IS NULL OR price_minor >= 0),
            CHECK (monetization_type != 'PREMIUM' OR price_minor > 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the payments table
///
/// Status transitions are guarded by conditional updates; the CHECK list is
/// the schema-level backstop.
pub async fn create_payments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS payments (
            id TEXT PRIMARY KEY,
            payer_id TEXT NOT NULL,
            target_type TEXT NOT NULL CHECK (target_type IN ('module', 'lesson', 'booking', 'bundle')),
            target_id TEXT NOT NULL,
            amount_minor INTEGER NOT NULL CHECK (amount_minor > 0),
            currency TEXT NOT NULL DEFAULT 'USD',
            status TEXT NOT NULL DEFAULT 'PENDING' CHECK (status IN ('PENDING', 'COMPLETED', 'CANCELLED')),
            provider TEXT NOT NULL,
            external_tx_id TEXT,
            coupon_code TEXT,
            discount_minor INTEGER NOT NULL DEFAULT 0 CHECK (discount_minor >= 0),
            created_at TEXT NOT NULL,
            completed_at TEXT,
            cancelled_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_payments_payer_target ON payments(payer_id, target_type, target_id, status)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_payments_status_completed ON payments(status, completed_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the lesson_slots table
///
/// `course_id` is NOT NULL so every booking attributes to a course for
/// earnings settlement.
pub async fn create_lesson_slots_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS lesson_slots (
            id TEXT PRIMARY KEY,
            teacher_id TEXT NOT NULL,
            course_id TEXT NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            price_minor INTEGER NOT NULL DEFAULT 0 CHECK (price_minor >= 0),
            is_available INTEGER NOT NULL DEFAULT 1 CHECK (is_available IN (0, 1)),
            is_booked INTEGER NOT NULL DEFAULT 0 CHECK (is_booked IN (0, 1)),
            created_at TEXT NOT NULL,
            CHECK (end_time > start_time)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_lesson_slots_teacher ON lesson_slots(teacher_id, start_time)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the bookings table
///
/// The partial unique index enforces "at most one active booking per slot"
/// in the schema, backing up the conditional-update claim path.
pub async fn create_bookings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bookings (
            id TEXT PRIMARY KEY,
            slot_id TEXT NOT NULL REFERENCES lesson_slots(id) ON DELETE CASCADE,
            student_id TEXT NOT NULL,
            teacher_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'cancelled')),
            note TEXT,
            created_at TEXT NOT NULL,
            cancelled_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_bookings_active_slot ON bookings(slot_id) WHERE status = 'active'",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_bookings_student ON bookings(student_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the coupons table
///
/// The usage CHECK is the schema backstop; the conditional increment at
/// payment confirmation is what actually serializes concurrent redemptions.
pub async fn create_coupons_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS coupons (
            code TEXT PRIMARY KEY,
            coupon_type TEXT NOT NULL CHECK (coupon_type IN ('PERCENTAGE', 'FIXED')),
            value INTEGER NOT NULL CHECK (value > 0),
            min_purchase_minor INTEGER NOT NULL DEFAULT 0 CHECK (min_purchase_minor >= 0),
            max_discount_minor INTEGER CHECK (max_discount_minor IS NULL OR max_discount_minor > 0),
            usage_limit INTEGER CHECK (usage_limit IS NULL OR usage_limit > 0),
            usage_count INTEGER NOT NULL DEFAULT 0 CHECK (usage_count >= 0),
            expires_at TEXT,
            applies_to TEXT NOT NULL DEFAULT 'ALL' CHECK (applies_to IN ('ALL', 'COURSE', 'BUNDLE', 'SUBSCRIPTION')),
            scope_id TEXT,
            is_active INTEGER NOT NULL DEFAULT 1 CHECK (is_active IN (0, 1)),
            created_at TEXT NOT NULL,
            CHECK (usage_limit IS NULL OR usage_count <= usage_limit),
            CHECK (coupon_type != 'PERCENTAGE' OR value <= 100)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the teacher_earnings table
///
/// One row per teacher/course/month. Confirmation-time deltas accumulate
/// into the row; the monthly recompute replaces it wholesale.
pub async fn create_teacher_earnings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS teacher_earnings (
            teacher_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            year INTEGER NOT NULL,
            month INTEGER NOT NULL CHECK (month >= 1 AND month <= 12),
            gross_minor INTEGER NOT NULL DEFAULT 0 CHECK (gross_minor >= 0),
            teacher_share_minor INTEGER NOT NULL DEFAULT 0 CHECK (teacher_share_minor >= 0),
            computed_at TEXT NOT NULL,
            PRIMARY KEY (teacher_id, course_id, year, month),
            CHECK (teacher_share_minor <= gross_minor)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_teacher_earnings_teacher ON teacher_earnings(teacher_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the payout_requests table
pub async fn create_payout_requests_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS payout_requests (
            id TEXT PRIMARY KEY,
            teacher_id TEXT NOT NULL,
            amount_minor INTEGER NOT NULL CHECK (amount_minor > 0),
            status TEXT NOT NULL DEFAULT 'PENDING' CHECK (status IN ('PENDING', 'APPROVED', 'REJECTED')),
            method TEXT NOT NULL,
            details TEXT,
            reason TEXT,
            external_tx_id TEXT,
            decided_by TEXT,
            created_at TEXT NOT NULL,
            decided_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_payout_requests_teacher ON payout_requests(teacher_id, status)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_subscriptions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS subscriptions (
            user_id TEXT PRIMARY KEY,
            tier TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('active', 'expired', 'cancelled')),
            expires_at TEXT,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_enrollments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS enrollments (
            student_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            enrolled_at TEXT NOT NULL,
            PRIMARY KEY (student_id, course_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_course_activity_table(pool: &SqlitePool) -> Result<()> {
    // One row per student/course/day with any learning activity.
    // activity_date is YYYY-MM-DD so month windows compare as strings.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS course_activity (
            student_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            activity_date TEXT NOT NULL CHECK (length(activity_date) = 10),
            PRIMARY KEY (student_id, course_id, activity_date)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_course_activity_course ON course_activity(course_id, activity_date)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Initialize or update default settings
///
/// Ensures all commerce policy settings exist with default values. NULL
/// values are reset to defaults.
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    // Earnings policy: flat monthly rate per qualifying student, activity
    // tiers (descending min_days), and the teacher's share of gross
    ensure_setting(
        pool,
        "earnings_per_student_rate_minor",
        &DEFAULT_PER_STUDENT_RATE_MINOR.to_string(),
    )
    .await?;
    ensure_setting(pool, "earnings_activity_tiers", DEFAULT_ACTIVITY_TIERS_JSON).await?;
    ensure_setting(
        pool,
        "earnings_teacher_share_bps",
        &DEFAULT_TEACHER_SHARE_BPS.to_string(),
    )
    .await?;

    // Coupon administration
    ensure_setting(
        pool,
        "coupon_code_length",
        &DEFAULT_COUPON_CODE_LENGTH.to_string(),
    )
    .await?;

    info!("Default settings initialized");
    Ok(())
}

/// Ensure a setting exists with the specified default value
///
/// If the setting doesn't exist, it will be created with the default.
/// If the setting exists but has a NULL value, it will be reset to the default.
pub async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM settings WHERE key = ?)")
        .bind(key)
        .fetch_one(pool)
        .await?;

    if !exists {
        // INSERT OR IGNORE handles concurrent initialization races: multiple
        // connections may pass the exists check simultaneously
        sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(default_value)
            .execute(pool)
            .await?;

        info!("Initialized setting '{}' with default value: {}", key, default_value);
        return Ok(());
    }

    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_one(pool)
        .await?;

    if value.is_none() {
        sqlx::query("UPDATE settings SET value = ? WHERE key = ?")
            .bind(default_value)
            .bind(key)
            .execute(pool)
            .await?;

        warn!("Setting '{}' was NULL, reset to default: {}", key, default_value);
    }

    Ok(())
}
