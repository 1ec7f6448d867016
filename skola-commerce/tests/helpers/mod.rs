//! Shared test fixtures
//!
//! Every test runs against a file-backed database created through the
//! real initializer so WAL mode, foreign keys, and the seeded settings
//! match production. The TempDir must stay alive for the pool's lifetime.

#![allow(dead_code)]

use chrono::Utc;
use sqlx::SqlitePool;
use tempfile::TempDir;

use skola_common::db::init_database;
use skola_common::events::EventBus;
use skola_commerce::AppState;

pub async fn setup_db() -> (SqlitePool, TempDir) {
    let dir = TempDir::new().expect("create temp dir");
    let pool = init_database(&dir.path().join("skola-test.db"))
        .await
        .expect("init database");
    (pool, dir)
}

pub async fn setup_state() -> (AppState, TempDir) {
    let (pool, dir) = setup_db().await;
    let state = AppState::new(pool, EventBus::new(100));
    (state, dir)
}

pub async fn seed_course(pool: &SqlitePool, id: &str, teacher_id: &str) {
    sqlx::query("INSERT INTO courses (id, teacher_id, title, created_at) VALUES (?, ?, ?, ?)")
        .bind(id)
        .bind(teacher_id)
        .bind(format!("Course {}", id))
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await
        .expect("seed course");
}

pub async fn seed_module(pool: &SqlitePool, id: &str, course_id: &str) {
    sqlx::query("INSERT INTO course_modules (id, course_id, title, created_at) VALUES (?, ?, ?, ?)")
        .bind(id)
        .bind(course_id)
        .bind(format!("Module {}", id))
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await
        .expect("seed module");
}

pub async fn seed_lesson(pool: &SqlitePool, id: &str, module_id: &str) {
    sqlx::query("INSERT INTO lessons (id, module_id, title, created_at) VALUES (?, ?, ?, ?)")
        .bind(id)
        .bind(module_id)
        .bind(format!("Lesson {}", id))
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await
        .expect("seed lesson");
}

pub async fn seed_bundle(pool: &SqlitePool, id: &str, course_id: &str) {
    sqlx::query("INSERT INTO bundles (id, course_id, title, created_at) VALUES (?, ?, ?, ?)")
        .bind(id)
        .bind(course_id)
        .bind(format!("Bundle {}", id))
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await
        .expect("seed bundle");
}

pub async fn seed_enrollment(pool: &SqlitePool, student_id: &str, course_id: &str) {
    sqlx::query("INSERT INTO enrollments (student_id, course_id, enrolled_at) VALUES (?, ?, ?)")
        .bind(student_id)
        .bind(course_id)
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await
        .expect("seed enrollment");
}

/// Dates are `YYYY-MM-DD` strings, one row per active day
pub async fn seed_activity(pool: &SqlitePool, student_id: &str, course_id: &str, dates: &[&str]) {
    for date in dates {
        sqlx::query(
            "INSERT INTO course_activity (student_id, course_id, activity_date) VALUES (?, ?, ?)",
        )
        .bind(student_id)
        .bind(course_id)
        .bind(date)
        .execute(pool)
        .await
        .expect("seed activity");
    }
}

pub async fn seed_subscription(
    pool: &SqlitePool,
    user_id: &str,
    tier: &str,
    status: &str,
    expires_at: Option<&str>,
) {
    sqlx::query(
        "INSERT OR REPLACE INTO subscriptions (user_id, tier, status, expires_at, updated_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(tier)
    .bind(status)
    .bind(expires_at)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await
    .expect("seed subscription");
}

pub async fn seed_earnings(
    pool: &SqlitePool,
    teacher_id: &str,
    course_id: &str,
    year: i32,
    month: u32,
    gross_minor: i64,
    share_minor: i64,
) {
    sqlx::query(
        "INSERT INTO teacher_earnings \
         (teacher_id, course_id, year, month, gross_minor, teacher_share_minor, computed_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(teacher_id)
    .bind(course_id)
    .bind(year)
    .bind(month as i64)
    .bind(gross_minor)
    .bind(share_minor)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await
    .expect("seed earnings");
}

pub async fn coupon_usage_count(pool: &SqlitePool, code: &str) -> i64 {
    sqlx::query_scalar("SELECT usage_count FROM coupons WHERE code = ?")
        .bind(code)
        .fetch_one(pool)
        .await
        .expect("coupon usage count")
}

pub async fn earnings_row(
    pool: &SqlitePool,
    teacher_id: &str,
    course_id: &str,
    year: i32,
    month: u32,
) -> Option<(i64, i64)> {
    sqlx::query_as(
        "SELECT gross_minor, teacher_share_minor FROM teacher_earnings \
         WHERE teacher_id = ? AND course_id = ? AND year = ? AND month = ?",
    )
    .bind(teacher_id)
    .bind(course_id)
    .bind(year)
    .bind(month as i64)
    .fetch_optional(pool)
    .await
    .expect("earnings row")
}
