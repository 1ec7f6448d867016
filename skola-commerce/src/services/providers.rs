//! Collaborator seams
//!
//! Subscriptions, enrollments, and learning activity belong to other parts
//! of the platform. This service reads them through object-safe traits so
//! the engines stay testable with fakes and the deployment can point the
//! production impls at whatever store the platform runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::db::parse_timestamp;
use crate::error::Result;
use crate::models::StudentActivity;

/// Answers whether a user currently holds a subscription
#[async_trait]
pub trait SubscriptionProvider: Send + Sync {
    /// Active subscription check; `tier` narrows to one plan when given
    async fn has_active(&self, user_id: &str, tier: Option<&str>) -> Result<bool>;
}

/// Answers whether a student is enrolled in a course
#[async_trait]
pub trait EnrollmentProvider: Send + Sync {
    async fn is_enrolled(&self, student_id: &str, course_id: &str) -> Result<bool>;
}

/// Supplies learning-activity counts for settlement
#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// Distinct active days per student for `course_id` within `[start, end)`
    async fn active_days(
        &self,
        course_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<StudentActivity>>;
}

/// Reads the platform's subscriptions table
#[derive(Clone)]
pub struct SqliteSubscriptionProvider {
    pool: SqlitePool,
}

impl SqliteSubscriptionProvider {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionProvider for SqliteSubscriptionProvider {
    async fn has_active(&self, user_id: &str, tier: Option<&str>) -> Result<bool> {
        let row: Option<(String, Option<String>)> = sqlx::query_as(
            "SELECT tier, expires_at FROM subscriptions WHERE user_id = ? AND status = 'active'",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((sub_tier, expires_at)) = row else {
            return Ok(false);
        };

        // Expired rows may not have been reaped by the owning service yet
        if let Some(expiry) = expires_at {
            let expiry = parse_timestamp("expires_at", &expiry)?;
            if expiry <= Utc::now() {
                return Ok(false);
            }
        }

        match tier {
            Some(required) => Ok(sub_tier == required),
            None => Ok(true),
        }
    }
}

/// Reads the platform's enrollments table
#[derive(Clone)]
pub struct SqliteEnrollmentProvider {
    pool: SqlitePool,
}

impl SqliteEnrollmentProvider {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EnrollmentProvider for SqliteEnrollmentProvider {
    async fn is_enrolled(&self, student_id: &str, course_id: &str) -> Result<bool> {
        let enrolled: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM enrollments WHERE student_id = ? AND course_id = ?)",
        )
        .bind(student_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(enrolled)
    }
}

/// Reads the platform's course_activity table
#[derive(Clone)]
pub struct SqliteActivitySource {
    pool: SqlitePool,
}

impl SqliteActivitySource {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivitySource for SqliteActivitySource {
    async fn active_days(
        &self,
        course_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<StudentActivity>> {
        // activity_date is YYYY-MM-DD, so the window compares as text
        let start_day = start.format("%Y-%m-%d").to_string();
        let end_day = end.format("%Y-%m-%d").to_string();

        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT student_id, COUNT(DISTINCT activity_date) AS days
            FROM course_activity
            WHERE course_id = ? AND activity_date >= ? AND activity_date < ?
            GROUP BY student_id
            "#,
        )
        .bind(course_id)
        .bind(start_day)
        .bind(end_day)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(student_id, days)| StudentActivity { student_id, days })
            .collect())
    }
}
