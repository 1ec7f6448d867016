//! Earnings engine
//!
//! Monthly settlement. `calculate_monthly` recomputes a teacher's earnings
//! for one course and month from ground truth (enrolled-student activity
//! plus attributed payments) and replaces the stored row, superseding any
//! confirmation-time deltas for that month. Same inputs, same record.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::info;

use skola_common::events::{CommerceEvent, EventBus};
use skola_common::money::apply_bps;

use crate::db;
use crate::error::{CommerceError, Result};
use crate::models::{EarningsRecord, EarningsSummary};
use crate::services::providers::{ActivitySource, EnrollmentProvider};

#[derive(Clone)]
pub struct EarningsEngine {
    db: SqlitePool,
    enrollments: Arc<dyn EnrollmentProvider>,
    activity: Arc<dyn ActivitySource>,
    events: EventBus,
}

impl EarningsEngine {
    pub fn new(
        db: SqlitePool,
        enrollments: Arc<dyn EnrollmentProvider>,
        activity: Arc<dyn ActivitySource>,
        events: EventBus,
    ) -> Self {
        Self {
            db,
            enrollments,
            activity,
            events,
        }
    }

    /// Half-open UTC window `[first of month, first of next month)`
    fn month_window(year: i32, month: u32) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        if !(1..=12).contains(&month) {
            return Err(CommerceError::Validation(format!(
                "Month must be 1-12, got {}",
                month
            )));
        }

        let window_edge = |y: i32, m: u32| {
            NaiveDate::from_ymd_opt(y, m, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
                .ok_or_else(|| CommerceError::Validation(format!("Invalid year: {}", y)))
        };

        let start = window_edge(year, month)?;
        let (next_year, next_month) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };
        let end = window_edge(next_year, next_month)?;

        Ok((start, end))
    }

    /// Recompute one teacher/course/month from ground truth.
    ///
    /// Activity income counts enrolled students only, each at the highest
    /// tier their active days reach. Payment income floors the share per
    /// payment, matching the confirmation-time deltas exactly, so a
    /// recompute over the same payments lands on the same totals.
    pub async fn calculate_monthly(
        &self,
        teacher_id: &str,
        course_id: &str,
        year: i32,
        month: u32,
    ) -> Result<EarningsRecord> {
        let (start, end) = Self::month_window(year, month)?;

        let owner = db::catalog::course_teacher(&self.db, course_id)
            .await?
            .ok_or_else(|| CommerceError::NotFound(format!("Course not found: {}", course_id)))?;
        if owner != teacher_id {
            return Err(CommerceError::Authorization(
                "Course does not belong to this teacher".to_string(),
            ));
        }

        let policy = db::settings::load_earnings_policy(&self.db).await?;

        let mut activity_gross = 0i64;
        for student in self.activity.active_days(course_id, start, end).await? {
            if !self
                .enrollments
                .is_enrolled(&student.student_id, course_id)
                .await?
            {
                // Active but never enrolled: contributes nothing
                continue;
            }
            activity_gross += policy.student_income(student.days);
        }

        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let amounts =
            db::earnings::attributed_payment_amounts(&mut tx, course_id, start, end).await?;
        let payment_gross: i64 = amounts.iter().sum();
        let payment_share: i64 = amounts
            .iter()
            .map(|&amount| apply_bps(amount, policy.teacher_share_bps))
            .sum();

        let record = EarningsRecord {
            teacher_id: teacher_id.to_string(),
            course_id: course_id.to_string(),
            year,
            month,
            gross_minor: activity_gross + payment_gross,
            teacher_share_minor: apply_bps(activity_gross, policy.teacher_share_bps)
                + payment_share,
            computed_at: now,
        };
        db::earnings::replace_record(&mut tx, &record).await?;

        tx.commit().await?;

        info!(
            teacher_id = %teacher_id,
            course_id = %course_id,
            year,
            month,
            gross_minor = record.gross_minor,
            teacher_share_minor = record.teacher_share_minor,
            "monthly earnings recomputed"
        );
        self.events.emit_lossy(CommerceEvent::EarningsComputed {
            teacher_id: record.teacher_id.clone(),
            course_id: record.course_id.clone(),
            year,
            month,
            gross_minor: record.gross_minor,
            teacher_share_minor: record.teacher_share_minor,
            timestamp: now,
        });

        Ok(record)
    }

    /// Recompute every course of the teacher for the month
    pub async fn calculate_all_courses(
        &self,
        teacher_id: &str,
        year: i32,
        month: u32,
    ) -> Result<Vec<EarningsRecord>> {
        Self::month_window(year, month)?;

        let courses = db::catalog::teacher_courses(&self.db, teacher_id).await?;
        let mut records = Vec::with_capacity(courses.len());
        for course_id in courses {
            records.push(
                self.calculate_monthly(teacher_id, &course_id, year, month)
                    .await?,
            );
        }

        Ok(records)
    }

    /// Lifetime balance view: earned, paid out, reserved, available
    pub async fn summary(&self, teacher_id: &str) -> Result<EarningsSummary> {
        let lifetime = db::earnings::lifetime_share(&self.db, teacher_id).await?;
        let (paid_out, pending) = db::payouts::paid_and_pending(&self.db, teacher_id).await?;

        Ok(EarningsSummary {
            teacher_id: teacher_id.to_string(),
            lifetime_minor: lifetime,
            paid_out_minor: paid_out,
            pending_minor: pending,
            available_minor: lifetime - paid_out - pending,
        })
    }

    /// Statement listing, newest month first
    pub async fn monthly_records(
        &self,
        teacher_id: &str,
        year: Option<i32>,
    ) -> Result<Vec<EarningsRecord>> {
        db::earnings::list_records(&self.db, teacher_id, year).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_window_spans_the_month() {
        let (start, end) = EarningsEngine::month_window(2025, 3).unwrap();
        assert_eq!(start.to_rfc3339(), "2025-03-01T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2025-04-01T00:00:00+00:00");
    }

    #[test]
    fn december_rolls_into_next_year() {
        let (start, end) = EarningsEngine::month_window(2024, 12).unwrap();
        assert_eq!(start.to_rfc3339(), "2024-12-01T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }

    #[test]
    fn month_out_of_range_rejected() {
        assert!(matches!(
            EarningsEngine::month_window(2025, 0),
            Err(CommerceError::Validation(_))
        ));
        assert!(matches!(
            EarningsEngine::month_window(2025, 13),
            Err(CommerceError::Validation(_))
        ));
    }
}
