//! Catalog reads: target resolution and course lookups
//!
//! The catalog tables are owned by the wider platform; this service only
//! reads them to attribute payments to a teacher and course and to
//! validate administration requests.

use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::error::Result;
use crate::models::PaymentTargetKind;

/// Where a payment target's money goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetAttribution {
    pub teacher_id: String,
    pub course_id: String,
}

/// Resolve a payment target to `(teacher_id, course_id)`.
///
/// Takes a connection so confirmation can resolve inside its transaction;
/// pool callers acquire first. `None` means the target does not exist (or
/// its catalog chain was deleted).
pub async fn resolve_target(
    conn: &mut SqliteConnection,
    kind: PaymentTargetKind,
    target_id: &str,
) -> Result<Option<TargetAttribution>> {
    let sql = match kind {
        PaymentTargetKind::Module => {
            r#"
            SELECT c.teacher_id, c.id AS course_id
            FROM course_modules m
            JOIN courses c ON c.id = m.course_id
            WHERE m.id = ?
            "#
        }
        PaymentTargetKind::Lesson => {
            r#"
            SELECT c.teacher_id, c.id AS course_id
            FROM lessons l
            JOIN course_modules m ON m.id = l.module_id
            JOIN courses c ON c.id = m.course_id
            WHERE l.id = ?
            "#
        }
        PaymentTargetKind::Bundle => {
            r#"
            SELECT c.teacher_id, c.id AS course_id
            FROM bundles b
            JOIN courses c ON c.id = b.course_id
            WHERE b.id = ?
            "#
        }
        PaymentTargetKind::Booking => {
            r#"
            SELECT s.teacher_id, s.course_id
            FROM bookings bk
            JOIN lesson_slots s ON s.id = bk.slot_id
            WHERE bk.id = ?
            "#
        }
    };

    let row = sqlx::query(sql)
        .bind(target_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(|r| TargetAttribution {
        teacher_id: r.get("teacher_id"),
        course_id: r.get("course_id"),
    }))
}

/// Teacher owning the course, if the course exists
pub async fn course_teacher(pool: &SqlitePool, course_id: &str) -> Result<Option<String>> {
    let teacher: Option<String> =
        sqlx::query_scalar("SELECT teacher_id FROM courses WHERE id = ?")
            .bind(course_id)
            .fetch_optional(pool)
            .await?;

    Ok(teacher)
}

/// All course ids taught by the teacher
pub async fn teacher_courses(pool: &SqlitePool, teacher_id: &str) -> Result<Vec<String>> {
    let courses: Vec<String> =
        sqlx::query_scalar("SELECT id FROM courses WHERE teacher_id = ? ORDER BY created_at")
            .bind(teacher_id)
            .fetch_all(pool)
            .await?;

    Ok(courses)
}
