//! Earnings policy and settlement records
//!
//! The policy is loaded from the settings table at use time so operators
//! can retune rates without a restart. Tier fractions and the teacher
//! share are basis points; see `skola_common::money`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use skola_common::money::apply_bps;

/// One activity tier: students with at least `min_days` active days in the
/// month earn `fraction_bps` of the per-student rate for their teacher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityTier {
    pub min_days: i64,
    pub fraction_bps: i64,
}

/// Settlement parameters, stored in the settings table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarningsPolicy {
    /// Full monthly rate per qualifying student, minor units
    pub per_student_rate_minor: i64,
    /// Sorted descending by `min_days`; first tier the student meets wins
    pub tiers: Vec<ActivityTier>,
    /// Teacher's share of gross, basis points
    pub teacher_share_bps: i64,
}

impl EarningsPolicy {
    /// Fraction of the per-student rate earned for `days` active days.
    /// Below every tier earns nothing.
    pub fn fraction_for(&self, days: i64) -> i64 {
        self.tiers
            .iter()
            .find(|tier| days >= tier.min_days)
            .map(|tier| tier.fraction_bps)
            .unwrap_or(0)
    }

    /// Activity income for one student, minor units (floor)
    pub fn student_income(&self, days: i64) -> i64 {
        apply_bps(self.per_student_rate_minor, self.fraction_for(days))
    }
}

/// One student's distinct active days within a month window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentActivity {
    pub student_id: String,
    pub days: i64,
}

/// Stored earnings for one teacher/course/month
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarningsRecord {
    pub teacher_id: String,
    pub course_id: String,
    pub year: i32,
    pub month: u32,
    pub gross_minor: i64,
    pub teacher_share_minor: i64,
    pub computed_at: DateTime<Utc>,
}

/// Lifetime balance view for one teacher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarningsSummary {
    pub teacher_id: String,
    /// Sum of teacher_share_minor over all earnings rows
    pub lifetime_minor: i64,
    /// Sum of APPROVED payout amounts
    pub paid_out_minor: i64,
    /// Sum of PENDING payout amounts (reserved)
    pub pending_minor: i64,
    /// lifetime - paid_out - pending
    pub available_minor: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_policy() -> EarningsPolicy {
        EarningsPolicy {
            per_student_rate_minor: 1500,
            tiers: vec![
                ActivityTier {
                    min_days: 15,
                    fraction_bps: 10_000,
                },
                ActivityTier {
                    min_days: 5,
                    fraction_bps: 5_000,
                },
            ],
            teacher_share_bps: 8_000,
        }
    }

    #[test]
    fn highest_matching_tier_wins() {
        let policy = default_policy();
        assert_eq!(policy.fraction_for(20), 10_000);
        assert_eq!(policy.fraction_for(15), 10_000);
        assert_eq!(policy.fraction_for(14), 5_000);
        assert_eq!(policy.fraction_for(5), 5_000);
        assert_eq!(policy.fraction_for(4), 0);
        assert_eq!(policy.fraction_for(0), 0);
    }

    #[test]
    fn student_income_floors() {
        let policy = default_policy();
        assert_eq!(policy.student_income(15), 1500);
        assert_eq!(policy.student_income(5), 750);
        assert_eq!(policy.student_income(1), 0);

        // Odd rate: half of 1501 floors to 750
        let odd = EarningsPolicy {
            per_student_rate_minor: 1501,
            ..policy
        };
        assert_eq!(odd.student_income(5), 750);
    }

    #[test]
    fn empty_tiers_earn_nothing() {
        let policy = EarningsPolicy {
            per_student_rate_minor: 1500,
            tiers: vec![],
            teacher_share_bps: 8_000,
        };
        assert_eq!(policy.fraction_for(30), 0);
        assert_eq!(policy.student_income(30), 0);
    }
}
