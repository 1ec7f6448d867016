//! Earnings engine tests
//!
//! Monthly recomputation from activity and payment ground truth. The
//! tier numbers follow the seeded defaults: 1500 minor units per
//! student, full rate at 15 active days, half rate at 5, 80% teacher
//! share.

mod helpers;

use chrono::{Datelike, Utc};

use skola_commerce::models::{PaymentTargetKind, PayoutStatus};
use skola_commerce::services::NewPayment;
use skola_commerce::CommerceError;

/// Day strings inside July 2026
fn july_days(count: usize) -> Vec<String> {
    (1..=count).map(|d| format!("2026-07-{:02}", d)).collect()
}

#[tokio::test]
async fn test_activity_tiers() {
    let (state, _dir) = helpers::setup_state().await;
    helpers::seed_course(&state.db, "c1", "t1").await;

    // 4 students at the full tier, 3 at the half tier, 3 below any tier
    for i in 0..10 {
        let student = format!("s{}", i);
        helpers::seed_enrollment(&state.db, &student, "c1").await;
        let days = match i {
            0..=3 => 15,
            4..=6 => 5,
            _ => 2,
        };
        let dates = july_days(days);
        let dates: Vec<&str> = dates.iter().map(String::as_str).collect();
        helpers::seed_activity(&state.db, &student, "c1", &dates).await;
    }

    let record = state
        .earnings
        .calculate_monthly("t1", "c1", 2026, 7)
        .await
        .unwrap();

    // 4 * 1500 + 3 * 750 = 8250 gross; floor(8250 * 0.8) = 6600
    assert_eq!(record.gross_minor, 8_250);
    assert_eq!(record.teacher_share_minor, 6_600);

    // Recomputing replaces the stored record instead of accumulating
    let again = state
        .earnings
        .calculate_monthly("t1", "c1", 2026, 7)
        .await
        .unwrap();
    assert_eq!(again.gross_minor, 8_250);
    assert_eq!(again.teacher_share_minor, 6_600);
    let (gross, share) = helpers::earnings_row(&state.db, "t1", "c1", 2026, 7)
        .await
        .expect("earnings row");
    assert_eq!((gross, share), (8_250, 6_600));
}

#[tokio::test]
async fn test_unenrolled_activity_ignored() {
    let (state, _dir) = helpers::setup_state().await;
    helpers::seed_course(&state.db, "c1", "t1").await;

    // Plenty of activity, but the student never enrolled
    let dates = july_days(20);
    let dates: Vec<&str> = dates.iter().map(String::as_str).collect();
    helpers::seed_activity(&state.db, "ghost", "c1", &dates).await;

    let record = state
        .earnings
        .calculate_monthly("t1", "c1", 2026, 7)
        .await
        .unwrap();
    assert_eq!(record.gross_minor, 0);
    assert_eq!(record.teacher_share_minor, 0);
}

#[tokio::test]
async fn test_payments_attributed_to_course() {
    let (state, _dir) = helpers::setup_state().await;
    helpers::seed_course(&state.db, "c1", "t1").await;
    helpers::seed_module(&state.db, "m1", "c1").await;
    helpers::seed_bundle(&state.db, "b1", "c1").await;

    // Two completed purchases land inside the current month's window
    for (payer, kind, target, amount) in [
        ("s1", PaymentTargetKind::Module, "m1", 10_000),
        ("s2", PaymentTargetKind::Bundle, "b1", 25_000),
    ] {
        let payment = state
            .payments
            .create(NewPayment {
                payer_id: payer.to_string(),
                target_type: kind,
                target_id: target.to_string(),
                amount_minor: amount,
                currency: "USD".to_string(),
                provider: "stripe".to_string(),
                coupon_code: None,
            })
            .await
            .unwrap();
        state.payments.confirm(&payment.id, None).await.unwrap();
    }

    let now = Utc::now();
    let record = state
        .earnings
        .calculate_monthly("t1", "c1", now.year(), now.month())
        .await
        .unwrap();

    // Recompute agrees with the confirmation-time deltas
    assert_eq!(record.gross_minor, 35_000);
    assert_eq!(record.teacher_share_minor, 28_000);
    let (gross, share) = helpers::earnings_row(&state.db, "t1", "c1", now.year(), now.month())
        .await
        .expect("earnings row");
    assert_eq!((gross, share), (35_000, 28_000));
}

#[tokio::test]
async fn test_window_and_ownership_validation() {
    let (state, _dir) = helpers::setup_state().await;
    helpers::seed_course(&state.db, "c1", "t1").await;

    let err = state
        .earnings
        .calculate_monthly("t1", "c1", 2026, 13)
        .await
        .unwrap_err();
    assert!(matches!(err, CommerceError::Validation(_)), "got {:?}", err);

    let err = state
        .earnings
        .calculate_monthly("t1", "missing", 2026, 7)
        .await
        .unwrap_err();
    assert!(matches!(err, CommerceError::NotFound(_)), "got {:?}", err);

    let err = state
        .earnings
        .calculate_monthly("t2", "c1", 2026, 7)
        .await
        .unwrap_err();
    assert!(matches!(err, CommerceError::Authorization(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_calculate_all_courses() {
    let (state, _dir) = helpers::setup_state().await;
    helpers::seed_course(&state.db, "c1", "t1").await;
    helpers::seed_course(&state.db, "c2", "t1").await;
    helpers::seed_course(&state.db, "other", "t2").await;

    helpers::seed_enrollment(&state.db, "s1", "c1").await;
    let dates = july_days(15);
    let dates: Vec<&str> = dates.iter().map(String::as_str).collect();
    helpers::seed_activity(&state.db, "s1", "c1", &dates).await;

    let records = state
        .earnings
        .calculate_all_courses("t1", 2026, 7)
        .await
        .unwrap();
    assert_eq!(records.len(), 2);

    let c1 = records.iter().find(|r| r.course_id == "c1").unwrap();
    assert_eq!(c1.gross_minor, 1_500);
    let c2 = records.iter().find(|r| r.course_id == "c2").unwrap();
    assert_eq!(c2.gross_minor, 0);
}

#[tokio::test]
async fn test_monthly_records_ordering_and_year_filter() {
    let (state, _dir) = helpers::setup_state().await;
    helpers::seed_earnings(&state.db, "t1", "c1", 2025, 11, 1_000, 800).await;
    helpers::seed_earnings(&state.db, "t1", "c1", 2026, 1, 2_000, 1_600).await;
    helpers::seed_earnings(&state.db, "t1", "c1", 2026, 3, 3_000, 2_400).await;

    let all = state.earnings.monthly_records("t1", None).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!((all[0].year, all[0].month), (2026, 3));
    assert_eq!((all[1].year, all[1].month), (2026, 1));
    assert_eq!((all[2].year, all[2].month), (2025, 11));

    let recent = state.earnings.monthly_records("t1", Some(2026)).await.unwrap();
    assert_eq!(recent.len(), 2);
}

#[tokio::test]
async fn test_summary_without_payouts() {
    let (state, _dir) = helpers::setup_state().await;
    helpers::seed_earnings(&state.db, "t1", "c1", 2026, 6, 30_000, 24_000).await;
    helpers::seed_earnings(&state.db, "t1", "c1", 2026, 7, 20_000, 16_000).await;

    let summary = state.earnings.summary("t1").await.unwrap();
    assert_eq!(summary.lifetime_minor, 40_000);
    assert_eq!(summary.paid_out_minor, 0);
    assert_eq!(summary.pending_minor, 0);
    assert_eq!(summary.available_minor, 40_000);

    // Reservations move the available balance
    state
        .payouts
        .request_payout(skola_commerce::services::NewPayout {
            teacher_id: "t1".to_string(),
            amount_minor: Some(15_000),
            method: "paypal".to_string(),
            details: None,
        })
        .await
        .unwrap();
    let summary = state.earnings.summary("t1").await.unwrap();
    assert_eq!(summary.pending_minor, 15_000);
    assert_eq!(summary.available_minor, 25_000);

    let pending = state
        .payouts
        .list_for_teacher("t1", Some(PayoutStatus::Pending))
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
}
