//! Payout workflow tests
//!
//! Requests reserve against the available balance (lifetime share minus
//! PENDING and APPROVED payouts); the guards must hold under replays,
//! races, and earnings recomputed downward after a request.

mod helpers;

use skola_commerce::models::PayoutStatus;
use skola_commerce::services::NewPayout;
use skola_commerce::CommerceError;

fn payout(teacher: &str, amount: Option<i64>) -> NewPayout {
    NewPayout {
        teacher_id: teacher.to_string(),
        amount_minor: amount,
        method: "paypal".to_string(),
        details: Some(serde_json::json!({"email": "teacher@example.com"})),
    }
}

#[tokio::test]
async fn test_request_reserves_available_balance() {
    let (state, _dir) = helpers::setup_state().await;
    helpers::seed_earnings(&state.db, "t1", "c1", 2026, 7, 62_500, 50_000).await;

    let first = state.payouts.request_payout(payout("t1", Some(40_000))).await.unwrap();
    assert_eq!(first.status, PayoutStatus::Pending);
    assert_eq!(first.amount_minor, 40_000);

    // 10000 left; a 20000 request must not go through
    let err = state
        .payouts
        .request_payout(payout("t1", Some(20_000)))
        .await
        .unwrap_err();
    assert!(
        matches!(err, CommerceError::InsufficientFunds(_)),
        "got {:?}",
        err
    );

    let second = state.payouts.request_payout(payout("t1", Some(10_000))).await.unwrap();
    assert_eq!(second.amount_minor, 10_000);

    // Fully reserved now
    let err = state
        .payouts
        .request_payout(payout("t1", Some(1)))
        .await
        .unwrap_err();
    assert!(
        matches!(err, CommerceError::InsufficientFunds(_)),
        "got {:?}",
        err
    );
}

#[tokio::test]
async fn test_request_full_balance_when_amount_absent() {
    let (state, _dir) = helpers::setup_state().await;
    helpers::seed_earnings(&state.db, "t1", "c1", 2026, 7, 25_000, 20_000).await;

    let full = state.payouts.request_payout(payout("t1", None)).await.unwrap();
    assert_eq!(full.amount_minor, 20_000);

    // Nothing left to request
    let err = state.payouts.request_payout(payout("t1", None)).await.unwrap_err();
    assert!(matches!(err, CommerceError::Validation(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_request_validation() {
    let (state, _dir) = helpers::setup_state().await;

    let err = state
        .payouts
        .request_payout(payout("t1", Some(0)))
        .await
        .unwrap_err();
    assert!(matches!(err, CommerceError::Validation(_)), "got {:?}", err);

    let mut no_method = payout("t1", Some(1_000));
    no_method.method = "  ".to_string();
    let err = state.payouts.request_payout(no_method).await.unwrap_err();
    assert!(matches!(err, CommerceError::Validation(_)), "got {:?}", err);

    // A teacher with no earnings cannot request anything
    let err = state
        .payouts
        .request_payout(payout("nobody", Some(1_000)))
        .await
        .unwrap_err();
    assert!(
        matches!(err, CommerceError::InsufficientFunds(_)),
        "got {:?}",
        err
    );
}

#[tokio::test]
async fn test_approve_and_reject_flow() {
    let (state, _dir) = helpers::setup_state().await;
    helpers::seed_earnings(&state.db, "t1", "c1", 2026, 7, 62_500, 50_000).await;

    let first = state.payouts.request_payout(payout("t1", Some(40_000))).await.unwrap();
    let second = state.payouts.request_payout(payout("t1", Some(10_000))).await.unwrap();

    let approved = state
        .payouts
        .approve(&first.id, "admin", Some("wire-77".to_string()))
        .await
        .unwrap();
    assert_eq!(approved.status, PayoutStatus::Approved);
    assert_eq!(approved.decided_by.as_deref(), Some("admin"));
    assert_eq!(approved.external_tx_id.as_deref(), Some("wire-77"));
    assert!(approved.decided_at.is_some());

    // Replay keeps the original decision untouched
    let again = state.payouts.approve(&first.id, "admin2", None).await.unwrap();
    assert_eq!(again.status, PayoutStatus::Approved);
    assert_eq!(again.decided_by.as_deref(), Some("admin"));
    assert_eq!(again.external_tx_id.as_deref(), Some("wire-77"));

    let summary = state.earnings.summary("t1").await.unwrap();
    assert_eq!(summary.paid_out_minor, 40_000);
    assert_eq!(summary.pending_minor, 10_000);
    assert_eq!(summary.available_minor, 0);

    // Rejection releases the reservation
    let rejected = state
        .payouts
        .reject(&second.id, "admin", "wrong account details")
        .await
        .unwrap();
    assert_eq!(rejected.status, PayoutStatus::Rejected);
    assert_eq!(rejected.reason.as_deref(), Some("wrong account details"));

    let summary = state.earnings.summary("t1").await.unwrap();
    assert_eq!(summary.available_minor, 10_000);

    // And the released funds can be requested again
    state.payouts.request_payout(payout("t1", Some(10_000))).await.unwrap();
}

#[tokio::test]
async fn test_decided_payouts_stay_decided() {
    let (state, _dir) = helpers::setup_state().await;
    helpers::seed_earnings(&state.db, "t1", "c1", 2026, 7, 25_000, 20_000).await;

    let a = state.payouts.request_payout(payout("t1", Some(5_000))).await.unwrap();
    let b = state.payouts.request_payout(payout("t1", Some(5_000))).await.unwrap();

    state.payouts.reject(&a.id, "admin", "stale").await.unwrap();
    let err = state.payouts.approve(&a.id, "admin", None).await.unwrap_err();
    assert!(matches!(err, CommerceError::Conflict(_)), "got {:?}", err);

    // Rejecting a rejected payout is a replay, not an error
    let again = state.payouts.reject(&a.id, "admin", "stale").await.unwrap();
    assert_eq!(again.status, PayoutStatus::Rejected);

    state.payouts.approve(&b.id, "admin", None).await.unwrap();
    let err = state.payouts.reject(&b.id, "admin", "too late").await.unwrap_err();
    assert!(matches!(err, CommerceError::Conflict(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_approve_blocked_after_earnings_shrank() {
    let (state, _dir) = helpers::setup_state().await;
    helpers::seed_earnings(&state.db, "t1", "c1", 2026, 7, 62_500, 50_000).await;

    let request = state.payouts.request_payout(payout("t1", Some(40_000))).await.unwrap();

    // A recompute lowered the month's share below the requested amount
    sqlx::query("UPDATE teacher_earnings SET teacher_share_minor = 30000 WHERE teacher_id = 't1'")
        .execute(&state.db)
        .await
        .unwrap();

    let err = state.payouts.approve(&request.id, "admin", None).await.unwrap_err();
    assert!(
        matches!(err, CommerceError::InsufficientFunds(_)),
        "got {:?}",
        err
    );

    // The request survives as PENDING for a later decision
    let current = state.payouts.get(&request.id).await.unwrap();
    assert_eq!(current.status, PayoutStatus::Pending);

    // Rejecting it releases the reservation as usual
    state.payouts.reject(&request.id, "admin", "balance shrank").await.unwrap();
    let fits = state.payouts.request_payout(payout("t1", Some(30_000))).await.unwrap();
    state.payouts.approve(&fits.id, "admin", None).await.unwrap();
}

#[tokio::test]
async fn test_concurrent_approvals_of_same_payout() {
    let (state, _dir) = helpers::setup_state().await;
    helpers::seed_earnings(&state.db, "t1", "c1", 2026, 7, 25_000, 20_000).await;

    let request = state.payouts.request_payout(payout("t1", Some(20_000))).await.unwrap();

    let first = {
        let payouts = state.payouts.clone();
        let id = request.id.clone();
        tokio::spawn(async move { payouts.approve(&id, "admin1", None).await })
    };
    let second = {
        let payouts = state.payouts.clone();
        let id = request.id.clone();
        tokio::spawn(async move { payouts.approve(&id, "admin2", None).await })
    };

    // One wins the flip, the other replays; both observe APPROVED
    let a = first.await.unwrap().unwrap();
    let b = second.await.unwrap().unwrap();
    assert_eq!(a.status, PayoutStatus::Approved);
    assert_eq!(b.status, PayoutStatus::Approved);

    let summary = state.earnings.summary("t1").await.unwrap();
    assert_eq!(summary.paid_out_minor, 20_000);
}

#[tokio::test]
async fn test_pending_queue_and_lookup() {
    let (state, _dir) = helpers::setup_state().await;
    helpers::seed_earnings(&state.db, "t1", "c1", 2026, 7, 62_500, 50_000).await;
    helpers::seed_earnings(&state.db, "t2", "c2", 2026, 7, 12_500, 10_000).await;

    let first = state.payouts.request_payout(payout("t1", Some(1_000))).await.unwrap();
    let second = state.payouts.request_payout(payout("t2", Some(2_000))).await.unwrap();

    // Oldest first across all teachers
    let queue = state.payouts.list_pending().await.unwrap();
    assert_eq!(queue.len(), 2);
    assert_eq!(queue[0].id, first.id);
    assert_eq!(queue[1].id, second.id);

    state.payouts.approve(&first.id, "admin", None).await.unwrap();
    let queue = state.payouts.list_pending().await.unwrap();
    assert_eq!(queue.len(), 1);

    let err = state.payouts.get("missing").await.unwrap_err();
    assert!(matches!(err, CommerceError::NotFound(_)), "got {:?}", err);

    let err = state.payouts.approve("missing", "admin", None).await.unwrap_err();
    assert!(matches!(err, CommerceError::NotFound(_)), "got {:?}", err);

    // Stored details round-trip as JSON
    let fetched = state.payouts.get(&second.id).await.unwrap();
    assert_eq!(
        fetched.details,
        Some(serde_json::json!({"email": "teacher@example.com"}))
    );
}
