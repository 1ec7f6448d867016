//! Lesson slot and booking tests
//!
//! The double-booking test drives two real concurrent transactions at
//! one slot; the conditional claim must let exactly one through.

mod helpers;

use chrono::{Duration, Utc};

use skola_commerce::models::BookingStatus;
use skola_commerce::services::NewSlot;
use skola_commerce::CommerceError;

fn slot_for(teacher: &str, course: &str) -> NewSlot {
    let start = Utc::now() + Duration::days(1);
    NewSlot {
        teacher_id: teacher.to_string(),
        course_id: course.to_string(),
        start_time: start,
        end_time: start + Duration::hours(1),
        price_minor: 5_000,
    }
}

#[tokio::test]
async fn test_create_slot_validation() {
    let (state, _dir) = helpers::setup_state().await;
    helpers::seed_course(&state.db, "c1", "t1").await;

    let mut inverted = slot_for("t1", "c1");
    inverted.end_time = inverted.start_time - Duration::hours(1);
    let err = state.bookings.create_slot(inverted).await.unwrap_err();
    assert!(matches!(err, CommerceError::Validation(_)), "got {:?}", err);

    let mut negative = slot_for("t1", "c1");
    negative.price_minor = -1;
    let err = state.bookings.create_slot(negative).await.unwrap_err();
    assert!(matches!(err, CommerceError::Validation(_)), "got {:?}", err);

    let err = state
        .bookings
        .create_slot(slot_for("t1", "missing"))
        .await
        .unwrap_err();
    assert!(matches!(err, CommerceError::NotFound(_)), "got {:?}", err);

    // The slot's teacher must own the course
    let err = state
        .bookings
        .create_slot(slot_for("t2", "c1"))
        .await
        .unwrap_err();
    assert!(matches!(err, CommerceError::Authorization(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_booking_lifecycle() {
    let (state, _dir) = helpers::setup_state().await;
    helpers::seed_course(&state.db, "c1", "t1").await;

    let slot = state.bookings.create_slot(slot_for("t1", "c1")).await.unwrap();
    assert!(slot.is_available);
    assert!(!slot.is_booked);

    let booking = state
        .bookings
        .book_slot(&slot.id, "s1", Some("first lesson".to_string()))
        .await
        .unwrap();
    assert_eq!(booking.status, BookingStatus::Active);
    assert_eq!(booking.teacher_id, "t1");
    assert_eq!(booking.note.as_deref(), Some("first lesson"));

    // A booked slot leaves the open listing
    let open = state.bookings.list_slots("t1", true).await.unwrap();
    assert!(open.is_empty());
    let all = state.bookings.list_slots("t1", false).await.unwrap();
    assert_eq!(all.len(), 1);
    assert!(all[0].is_booked);

    let cancelled = state
        .bookings
        .cancel_booking(&booking.id, "s1")
        .await
        .unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert!(cancelled.cancelled_at.is_some());

    // Cancellation reopens the slot
    let open = state.bookings.list_slots("t1", true).await.unwrap();
    assert_eq!(open.len(), 1);
    assert!(!open[0].is_booked);
}

#[tokio::test]
async fn test_double_booking_exactly_one_wins() {
    let (state, _dir) = helpers::setup_state().await;
    helpers::seed_course(&state.db, "c1", "t1").await;
    let slot = state.bookings.create_slot(slot_for("t1", "c1")).await.unwrap();

    let first = {
        let ledger = state.bookings.clone();
        let slot_id = slot.id.clone();
        tokio::spawn(async move { ledger.book_slot(&slot_id, "s1", None).await })
    };
    let second = {
        let ledger = state.bookings.clone();
        let slot_id = slot.id.clone();
        tokio::spawn(async move { ledger.book_slot(&slot_id, "s2", None).await })
    };

    let results = [first.await.unwrap(), second.await.unwrap()];
    let wins = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1, "exactly one booking must win: {:?}", results);

    let loss = results
        .iter()
        .find(|r| r.is_err())
        .and_then(|r| r.as_ref().err())
        .expect("one booking must lose");
    assert!(matches!(loss, CommerceError::Conflict(_)), "got {:?}", loss);

    // Exactly one active booking row exists for the slot
    let active: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM bookings WHERE slot_id = ? AND status = 'active'",
    )
    .bind(&slot.id)
    .fetch_one(&state.db)
    .await
    .unwrap();
    assert_eq!(active, 1);
}

#[tokio::test]
async fn test_book_unknown_or_taken_slot() {
    let (state, _dir) = helpers::setup_state().await;
    helpers::seed_course(&state.db, "c1", "t1").await;
    let slot = state.bookings.create_slot(slot_for("t1", "c1")).await.unwrap();

    let err = state
        .bookings
        .book_slot("missing", "s1", None)
        .await
        .unwrap_err();
    assert!(matches!(err, CommerceError::NotFound(_)), "got {:?}", err);

    let err = state.bookings.book_slot(&slot.id, "", None).await.unwrap_err();
    assert!(matches!(err, CommerceError::Validation(_)), "got {:?}", err);

    state.bookings.book_slot(&slot.id, "s1", None).await.unwrap();
    let err = state
        .bookings
        .book_slot(&slot.id, "s2", None)
        .await
        .unwrap_err();
    assert!(matches!(err, CommerceError::Conflict(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_cancel_booking_authorization() {
    let (state, _dir) = helpers::setup_state().await;
    helpers::seed_course(&state.db, "c1", "t1").await;
    let slot = state.bookings.create_slot(slot_for("t1", "c1")).await.unwrap();
    let booking = state.bookings.book_slot(&slot.id, "s1", None).await.unwrap();

    // Neither a stranger nor another student may cancel
    let err = state
        .bookings
        .cancel_booking(&booking.id, "s2")
        .await
        .unwrap_err();
    assert!(matches!(err, CommerceError::Authorization(_)), "got {:?}", err);

    // The slot's teacher may
    let cancelled = state
        .bookings
        .cancel_booking(&booking.id, "t1")
        .await
        .unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);

    // Cancelling again is a no-op replay
    let again = state
        .bookings
        .cancel_booking(&booking.id, "s1")
        .await
        .unwrap();
    assert_eq!(again.status, BookingStatus::Cancelled);
    assert_eq!(again.cancelled_at, cancelled.cancelled_at);
}

#[tokio::test]
async fn test_rebook_after_cancel() {
    let (state, _dir) = helpers::setup_state().await;
    helpers::seed_course(&state.db, "c1", "t1").await;
    let slot = state.bookings.create_slot(slot_for("t1", "c1")).await.unwrap();

    let first = state.bookings.book_slot(&slot.id, "s1", None).await.unwrap();
    state.bookings.cancel_booking(&first.id, "s1").await.unwrap();

    // The unique active-booking constraint only counts live bookings
    let second = state.bookings.book_slot(&slot.id, "s2", None).await.unwrap();
    assert_eq!(second.student_id, "s2");
    assert_eq!(second.status, BookingStatus::Active);
}
