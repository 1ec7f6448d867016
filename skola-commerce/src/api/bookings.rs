//! Lesson slot and booking endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::models::{Booking, LessonSlot};
use crate::services::NewSlot;
use crate::AppState;

/// Create slot request body
#[derive(Debug, Deserialize)]
pub struct CreateSlotRequest {
    pub teacher_id: String,
    pub course_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub price_minor: i64,
}

/// Query parameters for listing a teacher's slots
#[derive(Debug, Default, Deserialize)]
pub struct SlotListQuery {
    /// When true, only slots that can still be booked
    #[serde(default)]
    pub open: bool,
}

/// Book slot request body
#[derive(Debug, Deserialize)]
pub struct BookSlotRequest {
    pub student_id: String,
    pub note: Option<String>,
}

/// Cancel booking request body
#[derive(Debug, Deserialize)]
pub struct CancelBookingRequest {
    /// Must be the booking's student or the slot's teacher
    pub actor_id: String,
}

/// POST /slots
pub async fn create_slot(
    State(state): State<AppState>,
    Json(req): Json<CreateSlotRequest>,
) -> ApiResult<(StatusCode, Json<LessonSlot>)> {
    let slot = state
        .bookings
        .create_slot(NewSlot {
            teacher_id: req.teacher_id,
            course_id: req.course_id,
            start_time: req.start_time,
            end_time: req.end_time,
            price_minor: req.price_minor,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(slot)))
}

/// GET /teachers/:id/slots?open=true
pub async fn list_teacher_slots(
    State(state): State<AppState>,
    Path(teacher_id): Path<String>,
    Query(query): Query<SlotListQuery>,
) -> ApiResult<Json<Vec<LessonSlot>>> {
    Ok(Json(state.bookings.list_slots(&teacher_id, query.open).await?))
}

/// POST /slots/:id/book
///
/// At most one active booking per slot; a lost race returns CONFLICT.
pub async fn book_slot(
    State(state): State<AppState>,
    Path(slot_id): Path<String>,
    Json(req): Json<BookSlotRequest>,
) -> ApiResult<(StatusCode, Json<Booking>)> {
    let booking = state
        .bookings
        .book_slot(&slot_id, &req.student_id, req.note)
        .await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// GET /bookings/:id
pub async fn get_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<String>,
) -> ApiResult<Json<Booking>> {
    Ok(Json(state.bookings.get_booking(&booking_id).await?))
}

/// POST /bookings/:id/cancel
///
/// Cancels the booking and reopens its slot.
pub async fn cancel_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<String>,
    Json(req): Json<CancelBookingRequest>,
) -> ApiResult<Json<Booking>> {
    Ok(Json(
        state.bookings.cancel_booking(&booking_id, &req.actor_id).await?,
    ))
}

/// Build booking routes
pub fn booking_routes() -> Router<AppState> {
    Router::new()
        .route("/slots", post(create_slot))
        .route("/slots/:id/book", post(book_slot))
        .route("/teachers/:id/slots", get(list_teacher_slots))
        .route("/bookings/:id", get(get_booking))
        .route("/bookings/:id/cancel", post(cancel_booking))
}
