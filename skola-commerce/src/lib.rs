//! skola-commerce library - commerce and settlement core
//!
//! Payments, lesson bookings, coupons, content entitlements, teacher
//! earnings, and payouts for the Skola platform. Every financial move is
//! a conditional SQL write; handlers stay thin and services own the
//! invariants.

use std::sync::Arc;

use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use skola_common::events::EventBus;

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use error::{ApiResult, CommerceError, Result};

use services::{
    BookingLedger, CouponEngine, EarningsEngine, EntitlementService, PaymentLedger, PayoutWorkflow,
    SqliteActivitySource, SqliteEnrollmentProvider, SqliteSubscriptionProvider,
};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for commerce domain events
    pub event_bus: EventBus,
    pub payments: PaymentLedger,
    pub bookings: BookingLedger,
    pub coupons: CouponEngine,
    pub entitlements: EntitlementService,
    pub earnings: EarningsEngine,
    pub payouts: PayoutWorkflow,
}

impl AppState {
    /// Create application state with all services wired to the pool
    pub fn new(db: SqlitePool, event_bus: EventBus) -> Self {
        let coupons = CouponEngine::new(db.clone());
        let payments = PaymentLedger::new(db.clone(), coupons.clone(), event_bus.clone());
        let bookings = BookingLedger::new(db.clone(), event_bus.clone());
        let entitlements = EntitlementService::new(
            db.clone(),
            Arc::new(SqliteSubscriptionProvider::new(db.clone())),
        );
        let earnings = EarningsEngine::new(
            db.clone(),
            Arc::new(SqliteEnrollmentProvider::new(db.clone())),
            Arc::new(SqliteActivitySource::new(db.clone())),
            event_bus.clone(),
        );
        let payouts = PayoutWorkflow::new(db.clone(), event_bus.clone());

        Self {
            db,
            event_bus,
            payments,
            bookings,
            coupons,
            entitlements,
            earnings,
            payouts,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::payment_routes())
        .merge(api::booking_routes())
        .merge(api::coupon_routes())
        .merge(api::content_routes())
        .merge(api::earnings_routes())
        .merge(api::payout_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
