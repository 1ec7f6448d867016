//! Business logic services
//!
//! Each service is a cheap-to-clone handle over the shared pool plus the
//! event bus. Handlers in `api` call into these; the services own every
//! invariant and never trust the caller to have validated anything.

pub mod booking_ledger;
pub mod coupon_engine;
pub mod earnings_engine;
pub mod entitlements;
pub mod payment_ledger;
pub mod payout_workflow;
pub mod providers;

pub use booking_ledger::{BookingLedger, NewSlot};
pub use coupon_engine::{CouponEngine, NewCoupon};
pub use earnings_engine::EarningsEngine;
pub use entitlements::{EntitlementService, PolicyUpdate};
pub use payment_ledger::{NewPayment, PaymentLedger};
pub use payout_workflow::{NewPayout, PayoutWorkflow};
pub use providers::{
    ActivitySource, EnrollmentProvider, SqliteActivitySource, SqliteEnrollmentProvider,
    SqliteSubscriptionProvider, SubscriptionProvider,
};
