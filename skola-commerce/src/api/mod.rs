//! HTTP API handlers for skola-commerce

pub mod bookings;
pub mod content;
pub mod coupons;
pub mod earnings;
pub mod health;
pub mod payments;
pub mod payouts;

pub use bookings::booking_routes;
pub use content::content_routes;
pub use coupons::coupon_routes;
pub use earnings::earnings_routes;
pub use health::health_routes;
pub use payments::payment_routes;
pub use payouts::payout_routes;
