//! Domain models for skola-commerce

pub mod booking;
pub mod coupon;
pub mod earnings;
pub mod payment;
pub mod payout;
pub mod policy;

pub use booking::{Booking, BookingStatus, LessonSlot};
pub use coupon::{Coupon, CouponQuote, CouponScope, CouponType, PurchaseContext};
pub use earnings::{ActivityTier, EarningsPolicy, EarningsRecord, EarningsSummary, StudentActivity};
pub use payment::{Payment, PaymentStatus, PaymentTargetKind};
pub use payout::{PayoutRequest, PayoutStatus};
pub use policy::{AccessDecision, AccessRequirements, ContentPolicy, ContentType, MonetizationType};
