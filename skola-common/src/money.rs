//! Integer money arithmetic
//!
//! All monetary amounts in Skola are `i64` minor units (cents for USD).
//! Ratios are expressed in basis points: 10_000 bps = 100%. Derived amounts
//! always round down, so a split can never exceed the amount it was derived
//! from. Intermediate products use `i128` so large amounts cannot overflow.

/// Basis points representing 100%
pub const BPS_SCALE: i64 = 10_000;

/// Apply a basis-point ratio to an amount, rounding down.
///
/// `apply_bps(10_000, 8_000)` = 8_000 (80% of 100.00).
pub fn apply_bps(amount_minor: i64, bps: i64) -> i64 {
    ((amount_minor as i128 * bps as i128) / BPS_SCALE as i128) as i64
}

/// Whole-percent share of an amount, rounding down.
///
/// Used for percentage coupons where the stored value is a percent (0-100).
pub fn percentage_of(amount_minor: i64, percent: i64) -> i64 {
    ((amount_minor as i128 * percent as i128) / 100) as i64
}

/// Clamp a derived discount into `[0, base]`.
///
/// A discount can never be negative and can never exceed the amount it
/// discounts.
pub fn clamp_discount(discount_minor: i64, base_minor: i64) -> i64 {
    discount_minor.clamp(0, base_minor.max(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_bps_floors() {
        // 80% of 99 cents = 79.2 -> 79
        assert_eq!(apply_bps(99, 8_000), 79);
        // 50% of odd amount floors
        assert_eq!(apply_bps(101, 5_000), 50);
        // full and zero ratios
        assert_eq!(apply_bps(12_345, BPS_SCALE), 12_345);
        assert_eq!(apply_bps(12_345, 0), 0);
    }

    #[test]
    fn apply_bps_survives_large_amounts() {
        // 9 trillion minor units at 80% would overflow an i64 product
        let amount = 9_000_000_000_000i64;
        assert_eq!(apply_bps(amount, 8_000), 7_200_000_000_000);
    }

    #[test]
    fn percentage_of_floors() {
        assert_eq!(percentage_of(10_000, 20), 2_000);
        assert_eq!(percentage_of(999, 10), 99);
        assert_eq!(percentage_of(1, 50), 0);
    }

    #[test]
    fn clamp_discount_bounds() {
        assert_eq!(clamp_discount(1_500, 10_000), 1_500);
        assert_eq!(clamp_discount(20_000, 10_000), 10_000);
        assert_eq!(clamp_discount(-5, 10_000), 0);
        assert_eq!(clamp_discount(100, 0), 0);
    }
}
