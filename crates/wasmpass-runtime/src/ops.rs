//! Wasm numeric operations that require runtime checks or exact semantics
//! Rust's primitive operators do not give.
//!
//! ## Float-to-integer truncation
//!
//! Rust's `as` cast for float-to-integer is **saturating** (NaN maps to 0).
//! That is exactly `trunc_sat`. The trapping `trunc` family validates the
//! input first: NaN traps with `InvalidConversionToInteger`, anything whose
//! truncation falls outside the target range traps with `IntegerOverflow`.
//!
//! ## Integer division / remainder
//!
//! A zero divisor traps with `DivideByZero`. `div_s(MIN, -1)` traps with
//! `IntegerOverflow`; `rem_s(MIN, -1)` is defined as 0.
//!
//! ## Float min / max / nearest
//!
//! `f32::min` ignores NaN and does not order `-0.0 < +0.0`; Wasm propagates
//! NaN and does. `nearest` rounds half to even. `core` has no rounding
//! functions, so `nearest` is done with integer conversion on the small range
//! where a fraction can exist.
//!
//! `no_std` compatible: no alloc, no std, no panics.

use crate::{Trap, TrapResult};

// ── Float → i32 trapping truncation ──────────────────────────────────────────

/// Wasm `i32.trunc_f32_s`.
#[inline(never)]
pub fn i32_trunc_f32_s(v: f32) -> TrapResult<i32> {
    if v.is_nan() {
        return Err(Trap::InvalidConversionToInteger);
    }
    if v >= 2147483648.0f32 || v < -2147483648.0f32 {
        return Err(Trap::IntegerOverflow);
    }
    Ok(v as i32)
}

/// Wasm `i32.trunc_f32_u` (result reinterpreted as i32).
///
/// The lower bound is `<= -1.0` (not `< 0.0`) because `-0.5` truncates to 0,
/// which is a valid unsigned value.
#[inline(never)]
pub fn i32_trunc_f32_u(v: f32) -> TrapResult<i32> {
    if v.is_nan() {
        return Err(Trap::InvalidConversionToInteger);
    }
    if v >= 4294967296.0f32 || v <= -1.0f32 {
        return Err(Trap::IntegerOverflow);
    }
    Ok(v as u32 as i32)
}

/// Wasm `i32.trunc_f64_s`.
#[inline(never)]
pub fn i32_trunc_f64_s(v: f64) -> TrapResult<i32> {
    if v.is_nan() {
        return Err(Trap::InvalidConversionToInteger);
    }
    if v >= 2147483648.0f64 || v <= -2147483649.0f64 {
        return Err(Trap::IntegerOverflow);
    }
    Ok(v as i32)
}

/// Wasm `i32.trunc_f64_u`.
#[inline(never)]
pub fn i32_trunc_f64_u(v: f64) -> TrapResult<i32> {
    if v.is_nan() {
        return Err(Trap::InvalidConversionToInteger);
    }
    if v >= 4294967296.0f64 || v <= -1.0f64 {
        return Err(Trap::IntegerOverflow);
    }
    Ok(v as u32 as i32)
}

// ── Float → i64 trapping truncation ──────────────────────────────────────────

/// Wasm `i64.trunc_f32_s`.
#[inline(never)]
pub fn i64_trunc_f32_s(v: f32) -> TrapResult<i64> {
    if v.is_nan() {
        return Err(Trap::InvalidConversionToInteger);
    }
    if v >= 9223372036854775808.0f32 || v < -9223372036854775808.0f32 {
        return Err(Trap::IntegerOverflow);
    }
    Ok(v as i64)
}

/// Wasm `i64.trunc_f32_u`.
#[inline(never)]
pub fn i64_trunc_f32_u(v: f32) -> TrapResult<i64> {
    if v.is_nan() {
        return Err(Trap::InvalidConversionToInteger);
    }
    if v >= 18446744073709551616.0f32 || v <= -1.0f32 {
        return Err(Trap::IntegerOverflow);
    }
    Ok(v as u64 as i64)
}

/// Wasm `i64.trunc_f64_s`.
#[inline(never)]
pub fn i64_trunc_f64_s(v: f64) -> TrapResult<i64> {
    if v.is_nan() {
        return Err(Trap::InvalidConversionToInteger);
    }
    if v >= 9223372036854775808.0f64 || v < -9223372036854775808.0f64 {
        return Err(Trap::IntegerOverflow);
    }
    Ok(v as i64)
}

/// Wasm `i64.trunc_f64_u`.
#[inline(never)]
pub fn i64_trunc_f64_u(v: f64) -> TrapResult<i64> {
    if v.is_nan() {
        return Err(Trap::InvalidConversionToInteger);
    }
    if v >= 18446744073709551616.0f64 || v <= -1.0f64 {
        return Err(Trap::IntegerOverflow);
    }
    Ok(v as u64 as i64)
}

// ── Saturating truncation (0xFC 0..7) ────────────────────────────────────────

/// Wasm `i32.trunc_sat_f32_s`.
#[inline]
pub fn i32_trunc_sat_f32_s(v: f32) -> i32 {
    v as i32
}

/// Wasm `i32.trunc_sat_f32_u`.
#[inline]
pub fn i32_trunc_sat_f32_u(v: f32) -> i32 {
    v as u32 as i32
}

/// Wasm `i32.trunc_sat_f64_s`.
#[inline]
pub fn i32_trunc_sat_f64_s(v: f64) -> i32 {
    v as i32
}

/// Wasm `i32.trunc_sat_f64_u`.
#[inline]
pub fn i32_trunc_sat_f64_u(v: f64) -> i32 {
    v as u32 as i32
}

/// Wasm `i64.trunc_sat_f32_s`.
#[inline]
pub fn i64_trunc_sat_f32_s(v: f32) -> i64 {
    v as i64
}

/// Wasm `i64.trunc_sat_f32_u`.
#[inline]
pub fn i64_trunc_sat_f32_u(v: f32) -> i64 {
    v as u64 as i64
}

/// Wasm `i64.trunc_sat_f64_s`.
#[inline]
pub fn i64_trunc_sat_f64_s(v: f64) -> i64 {
    v as i64
}

/// Wasm `i64.trunc_sat_f64_u`.
#[inline]
pub fn i64_trunc_sat_f64_u(v: f64) -> i64 {
    v as u64 as i64
}

// ── i32 division / remainder ──────────────────────────────────────────────────

/// Wasm `i32.div_s`.
#[inline(never)]
pub fn i32_div_s(lhs: i32, rhs: i32) -> TrapResult<i32> {
    if rhs == 0 {
        return Err(Trap::DivideByZero);
    }
    lhs.checked_div(rhs).ok_or(Trap::IntegerOverflow)
}

/// Wasm `i32.div_u`.
#[inline(never)]
pub fn i32_div_u(lhs: i32, rhs: i32) -> TrapResult<i32> {
    (lhs as u32)
        .checked_div(rhs as u32)
        .map(|v| v as i32)
        .ok_or(Trap::DivideByZero)
}

/// Wasm `i32.rem_s`. `MIN rem_s -1` is 0 and does not trap.
#[inline(never)]
pub fn i32_rem_s(lhs: i32, rhs: i32) -> TrapResult<i32> {
    if rhs == 0 {
        return Err(Trap::DivideByZero);
    }
    Ok(lhs.wrapping_rem(rhs))
}

/// Wasm `i32.rem_u`.
#[inline(never)]
pub fn i32_rem_u(lhs: i32, rhs: i32) -> TrapResult<i32> {
    (lhs as u32)
        .checked_rem(rhs as u32)
        .map(|v| v as i32)
        .ok_or(Trap::DivideByZero)
}

// ── i64 division / remainder ──────────────────────────────────────────────────

/// Wasm `i64.div_s`.
#[inline(never)]
pub fn i64_div_s(lhs: i64, rhs: i64) -> TrapResult<i64> {
    if rhs == 0 {
        return Err(Trap::DivideByZero);
    }
    lhs.checked_div(rhs).ok_or(Trap::IntegerOverflow)
}

/// Wasm `i64.div_u`.
#[inline(never)]
pub fn i64_div_u(lhs: i64, rhs: i64) -> TrapResult<i64> {
    (lhs as u64)
        .checked_div(rhs as u64)
        .map(|v| v as i64)
        .ok_or(Trap::DivideByZero)
}

/// Wasm `i64.rem_s`. `MIN rem_s -1` is 0 and does not trap.
#[inline(never)]
pub fn i64_rem_s(lhs: i64, rhs: i64) -> TrapResult<i64> {
    if rhs == 0 {
        return Err(Trap::DivideByZero);
    }
    Ok(lhs.wrapping_rem(rhs))
}

/// Wasm `i64.rem_u`.
#[inline(never)]
pub fn i64_rem_u(lhs: i64, rhs: i64) -> TrapResult<i64> {
    (lhs as u64)
        .checked_rem(rhs as u64)
        .map(|v| v as i64)
        .ok_or(Trap::DivideByZero)
}

// ── Float min / max / nearest ────────────────────────────────────────────────

/// Wasm `f32.min`: NaN in, NaN out; `min(-0.0, +0.0) == -0.0`.
#[inline]
pub fn f32_min(a: f32, b: f32) -> f32 {
    if a.is_nan() || b.is_nan() {
        return a + b;
    }
    if a == b {
        // Only differs for a pair of zeros; OR keeps the sign bit.
        return f32::from_bits(a.to_bits() | b.to_bits());
    }
    if a < b {
        a
    } else {
        b
    }
}

/// Wasm `f32.max`: NaN in, NaN out; `max(-0.0, +0.0) == +0.0`.
#[inline]
pub fn f32_max(a: f32, b: f32) -> f32 {
    if a.is_nan() || b.is_nan() {
        return a + b;
    }
    if a == b {
        return f32::from_bits(a.to_bits() & b.to_bits());
    }
    if a > b {
        a
    } else {
        b
    }
}

/// Wasm `f64.min`.
#[inline]
pub fn f64_min(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        return a + b;
    }
    if a == b {
        return f64::from_bits(a.to_bits() | b.to_bits());
    }
    if a < b {
        a
    } else {
        b
    }
}

/// Wasm `f64.max`.
#[inline]
pub fn f64_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        return a + b;
    }
    if a == b {
        return f64::from_bits(a.to_bits() & b.to_bits());
    }
    if a > b {
        a
    } else {
        b
    }
}

/// Wasm `f32.nearest`: round to integral, ties to even, sign of zero kept.
#[inline(never)]
pub fn f32_nearest(v: f32) -> f32 {
    // At 2^23 and above every f32 is already integral (or inf/NaN).
    if v.is_nan() || !(v > -8388608.0f32 && v < 8388608.0f32) {
        return v;
    }
    let t = v as i32;
    let frac = v - t as f32;
    let r = if frac > 0.5 || (frac == 0.5 && t & 1 != 0) {
        t + 1
    } else if frac < -0.5 || (frac == -0.5 && t & 1 != 0) {
        t - 1
    } else {
        t
    };
    f32::from_bits((r as f32).to_bits() | (v.to_bits() & 0x8000_0000))
}

/// Wasm `f64.nearest`.
#[inline(never)]
pub fn f64_nearest(v: f64) -> f64 {
    // At 2^52 and above every f64 is already integral (or inf/NaN).
    if v.is_nan() || !(v > -4503599627370496.0f64 && v < 4503599627370496.0f64) {
        return v;
    }
    let t = v as i64;
    let frac = v - t as f64;
    let r = if frac > 0.5 || (frac == 0.5 && t & 1 != 0) {
        t + 1
    } else if frac < -0.5 || (frac == -0.5 && t & 1 != 0) {
        t - 1
    } else {
        t
    };
    f64::from_bits((r as f64).to_bits() | (v.to_bits() & 0x8000_0000_0000_0000))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── trapping truncation ──

    #[test]
    fn i32_trunc_f32_s_basic() {
        assert_eq!(i32_trunc_f32_s(1.9f32), Ok(1));
        assert_eq!(i32_trunc_f32_s(-1.9f32), Ok(-1));
        assert_eq!(i32_trunc_f32_s(0.0f32), Ok(0));
    }

    #[test]
    fn i32_trunc_f32_s_nan_is_invalid_conversion() {
        assert_eq!(
            i32_trunc_f32_s(f32::NAN),
            Err(Trap::InvalidConversionToInteger)
        );
    }

    #[test]
    fn i32_trunc_f32_s_boundaries() {
        // 2^31 is one past i32::MAX
        assert_eq!(i32_trunc_f32_s(2147483648.0f32), Err(Trap::IntegerOverflow));
        // Largest f32 below 2^31
        assert_eq!(i32_trunc_f32_s(2147483520.0f32), Ok(2147483520));
        assert_eq!(i32_trunc_f32_s(-2147483648.0f32), Ok(i32::MIN));
        assert_eq!(i32_trunc_f32_s(-2147483904.0f32), Err(Trap::IntegerOverflow));
        assert_eq!(i32_trunc_f32_s(f32::INFINITY), Err(Trap::IntegerOverflow));
        assert_eq!(
            i32_trunc_f32_s(f32::NEG_INFINITY),
            Err(Trap::IntegerOverflow)
        );
    }

    #[test]
    fn i32_trunc_f32_u_bounds() {
        assert_eq!(i32_trunc_f32_u(3.9f32), Ok(3));
        // trunc(-0.5) = 0, which is valid for unsigned
        assert_eq!(i32_trunc_f32_u(-0.5f32), Ok(0));
        assert_eq!(i32_trunc_f32_u(-1.0f32), Err(Trap::IntegerOverflow));
        assert_eq!(i32_trunc_f32_u(4294967296.0f32), Err(Trap::IntegerOverflow));
        assert_eq!(i32_trunc_f32_u(4294967040.0f32), Ok(-256));
    }

    #[test]
    fn i32_trunc_f64_s_bounds() {
        assert_eq!(i32_trunc_f64_s(2147483647.0f64), Ok(i32::MAX));
        assert_eq!(i32_trunc_f64_s(-2147483648.9f64), Ok(i32::MIN));
        assert_eq!(i32_trunc_f64_s(2147483648.0f64), Err(Trap::IntegerOverflow));
        assert_eq!(i32_trunc_f64_s(-2147483649.0f64), Err(Trap::IntegerOverflow));
    }

    #[test]
    fn i32_trunc_f64_u_bounds() {
        assert_eq!(i32_trunc_f64_u(4294967295.0f64), Ok(-1));
        assert_eq!(i32_trunc_f64_u(-0.9f64), Ok(0));
        assert_eq!(i32_trunc_f64_u(4294967296.0f64), Err(Trap::IntegerOverflow));
        assert_eq!(
            i32_trunc_f64_u(f64::NAN),
            Err(Trap::InvalidConversionToInteger)
        );
    }

    #[test]
    fn i64_trunc_bounds() {
        assert_eq!(i64_trunc_f32_s(-1.5f32), Ok(-1));
        assert_eq!(
            i64_trunc_f32_s(9223372036854775808.0f32),
            Err(Trap::IntegerOverflow)
        );
        assert_eq!(i64_trunc_f32_u(-1.0f32), Err(Trap::IntegerOverflow));
        assert_eq!(i64_trunc_f64_s(-9223372036854775808.0f64), Ok(i64::MIN));
        assert_eq!(
            i64_trunc_f64_u(18446744073709551616.0f64),
            Err(Trap::IntegerOverflow)
        );
        assert_eq!(
            i64_trunc_f64_u(f64::NAN),
            Err(Trap::InvalidConversionToInteger)
        );
    }

    // ── saturating truncation ──

    #[test]
    fn trunc_sat_clamps_and_zeroes_nan() {
        assert_eq!(i32_trunc_sat_f32_u(-1.0f32), 0);
        assert_eq!(i32_trunc_sat_f32_s(f32::NAN), 0);
        assert_eq!(i32_trunc_sat_f32_s(3.0e10f32), i32::MAX);
        assert_eq!(i32_trunc_sat_f64_u(1.0e20f64), -1);
        assert_eq!(i64_trunc_sat_f64_s(f64::NEG_INFINITY), i64::MIN);
        assert_eq!(i64_trunc_sat_f32_u(f32::INFINITY), -1);
    }

    // ── division ──

    #[test]
    fn i32_div_matrix() {
        assert_eq!(i32_div_s(7, 2), Ok(3));
        assert_eq!(i32_div_s(-7, 2), Ok(-3));
        assert_eq!(i32_div_s(1, 0), Err(Trap::DivideByZero));
        assert_eq!(i32_div_s(i32::MIN, -1), Err(Trap::IntegerOverflow));
        assert_eq!(i32_div_u(-1, 2), Ok(0x7FFF_FFFF));
        assert_eq!(i32_div_u(1, 0), Err(Trap::DivideByZero));
    }

    #[test]
    fn i32_rem_matrix() {
        assert_eq!(i32_rem_s(-7, 2), Ok(-1));
        assert_eq!(i32_rem_s(i32::MIN, -1), Ok(0));
        assert_eq!(i32_rem_s(5, 0), Err(Trap::DivideByZero));
        assert_eq!(i32_rem_u(-1, 10), Ok(5));
        assert_eq!(i32_rem_u(5, 0), Err(Trap::DivideByZero));
    }

    #[test]
    fn i64_div_rem_matrix() {
        assert_eq!(i64_div_s(-9, 4), Ok(-2));
        assert_eq!(i64_div_s(i64::MIN, -1), Err(Trap::IntegerOverflow));
        assert_eq!(i64_div_s(3, 0), Err(Trap::DivideByZero));
        assert_eq!(i64_div_u(-1, 2), Ok(i64::MAX));
        assert_eq!(i64_rem_s(i64::MIN, -1), Ok(0));
        assert_eq!(i64_rem_s(3, 0), Err(Trap::DivideByZero));
        assert_eq!(i64_rem_u(3, 0), Err(Trap::DivideByZero));
    }

    // ── min / max / nearest ──

    #[test]
    fn min_max_signed_zero() {
        assert_eq!(f32_min(0.0, -0.0).to_bits(), (-0.0f32).to_bits());
        assert_eq!(f32_max(-0.0, 0.0).to_bits(), 0.0f32.to_bits());
        assert_eq!(f64_min(-0.0, 0.0).to_bits(), (-0.0f64).to_bits());
        assert_eq!(f64_max(0.0, -0.0).to_bits(), 0.0f64.to_bits());
    }

    #[test]
    fn min_max_propagate_nan() {
        assert!(f32_min(f32::NAN, 1.0).is_nan());
        assert!(f32_max(1.0, f32::NAN).is_nan());
        assert!(f64_min(2.0, f64::NAN).is_nan());
        assert_eq!(f64_max(2.0, 3.0), 3.0);
        assert_eq!(f32_min(2.0, 3.0), 2.0);
    }

    #[test]
    fn nearest_ties_to_even() {
        assert_eq!(f32_nearest(0.5), 0.0);
        assert_eq!(f32_nearest(1.5), 2.0);
        assert_eq!(f32_nearest(2.5), 2.0);
        assert_eq!(f32_nearest(-2.5), -2.0);
        assert_eq!(f32_nearest(2.6), 3.0);
        assert_eq!(f64_nearest(-3.5), -4.0);
        assert_eq!(f64_nearest(4.4), 4.0);
    }

    #[test]
    fn nearest_keeps_sign_of_zero() {
        assert_eq!(f32_nearest(-0.4).to_bits(), (-0.0f32).to_bits());
        assert_eq!(f64_nearest(-0.5).to_bits(), (-0.0f64).to_bits());
        assert_eq!(f64_nearest(0.3).to_bits(), 0.0f64.to_bits());
    }

    #[test]
    fn nearest_large_and_special() {
        assert_eq!(f32_nearest(16777216.0), 16777216.0);
        assert!(f64_nearest(f64::NAN).is_nan());
        assert_eq!(f64_nearest(f64::INFINITY), f64::INFINITY);
    }
}
