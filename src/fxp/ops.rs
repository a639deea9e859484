// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Fixed-point operations.

use crate::types::scalar::FxpScalar;
use crate::fxp::qformat::{FRAC_BITS, SCALE};

/// Basic fixed-point addition with saturation.
pub fn fxp_add(a: FxpScalar, b: FxpScalar) -> FxpScalar {
    FxpScalar(a.0.saturating_add(b.0))
}

/// Basic fixed-point subtraction with saturation.
pub fn fxp_sub(a: FxpScalar, b: FxpScalar) -> FxpScalar {
    FxpScalar(a.0.saturating_sub(b.0))
}

/// Fixed-point multiplication with scaling and saturation.
pub fn fxp_mul(a: FxpScalar, b: FxpScalar) -> FxpScalar {
    let product = (a.0 as i64) * (b.0 as i64);
    FxpScalar(saturate(product >> FRAC_BITS))
}

/// Fixed-point ratio `num / den` of two integer counters.
///
/// Returns zero when `den` is zero.
pub fn fxp_ratio(num: u64, den: u64) -> FxpScalar {
    if den == 0 {
        return FxpScalar::ZERO;
    }
    let scaled = ((num as u128) << FRAC_BITS) / den as u128;
    if scaled > i32::MAX as u128 {
        FxpScalar(i32::MAX)
    } else {
        FxpScalar(scaled as i32)
    }
}

/// Converts a float to Q16.16, rounding to nearest.
///
/// Returns `None` for NaN, infinities and values outside the Q16.16 range.
pub fn from_f64_checked(f: f64) -> Option<FxpScalar> {
    if !f.is_finite() {
        return None;
    }
    let scaled = f * (SCALE as f64);
    if scaled > i32::MAX as f64 || scaled < i32::MIN as f64 {
        return None;
    }
    let rounded = if scaled >= 0.0 { scaled + 0.5 } else { scaled - 0.5 };
    Some(FxpScalar(saturate(rounded as i64)))
}

/// Converts Q16.16 back to a float for display.
pub fn to_f64(s: FxpScalar) -> f64 {
    (s.0 as f64) / (SCALE as f64)
}

/// Helper to convert f32 to FxpScalar (TEST ONLY).
#[cfg(any(test, feature = "std"))]
pub fn from_f32(f: f32) -> FxpScalar {
    from_f64_checked(f as f64).unwrap_or(FxpScalar::ZERO)
}

/// Helper to convert FxpScalar to f32 (TEST ONLY).
#[cfg(any(test, feature = "std"))]
pub fn to_f32(s: FxpScalar) -> f32 {
    (s.0 as f32) / (SCALE as f32)
}

fn saturate(v: i64) -> i32 {
    if v > i32::MAX as i64 {
        i32::MAX
    } else if v < i32::MIN as i64 {
        i32::MIN
    } else {
        v as i32
    }
}
