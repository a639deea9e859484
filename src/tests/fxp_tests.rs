// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::config::SCALE;
use crate::fxp::ops::{from_f32, from_f64_checked, fxp_add, fxp_mul, fxp_ratio, fxp_sub, to_f32};
use crate::types::scalar::FxpScalar;

const EPSILON: f32 = 1.0 / (SCALE as f32);

#[test]
fn test_fxp_conversions() {
    let s = from_f32(1.0);
    assert_eq!(s.0, SCALE);

    let s = from_f32(-2.5);
    assert_eq!(s.0, -2 * SCALE - SCALE / 2);
    assert!((to_f32(s) + 2.5).abs() <= EPSILON);
}

#[test]
fn test_fxp_rounds_to_nearest() {
    // 0.6 * 65536 = 39321.6
    assert_eq!(from_f64_checked(0.6), Some(FxpScalar(39322)));
    assert_eq!(from_f64_checked(-0.6), Some(FxpScalar(-39322)));
}

#[test]
fn test_fxp_rejects_non_finite() {
    assert_eq!(from_f64_checked(f64::NAN), None);
    assert_eq!(from_f64_checked(f64::INFINITY), None);
    assert_eq!(from_f64_checked(1.0e9), None);
}

#[test]
fn test_fxp_arithmetic() {
    assert!((to_f32(fxp_add(from_f32(1.5), from_f32(2.25))) - 3.75).abs() <= EPSILON);
    assert!((to_f32(fxp_sub(from_f32(3.5), from_f32(1.25))) - 2.25).abs() <= EPSILON);
    assert!((to_f32(fxp_mul(from_f32(2.0), from_f32(3.0))) - 6.0).abs() <= EPSILON);
    assert!((to_f32(fxp_mul(from_f32(-0.5), from_f32(0.5))) + 0.25).abs() <= EPSILON);
}

#[test]
fn test_fxp_saturation() {
    assert_eq!(fxp_add(FxpScalar(i32::MAX), FxpScalar::ONE), FxpScalar(i32::MAX));
    assert_eq!(fxp_mul(FxpScalar(i32::MAX), FxpScalar(i32::MAX)), FxpScalar(i32::MAX));
}

#[test]
fn test_fxp_ratio() {
    assert_eq!(fxp_ratio(1, 2), FxpScalar::HALF);
    assert_eq!(fxp_ratio(3, 3), FxpScalar::ONE);
    assert_eq!(fxp_ratio(5, 0), FxpScalar::ZERO);
}
