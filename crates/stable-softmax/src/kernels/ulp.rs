//! ULP (unit in the last place) distances for comparing reducer outputs.
//!
//! The warp-wise and block-wise reducers sum in different orders, so their
//! outputs agree to a few ULP rather than bit-for-bit.

/// Number of representable `f32` values between `a` and `b`.
///
/// NaN on either side, or a sign mismatch between non-zero values, yields
/// `u64::MAX`.
#[must_use]
pub fn ulp_distance_f32(a: f32, b: f32) -> u64 {
    if a.is_nan() || b.is_nan() {
        return u64::MAX;
    }
    if a == b {
        return 0;
    }
    let a_bits = a.to_bits() as i32;
    let b_bits = b.to_bits() as i32;
    if (a_bits < 0) != (b_bits < 0) {
        return u64::MAX;
    }
    u64::from(a_bits.abs_diff(b_bits))
}

/// Number of representable `f64` values between `a` and `b`.
#[must_use]
pub fn ulp_distance_f64(a: f64, b: f64) -> u64 {
    if a.is_nan() || b.is_nan() {
        return u64::MAX;
    }
    if a == b {
        return 0;
    }
    let a_bits = a.to_bits() as i64;
    let b_bits = b.to_bits() as i64;
    if (a_bits < 0) != (b_bits < 0) {
        return u64::MAX;
    }
    a_bits.abs_diff(b_bits)
}

/// Largest pairwise ULP distance between two equal-length `f32` slices.
#[must_use]
pub fn max_ulp_f32(a: &[f32], b: &[f32]) -> u64 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| ulp_distance_f32(x, y))
        .max()
        .unwrap_or(0)
}

/// Assert two `f32` slices agree within `max_ulp`.
///
/// # Panics
///
/// Panics on a length mismatch or if any pair exceeds the tolerance.
pub fn assert_ulp_eq(a: &[f32], b: &[f32], max_ulp: u64) {
    assert_eq!(
        a.len(),
        b.len(),
        "slice length mismatch: {} vs {}",
        a.len(),
        b.len()
    );
    for (i, (&va, &vb)) in a.iter().zip(b.iter()).enumerate() {
        let dist = ulp_distance_f32(va, vb);
        assert!(
            dist <= max_ulp,
            "ULP violation at index {i}: {va} vs {vb} (ULP distance {dist}, max {max_ulp})"
        );
    }
}
