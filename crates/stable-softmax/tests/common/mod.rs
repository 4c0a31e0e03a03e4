//! Shared helpers for the operator integration tests.
#![allow(dead_code)]

use stable_softmax::tensor::Tensor;

/// Asserts every element in a slice is finite (not NaN or infinite).
pub fn assert_all_finite(slice: &[f32]) {
    for (i, &val) in slice.iter().enumerate() {
        assert!(val.is_finite(), "Element [{i}] is not finite: {val}");
    }
}

/// Asserts slice forms a valid probability distribution: all >= 0 and sum ≈ 1.
pub fn assert_probability_distribution(slice: &[f32], tol: f32) {
    let sum: f32 = slice.iter().sum();
    assert!(
        (sum - 1.0).abs() < tol,
        "Distribution sums to {sum}, expected ≈1.0 (tol={tol})"
    );
    for (i, &val) in slice.iter().enumerate() {
        assert!(val >= 0.0, "Element [{i}] is negative: {val}");
    }
}

/// Deterministic pseudo-random values in `[-scale, scale)`.
pub fn pseudo_random(n: usize, seed: u64, scale: f32) -> Vec<f32> {
    let mut state = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
    (0..n)
        .map(|_| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            let unit = (state >> 40) as f32 / (1u64 << 24) as f32;
            (unit * 2.0 - 1.0) * scale
        })
        .collect()
}

pub fn tensor(shape: &[usize], data: Vec<f32>) -> Tensor<f32> {
    Tensor::from_vec(shape.to_vec(), data).unwrap()
}

/// Softmax along a single `axis` of a row-major tensor, computed directly in
/// `f64` without moving any data.
pub fn reference_along_axis(shape: &[usize], data: &[f32], axis: usize, log: bool) -> Vec<f64> {
    let inner: usize = shape[axis + 1..].iter().product();
    let extent = shape[axis];
    let outer: usize = shape[..axis].iter().product();
    let mut out = vec![0.0_f64; data.len()];
    for o in 0..outer {
        for i in 0..inner {
            let idx = |k: usize| (o * extent + k) * inner + i;
            let max = (0..extent)
                .map(|k| f64::from(data[idx(k)]))
                .fold(f64::NEG_INFINITY, f64::max);
            let sum: f64 = (0..extent).map(|k| (f64::from(data[idx(k)]) - max).exp()).sum();
            for k in 0..extent {
                let shifted = f64::from(data[idx(k)]) - max;
                out[idx(k)] = if log { shifted - sum.ln() } else { shifted.exp() / sum };
            }
        }
    }
    out
}

/// Asserts every element is within `tol` of the reference.
pub fn assert_close(actual: &[f32], expected: &[f64], tol: f64) {
    assert_eq!(actual.len(), expected.len());
    for (i, (&a, &e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            (f64::from(a) - e).abs() <= tol,
            "Element [{i}]: got {a}, expected {e} (tol={tol})"
        );
    }
}
