//! Lane-group reduction primitives.
//!
//! `warp_allreduce` models an xor-shuffle butterfly across 32 lanes: after
//! `log2(32)` exchange steps every lane holds the combined value.
//! `block_reduce` models a staged tree reduction through a shared scratch
//! buffer; the result lands in slot 0.

/// Lanes per warp.
pub const WARP_SIZE: usize = 32;

/// Threads per block for the block-wise strategy.
pub const BLOCK_THREADS: usize = 256;

/// Butterfly all-reduce: every lane ends with `op` folded over all lanes.
#[inline]
pub fn warp_allreduce<A, F>(lanes: &mut [A; WARP_SIZE], op: F)
where
    A: Copy,
    F: Fn(A, A) -> A,
{
    let mut offset = WARP_SIZE / 2;
    while offset > 0 {
        let snapshot = *lanes;
        for (lane, value) in lanes.iter_mut().enumerate() {
            *value = op(snapshot[lane], snapshot[lane ^ offset]);
        }
        offset /= 2;
    }
}

/// Staged tree reduction over `scratch`; returns the combined value.
///
/// `scratch.len()` must be a power of two.
#[inline]
pub fn block_reduce<A, F>(scratch: &mut [A], op: F) -> A
where
    A: Copy,
    F: Fn(A, A) -> A,
{
    debug_assert!(scratch.len().is_power_of_two());
    let mut active = scratch.len() / 2;
    while active > 0 {
        let (low, high) = scratch.split_at_mut(active);
        for (a, &b) in low.iter_mut().zip(high.iter()) {
            *a = op(*a, b);
        }
        active /= 2;
    }
    scratch[0]
}
