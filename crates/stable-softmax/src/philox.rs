//! Counter-based pseudorandom generation (Philox4x32-10).
//!
//! A draw is a pure function of `(seed, counter)`, so any element can be
//! generated independently and in any order. The shared state is only the
//! next unused counter; invocations claim disjoint counter ranges with an
//! atomic `fetch_add`.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

const PHILOX_M0: u32 = 0xD251_1F53;
const PHILOX_M1: u32 = 0xCD9E_8D57;
const PHILOX_W0: u32 = 0x9E37_79B9;
const PHILOX_W1: u32 = 0xBB67_AE85;
const PHILOX_ROUNDS: usize = 10;

/// Seed used by the process-wide generator when none is configured.
pub const DEFAULT_SEED: u64 = 0x5EED_50F7_3A11_0001;

/// Environment variable that overrides [`DEFAULT_SEED`].
pub const SEED_ENV_VAR: &str = "STABLE_SOFTMAX_SEED";

#[inline]
fn mulhilo(a: u32, b: u32) -> (u32, u32) {
    let product = u64::from(a) * u64::from(b);
    ((product >> 32) as u32, product as u32)
}

#[inline]
fn round(ctr: [u32; 4], key: [u32; 2]) -> [u32; 4] {
    let (hi0, lo0) = mulhilo(PHILOX_M0, ctr[0]);
    let (hi1, lo1) = mulhilo(PHILOX_M1, ctr[2]);
    [hi1 ^ ctr[1] ^ key[0], lo1, hi0 ^ ctr[3] ^ key[1], lo0]
}

/// The Philox4x32-10 block function.
#[must_use]
pub fn philox4x32_10(counter: [u32; 4], key: [u32; 2]) -> [u32; 4] {
    let mut ctr = counter;
    let mut key = key;
    for r in 0..PHILOX_ROUNDS {
        if r > 0 {
            key[0] = key[0].wrapping_add(PHILOX_W0);
            key[1] = key[1].wrapping_add(PHILOX_W1);
        }
        ctr = round(ctr, key);
    }
    ctr
}

/// A reserved slice of the counter space: draws `offset..offset + count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhiloxState {
    pub seed: u64,
    pub offset: u64,
}

impl PhiloxState {
    /// Uniform draw in `[0, 1)` for the `index`-th element of the reservation.
    #[must_use]
    pub fn uniform(&self, index: u64) -> f32 {
        let counter = self.offset.wrapping_add(index);
        let block = philox4x32_10(
            [counter as u32, (counter >> 32) as u32, 0, 0],
            [self.seed as u32, (self.seed >> 32) as u32],
        );
        // 24 high bits map exactly onto the f32 mantissa.
        (block[0] >> 8) as f32 * (1.0 / 16_777_216.0)
    }
}

/// Shared generator: a fixed seed plus the next unclaimed counter.
#[derive(Debug)]
pub struct PhiloxGenerator {
    seed: u64,
    offset: AtomicU64,
}

impl PhiloxGenerator {
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            seed,
            offset: AtomicU64::new(0),
        }
    }

    /// Process-wide default instance, created on first use.
    ///
    /// Seeded from `STABLE_SOFTMAX_SEED` when set and parseable, otherwise
    /// from [`DEFAULT_SEED`].
    pub fn global() -> &'static PhiloxGenerator {
        static GLOBAL: OnceLock<PhiloxGenerator> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            let seed = std::env::var(SEED_ENV_VAR)
                .ok()
                .and_then(|s| s.trim().parse::<u64>().ok())
                .unwrap_or(DEFAULT_SEED);
            PhiloxGenerator::new(seed)
        })
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Next counter that has not been handed out.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset.load(Ordering::Acquire)
    }

    /// Claim `count` consecutive draws.
    ///
    /// Concurrent callers always receive disjoint ranges.
    pub fn reserve(&self, count: u64) -> PhiloxState {
        let offset = self.offset.fetch_add(count, Ordering::AcqRel);
        trace!(seed = self.seed, offset, count, "reserved philox draws");
        PhiloxState {
            seed: self.seed,
            offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn philox_known_answer_zero() {
        assert_eq!(
            philox4x32_10([0, 0, 0, 0], [0, 0]),
            [0x6627_e8d5, 0xe169_c58d, 0xbc57_ac4c, 0x9b00_dbd8]
        );
    }

    #[test]
    fn uniform_is_in_unit_interval() {
        let state = PhiloxState { seed: 7, offset: 0 };
        for i in 0..10_000 {
            let u = state.uniform(i);
            assert!((0.0..1.0).contains(&u), "draw {i} = {u}");
        }
    }

    #[test]
    fn draws_are_deterministic() {
        let a = PhiloxState { seed: 42, offset: 100 };
        let b = PhiloxState { seed: 42, offset: 90 };
        // Same absolute counter gives the same value.
        assert_eq!(a.uniform(0), b.uniform(10));
    }

    #[test]
    fn different_seeds_differ() {
        let a = PhiloxState { seed: 1, offset: 0 };
        let b = PhiloxState { seed: 2, offset: 0 };
        let same = (0..64).filter(|&i| a.uniform(i) == b.uniform(i)).count();
        assert!(same < 4);
    }

    #[test]
    fn reserve_advances_offset() {
        let g = PhiloxGenerator::new(3);
        assert_eq!(g.reserve(10).offset, 0);
        assert_eq!(g.reserve(5).offset, 10);
        assert_eq!(g.offset(), 15);
        assert_eq!(g.seed(), 3);
    }

    #[test]
    fn concurrent_reservations_are_disjoint() {
        let g = Arc::new(PhiloxGenerator::new(11));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let g = Arc::clone(&g);
                std::thread::spawn(move || (0..100).map(|_| g.reserve(7).offset).collect::<Vec<_>>())
            })
            .collect();
        let mut seen = HashSet::new();
        for h in handles {
            for off in h.join().unwrap() {
                assert_eq!(off % 7, 0);
                assert!(seen.insert(off), "offset {off} handed out twice");
            }
        }
        assert_eq!(g.offset(), 8 * 100 * 7);
    }

    #[test]
    fn global_is_singleton() {
        let a = PhiloxGenerator::global() as *const PhiloxGenerator;
        let b = PhiloxGenerator::global() as *const PhiloxGenerator;
        assert_eq!(a, b);
    }

    #[test]
    fn uniform_mean_near_half() {
        let state = PhiloxState { seed: 99, offset: 0 };
        let n = 20_000;
        let mean: f64 = (0..n).map(|i| f64::from(state.uniform(i))).sum::<f64>() / n as f64;
        assert!((mean - 0.5).abs() < 0.02, "mean = {mean}");
    }
}
