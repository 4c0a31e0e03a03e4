//! Warp-wise reducer for short rows.
//!
//! A row is owned by one 32-lane group. Element `it * 32 + lane` belongs to
//! `lane` and is loaded once into that lane's cache (at most 32 entries), so
//! the max, sum and normalize phases never re-read the input. Partial maxima
//! and sums are combined with a butterfly all-reduce.

use num_traits::{Float, Zero};

use super::dispatch::{Strategy, WARP_MAX_ELEMENTS};
use super::primitives::{WARP_SIZE, warp_allreduce};
use super::{BlockReducer, MaskElement, RowJob, RowReducer, RowStats, load, max_op, sum_op};
use crate::dtype::Element;

/// Cache entries per lane.
pub const MAX_ELEMENTS_PER_LANE: usize = WARP_MAX_ELEMENTS / WARP_SIZE;

#[derive(Debug, Clone, Copy, Default)]
pub struct WarpReducer;

impl RowReducer for WarpReducer {
    fn strategy(&self) -> Strategy {
        Strategy::Warp
    }

    fn reduce_row<T: Element, M: MaskElement>(&self, job: RowJob<'_, T, M>) {
        let d = job.input.len();
        if d > WARP_MAX_ELEMENTS {
            // Does not fit the lane caches.
            BlockReducer.reduce_row(job);
            return;
        }
        let RowJob {
            input,
            bias,
            output,
            log_softmax,
            mut dropout,
        } = job;

        let iterations = d.div_ceil(WARP_SIZE);
        let neg_inf = T::Accum::neg_infinity();
        let mut cache = [[neg_inf; MAX_ELEMENTS_PER_LANE]; WARP_SIZE];
        for (lane, slots) in cache.iter_mut().enumerate() {
            for it in 0..iterations {
                let col = it * WARP_SIZE + lane;
                if col < d {
                    slots[it] = load(input, bias, col);
                }
            }
        }

        // scan_max
        let mut lanes = [neg_inf; WARP_SIZE];
        for (lane, slots) in cache.iter().enumerate() {
            lanes[lane] = slots[..iterations].iter().copied().fold(neg_inf, max_op);
        }
        warp_allreduce(&mut lanes, max_op);
        let max = lanes[0];

        // scan_sum
        let mut lanes = [T::Accum::zero(); WARP_SIZE];
        for (lane, slots) in cache.iter().enumerate() {
            for it in 0..iterations {
                if it * WARP_SIZE + lane < d {
                    lanes[lane] = lanes[lane] + (slots[it] - max).exp();
                }
            }
        }
        warp_allreduce(&mut lanes, sum_op);
        let stats = RowStats::new(max, lanes[0]);

        // normalize
        for (lane, slots) in cache.iter().enumerate() {
            for it in 0..iterations {
                let col = it * WARP_SIZE + lane;
                if col >= d {
                    break;
                }
                let y = stats.emit(slots[it], log_softmax);
                output[col] = T::narrow(y);
                if let Some(dr) = dropout.as_mut() {
                    dr.apply(col, y);
                }
            }
        }
    }
}
