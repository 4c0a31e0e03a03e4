//! Block-wise reducer for long rows.
//!
//! A row is owned by one 256-thread group. Thread `t` walks columns
//! `t, t + 256, ...`, and per-thread partials are staged through a shared
//! scratch buffer and tree-reduced. Nothing is cached between phases: each
//! phase re-reads the input, so any row length works.

use num_traits::{Float, Zero};

use super::dispatch::Strategy;
use super::primitives::{BLOCK_THREADS, block_reduce};
use super::{MaskElement, RowJob, RowReducer, RowStats, load, max_op, sum_op};
use crate::dtype::Element;

#[derive(Debug, Clone, Copy, Default)]
pub struct BlockReducer;

impl RowReducer for BlockReducer {
    fn strategy(&self) -> Strategy {
        Strategy::Block
    }

    fn reduce_row<T: Element, M: MaskElement>(&self, job: RowJob<'_, T, M>) {
        let RowJob {
            input,
            bias,
            output,
            log_softmax,
            mut dropout,
        } = job;
        let d = input.len();
        let neg_inf = T::Accum::neg_infinity();
        let mut scratch = [neg_inf; BLOCK_THREADS];

        // scan_max
        for (t, slot) in scratch.iter_mut().enumerate() {
            let mut partial = neg_inf;
            for col in (t..d).step_by(BLOCK_THREADS) {
                partial = max_op(partial, load(input, bias, col));
            }
            *slot = partial;
        }
        let max = block_reduce(&mut scratch, max_op);

        // scan_sum
        for (t, slot) in scratch.iter_mut().enumerate() {
            let mut partial = T::Accum::zero();
            for col in (t..d).step_by(BLOCK_THREADS) {
                partial = partial + (load(input, bias, col) - max).exp();
            }
            *slot = partial;
        }
        let stats = RowStats::new(max, block_reduce(&mut scratch, sum_op));

        // normalize
        for col in 0..d {
            let y = stats.emit(load(input, bias, col), log_softmax);
            output[col] = T::narrow(y);
            if let Some(dr) = dropout.as_mut() {
                dr.apply(col, y);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::reference_row;
    use half::f16;

    #[test]
    fn long_row_sums_to_one() {
        let input: Vec<f64> = (0..5000).map(|i| f64::from(i % 101) * 0.05 - 2.0).collect();
        let mut out = vec![0.0_f64; input.len()];
        BlockReducer.reduce_row::<f64, u8>(RowJob {
            input: &input,
            bias: None,
            output: &mut out,
            log_softmax: false,
            dropout: None,
        });
        let sum: f64 = out.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        let reference = reference_row(&input, false);
        for (o, r) in out.iter().zip(reference) {
            assert!((o - r).abs() < 1e-15);
        }
    }

    #[test]
    fn short_row_leaves_threads_idle() {
        let input = [1.0_f32, 2.0, 3.0];
        let mut out = [0.0_f32; 3];
        BlockReducer.reduce_row::<f32, u8>(RowJob {
            input: &input,
            bias: None,
            output: &mut out,
            log_softmax: false,
            dropout: None,
        });
        assert!((out[2] - 0.665_240_94).abs() < 1e-6);
    }

    #[test]
    fn half_precision_accumulates_wide() {
        // 4096 equal f16 values: an f16 running sum would stall at 2048.
        let input = vec![f16::from_f32(0.0); 4096];
        let mut out = vec![f16::from_f32(0.0); 4096];
        BlockReducer.reduce_row::<f16, u8>(RowJob {
            input: &input,
            bias: None,
            output: &mut out,
            log_softmax: false,
            dropout: None,
        });
        let expected = f16::from_f32(1.0 / 4096.0);
        assert!(out.iter().all(|&v| v == expected));
    }
}
