//! Row reduction engine: warp-wise and block-wise stable (log-)softmax.
//!
//! Every row runs the same three phases:
//! - `scan_max`: row maximum in the accumulation type
//! - `scan_sum`: `sum(exp(x_i - max))`
//! - `normalize`: `exp(x_i - max) / sum` or `(x_i - max) - ln(sum)`
//!
//! The two [`RowReducer`] implementations differ only in how a row is split
//! across lanes and how partial results are combined. Rows are independent
//! and are distributed across the rayon pool.

// Kernel code uses short math names and index casts throughout.
#![allow(
    clippy::many_single_char_names,
    clippy::similar_names,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::needless_range_loop,
    clippy::float_cmp
)]

pub mod block;
pub mod dispatch;
pub mod dropout;
pub mod primitives;
pub mod ulp;
pub mod warp;

use num_traits::Float;
use rayon::prelude::*;

use crate::dtype::{Accumulator, Element};
use crate::error::{Result, SoftmaxError};

pub use block::BlockReducer;
pub use dispatch::{Strategy, StrategyOverride, select_strategy};
pub use dropout::{DropoutLaunch, MaskElement, MaskWidth, RowDropout};
pub use warp::WarpReducer;

/// `f32` bias added to every element before the max scan.
#[derive(Debug, Clone, Copy)]
pub enum AdditiveMask<'a> {
    /// One value per column, shared by every row.
    Broadcast(&'a [f32]),
    /// One value per element.
    Full(&'a [f32]),
}

impl<'a> AdditiveMask<'a> {
    /// Interpret `mask` against an `(n, d)` row split.
    ///
    /// # Errors
    ///
    /// Returns [`SoftmaxError::InvalidArgument`] unless `mask.len()` is `d`
    /// or `n * d`.
    pub fn for_rows(mask: &'a [f32], n: usize, d: usize) -> Result<Self> {
        if mask.len() == d {
            Ok(Self::Broadcast(mask))
        } else if mask.len() == n * d {
            Ok(Self::Full(mask))
        } else {
            Err(SoftmaxError::invalid(format!(
                "additive mask has {} elements; expected {d} (per row) or {} (full)",
                mask.len(),
                n * d
            )))
        }
    }

    #[inline]
    fn row(&self, row: usize, d: usize) -> &'a [f32] {
        match *self {
            Self::Broadcast(m) => m,
            Self::Full(m) => &m[row * d..(row + 1) * d],
        }
    }
}

/// One row of work handed to a reducer.
pub struct RowJob<'a, T: Element, M: MaskElement> {
    pub input: &'a [T],
    pub bias: Option<&'a [f32]>,
    pub output: &'a mut [T],
    pub log_softmax: bool,
    pub dropout: Option<RowDropout<'a, T, M>>,
}

/// A row reduction algorithm.
pub trait RowReducer: Sync {
    fn strategy(&self) -> Strategy;

    /// Write the (log-)softmax of `job.input` into `job.output`, applying
    /// the dropout epilogue when present.
    fn reduce_row<T: Element, M: MaskElement>(&self, job: RowJob<'_, T, M>);
}

/// Widened input element plus its bias.
#[inline]
pub(crate) fn load<T: Element>(input: &[T], bias: Option<&[f32]>, col: usize) -> T::Accum {
    let x = input[col].widen();
    match bias {
        Some(b) => x + T::Accum::from_f32(b[col]),
        None => x,
    }
}

/// Finalized max and sum of one row.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RowStats<A> {
    max: A,
    sum: A,
    log_sum: A,
}

impl<A: Accumulator> RowStats<A> {
    #[inline]
    pub(crate) fn new(max: A, sum: A) -> Self {
        Self {
            max,
            sum,
            log_sum: sum.ln(),
        }
    }

    #[inline]
    pub(crate) fn emit(&self, x: A, log_softmax: bool) -> A {
        let shifted = x - self.max;
        if log_softmax {
            shifted - self.log_sum
        } else {
            shifted.exp() / self.sum
        }
    }
}

#[inline]
pub(crate) fn max_op<A: Float>(a: A, b: A) -> A {
    a.max(b)
}

#[inline]
pub(crate) fn sum_op<A: Float>(a: A, b: A) -> A {
    a + b
}

/// Run every row of an `(n, d)` buffer through `strategy`.
///
/// `input` and `output` hold `n * d` elements; an empty buffer is a no-op.
///
/// # Errors
///
/// Returns [`SoftmaxError::InvalidArgument`] on any buffer length mismatch.
pub fn launch<T: Element, M: MaskElement>(
    strategy: Strategy,
    d: usize,
    input: &[T],
    output: &mut [T],
    log_softmax: bool,
    bias: Option<AdditiveMask<'_>>,
    dropout: Option<DropoutLaunch<'_, T, M>>,
) -> Result<()> {
    if input.len() != output.len() {
        return Err(SoftmaxError::invalid(format!(
            "input/output length mismatch: {} vs {}",
            input.len(),
            output.len()
        )));
    }
    if input.is_empty() {
        return Ok(());
    }
    if d == 0 || input.len() % d != 0 {
        return Err(SoftmaxError::invalid(format!(
            "buffer of {} elements is not a whole number of rows of {d}",
            input.len()
        )));
    }
    if let Some(ref dl) = dropout {
        dl.check_len(input.len())?;
    }
    match strategy {
        Strategy::Warp => run_rows(&WarpReducer, d, input, output, log_softmax, bias, dropout),
        Strategy::Block => run_rows(&BlockReducer, d, input, output, log_softmax, bias, dropout),
    }
    Ok(())
}

fn run_rows<R: RowReducer, T: Element, M: MaskElement>(
    reducer: &R,
    d: usize,
    input: &[T],
    output: &mut [T],
    log_softmax: bool,
    bias: Option<AdditiveMask<'_>>,
    dropout: Option<DropoutLaunch<'_, T, M>>,
) {
    match dropout {
        None => {
            output
                .par_chunks_mut(d)
                .zip(input.par_chunks(d))
                .enumerate()
                .for_each(|(row, (out, x))| {
                    reducer.reduce_row::<T, M>(RowJob {
                        input: x,
                        bias: bias.map(|b| b.row(row, d)),
                        output: out,
                        log_softmax,
                        dropout: None,
                    });
                });
        }
        Some(DropoutLaunch {
            draws,
            ratio,
            dropped,
            mask,
        }) => {
            output
                .par_chunks_mut(d)
                .zip(input.par_chunks(d))
                .zip(dropped.par_chunks_mut(d))
                .zip(mask.par_chunks_mut(d))
                .enumerate()
                .for_each(|(row, (((out, x), dropped), mask))| {
                    reducer.reduce_row(RowJob {
                        input: x,
                        bias: bias.map(|b| b.row(row, d)),
                        output: out,
                        log_softmax,
                        dropout: Some(RowDropout::new(draws, (row * d) as u64, ratio, dropped, mask)),
                    });
                });
        }
    }
}

/// Reference single-row softmax in `f64`, used to check the reducers.
#[must_use]
pub fn reference_row(input: &[f64], log_softmax: bool) -> Vec<f64> {
    let max = input.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let sum: f64 = input.iter().map(|&x| (x - max).exp()).sum();
    input
        .iter()
        .map(|&x| {
            if log_softmax {
                x - max - sum.ln()
            } else {
                (x - max).exp() / sum
            }
        })
        .collect()
}
