//! Layout planning: version-dependent axis semantics and the swap
//! permutation that moves the reduction axis innermost.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SoftmaxError};
use crate::tensor::{Allocator, Tensor, element_count};

/// First opset in which `axis` names a single dimension.
pub const SINGLE_AXIS_OPSET: u32 = 13;

/// Meaning of the `axis` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisSemantics {
    /// `axis` starts a flattened block; the row is every dim from `axis` on.
    Flattened,
    /// `axis` is the only reduced dimension.
    SingleAxis,
}

impl AxisSemantics {
    #[must_use]
    pub const fn for_opset(opset: u32) -> Self {
        if opset >= SINGLE_AXIS_OPSET {
            Self::SingleAxis
        } else {
            Self::Flattened
        }
    }
}

/// Swap of one dimension with the innermost one. Its own inverse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permutation {
    order: Vec<usize>,
}

impl Permutation {
    /// Swap `axis` with the last position of a rank-`rank` shape.
    #[must_use]
    pub fn swap_with_last(axis: usize, rank: usize) -> Self {
        let mut order: Vec<usize> = (0..rank).collect();
        if rank > 0 && axis < rank {
            order.swap(axis, rank - 1);
        }
        Self { order }
    }

    #[must_use]
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    #[must_use]
    pub fn rank(&self) -> usize {
        self.order.len()
    }

    /// Dimensions after applying the permutation.
    #[must_use]
    pub fn apply_to_shape(&self, shape: &[usize]) -> Vec<usize> {
        self.order.iter().map(|&p| shape[p]).collect()
    }
}

/// Decision produced by the planner for one input shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutPlan {
    /// Resolved axis in the caller's layout.
    pub axis: usize,
    /// Whether the input must be transposed before the reduction.
    pub relocate_required: bool,
    /// Axis handed to the reduction engine (in the computation layout).
    pub compute_axis: usize,
    /// Present exactly when `relocate_required` is set.
    pub permutation: Option<Permutation>,
}

/// Plan the computation layout for a resolved `axis`.
#[must_use]
pub fn plan_layout(semantics: AxisSemantics, axis: usize, rank: usize) -> LayoutPlan {
    let relocate_required =
        semantics == AxisSemantics::SingleAxis && rank > 0 && axis != rank - 1;
    if relocate_required {
        LayoutPlan {
            axis,
            relocate_required,
            compute_axis: rank - 1,
            permutation: Some(Permutation::swap_with_last(axis, rank)),
        }
    } else {
        LayoutPlan {
            axis,
            relocate_required,
            compute_axis: axis,
            permutation: None,
        }
    }
}

/// Row-major strides for `shape`.
fn strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

/// Copy `source` into a freshly allocated tensor laid out by `perm`.
///
/// Output dimension `k` is source dimension `perm[k]`.
///
/// # Errors
///
/// [`SoftmaxError::InvalidArgument`] on a rank mismatch and
/// [`SoftmaxError::ResourceExhausted`] if the allocator cannot provide the
/// staging buffer.
pub fn transpose<T, A>(source: &Tensor<T>, perm: &Permutation, alloc: &A) -> Result<Tensor<T>>
where
    T: Copy + Default,
    A: Allocator,
{
    check_rank(source, perm)?;
    let mut out = alloc.allocate::<T>(&perm.apply_to_shape(source.shape()))?;
    transpose_into(source, perm, &mut out)?;
    Ok(out)
}

/// Like [`transpose`], but writes into a buffer the caller already holds.
///
/// # Errors
///
/// [`SoftmaxError::InvalidArgument`] on a rank mismatch or if `dest` does not
/// have the permuted shape.
pub fn transpose_into<T: Copy>(source: &Tensor<T>, perm: &Permutation, dest: &mut Tensor<T>) -> Result<()> {
    check_rank(source, perm)?;
    let out_shape = perm.apply_to_shape(source.shape());
    if dest.shape() != out_shape.as_slice() {
        return Err(SoftmaxError::invalid(format!(
            "transpose destination has shape {:?}, expected {out_shape:?}",
            dest.shape()
        )));
    }
    if dest.is_empty() {
        return Ok(());
    }

    let src_strides = strides(source.shape());
    // Source stride walked by each output dimension.
    let walk: Vec<usize> = perm.order().iter().map(|&p| src_strides[p]).collect();
    let rank = out_shape.len();
    let mut index = vec![0usize; rank];
    let mut src_offset = 0usize;
    let src = source.as_slice();

    for dst in dest.as_mut_slice().iter_mut() {
        *dst = src[src_offset];
        // Odometer increment over the output multi-index.
        for k in (0..rank).rev() {
            index[k] += 1;
            src_offset += walk[k];
            if index[k] < out_shape[k] {
                break;
            }
            src_offset -= walk[k] * out_shape[k];
            index[k] = 0;
        }
    }
    debug_assert_eq!(dest.len(), element_count(&out_shape));
    Ok(())
}

fn check_rank<T: Copy>(source: &Tensor<T>, perm: &Permutation) -> Result<()> {
    if perm.rank() == source.rank() {
        return Ok(());
    }
    Err(SoftmaxError::invalid(format!(
        "permutation of rank {} applied to tensor of rank {}",
        perm.rank(),
        source.rank()
    )))
}
