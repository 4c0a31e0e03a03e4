//! Operators: plain (log-)softmax and the fused additive-mask softmax with
//! dropout.
//!
//! Both operators follow the same pipeline: resolve the axis, decide whether
//! the axis has to be moved innermost, stage a transposed copy if so, run the
//! row reducers, then transpose every output back.

pub mod fused;
pub mod softmax;

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::axis::{normalize_axis, split};
use crate::dtype::DataType;
use crate::error::Result;
use crate::kernels::{Strategy, StrategyOverride};
use crate::layout::{AxisSemantics, LayoutPlan, plan_layout};
use crate::tensor::element_count;

pub use fused::{DropoutOutput, FusedSoftmaxDropout, GeneratorSource};
pub use softmax::Softmax;

/// Everything decided before any element is touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionPlan {
    pub semantics: AxisSemantics,
    /// Resolved, non-negative axis in the caller's layout.
    pub axis: usize,
    pub relocate_required: bool,
    /// Axis order of the staged copy; `None` when no transpose happens.
    pub permutation: Option<Vec<usize>>,
    /// Shape the reducers see.
    pub compute_shape: Vec<usize>,
    pub n: usize,
    pub d: usize,
    pub dtype: DataType,
    pub strategy: Strategy,
    /// Generator draws one invocation reserves (0 without dropout).
    pub draws: u64,
}

impl fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "semantics:   {:?}", self.semantics)?;
        writeln!(f, "axis:        {}", self.axis)?;
        writeln!(f, "relocate:    {}", self.relocate_required)?;
        match &self.permutation {
            Some(p) => writeln!(f, "permutation: {p:?}")?,
            None => writeln!(f, "permutation: none")?,
        }
        writeln!(f, "compute:     {:?}", self.compute_shape)?;
        writeln!(f, "rows (N):    {}", self.n)?;
        writeln!(f, "length (D):  {}", self.d)?;
        writeln!(f, "dtype:       {} (accumulate {})", self.dtype, self.dtype.accumulation())?;
        writeln!(f, "strategy:    {}", self.strategy)?;
        write!(f, "draws:       {}", self.draws)
    }
}

/// Build the plan for one invocation.
///
/// Returns `Ok(None)` for an empty tensor: there is nothing to reduce and
/// the axis is not checked.
pub(crate) fn build_plan(
    semantics: AxisSemantics,
    axis: i64,
    shape: &[usize],
    dtype: DataType,
    strategy: StrategyOverride,
    with_dropout: bool,
) -> Result<Option<ExecutionPlan>> {
    if element_count(shape) == 0 {
        debug!(?shape, "empty input, nothing to compute");
        return Ok(None);
    }
    let rank = shape.len();
    let axis = normalize_axis(axis, rank)?;
    let LayoutPlan {
        relocate_required,
        compute_axis,
        permutation,
        ..
    } = plan_layout(semantics, axis, rank);
    let compute_shape = match &permutation {
        Some(p) => p.apply_to_shape(shape),
        None => shape.to_vec(),
    };
    let (n, d) = split(&compute_shape, compute_axis);
    let strategy = strategy.resolve(d, dtype.byte_width());
    let draws = if with_dropout { (n as u64) * (d as u64) } else { 0 };
    debug!(
        ?semantics,
        axis,
        relocate_required,
        n,
        d,
        %strategy,
        draws,
        "planned softmax"
    );
    Ok(Some(ExecutionPlan {
        semantics,
        axis,
        relocate_required,
        permutation: permutation.map(|p| p.order().to_vec()),
        compute_shape,
        n,
        d,
        dtype,
        strategy,
        draws,
    }))
}
