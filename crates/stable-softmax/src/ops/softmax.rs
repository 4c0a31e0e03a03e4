//! `Softmax` / `LogSoftmax`.

use crate::dtype::{DataType, Element};
use crate::error::{Result, SoftmaxError};
use crate::kernels::{StrategyOverride, launch};
use crate::layout::{AxisSemantics, Permutation, transpose};
use crate::tensor::{Allocator, Tensor};

use super::{ExecutionPlan, build_plan};

/// Default reduction axis: the innermost dimension.
pub const DEFAULT_AXIS: i64 = -1;

/// A configured softmax operator.
///
/// The axis semantics is fixed at construction from the opset version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Softmax {
    opset: u32,
    axis: i64,
    log_softmax: bool,
    semantics: AxisSemantics,
    strategy: StrategyOverride,
}

impl Softmax {
    /// # Errors
    ///
    /// Returns [`SoftmaxError::InvalidArgument`] for opset 0.
    pub fn new(opset: u32, axis: i64, log_softmax: bool) -> Result<Self> {
        if opset == 0 {
            return Err(SoftmaxError::invalid("opset version must be at least 1"));
        }
        Ok(Self {
            opset,
            axis,
            log_softmax,
            semantics: AxisSemantics::for_opset(opset),
            strategy: StrategyOverride::Auto,
        })
    }

    /// Force a reduction strategy instead of the size heuristic.
    #[must_use]
    pub fn with_strategy(mut self, strategy: StrategyOverride) -> Self {
        self.strategy = strategy;
        self
    }

    #[must_use]
    pub fn opset(&self) -> u32 {
        self.opset
    }

    #[must_use]
    pub fn axis(&self) -> i64 {
        self.axis
    }

    #[must_use]
    pub fn is_log_softmax(&self) -> bool {
        self.log_softmax
    }

    #[must_use]
    pub fn semantics(&self) -> AxisSemantics {
        self.semantics
    }

    /// Plan an invocation on `shape` without running it.
    ///
    /// `Ok(None)` means the input is empty and no work would be done.
    ///
    /// # Errors
    ///
    /// Returns [`SoftmaxError::InvalidArgument`] if the axis is out of range.
    pub fn plan(&self, shape: &[usize], dtype: DataType) -> Result<Option<ExecutionPlan>> {
        build_plan(self.semantics, self.axis, shape, dtype, self.strategy, false)
    }

    /// Compute the (log-)softmax of `input`.
    ///
    /// All intermediate and output buffers come from `alloc`.
    ///
    /// # Errors
    ///
    /// Returns [`SoftmaxError::InvalidArgument`] for a bad axis and
    /// [`SoftmaxError::ResourceExhausted`] when `alloc` refuses a buffer.
    pub fn compute<T: Element, A: Allocator>(&self, input: &Tensor<T>, alloc: &A) -> Result<Tensor<T>> {
        let Some(plan) = self.plan(input.shape(), T::DTYPE)? else {
            return alloc.allocate(input.shape());
        };
        if plan.relocate_required {
            let perm = Permutation::swap_with_last(plan.axis, input.rank());
            let staged = transpose(input, &perm, alloc)?;
            let mut out = alloc.allocate::<T>(staged.shape())?;
            self.reduce(&plan, &staged, &mut out)?;
            transpose(&out, &perm, alloc)
        } else {
            let mut out = alloc.allocate::<T>(input.shape())?;
            self.reduce(&plan, input, &mut out)?;
            Ok(out)
        }
    }

    fn reduce<T: Element>(&self, plan: &ExecutionPlan, input: &Tensor<T>, out: &mut Tensor<T>) -> Result<()> {
        launch::<T, u8>(
            plan.strategy,
            plan.d,
            input.as_slice(),
            out.as_mut_slice(),
            self.log_softmax,
            None,
            None,
        )
    }
}
