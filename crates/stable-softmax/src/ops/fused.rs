//! Additive-mask softmax with fused dropout.
//!
//! Produces three tensors of the input's shape: the softmax itself, the
//! inverted-dropout result, and the keep mask. Each invocation claims
//! exactly `N * D` generator draws before launching.

use std::sync::Arc;

use crate::dtype::{DataType, Element};
use crate::error::Result;
use crate::kernels::dropout::validate_ratio;
use crate::kernels::{AdditiveMask, DropoutLaunch, MaskElement, StrategyOverride, launch};
use crate::layout::{AxisSemantics, Permutation, transpose, transpose_into};
use crate::philox::PhiloxGenerator;
use crate::tensor::{Allocator, Tensor};

use super::{ExecutionPlan, build_plan};

/// Where an operator gets its random draws from.
#[derive(Debug, Clone, Default)]
pub enum GeneratorSource {
    /// The lazily created process-wide generator.
    #[default]
    Global,
    /// A caller-supplied generator, possibly shared between operators.
    Shared(Arc<PhiloxGenerator>),
}

impl GeneratorSource {
    /// A fresh generator for `seed`, owned by whoever holds this source.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self::Shared(Arc::new(PhiloxGenerator::new(seed)))
    }

    #[must_use]
    pub fn generator(&self) -> &PhiloxGenerator {
        match self {
            Self::Global => PhiloxGenerator::global(),
            Self::Shared(g) => g,
        }
    }
}

/// The three outputs of [`FusedSoftmaxDropout::compute`].
#[derive(Debug, Clone, PartialEq)]
pub struct DropoutOutput<T, M> {
    pub softmax: Tensor<T>,
    pub dropped: Tensor<T>,
    pub mask: Tensor<M>,
}

#[derive(Debug, Clone)]
pub struct FusedSoftmaxDropout {
    ratio: f32,
    axis: i64,
    log_softmax: bool,
    generator: GeneratorSource,
    strategy: StrategyOverride,
}

impl FusedSoftmaxDropout {
    /// Dropout with probability `ratio` over the last axis.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::SoftmaxError::InvalidArgument`] unless `ratio` is in `[0, 1)`.
    pub fn new(ratio: f32, generator: GeneratorSource) -> Result<Self> {
        validate_ratio(ratio)?;
        Ok(Self {
            ratio,
            axis: -1,
            log_softmax: false,
            generator,
            strategy: StrategyOverride::Auto,
        })
    }

    /// Reduce over `axis` instead of the last one. Non-innermost axes are
    /// relocated and every output is transposed back.
    #[must_use]
    pub fn with_axis(mut self, axis: i64) -> Self {
        self.axis = axis;
        self
    }

    #[must_use]
    pub fn with_log_softmax(mut self, log_softmax: bool) -> Self {
        self.log_softmax = log_softmax;
        self
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: StrategyOverride) -> Self {
        self.strategy = strategy;
        self
    }

    #[must_use]
    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    #[must_use]
    pub fn generator(&self) -> &PhiloxGenerator {
        self.generator.generator()
    }

    /// # Errors
    ///
    /// Returns [`crate::error::SoftmaxError::InvalidArgument`] if the axis is out of range.
    pub fn plan(&self, shape: &[usize], dtype: DataType) -> Result<Option<ExecutionPlan>> {
        build_plan(AxisSemantics::SingleAxis, self.axis, shape, dtype, self.strategy, true)
    }

    /// Run softmax, dropout and mask generation in one pass.
    ///
    /// `additive_mask`, when given, holds either one value per reduced
    /// column (shared by every row) or one value per input element in the
    /// input's layout.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::SoftmaxError::InvalidArgument`] for a bad axis or mask
    /// length and [`crate::error::SoftmaxError::ResourceExhausted`] when `alloc` refuses a
    /// buffer. No draws are reserved when an error occurs before launch.
    pub fn compute<T, M, A>(
        &self,
        input: &Tensor<T>,
        additive_mask: Option<&[f32]>,
        alloc: &A,
    ) -> Result<DropoutOutput<T, M>>
    where
        T: Element,
        M: MaskElement,
        A: Allocator,
    {
        let Some(plan) = self.plan(input.shape(), T::DTYPE)? else {
            return Self::allocate_outputs(input.shape(), alloc);
        };

        if !plan.relocate_required {
            let bias = Self::bias(&plan, additive_mask)?;
            let mut out = Self::allocate_outputs(input.shape(), alloc)?;
            self.reduce(&plan, input, bias, &mut out)?;
            return Ok(out);
        }

        let perm = Permutation::swap_with_last(plan.axis, input.rank());
        let staged = transpose(input, &perm, alloc)?;
        let staged_mask = match additive_mask {
            Some(m) if m.len() == input.len() && m.len() != plan.d => {
                let full = Tensor::from_vec(input.shape().to_vec(), m.to_vec())?;
                Some(transpose(&full, &perm, alloc)?)
            }
            _ => None,
        };
        let bias = Self::bias(&plan, staged_mask.as_ref().map(Tensor::as_slice).or(additive_mask))?;
        // Both layouts are held before any draw is reserved.
        let mut work = Self::allocate_outputs(staged.shape(), alloc)?;
        let mut out = Self::allocate_outputs(input.shape(), alloc)?;
        self.reduce(&plan, &staged, bias, &mut work)?;
        transpose_into(&work.softmax, &perm, &mut out.softmax)?;
        transpose_into(&work.dropped, &perm, &mut out.dropped)?;
        transpose_into(&work.mask, &perm, &mut out.mask)?;
        Ok(out)
    }

    fn bias<'m>(plan: &ExecutionPlan, additive_mask: Option<&'m [f32]>) -> Result<Option<AdditiveMask<'m>>> {
        additive_mask
            .map(|m| AdditiveMask::for_rows(m, plan.n, plan.d))
            .transpose()
    }

    fn allocate_outputs<T, M, A>(shape: &[usize], alloc: &A) -> Result<DropoutOutput<T, M>>
    where
        T: Element,
        M: MaskElement,
        A: Allocator,
    {
        Ok(DropoutOutput {
            softmax: alloc.allocate(shape)?,
            dropped: alloc.allocate(shape)?,
            mask: alloc.allocate(shape)?,
        })
    }

    /// Reserve `N * D` draws and run the reducers into `out`.
    fn reduce<T, M>(
        &self,
        plan: &ExecutionPlan,
        input: &Tensor<T>,
        bias: Option<AdditiveMask<'_>>,
        out: &mut DropoutOutput<T, M>,
    ) -> Result<()>
    where
        T: Element,
        M: MaskElement,
    {
        let draws = self.generator().reserve(plan.draws);
        launch(
            plan.strategy,
            plan.d,
            input.as_slice(),
            out.softmax.as_mut_slice(),
            self.log_softmax,
            bias,
            Some(DropoutLaunch {
                draws,
                ratio: self.ratio,
                dropped: out.dropped.as_mut_slice(),
                mask: out.mask.as_mut_slice(),
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SoftmaxError;
    use crate::kernels::dropout::kept_count;
    use crate::tensor::{ArenaAllocator, HeapAllocator};

    fn ones(shape: &[usize]) -> Tensor<f32> {
        let n = shape.iter().product();
        Tensor::from_vec(shape.to_vec(), vec![1.0; n]).unwrap()
    }

    #[test]
    fn ratio_validated_at_construction() {
        assert!(FusedSoftmaxDropout::new(1.0, GeneratorSource::seeded(1)).is_err());
        assert!(FusedSoftmaxDropout::new(-0.5, GeneratorSource::Global).is_err());
        assert!(FusedSoftmaxDropout::new(0.0, GeneratorSource::seeded(1)).is_ok());
    }

    #[test]
    fn outputs_share_input_shape() {
        let op = FusedSoftmaxDropout::new(0.3, GeneratorSource::seeded(9)).unwrap();
        let out: DropoutOutput<f32, u8> = op.compute(&ones(&[2, 4]), None, &HeapAllocator).unwrap();
        assert_eq!(out.softmax.shape(), &[2, 4]);
        assert_eq!(out.dropped.shape(), &[2, 4]);
        assert_eq!(out.mask.shape(), &[2, 4]);
        assert!(out.softmax.as_slice().iter().all(|&v| (v - 0.25).abs() < 1e-6));
    }

    #[test]
    fn dropped_values_follow_mask() {
        let op = FusedSoftmaxDropout::new(0.5, GeneratorSource::seeded(21)).unwrap();
        let out: DropoutOutput<f32, u16> = op.compute(&ones(&[8, 16]), None, &HeapAllocator).unwrap();
        for ((s, y), m) in out
            .softmax
            .as_slice()
            .iter()
            .zip(out.dropped.as_slice())
            .zip(out.mask.as_slice())
        {
            match *m {
                1 => assert!((y - s * 2.0).abs() < 1e-6),
                0 => assert_eq!(*y, 0.0),
                other => panic!("mask value {other}"),
            }
        }
    }

    #[test]
    fn reserves_exactly_n_times_d() {
        let source = GeneratorSource::seeded(4);
        let op = FusedSoftmaxDropout::new(0.1, source.clone()).unwrap();
        let _: DropoutOutput<f32, u8> = op.compute(&ones(&[3, 5]), None, &HeapAllocator).unwrap();
        assert_eq!(source.generator().offset(), 15);
        let _: DropoutOutput<f32, u8> = op.compute(&ones(&[2, 2]), None, &HeapAllocator).unwrap();
        assert_eq!(source.generator().offset(), 19);
    }

    #[test]
    fn empty_input_reserves_nothing() {
        let source = GeneratorSource::seeded(4);
        let op = FusedSoftmaxDropout::new(0.1, source.clone()).unwrap();
        let input = Tensor::<f32>::from_vec(vec![0, 5], vec![]).unwrap();
        let out: DropoutOutput<f32, u8> = op.compute(&input, None, &HeapAllocator).unwrap();
        assert!(out.mask.is_empty());
        assert_eq!(source.generator().offset(), 0);
    }

    #[test]
    fn bad_mask_reserves_nothing() {
        let source = GeneratorSource::seeded(4);
        let op = FusedSoftmaxDropout::new(0.1, source.clone()).unwrap();
        let err = op
            .compute::<f32, u8, _>(&ones(&[2, 3]), Some(&[0.0; 4]), &HeapAllocator)
            .unwrap_err();
        assert!(matches!(err, SoftmaxError::InvalidArgument(_)));
        assert_eq!(source.generator().offset(), 0);
    }

    #[test]
    fn allocation_failure_reserves_nothing() {
        let source = GeneratorSource::seeded(4);
        let op = FusedSoftmaxDropout::new(0.1, source.clone()).unwrap();
        let arena = ArenaAllocator::new(8 * 4);
        let err = op.compute::<f32, u8, _>(&ones(&[2, 4]), None, &arena).unwrap_err();
        assert!(matches!(err, SoftmaxError::ResourceExhausted { .. }));
        assert_eq!(source.generator().offset(), 0);
    }

    #[test]
    fn relocated_allocation_failure_reserves_nothing() {
        // [2, 3] over axis 0: staged input (24 bytes), staged outputs
        // (24 + 24 + 6) and final outputs (24 + 24 + 6).
        let needed = 24 + 2 * 54;
        let source = GeneratorSource::seeded(4);
        let op = FusedSoftmaxDropout::new(0.1, source.clone())
            .unwrap()
            .with_axis(0);
        for capacity in (0..needed).step_by(6) {
            let arena = ArenaAllocator::new(capacity);
            let err = op.compute::<f32, u8, _>(&ones(&[2, 3]), None, &arena).unwrap_err();
            assert!(matches!(err, SoftmaxError::ResourceExhausted { .. }), "capacity {capacity}");
            assert_eq!(source.generator().offset(), 0, "capacity {capacity}");
        }
        let arena = ArenaAllocator::new(needed);
        let out = op.compute::<f32, u8, _>(&ones(&[2, 3]), None, &arena).unwrap();
        assert_eq!(out.mask.shape(), &[2, 3]);
        assert_eq!(source.generator().offset(), 6);
        assert_eq!(arena.remaining(), 0);
    }

    #[test]
    fn additive_mask_excludes_columns() {
        let op = FusedSoftmaxDropout::new(0.0, GeneratorSource::seeded(1)).unwrap();
        let bias = [0.0, f32::NEG_INFINITY, 0.0];
        let out: DropoutOutput<f32, u8> = op.compute(&ones(&[2, 3]), Some(&bias), &HeapAllocator).unwrap();
        for row in out.softmax.as_slice().chunks(3) {
            assert!((row[0] - 0.5).abs() < 1e-6);
            assert_eq!(row[1], 0.0);
        }
        assert_eq!(kept_count(out.mask.as_slice()), 6);
    }

    #[test]
    fn full_mask_follows_relocation() {
        // Reduce over axis 0 of a 2x3 tensor; the full mask knocks out
        // element (1, 2) so column 2 collapses onto row 0.
        let op = FusedSoftmaxDropout::new(0.0, GeneratorSource::seeded(1))
            .unwrap()
            .with_axis(0);
        let bias = [0.0, 0.0, 0.0, 0.0, 0.0, f32::NEG_INFINITY];
        let out: DropoutOutput<f32, u8> = op.compute(&ones(&[2, 3]), Some(&bias), &HeapAllocator).unwrap();
        let s = out.softmax.as_slice();
        assert!((s[0] - 0.5).abs() < 1e-6);
        assert!((s[2] - 1.0).abs() < 1e-6);
        assert_eq!(s[5], 0.0);
    }

    #[test]
    fn same_seed_same_mask() {
        let run = || {
            let op = FusedSoftmaxDropout::new(0.5, GeneratorSource::seeded(77)).unwrap();
            let out: DropoutOutput<f32, u8> = op.compute(&ones(&[4, 50]), None, &HeapAllocator).unwrap();
            out.mask.into_vec()
        };
        assert_eq!(run(), run());
    }
}
