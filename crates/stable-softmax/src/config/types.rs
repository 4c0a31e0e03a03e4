use serde::{Deserialize, Serialize};

use crate::dtype::DataType;
use crate::error::Result;
use crate::kernels::{MaskWidth, StrategyOverride};
use crate::ops::{FusedSoftmaxDropout, GeneratorSource, Softmax};
use crate::registry::OpKind;

fn default_axis() -> i64 {
    -1
}

fn default_dtype() -> DataType {
    DataType::F32
}

/// One operator invocation as described in YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OperatorConfig {
    pub operator: OpKind,
    /// Operator version; each operator has its own default.
    #[serde(default)]
    pub opset: Option<u32>,
    #[serde(default = "default_axis")]
    pub axis: i64,
    #[serde(default = "default_dtype")]
    pub dtype: DataType,
    /// Emit log-probabilities from the fused operator.
    #[serde(default)]
    pub log_softmax: bool,
    #[serde(default)]
    pub dropout: Option<DropoutConfig>,
    #[serde(default)]
    pub strategy: StrategyOverride,
}

/// Dropout block of the fused operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DropoutConfig {
    pub ratio: f32,
    /// Seed of a private generator; omitted means the process-wide one.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub mask_width: MaskWidth,
}

impl OperatorConfig {
    #[must_use]
    pub fn effective_opset(&self) -> u32 {
        self.opset.unwrap_or_else(|| self.operator.default_opset())
    }

    #[must_use]
    pub fn is_fused(&self) -> bool {
        self.operator == OpKind::AdditiveMaskSoftmaxDropout
    }

    /// Whether the operator emits log-probabilities.
    #[must_use]
    pub fn emits_log(&self) -> bool {
        match self.operator {
            OpKind::Softmax => false,
            OpKind::LogSoftmax => true,
            OpKind::AdditiveMaskSoftmaxDropout => self.log_softmax,
        }
    }

    #[must_use]
    pub fn mask_width(&self) -> MaskWidth {
        self.dropout.as_ref().map(|d| d.mask_width).unwrap_or_default()
    }

    /// Build the plain operator described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::SoftmaxError::InvalidArgument`] for opset 0.
    pub fn build_softmax(&self) -> Result<Softmax> {
        Ok(Softmax::new(self.effective_opset(), self.axis, self.emits_log())?.with_strategy(self.strategy))
    }

    /// Build the fused operator described by this configuration.
    ///
    /// A missing dropout block means ratio 0 on the process-wide generator.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::SoftmaxError::InvalidArgument`] for a ratio
    /// outside `[0, 1)`.
    pub fn build_fused(&self) -> Result<FusedSoftmaxDropout> {
        let (ratio, generator) = match &self.dropout {
            Some(DropoutConfig {
                ratio,
                seed: Some(seed),
                ..
            }) => (*ratio, GeneratorSource::seeded(*seed)),
            Some(DropoutConfig { ratio, seed: None, .. }) => (*ratio, GeneratorSource::Global),
            None => (0.0, GeneratorSource::Global),
        };
        Ok(FusedSoftmaxDropout::new(ratio, generator)?
            .with_axis(self.axis)
            .with_log_softmax(self.log_softmax)
            .with_strategy(self.strategy))
    }
}
