//! Kernel registry: which operator versions and element types are bound.
//!
//! Each [`KernelDef`] covers one operator over a contiguous version range.
//! The range fixes the axis semantics the operator is built with, so
//! resolving a definition is the only place an opset number turns into
//! behavior.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dtype::DataType;
use crate::error::{Result, SoftmaxError};
use crate::kernels::MaskWidth;
use crate::layout::{AxisSemantics, SINGLE_AXIS_OPSET};

/// Domain of the standard operators.
pub const ONNX_DOMAIN: &str = "ai.onnx";

/// Domain of the fused contributed operator.
pub const MS_DOMAIN: &str = "com.microsoft";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Softmax,
    LogSoftmax,
    AdditiveMaskSoftmaxDropout,
}

impl OpKind {
    pub const ALL: [OpKind; 3] = [Self::Softmax, Self::LogSoftmax, Self::AdditiveMaskSoftmaxDropout];

    /// Registered operator name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Softmax => "Softmax",
            Self::LogSoftmax => "LogSoftmax",
            Self::AdditiveMaskSoftmaxDropout => "AdditiveMaskSoftmaxDropout",
        }
    }

    #[must_use]
    pub const fn domain(self) -> &'static str {
        match self {
            Self::Softmax | Self::LogSoftmax => ONNX_DOMAIN,
            Self::AdditiveMaskSoftmaxDropout => MS_DOMAIN,
        }
    }

    /// Version used when a configuration does not name one.
    #[must_use]
    pub const fn default_opset(self) -> u32 {
        match self {
            Self::Softmax | Self::LogSoftmax => SINGLE_AXIS_OPSET,
            Self::AdditiveMaskSoftmaxDropout => 1,
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Inclusive version range; `end == None` is open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRange {
    pub start: u32,
    pub end: Option<u32>,
}

impl VersionRange {
    #[must_use]
    pub const fn between(start: u32, end: u32) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    #[must_use]
    pub const fn since(start: u32) -> Self {
        Self { start, end: None }
    }

    #[must_use]
    pub fn contains(&self, version: u32) -> bool {
        version >= self.start && self.end.is_none_or(|end| version <= end)
    }

    #[must_use]
    pub fn overlaps(&self, other: &VersionRange) -> bool {
        let self_end = self.end.unwrap_or(u32::MAX);
        let other_end = other.end.unwrap_or(u32::MAX);
        self.start <= other_end && other.start <= self_end
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) if end == self.start => write!(f, "{}", self.start),
            Some(end) => write!(f, "{}-{end}", self.start),
            None => write!(f, "{}+", self.start),
        }
    }
}

/// One registered kernel binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelDef {
    pub op: OpKind,
    pub domain: String,
    pub versions: VersionRange,
    pub dtypes: Vec<DataType>,
    /// Mask output widths; empty for operators without a mask.
    #[serde(default)]
    pub mask_widths: Vec<MaskWidth>,
    pub semantics: AxisSemantics,
}

impl KernelDef {
    #[must_use]
    pub fn supports(&self, dtype: DataType) -> bool {
        self.dtypes.contains(&dtype)
    }
}

#[derive(Debug, Clone, Default)]
pub struct KernelRegistry {
    kernels: Vec<KernelDef>,
}

impl KernelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard bindings: `Softmax` and `LogSoftmax` over versions
    /// 1-10, 11-12 and 13+, plus the fused dropout operator at version 1.
    #[must_use]
    pub fn builtin() -> Self {
        let mut kernels = Vec::new();
        for op in [OpKind::Softmax, OpKind::LogSoftmax] {
            for versions in [
                VersionRange::between(1, 10),
                VersionRange::between(11, 12),
                VersionRange::since(SINGLE_AXIS_OPSET),
            ] {
                kernels.push(KernelDef {
                    op,
                    domain: op.domain().to_string(),
                    versions,
                    dtypes: DataType::ALL.to_vec(),
                    mask_widths: Vec::new(),
                    semantics: AxisSemantics::for_opset(versions.start),
                });
            }
        }
        kernels.push(KernelDef {
            op: OpKind::AdditiveMaskSoftmaxDropout,
            domain: MS_DOMAIN.to_string(),
            versions: VersionRange::between(1, 1),
            dtypes: DataType::ALL.to_vec(),
            mask_widths: MaskWidth::ALL.to_vec(),
            semantics: AxisSemantics::SingleAxis,
        });
        Self { kernels }
    }

    /// Add a binding.
    ///
    /// # Errors
    ///
    /// Returns [`SoftmaxError::InvalidArgument`] if the range is empty or
    /// overlaps an existing binding of the same operator for a shared
    /// element type.
    pub fn register(&mut self, def: KernelDef) -> Result<()> {
        if def.versions.end.is_some_and(|end| end < def.versions.start) || def.versions.start == 0 {
            return Err(SoftmaxError::invalid(format!(
                "{} has an empty version range {}",
                def.op, def.versions
            )));
        }
        if let Some(existing) = self.kernels.iter().find(|k| {
            k.op == def.op
                && k.versions.overlaps(&def.versions)
                && k.dtypes.iter().any(|d| def.dtypes.contains(d))
        }) {
            return Err(SoftmaxError::invalid(format!(
                "{} versions {} overlap existing binding {}",
                def.op, def.versions, existing.versions
            )));
        }
        self.kernels.push(def);
        Ok(())
    }

    #[must_use]
    pub fn kernels(&self) -> &[KernelDef] {
        &self.kernels
    }

    /// Find the binding for `(op, opset, dtype)`.
    ///
    /// # Errors
    ///
    /// Returns [`SoftmaxError::NotRegistered`] when nothing matches.
    pub fn resolve(&self, op: OpKind, opset: u32, dtype: DataType) -> Result<&KernelDef> {
        self.kernels
            .iter()
            .find(|k| k.op == op && k.versions.contains(opset) && k.supports(dtype))
            .ok_or_else(|| SoftmaxError::NotRegistered {
                op: op.name().to_string(),
                opset,
                dtype: dtype.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_covers_all_versions() {
        let reg = KernelRegistry::builtin();
        assert_eq!(reg.kernels().len(), 7);
        for opset in [1, 10, 11, 12, 13, 21] {
            for dtype in DataType::ALL {
                assert!(reg.resolve(OpKind::Softmax, opset, dtype).is_ok());
                assert!(reg.resolve(OpKind::LogSoftmax, opset, dtype).is_ok());
            }
        }
    }

    #[test]
    fn version_range_picks_semantics() {
        let reg = KernelRegistry::builtin();
        let old = reg.resolve(OpKind::Softmax, 11, DataType::F32).unwrap();
        assert_eq!(old.semantics, AxisSemantics::Flattened);
        assert_eq!(old.versions, VersionRange::between(11, 12));
        let new = reg.resolve(OpKind::Softmax, 13, DataType::F32).unwrap();
        assert_eq!(new.semantics, AxisSemantics::SingleAxis);
    }

    #[test]
    fn fused_is_version_one_only() {
        let reg = KernelRegistry::builtin();
        let def = reg
            .resolve(OpKind::AdditiveMaskSoftmaxDropout, 1, DataType::F16)
            .unwrap();
        assert_eq!(def.domain, MS_DOMAIN);
        assert_eq!(def.mask_widths.len(), 4);
        let err = reg
            .resolve(OpKind::AdditiveMaskSoftmaxDropout, 13, DataType::F32)
            .unwrap_err();
        assert!(matches!(err, SoftmaxError::NotRegistered { opset: 13, .. }));
    }

    #[test]
    fn opset_zero_not_registered() {
        let reg = KernelRegistry::builtin();
        assert!(reg.resolve(OpKind::Softmax, 0, DataType::F32).is_err());
    }

    #[test]
    fn register_rejects_overlap() {
        let mut reg = KernelRegistry::builtin();
        let err = reg
            .register(KernelDef {
                op: OpKind::Softmax,
                domain: ONNX_DOMAIN.to_string(),
                versions: VersionRange::between(12, 14),
                dtypes: vec![DataType::F32],
                mask_widths: vec![],
                semantics: AxisSemantics::SingleAxis,
            })
            .unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn register_into_empty_registry() {
        let mut reg = KernelRegistry::new();
        assert!(reg.resolve(OpKind::Softmax, 13, DataType::F64).is_err());
        reg.register(KernelDef {
            op: OpKind::Softmax,
            domain: ONNX_DOMAIN.to_string(),
            versions: VersionRange::since(13),
            dtypes: vec![DataType::F64],
            mask_widths: vec![],
            semantics: AxisSemantics::SingleAxis,
        })
        .unwrap();
        assert!(reg.resolve(OpKind::Softmax, 13, DataType::F64).is_ok());
        assert!(reg.resolve(OpKind::Softmax, 13, DataType::F32).is_err());
    }

    #[test]
    fn range_display() {
        assert_eq!(VersionRange::between(1, 10).to_string(), "1-10");
        assert_eq!(VersionRange::between(1, 1).to_string(), "1");
        assert_eq!(VersionRange::since(13).to_string(), "13+");
    }
}
