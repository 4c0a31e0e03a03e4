//! Storage element types and the accumulation type each one widens to.
//!
//! Reduced-precision storage (`f16`, `bf16`) accumulates in `f32`; `f32`
//! accumulates in itself and `f64` in `f64`. The widening happens inside the
//! reduction engine only; callers always see their storage type.

use std::fmt;

use half::{bf16, f16};
use num_traits::Float;
use serde::{Deserialize, Serialize};

/// Runtime tag for the supported element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    F32,
    F64,
    F16,
    Bf16,
}

impl DataType {
    /// Every element type the operators are registered for.
    pub const ALL: [DataType; 4] = [Self::F32, Self::F64, Self::F16, Self::Bf16];

    /// Storage width in bytes.
    #[must_use]
    pub const fn byte_width(self) -> usize {
        match self {
            Self::F32 => 4,
            Self::F64 => 8,
            Self::F16 | Self::Bf16 => 2,
        }
    }

    /// The wider type used for running max/sum.
    #[must_use]
    pub const fn accumulation(self) -> DataType {
        match self {
            Self::F64 => Self::F64,
            Self::F32 | Self::F16 | Self::Bf16 => Self::F32,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::F16 => "f16",
            Self::Bf16 => "bf16",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "f32" | "float" => Ok(Self::F32),
            "f64" | "double" => Ok(Self::F64),
            "f16" | "float16" => Ok(Self::F16),
            "bf16" | "bfloat16" => Ok(Self::Bf16),
            other => Err(format!("unknown dtype '{other}' (expected f32, f64, f16, bf16)")),
        }
    }
}

/// Floating type used for per-row running values.
pub trait Accumulator: Float + Send + Sync + fmt::Debug + 'static {
    fn from_f32(v: f32) -> Self;
    fn to_f64(self) -> f64;
}

impl Accumulator for f32 {
    #[inline]
    fn from_f32(v: f32) -> Self {
        v
    }

    #[inline]
    fn to_f64(self) -> f64 {
        f64::from(self)
    }
}

impl Accumulator for f64 {
    #[inline]
    fn from_f32(v: f32) -> Self {
        f64::from(v)
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }
}

/// A tensor element type with its accumulation type.
pub trait Element: Copy + Default + PartialEq + Send + Sync + fmt::Debug + 'static {
    type Accum: Accumulator;

    const DTYPE: DataType;

    fn widen(self) -> Self::Accum;

    fn narrow(acc: Self::Accum) -> Self;

    /// Lossy conversion used when loading tensors from text files.
    fn from_f64(v: f64) -> Self;

    fn to_f64(self) -> f64 {
        self.widen().to_f64()
    }
}

impl Element for f32 {
    type Accum = f32;
    const DTYPE: DataType = DataType::F32;

    #[inline]
    fn widen(self) -> f32 {
        self
    }

    #[inline]
    fn narrow(acc: f32) -> Self {
        acc
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_f64(v: f64) -> Self {
        v as f32
    }
}

impl Element for f64 {
    type Accum = f64;
    const DTYPE: DataType = DataType::F64;

    #[inline]
    fn widen(self) -> f64 {
        self
    }

    #[inline]
    fn narrow(acc: f64) -> Self {
        acc
    }

    fn from_f64(v: f64) -> Self {
        v
    }
}

impl Element for f16 {
    type Accum = f32;
    const DTYPE: DataType = DataType::F16;

    #[inline]
    fn widen(self) -> f32 {
        self.to_f32()
    }

    #[inline]
    fn narrow(acc: f32) -> Self {
        f16::from_f32(acc)
    }

    fn from_f64(v: f64) -> Self {
        f16::from_f64(v)
    }
}

impl Element for bf16 {
    type Accum = f32;
    const DTYPE: DataType = DataType::Bf16;

    #[inline]
    fn widen(self) -> f32 {
        self.to_f32()
    }

    #[inline]
    fn narrow(acc: f32) -> Self {
        bf16::from_f32(acc)
    }

    fn from_f64(v: f64) -> Self {
        bf16::from_f64(v)
    }
}
