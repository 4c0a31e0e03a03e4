//! Dropout epilogue fused into the row reducers.
//!
//! Inverted dropout on the reducer output `s_i`:
//! kept `y_i = s_i / (1 - p)`, dropped `y_i = 0`.
//!
//! Draw `i` of a launch is `uniform(offset + i)` where `i` is the flat
//! element index, so the mask depends only on the reserved generator range
//! and never on how rows are scheduled.

use std::fmt;

use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};

use crate::dtype::{Accumulator, Element};
use crate::error::{Result, SoftmaxError};
use crate::philox::PhiloxState;

/// Storage width of the emitted mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskWidth {
    #[default]
    U8,
    U16,
    U32,
    U64,
}

impl MaskWidth {
    pub const ALL: [MaskWidth; 4] = [Self::U8, Self::U16, Self::U32, Self::U64];

    #[must_use]
    pub const fn byte_width(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
            Self::U64 => 8,
        }
    }
}

impl fmt::Display for MaskWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
        };
        write!(f, "{s}")
    }
}

/// A mask flag type: `1` kept, `0` dropped.
pub trait MaskElement: Copy + Default + PartialEq + Send + Sync + fmt::Debug + 'static {
    const KEPT: Self;
    const DROPPED: Self;
    const WIDTH: MaskWidth;

    fn is_kept(self) -> bool {
        self == Self::KEPT
    }
}

macro_rules! impl_mask_element {
    ($($ty:ty => $width:ident),* $(,)?) => {
        $(
            impl MaskElement for $ty {
                const KEPT: Self = 1;
                const DROPPED: Self = 0;
                const WIDTH: MaskWidth = MaskWidth::$width;
            }
        )*
    };
}

impl_mask_element!(u8 => U8, u16 => U16, u32 => U32, u64 => U64);

/// Check `ratio` lies in `[0, 1)`.
///
/// # Errors
///
/// Returns [`SoftmaxError::InvalidArgument`] for NaN, negative or `>= 1`.
pub fn validate_ratio(ratio: f32) -> Result<()> {
    if (0.0..1.0).contains(&ratio) {
        Ok(())
    } else {
        Err(SoftmaxError::invalid(format!(
            "dropout ratio must be in [0, 1), got {ratio}"
        )))
    }
}

/// Whole-buffer dropout arguments for one launch.
pub struct DropoutLaunch<'a, T, M> {
    pub draws: PhiloxState,
    pub ratio: f32,
    pub dropped: &'a mut [T],
    pub mask: &'a mut [M],
}

impl<T, M> DropoutLaunch<'_, T, M> {
    pub(crate) fn check_len(&self, len: usize) -> Result<()> {
        validate_ratio(self.ratio)?;
        if self.dropped.len() != len || self.mask.len() != len {
            return Err(SoftmaxError::invalid(format!(
                "dropout buffers ({} / {}) do not match input length {len}",
                self.dropped.len(),
                self.mask.len()
            )));
        }
        Ok(())
    }
}

/// Per-row view of a [`DropoutLaunch`].
pub struct RowDropout<'a, T: Element, M> {
    draws: PhiloxState,
    base: u64,
    keep_prob: f32,
    scale: T::Accum,
    dropped: &'a mut [T],
    mask: &'a mut [M],
}

impl<'a, T: Element, M: MaskElement> RowDropout<'a, T, M> {
    /// `base` is the flat index of the row's first element.
    pub fn new(draws: PhiloxState, base: u64, ratio: f32, dropped: &'a mut [T], mask: &'a mut [M]) -> Self {
        let keep_prob = 1.0 - ratio;
        Self {
            draws,
            base,
            keep_prob,
            scale: T::Accum::one() / T::Accum::from_f32(keep_prob),
            dropped,
            mask,
        }
    }

    /// Record the keep/drop decision for column `col` with reducer output `value`.
    #[inline]
    pub fn apply(&mut self, col: usize, value: T::Accum) {
        let u = self.draws.uniform(self.base + col as u64);
        if u < self.keep_prob {
            self.mask[col] = M::KEPT;
            self.dropped[col] = T::narrow(value * self.scale);
        } else {
            self.mask[col] = M::DROPPED;
            self.dropped[col] = T::narrow(T::Accum::zero());
        }
    }
}

/// Count kept flags in a mask.
#[must_use]
pub fn kept_count<M: MaskElement>(mask: &[M]) -> usize {
    mask.iter().filter(|m| m.is_kept()).count()
}
