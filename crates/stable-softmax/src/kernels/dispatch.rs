//! Strategy selection between the warp-wise and block-wise reducers.
//!
//! The thresholds only bound the warp-wise working set (32 lanes with at
//! most 32 cached elements each); both strategies compute the same result.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Longest row the warp-wise strategy accepts.
pub const WARP_MAX_ELEMENTS: usize = 1024;

/// Largest row, in bytes, the warp-wise strategy accepts.
pub const WARP_MAX_BYTES: usize = 4096;

/// Row reduction algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// One 32-lane group per row, butterfly reduction.
    Warp,
    /// One 256-thread group per row, staged reduction through scratch memory.
    Block,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warp => write!(f, "warp-wise"),
            Self::Block => write!(f, "block-wise"),
        }
    }
}

/// Pick the strategy for rows of `d` elements of `element_bytes` each.
#[must_use]
pub const fn select_strategy(d: usize, element_bytes: usize) -> Strategy {
    if d <= WARP_MAX_ELEMENTS && d.saturating_mul(element_bytes) <= WARP_MAX_BYTES {
        Strategy::Warp
    } else {
        Strategy::Block
    }
}

/// Caller preference: let the heuristic decide or force one strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyOverride {
    #[default]
    Auto,
    Warp,
    Block,
}

impl StrategyOverride {
    /// Resolve against the heuristic.
    ///
    /// A forced warp-wise request on a row longer than the lane caches
    /// hold falls back to block-wise.
    #[must_use]
    pub const fn resolve(self, d: usize, element_bytes: usize) -> Strategy {
        match self {
            Self::Auto => select_strategy(d, element_bytes),
            Self::Warp if d <= WARP_MAX_ELEMENTS => Strategy::Warp,
            Self::Warp | Self::Block => Strategy::Block,
        }
    }
}

impl std::str::FromStr for StrategyOverride {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "warp" => Ok(Self::Warp),
            "block" => Ok(Self::Block),
            other => Err(format!("unknown strategy '{other}' (expected auto, warp, block)")),
        }
    }
}
