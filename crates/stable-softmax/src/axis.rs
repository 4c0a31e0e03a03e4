//! Axis resolution and the `(N, D)` row split.

use crate::error::{Result, SoftmaxError};

/// Resolve a possibly-negative `axis` against `rank`.
///
/// Negative values count from the end. A rank-0 tensor behaves as rank 1,
/// so `0` and `-1` both address its single implicit dimension.
///
/// # Errors
///
/// Returns [`SoftmaxError::InvalidArgument`] if the resolved axis is outside
/// `[0, rank)`.
pub fn normalize_axis(axis: i64, rank: usize) -> Result<usize> {
    let effective_rank = rank.max(1);
    let rank_i = i64::try_from(effective_rank)
        .map_err(|_| SoftmaxError::invalid(format!("rank {rank} too large")))?;
    let resolved = if axis < 0 { axis + rank_i } else { axis };
    if (0..rank_i).contains(&resolved) {
        // In range, so the cast cannot truncate.
        Ok(usize::try_from(resolved).unwrap_or_default())
    } else {
        Err(SoftmaxError::invalid(format!(
            "axis {axis} is out of range for a tensor of rank {rank} \
             (expected [-{effective_rank}, {})",
            effective_rank - 1
        )))
    }
}

/// Split `shape` at `axis` into outer count `N` and reduction length `D`.
///
/// `N` is the product of the extents before `axis`, `D` the product of the
/// extents from `axis` to the end.
#[must_use]
pub fn split(shape: &[usize], axis: usize) -> (usize, usize) {
    let axis = axis.min(shape.len());
    let n = shape[..axis].iter().product();
    let d = shape[axis..].iter().product();
    (n, d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn positive_axis_passes_through() {
        assert_eq!(normalize_axis(1, 3).unwrap(), 1);
    }

    #[test]
    fn negative_axis_counts_from_end() {
        assert_eq!(normalize_axis(-1, 3).unwrap(), 2);
        assert_eq!(normalize_axis(-3, 3).unwrap(), 0);
    }

    #[test]
    fn out_of_range_is_invalid() {
        assert!(matches!(
            normalize_axis(3, 3),
            Err(SoftmaxError::InvalidArgument(_))
        ));
        assert!(matches!(
            normalize_axis(-4, 3),
            Err(SoftmaxError::InvalidArgument(_))
        ));
    }

    #[test]
    fn scalar_rank_accepts_zero_and_minus_one() {
        assert_eq!(normalize_axis(0, 0).unwrap(), 0);
        assert_eq!(normalize_axis(-1, 0).unwrap(), 0);
        assert!(normalize_axis(1, 0).is_err());
    }

    #[test]
    fn split_flattens_trailing_dims() {
        assert_eq!(split(&[2, 3, 4], 0), (1, 24));
        assert_eq!(split(&[2, 3, 4], 1), (2, 12));
        assert_eq!(split(&[2, 3, 4], 2), (6, 4));
    }

    #[test]
    fn split_scalar() {
        assert_eq!(split(&[], 0), (1, 1));
    }

    proptest! {
        #[test]
        fn prop_split_preserves_count(
            shape in proptest::collection::vec(0usize..6, 1..5),
            axis_seed in 0usize..8,
        ) {
            let axis = axis_seed % shape.len();
            let (n, d) = split(&shape, axis);
            prop_assert_eq!(n * d, shape.iter().product::<usize>());
        }

        #[test]
        fn prop_negative_and_positive_agree(rank in 1usize..8, k in 0usize..8) {
            let k = k % rank;
            let neg = i64::try_from(k).unwrap() - i64::try_from(rank).unwrap();
            prop_assert_eq!(
                normalize_axis(neg, rank).unwrap(),
                normalize_axis(i64::try_from(k).unwrap(), rank).unwrap()
            );
        }
    }
}
