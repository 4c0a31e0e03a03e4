//! Dense row-major tensors and the allocators that back them.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use crate::dtype::Element;
use crate::error::{Result, SoftmaxError};

/// Number of elements described by `shape` (1 for a rank-0 shape).
#[must_use]
pub fn element_count(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// A contiguous row-major tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T> {
    shape: Vec<usize>,
    data: Vec<T>,
}

impl<T: Copy> Tensor<T> {
    /// Wrap an existing buffer.
    ///
    /// # Errors
    ///
    /// Returns [`SoftmaxError::InvalidArgument`] if `data.len()` does not
    /// equal the product of `shape`.
    pub fn from_vec(shape: Vec<usize>, data: Vec<T>) -> Result<Self> {
        let expected = element_count(&shape);
        if data.len() != expected {
            return Err(SoftmaxError::invalid(format!(
                "buffer of {} elements does not match shape {shape:?} (expected {expected})",
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[must_use]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Total storage in bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.data.len() * std::mem::size_of::<T>()
    }
}

/// Text form of a tensor, used by tensor files and the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TensorFile {
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

impl TensorFile {
    /// Convert into a typed tensor, narrowing each value to `T`.
    pub fn into_tensor<T: Element>(self) -> Result<Tensor<T>> {
        let data = self.data.into_iter().map(T::from_f64).collect();
        Tensor::from_vec(self.shape, data)
    }

    #[must_use]
    pub fn from_tensor<T: Element>(tensor: &Tensor<T>) -> Self {
        Self {
            shape: tensor.shape().to_vec(),
            data: tensor.as_slice().iter().map(|v| v.to_f64()).collect(),
        }
    }
}

/// Source of tensor storage.
///
/// Every buffer the operators need (outputs, transpose staging) comes from
/// an allocator so that exhaustion surfaces as
/// [`SoftmaxError::ResourceExhausted`] instead of an abort.
pub trait Allocator: Send + Sync {
    /// Reserve `bytes` of storage, failing if unavailable.
    fn reserve(&self, bytes: usize) -> Result<()>;

    /// Allocate a default-filled tensor of the given shape.
    fn allocate<T: Copy + Default>(&self, shape: &[usize]) -> Result<Tensor<T>>
    where
        Self: Sized,
    {
        let count = element_count(shape);
        let bytes = count
            .checked_mul(std::mem::size_of::<T>())
            .ok_or(SoftmaxError::ResourceExhausted {
                requested: usize::MAX,
                available: 0,
            })?;
        self.reserve(bytes)?;
        let mut data = Vec::new();
        data.try_reserve_exact(count)
            .map_err(|_| SoftmaxError::ResourceExhausted {
                requested: bytes,
                available: 0,
            })?;
        data.resize(count, T::default());
        Ok(Tensor {
            shape: shape.to_vec(),
            data,
        })
    }
}

/// Allocates from the process heap.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapAllocator;

impl Allocator for HeapAllocator {
    fn reserve(&self, _bytes: usize) -> Result<()> {
        Ok(())
    }
}

/// Allocator with a fixed byte budget.
///
/// Allocations are never returned individually; [`ArenaAllocator::reset`]
/// reclaims the whole budget at once.
#[derive(Debug)]
pub struct ArenaAllocator {
    capacity: usize,
    used: AtomicUsize,
}

impl ArenaAllocator {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            used: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn used(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.used())
    }

    pub fn reset(&self) {
        self.used.store(0, Ordering::Release);
    }
}

impl Allocator for ArenaAllocator {
    fn reserve(&self, bytes: usize) -> Result<()> {
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(bytes).filter(|&next| next <= self.capacity)
            })
            .map(|_| ())
            .map_err(|used| SoftmaxError::ResourceExhausted {
                requested: bytes,
                available: self.capacity.saturating_sub(used),
            })
    }
}
