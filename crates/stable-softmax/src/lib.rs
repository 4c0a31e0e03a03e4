//! # stable-softmax
//!
//! Numerically stable softmax and log-softmax over one axis of an
//! N-dimensional tensor, with a fused additive-mask + dropout variant.
//!
//! Rows are reduced in three phases (max, sum of shifted exponentials,
//! normalize) in a widened accumulation type, by either a warp-wise or a
//! block-wise reducer chosen from the row length.
//!
//! ## Modules
//!
//! - [`ops`]: `Softmax` / `LogSoftmax` and `FusedSoftmaxDropout`
//! - [`kernels`]: Row reducers, strategy selection, dropout epilogue
//! - [`axis`]: Axis normalization and the `(N, D)` split
//! - [`layout`]: Version-dependent axis semantics and transposition
//! - [`philox`]: Counter-based random draws with atomic reservation
//! - [`stream`]: In-order execution queue with sticky errors
//! - [`registry`]: Operator version ranges and element-type bindings
//! - [`config`]: YAML operator configuration and tensor files
//! - [`tensor`]: Tensor storage and allocators
//! - [`dtype`]: Storage element types and their accumulation types

pub mod axis;
pub mod config;
pub mod dtype;
pub mod error;
pub mod kernels;
pub mod layout;
pub mod ops;
pub mod philox;
pub mod registry;
pub mod stream;
pub mod tensor;
