//! Winograd 3×3 convolution for a tile-oriented tensor runtime.
//!
//! The fast path rewrites a stride-1 `3×3` convolution as a filter transform,
//! an input transform over overlapping tiles, one batched product per
//! transform-domain coefficient and an inverse transform. The direct
//! convolution in [`ops::conv::direct`] is the reference it must agree with,
//! see [`verification`].
//!
//! ```no_run
//! use winoflow_core::{winograd_conv2d, ExecutionContext, Padding, Tensor};
//!
//! # fn main() -> winoflow_core::Result<()> {
//! let ctx = ExecutionContext::stream()?;
//! let input = Tensor::<f32>::zeros(&[1, 32, 32, 8]);
//! let filter = Tensor::<f32>::zeros(&[16, 8, 3, 3]);
//! let bias = Tensor::<f32>::zeros(&[16]);
//! let output = winograd_conv2d(&ctx, &input, &filter, &bias, &Padding::same())?;
//! assert_eq!(output.dims(), &[1, 32, 32, 16]);
//! # Ok(())
//! # }
//! ```
#![allow(clippy::result_large_err)]

pub mod config;
pub mod context;
pub mod device;
pub mod dtype;
pub mod error;
pub mod graph;
pub mod layout;
pub mod ops;
pub mod precision;
pub mod shape;
pub mod tensor;
pub mod verification;

pub use config::WinogradConfig;
pub use context::ExecutionContext;
pub use device::{ExecutionQueue, InlineQueue, Pending, StreamQueue};
pub use dtype::DType;
pub use error::{ErrorContext, Result, TensorError};
pub use graph::{Net, OpDefBuilder, OpKind, OperatorDef};
pub use layout::{to_flat, to_tiled, BufferKind, StorageLayout};
pub use ops::conv::direct::conv2d_direct;
pub use ops::conv::padding::{Padding, PaddingMode, ResolvedPadding};
pub use ops::conv::winograd::{
    inverse_transform, transform_filter, transform_input, winograd_conv2d, PreparedFilter,
    TileGeometry, TileGrid, WinogradConv2d,
};
pub use ops::matmul::batched_tile_matmul;
pub use precision::{f16, Element};
pub use shape::Shape;
pub use tensor::Tensor;
pub use verification::{compare, compare_with_policy, EquivalenceReport, Tolerance, TolerancePolicy};
