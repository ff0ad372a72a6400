//! Winograd `F(m×m, 3×3)` convolution
//!
//! - [`geometry`]: tile sizes and the constant `G`, `Bᵗ`, `Aᵗ` tables
//! - [`filter`]: `U = G·g·Gᵗ` into `[P, out_channels, in_channels]`
//! - [`input`]: tiling, padding and `V = Bᵗ·d·B` into `[P, channels, tiles]`
//! - [`inverse`]: `Y = Aᵗ·M·A`, bias and cropping back to NHWC
//! - [`pipeline`]: the four stages issued to an execution queue

pub mod filter;
pub mod geometry;
pub mod input;
pub mod inverse;
pub mod pipeline;

pub use filter::transform_filter;
pub use geometry::{TileGeometry, TransformMatrices, KERNEL_SIZE};
pub use input::{transform_input, TileGrid};
pub use inverse::inverse_transform;
pub use pipeline::{winograd_conv2d, PreparedFilter, WinogradConv2d};
