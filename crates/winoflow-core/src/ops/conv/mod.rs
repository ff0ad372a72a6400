//! Convolution operations
//!
//! - Direct 2D convolution, the reference every fast path is checked against
//! - Padding policies shared by all convolution paths
//! - The Winograd 3×3 pipeline

pub mod direct;
pub mod padding;
pub mod winograd;

pub use direct::conv2d_direct;
pub use padding::{Padding, PaddingMode, ResolvedPadding};
pub use winograd::{winograd_conv2d, TileGeometry, WinogradConv2d};
