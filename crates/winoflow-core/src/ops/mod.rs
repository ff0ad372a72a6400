pub mod conv;
pub mod matmul;

pub use conv::{conv2d_direct, winograd_conv2d, Padding, PaddingMode};
pub use matmul::batched_tile_matmul;
