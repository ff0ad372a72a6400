//! Matrix Multiplication Operations
//!
//! - [`batch`] - coefficient-wise batched products for the Winograd pipeline

pub mod batch;

pub use batch::batched_tile_matmul;
