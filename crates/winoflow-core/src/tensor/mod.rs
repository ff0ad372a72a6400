//! Tensor Module
//!
//! - **core**: tensor structure, layout tag and property accessors
//! - **creation**: constructors and precision casts

pub mod core;
pub mod creation;

pub use core::Tensor;
