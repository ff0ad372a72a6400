//! Storage element types
//!
//! Tensors store either IEEE single precision or IEEE 754-2008 half precision
//! values. Arithmetic always runs in `f32`; half precision only affects how
//! values are stored between stages.

pub use half::f16;

use crate::DType;

/// Floating point element type that can be stored in a pipeline tensor.
pub trait Element:
    Copy
    + Clone
    + Default
    + PartialEq
    + std::fmt::Debug
    + num_traits::Zero
    + bytemuck::Pod
    + Send
    + Sync
    + 'static
{
    /// Precision tag of this element type
    const DTYPE: DType;

    /// Widen to the working precision
    fn to_f32(self) -> f32;

    /// Round from the working precision
    fn from_f32(value: f32) -> Self;
}

impl Element for f32 {
    const DTYPE: DType = DType::Float32;

    #[inline]
    fn to_f32(self) -> f32 {
        self
    }

    #[inline]
    fn from_f32(value: f32) -> Self {
        value
    }
}

impl Element for f16 {
    const DTYPE: DType = DType::Float16;

    #[inline]
    fn to_f32(self) -> f32 {
        f16::to_f32(self)
    }

    #[inline]
    fn from_f32(value: f32) -> Self {
        f16::from_f32(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f16_conversion() {
        let value = 3.14159f32;
        let converted_back = <f16 as Element>::from_f32(value).to_f32();

        // f16 has limited precision, so allow some error
        assert!((converted_back - value).abs() < 0.01);
    }

    #[test]
    fn test_f32_is_identity() {
        assert_eq!(<f32 as Element>::from_f32(0.1).to_f32(), 0.1);
        assert_ne!(<f16 as Element>::from_f32(0.1).to_f32(), 0.1);
    }

    #[test]
    fn test_dtype_mapping() {
        assert_eq!(<f16 as Element>::DTYPE, DType::Float16);
        assert_eq!(<f32 as Element>::DTYPE, DType::Float32);
    }
}
