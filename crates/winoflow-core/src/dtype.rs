#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use crate::{Result, TensorError};

/// Numeric precision tag carried by tensors and operator definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum DType {
    Float16,  // Half precision IEEE 754-2008
    BFloat16, // Brain floating point
    Float32,
    Float64,
    Int32,
    Int8,
    UInt8,
}

impl DType {
    /// Precisions the convolution pipeline accepts.
    pub const SUPPORTED_PRECISIONS: [DType; 2] = [DType::Float32, DType::Float16];

    pub fn size(&self) -> usize {
        match self {
            DType::Float16 => 2,
            DType::BFloat16 => 2,
            DType::Float32 => 4,
            DType::Float64 => 8,
            DType::Int32 => 4,
            DType::Int8 => 1,
            DType::UInt8 => 1,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DType::Float16 => "float16",
            DType::BFloat16 => "bfloat16",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
            DType::Int32 => "int32",
            DType::Int8 => "int8",
            DType::UInt8 => "uint8",
        }
    }

    pub fn is_supported_precision(&self) -> bool {
        Self::SUPPORTED_PRECISIONS.contains(self)
    }

    /// Fails with `UnsupportedPrecision` unless the tag is in the supported set.
    pub fn ensure_supported(self, operation: &str) -> Result<Self> {
        if self.is_supported_precision() {
            Ok(self)
        } else {
            Err(TensorError::unsupported_precision(operation, self))
        }
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for DType {
    type Err = TensorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "float16" | "half" | "f16" => Ok(DType::Float16),
            "bfloat16" | "bf16" => Ok(DType::BFloat16),
            "float32" | "float" | "f32" => Ok(DType::Float32),
            "float64" | "double" | "f64" => Ok(DType::Float64),
            "int32" | "i32" => Ok(DType::Int32),
            "int8" | "i8" => Ok(DType::Int8),
            "uint8" | "u8" => Ok(DType::UInt8),
            other => Err(TensorError::invalid_argument(
                "parse_dtype",
                format!("unknown dtype '{other}'"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_set() {
        assert!(DType::Float32.ensure_supported("conv").is_ok());
        assert!(DType::Float16.ensure_supported("conv").is_ok());
        for dtype in [DType::BFloat16, DType::Float64, DType::Int32, DType::Int8, DType::UInt8] {
            assert!(matches!(
                dtype.ensure_supported("conv"),
                Err(TensorError::UnsupportedPrecision { .. })
            ));
        }
    }

    #[test]
    fn test_parse() {
        assert_eq!("half".parse::<DType>().unwrap(), DType::Float16);
        assert_eq!("Float32".parse::<DType>().unwrap(), DType::Float32);
        assert!("complex".parse::<DType>().is_err());
        assert_eq!(DType::Float16.size(), 2);
    }
}
