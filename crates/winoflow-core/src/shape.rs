#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};
use std::ops::Index;

use crate::{Result, TensorError};

/// Ordered sequence of non-negative extents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    pub fn new(dims: Vec<usize>) -> Self {
        Self { dims }
    }

    pub fn from_slice(dims: &[usize]) -> Self {
        Self {
            dims: dims.to_vec(),
        }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Total element count (product of extents)
    pub fn size(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Fails with `ShapeMismatch` unless the shape has exactly `rank` axes.
    pub fn ensure_rank(&self, operation: &str, rank: usize) -> Result<()> {
        if self.rank() == rank {
            Ok(())
        } else {
            Err(TensorError::shape_mismatch(
                operation,
                &format!("rank {rank}"),
                &format!("rank {} (shape {self})", self.rank()),
            ))
        }
    }

    /// Fails with `ShapeMismatch` unless the shape equals `expected`.
    pub fn ensure_dims(&self, operation: &str, expected: &[usize]) -> Result<()> {
        if self.dims == expected {
            Ok(())
        } else {
            Err(TensorError::shape_mismatch(
                operation,
                &format!("{}", Shape::from_slice(expected)),
                &format!("{self}"),
            ))
        }
    }

    pub fn to_vec(&self) -> Vec<usize> {
        self.dims.clone()
    }
}

impl Index<usize> for Shape {
    type Output = usize;

    fn index(&self, index: usize) -> &Self::Output {
        &self.dims[index]
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Self::from_slice(dims)
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, dim) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{dim}")?;
        }
        write!(f, "]")
    }
}
