//! Core Tensor Structure and Properties
//!
//! This module contains the tensor structure, its storage layout tag and the
//! basic property accessors every pipeline stage relies on.

use crate::layout::{self, StorageLayout};
use crate::precision::Element;
use crate::{DType, Result, Shape, TensorError};
use ndarray::ArrayD;
use std::borrow::Cow;

/// Dense host tensor in standard (row-major) layout.
///
/// The `layout` tag records whether the storage is the flat logical form or a
/// packed tile image produced by the layout converter.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T> {
    pub(in crate::tensor) storage: ArrayD<T>,
    pub(in crate::tensor) shape: Shape,
    pub(in crate::tensor) layout: StorageLayout,
}

impl<T> Tensor<T> {
    /// Shape of the stored array (the image shape for tiled tensors)
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub fn is_flat(&self) -> bool {
        matches!(self.layout, StorageLayout::Flat)
    }

    /// Shape of the flat form, whatever the storage layout
    pub fn logical_shape(&self) -> &Shape {
        match &self.layout {
            StorageLayout::Flat => &self.shape,
            StorageLayout::Tiled { logical, .. } => logical,
        }
    }

    /// Get the data type of the tensor
    pub fn dtype(&self) -> DType
    where
        T: Element,
    {
        T::DTYPE
    }

    pub fn array(&self) -> &ArrayD<T> {
        &self.storage
    }

    pub fn into_array(self) -> ArrayD<T> {
        self.storage
    }

    /// Get the underlying data as a slice
    pub fn as_slice(&self) -> Option<&[T]> {
        self.storage.as_slice()
    }

    /// Contiguous element slice, or an error naming `operation`.
    pub fn contiguous(&self, operation: &str) -> Result<&[T]> {
        self.storage.as_slice().ok_or_else(|| {
            TensorError::invalid_shape(operation, "tensor storage is not contiguous", self.dims())
        })
    }

    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.storage.iter().cloned().collect()
    }

    pub fn size(&self) -> usize {
        self.shape.size()
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    pub fn is_empty(&self) -> bool {
        self.shape.size() == 0
    }

    /// Get memory usage in bytes
    pub fn memory_usage(&self) -> usize {
        self.shape.size() * std::mem::size_of::<T>()
    }

    pub(crate) fn with_layout(mut self, layout: StorageLayout) -> Self {
        self.layout = layout;
        self
    }
}

impl<T: Element> Tensor<T> {
    /// Raw bytes of the storage, as handed to an accelerator upload.
    pub fn as_bytes(&self) -> Result<&[u8]> {
        Ok(bytemuck::cast_slice(self.contiguous("as_bytes")?))
    }

    /// Flat logical form. Tiled storage is unpacked using its own tag.
    pub fn flat(&self) -> Result<Cow<'_, Tensor<T>>> {
        match &self.layout {
            StorageLayout::Flat => Ok(Cow::Borrowed(self)),
            StorageLayout::Tiled { kind, .. } => Ok(Cow::Owned(layout::to_flat(self, *kind)?)),
        }
    }
}
