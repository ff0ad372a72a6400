//! Tensor Creation and Construction

use super::core::Tensor;
use crate::layout::StorageLayout;
use crate::precision::Element;
use crate::{Result, Shape, TensorError};
use ndarray::{ArrayD, IxDyn};

impl<T: Clone> Tensor<T> {
    /// Create a flat tensor filled with zeros
    pub fn zeros(shape: &[usize]) -> Self
    where
        T: num_traits::Zero,
    {
        Self {
            storage: ArrayD::zeros(IxDyn(shape)),
            shape: Shape::from_slice(shape),
            layout: StorageLayout::Flat,
        }
    }

    /// Create a flat tensor from a row-major data vector
    pub fn from_vec(data: Vec<T>, shape: &[usize]) -> Result<Self> {
        let total_elements: usize = shape.iter().product();
        if data.len() != total_elements {
            return Err(TensorError::invalid_shape(
                "from_vec",
                format!(
                    "data length {} does not match shape (expected {total_elements} elements)",
                    data.len()
                ),
                shape,
            ));
        }

        let storage = ArrayD::from_shape_vec(IxDyn(shape), data)?;
        Ok(Self {
            storage,
            shape: Shape::from_slice(shape),
            layout: StorageLayout::Flat,
        })
    }

    /// Create a flat tensor from an existing ndarray
    pub fn from_array(array: ArrayD<T>) -> Self {
        let storage = if array.is_standard_layout() {
            array
        } else {
            array.as_standard_layout().into_owned()
        };
        let shape = Shape::from_slice(storage.shape());
        Self {
            storage,
            shape,
            layout: StorageLayout::Flat,
        }
    }
}

impl<T: Element> Tensor<T> {
    /// Convert to another storage precision, keeping shape and layout.
    pub fn cast<U: Element>(&self) -> Tensor<U> {
        Tensor {
            storage: self.storage.mapv(|v| U::from_f32(v.to_f32())),
            shape: self.shape.clone(),
            layout: self.layout.clone(),
        }
    }
}
