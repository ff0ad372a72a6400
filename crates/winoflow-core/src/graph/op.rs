//! Operator definitions
//!
//! Operators are a closed set resolved when the definition is built, so
//! arity and precision are checked before anything is issued.

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use crate::layout::BufferKind;
use crate::ops::conv::padding::Padding;
use crate::{DType, Result, TensorError};

/// Operator kinds understood by [`Net`](super::Net)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum OpKind {
    /// Pack a flat tensor into the image layout of the given kind
    BufferToImage(BufferKind),
    /// Unpack an image back to its flat tensor
    ImageToBuffer(BufferKind),
    /// Direct convolution: input, filter and an optional bias
    Conv2D { padding: Padding },
    WinogradFilterTransform,
    WinogradInputTransform { padding: Padding },
    /// Coefficient-wise batched product of two transform-domain tensors
    MatMul,
    /// Transform-domain product and an optional bias back to NHWC
    WinogradInverseTransform {
        batch: usize,
        height: usize,
        width: usize,
    },
}

impl OpKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            OpKind::BufferToImage(_) => "BufferToImage",
            OpKind::ImageToBuffer(_) => "ImageToBuffer",
            OpKind::Conv2D { .. } => "Conv2D",
            OpKind::WinogradFilterTransform => "WinogradFilterTransform",
            OpKind::WinogradInputTransform { .. } => "WinogradInputTransform",
            OpKind::MatMul => "MatMul",
            OpKind::WinogradInverseTransform { .. } => "WinogradInverseTransform",
        }
    }

    /// Accepted input counts, inclusive
    fn input_arity(&self) -> (usize, usize) {
        match self {
            OpKind::Conv2D { .. } => (2, 3),
            OpKind::MatMul => (2, 2),
            OpKind::WinogradInverseTransform { .. } => (1, 2),
            _ => (1, 1),
        }
    }
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// A validated operator bound to named workspace tensors.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct OperatorDef {
    pub name: String,
    pub kind: OpKind,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub dtype: DType,
}

impl OperatorDef {
    /// Fails unless the input count fits the kind and there is one output.
    pub(crate) fn check_arity(&self) -> Result<()> {
        let (min, max) = self.kind.input_arity();
        if !(min..=max).contains(&self.inputs.len()) {
            return Err(TensorError::invalid_argument(
                &self.name,
                format!(
                    "{} takes {min}..={max} inputs, got {}",
                    self.kind,
                    self.inputs.len()
                ),
            ));
        }
        if self.outputs.len() != 1 {
            return Err(TensorError::invalid_argument(
                &self.name,
                format!("{} has one output, got {}", self.kind, self.outputs.len()),
            ));
        }
        Ok(())
    }
}

/// Builder for [`OperatorDef`].
#[derive(Debug, Clone)]
pub struct OpDefBuilder {
    name: String,
    kind: OpKind,
    inputs: Vec<String>,
    outputs: Vec<String>,
    dtype: DType,
}

impl OpDefBuilder {
    pub fn new(name: impl Into<String>, kind: OpKind) -> Self {
        Self {
            name: name.into(),
            kind,
            inputs: Vec::new(),
            outputs: Vec::new(),
            dtype: DType::Float32,
        }
    }

    pub fn input(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(name.into());
        self
    }

    pub fn output(mut self, name: impl Into<String>) -> Self {
        self.outputs.push(name.into());
        self
    }

    /// Storage precision of the operator's tensors
    pub fn dtype(mut self, dtype: DType) -> Self {
        self.dtype = dtype;
        self
    }

    /// Check arity and precision and produce the definition.
    pub fn finalize(self) -> Result<OperatorDef> {
        let dtype = self.dtype.ensure_supported(&self.name)?;
        let op = OperatorDef {
            name: self.name,
            kind: self.kind,
            inputs: self.inputs,
            outputs: self.outputs,
            dtype,
        };
        op.check_arity()?;
        Ok(op)
    }
}
