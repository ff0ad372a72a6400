use crate::DType;
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised by the convolution pipeline and its test boundary.
///
/// Every variant except [`TensorError::ToleranceExceeded`] is fatal for the
/// invocation that produced it: no partial output is ever returned.
#[derive(Error, Debug, Clone)]
pub enum TensorError {
    #[error("Shape mismatch in operation '{operation}': expected {expected}, got {got}")]
    ShapeMismatch {
        operation: String,
        expected: String,
        got: String,
        context: Option<ErrorContext>,
    },

    #[error("Invalid shape in operation '{operation}': {reason}")]
    InvalidShape {
        operation: String,
        reason: String,
        shape: Option<Vec<usize>>,
        context: Option<ErrorContext>,
    },

    #[error("Invalid argument in operation '{operation}': {reason}")]
    InvalidArgument {
        operation: String,
        reason: String,
        context: Option<ErrorContext>,
    },

    #[error("Precision {dtype} not supported by operation '{operation}' (supported: {supported:?})")]
    UnsupportedPrecision {
        operation: String,
        dtype: DType,
        supported: Vec<DType>,
        context: Option<ErrorContext>,
    },

    #[error(
        "Padded extent {padded_height}x{padded_width} in operation '{operation}' is smaller than the {minimum}x{minimum} tile footprint"
    )]
    PaddingUnderflow {
        operation: String,
        padded_height: usize,
        padded_width: usize,
        minimum: usize,
        context: Option<ErrorContext>,
    },

    #[error(
        "Tolerance exceeded in '{operation}': {failures} of {total} elements differ (max abs diff {max_abs_diff:e})"
    )]
    ToleranceExceeded {
        operation: String,
        failures: usize,
        total: usize,
        max_abs_diff: f64,
        context: Option<ErrorContext>,
    },

    #[error("Compute error in operation '{operation}': {details}")]
    ComputeError {
        operation: String,
        details: String,
        context: Option<ErrorContext>,
    },
}

/// Additional context information for errors
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Input tensor shapes
    pub input_shapes: Vec<Vec<usize>>,
    /// Output shape (if applicable)
    pub output_shape: Option<Vec<usize>>,
    /// Additional metadata
    pub metadata: HashMap<String, String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add input tensor information
    pub fn with_input_shape(mut self, shape: &[usize]) -> Self {
        self.input_shapes.push(shape.to_vec());
        self
    }

    /// Add output shape information
    pub fn with_output_shape(mut self, shape: &[usize]) -> Self {
        self.output_shape = Some(shape.to_vec());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

impl TensorError {
    /// Create a shape mismatch error
    pub fn shape_mismatch(operation: &str, expected: &str, got: &str) -> Self {
        Self::ShapeMismatch {
            operation: operation.to_string(),
            expected: expected.to_string(),
            got: got.to_string(),
            context: None,
        }
    }

    /// Create an invalid shape error carrying the offending shape
    pub fn invalid_shape(operation: &str, reason: impl Into<String>, shape: &[usize]) -> Self {
        Self::InvalidShape {
            operation: operation.to_string(),
            reason: reason.into(),
            shape: Some(shape.to_vec()),
            context: None,
        }
    }

    pub fn invalid_argument(operation: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            operation: operation.to_string(),
            reason: reason.into(),
            context: None,
        }
    }

    pub fn unsupported_precision(operation: &str, dtype: DType) -> Self {
        Self::UnsupportedPrecision {
            operation: operation.to_string(),
            dtype,
            supported: DType::SUPPORTED_PRECISIONS.to_vec(),
            context: None,
        }
    }

    pub fn padding_underflow(
        operation: &str,
        padded_height: usize,
        padded_width: usize,
        minimum: usize,
    ) -> Self {
        Self::PaddingUnderflow {
            operation: operation.to_string(),
            padded_height,
            padded_width,
            minimum,
            context: None,
        }
    }

    pub fn compute_error(operation: &str, details: impl Into<String>) -> Self {
        Self::ComputeError {
            operation: operation.to_string(),
            details: details.into(),
            context: None,
        }
    }

    /// Add context to an existing error
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        match &mut self {
            Self::ShapeMismatch { context: ctx, .. }
            | Self::InvalidShape { context: ctx, .. }
            | Self::InvalidArgument { context: ctx, .. }
            | Self::UnsupportedPrecision { context: ctx, .. }
            | Self::PaddingUnderflow { context: ctx, .. }
            | Self::ToleranceExceeded { context: ctx, .. }
            | Self::ComputeError { context: ctx, .. } => *ctx = Some(context),
        }
        self
    }

    /// Get the operation name for this error
    pub fn operation(&self) -> &str {
        match self {
            Self::ShapeMismatch { operation, .. }
            | Self::InvalidShape { operation, .. }
            | Self::InvalidArgument { operation, .. }
            | Self::UnsupportedPrecision { operation, .. }
            | Self::PaddingUnderflow { operation, .. }
            | Self::ToleranceExceeded { operation, .. }
            | Self::ComputeError { operation, .. } => operation,
        }
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::ShapeMismatch { context, .. }
            | Self::InvalidShape { context, .. }
            | Self::InvalidArgument { context, .. }
            | Self::UnsupportedPrecision { context, .. }
            | Self::PaddingUnderflow { context, .. }
            | Self::ToleranceExceeded { context, .. }
            | Self::ComputeError { context, .. } => context.as_ref(),
        }
    }

    /// Whether the error aborts the invocation. Equivalence reports are
    /// informational so a test run can enumerate every failing case.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::ToleranceExceeded { .. })
    }
}

pub type Result<T> = std::result::Result<T, TensorError>;

/// Convert from ndarray::ShapeError to TensorError
impl From<ndarray::ShapeError> for TensorError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::InvalidShape {
            operation: "tensor_creation".to_string(),
            reason: format!("Shape error: {err}"),
            shape: None,
            context: None,
        }
    }
}
