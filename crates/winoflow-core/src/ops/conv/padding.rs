//! Padding policy for stride-1 convolutions.
//!
//! A policy is either a named mode or explicit per-side amounts. Both forms
//! are reduced to [`ResolvedPadding`] by [`Padding::resolve`], the only place
//! padding amounts are derived.

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use crate::{Result, TensorError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum PaddingMode {
    /// No padding
    Valid,
    /// Pad so the output extent equals the input extent
    Same,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum Padding {
    Named(PaddingMode),
    /// `before` pads top and left, `after` pads bottom and right
    Explicit { before: usize, after: usize },
}

/// Concrete amounts added around the feature map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ResolvedPadding {
    pub top: usize,
    pub left: usize,
    pub bottom: usize,
    pub right: usize,
}

impl Padding {
    pub fn valid() -> Self {
        Padding::Named(PaddingMode::Valid)
    }

    pub fn same() -> Self {
        Padding::Named(PaddingMode::Same)
    }

    /// The same amount on every side
    pub fn symmetric(amount: usize) -> Self {
        Padding::Explicit {
            before: amount,
            after: amount,
        }
    }

    /// Split a total pad per axis, putting the odd pixel after.
    pub fn from_total(total: usize) -> Self {
        let before = total / 2;
        Padding::Explicit {
            before,
            after: total - before,
        }
    }

    /// Derive concrete amounts for a square `kernel` at stride 1.
    pub fn resolve(&self, kernel: usize) -> Result<ResolvedPadding> {
        let (before, after) = match *self {
            Padding::Named(PaddingMode::Valid) => (0, 0),
            Padding::Named(PaddingMode::Same) => {
                let total = kernel.saturating_sub(1);
                (total / 2, total - total / 2)
            }
            Padding::Explicit { before, after } => {
                if before.abs_diff(after) > 1 {
                    return Err(TensorError::invalid_argument(
                        "resolve_padding",
                        format!("explicit padding {before}/{after} differs by more than one"),
                    ));
                }
                (before, after)
            }
        };
        Ok(ResolvedPadding {
            top: before,
            left: before,
            bottom: after,
            right: after,
        })
    }
}

impl Default for Padding {
    fn default() -> Self {
        Padding::valid()
    }
}

impl std::fmt::Display for Padding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Padding::Named(PaddingMode::Valid) => write!(f, "VALID"),
            Padding::Named(PaddingMode::Same) => write!(f, "SAME"),
            Padding::Explicit { before, after } => write!(f, "EXPLICIT({before},{after})"),
        }
    }
}

impl ResolvedPadding {
    /// Height after padding
    pub fn padded_height(&self, height: usize) -> usize {
        height + self.top + self.bottom
    }

    /// Width after padding
    pub fn padded_width(&self, width: usize) -> usize {
        width + self.left + self.right
    }

    /// Stride-1 convolution output extent `(height, width)`.
    pub fn output_extent(&self, height: usize, width: usize, kernel: usize) -> Result<(usize, usize)> {
        let padded_h = self.padded_height(height);
        let padded_w = self.padded_width(width);
        if padded_h < kernel || padded_w < kernel {
            return Err(TensorError::invalid_shape(
                "conv_output_extent",
                format!("padded input {padded_h}x{padded_w} is smaller than the {kernel}x{kernel} kernel"),
                &[height, width],
            ));
        }
        Ok((padded_h - kernel + 1, padded_w - kernel + 1))
    }
}
