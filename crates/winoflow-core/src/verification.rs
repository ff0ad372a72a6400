//! Element-wise equivalence checks against a reference result.
//!
//! An element passes when `|actual - expected| <= abs` or
//! `|actual - expected| <= rel * |expected|`. Every failing element is
//! recorded so a test run can report all of them at once.

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use crate::precision::Element;
use crate::{DType, Result, Tensor, TensorError};

/// Absolute and relative tolerance pair
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Tolerance {
    pub abs: f64,
    pub rel: f64,
}

impl Tolerance {
    pub const fn new(abs: f64, rel: f64) -> Self {
        Self { abs, rel }
    }

    pub fn accepts(&self, expected: f64, actual: f64) -> bool {
        let diff = (actual - expected).abs();
        diff <= self.abs || diff <= self.rel * expected.abs()
    }
}

/// Tolerance bands keyed by storage precision.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct TolerancePolicy {
    pub single: Tolerance,
    pub half: Tolerance,
}

impl Default for TolerancePolicy {
    fn default() -> Self {
        Self {
            single: Tolerance::new(1e-5, 1e-4),
            half: Tolerance::new(1e-2, 1e-2),
        }
    }
}

impl TolerancePolicy {
    pub fn for_dtype(&self, dtype: DType) -> Result<Tolerance> {
        match dtype {
            DType::Float32 => Ok(self.single),
            DType::Float16 => Ok(self.half),
            other => Err(TensorError::unsupported_precision("tolerance_policy", other)),
        }
    }
}

/// One element outside the tolerance band
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mismatch {
    pub index: usize,
    pub expected: f64,
    pub actual: f64,
}

/// Outcome of an element-wise comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct EquivalenceReport {
    pub tolerance: Tolerance,
    pub total: usize,
    pub mismatches: Vec<Mismatch>,
    pub max_abs_diff: f64,
    pub max_rel_diff: f64,
}

impl EquivalenceReport {
    pub fn passed(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// `Ok` when every element passed, otherwise `ToleranceExceeded`.
    pub fn into_result(self) -> Result<()> {
        if self.passed() {
            return Ok(());
        }
        let first = self.mismatches[0];
        Err(TensorError::ToleranceExceeded {
            operation: "compare".to_string(),
            failures: self.mismatches.len(),
            total: self.total,
            max_abs_diff: self.max_abs_diff,
            context: Some(
                crate::error::ErrorContext::new()
                    .with_metadata("first_index", first.index.to_string())
                    .with_metadata("first_expected", first.expected.to_string())
                    .with_metadata("first_actual", first.actual.to_string()),
            ),
        })
    }
}

/// Compare two tensors of the same logical shape element by element.
///
/// Tiled tensors are compared in their flat form. A shape disagreement is a
/// `ShapeMismatch`, not a report.
pub fn compare<T: Element, U: Element>(
    expected: &Tensor<T>,
    actual: &Tensor<U>,
    tolerance: Tolerance,
) -> Result<EquivalenceReport> {
    let expected = expected.flat()?;
    let actual = actual.flat()?;
    actual.shape().ensure_dims("compare", expected.dims())?;

    let mut report = EquivalenceReport {
        tolerance,
        total: expected.size(),
        mismatches: Vec::new(),
        max_abs_diff: 0.0,
        max_rel_diff: 0.0,
    };
    let pairs = expected
        .contiguous("compare")?
        .iter()
        .zip(actual.contiguous("compare")?);
    for (index, (e, a)) in pairs.enumerate() {
        let (e, a) = (f64::from(e.to_f32()), f64::from(a.to_f32()));
        let diff = (a - e).abs();
        report.max_abs_diff = report.max_abs_diff.max(diff);
        if e != 0.0 {
            report.max_rel_diff = report.max_rel_diff.max(diff / e.abs());
        }
        if !tolerance.accepts(e, a) {
            report.mismatches.push(Mismatch {
                index,
                expected: e,
                actual: a,
            });
        }
    }
    Ok(report)
}

/// Compare with the band the policy assigns to `U`'s precision.
pub fn compare_with_policy<T: Element, U: Element>(
    expected: &Tensor<T>,
    actual: &Tensor<U>,
    policy: &TolerancePolicy,
) -> Result<EquivalenceReport> {
    compare(expected, actual, policy.for_dtype(U::DTYPE)?)
}
