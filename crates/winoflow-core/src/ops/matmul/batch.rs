//! Batch Matrix Multiplication Operations
//!
//! One independent product per transform-domain coefficient position. The
//! leading axis is never reduced over.

use ndarray::linalg::general_mat_mul;
use ndarray::{ArrayView2, ArrayViewMut2};
use rayon::prelude::*;
use tracing::debug;

use crate::{Result, Tensor, TensorError};

const OP: &str = "batched_tile_matmul";

/// `out[p] = lhs[p] · rhs[p]` for `lhs: [P, M, K]` and `rhs: [P, K, N]`.
///
/// Both operands may be flat or tiled; the result is a flat `[P, M, N]`.
pub fn batched_tile_matmul(lhs: &Tensor<f32>, rhs: &Tensor<f32>) -> Result<Tensor<f32>> {
    let lhs = lhs.flat()?;
    let rhs = rhs.flat()?;
    lhs.shape().ensure_rank(OP, 3)?;
    rhs.shape().ensure_rank(OP, 3)?;

    let (batches, rows, inner) = (lhs.dims()[0], lhs.dims()[1], lhs.dims()[2]);
    let cols = rhs.dims()[2];
    if rhs.dims()[0] != batches || rhs.dims()[1] != inner {
        return Err(TensorError::shape_mismatch(
            OP,
            &format!("rhs [{batches}, {inner}, N]"),
            &format!("rhs {}", rhs.shape()),
        ));
    }

    debug!(batches, rows, inner, cols, "batched matmul");

    let a = lhs.contiguous(OP)?;
    let b = rhs.contiguous(OP)?;
    let mut out = vec![0.0f32; batches * rows * cols];
    if rows * cols > 0 {
        out.par_chunks_mut(rows * cols)
            .enumerate()
            .try_for_each(|(p, dst)| -> Result<()> {
                let a = ArrayView2::from_shape((rows, inner), &a[p * rows * inner..(p + 1) * rows * inner])?;
                let b = ArrayView2::from_shape((inner, cols), &b[p * inner * cols..(p + 1) * inner * cols])?;
                let mut c = ArrayViewMut2::from_shape((rows, cols), dst)?;
                general_mat_mul(1.0, &a, &b, 0.0, &mut c);
                Ok(())
            })?;
    }

    Tensor::from_vec(out, &[batches, rows, cols])
}
