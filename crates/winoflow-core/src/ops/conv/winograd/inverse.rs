//! Inverse transform `Y = Aᵗ · M · A`, bias and tile reassembly.

use rayon::prelude::*;
use tracing::debug;

use super::geometry::{sandwich, TileGeometry};
use crate::precision::Element;
use crate::{Result, Tensor, TensorError};

const OP: &str = "winograd_inverse_transform";

/// Reduce a `[P, out_channels, tiles]` product back to an NHWC map of
/// `[batch, height, width, out_channels]`.
///
/// `height` and `width` are the true convolution output extents; tile
/// overhang beyond them is dropped. Bias is added once per output element.
pub fn inverse_transform<T: Element>(
    gemm: &Tensor<f32>,
    bias: &Tensor<T>,
    batch: usize,
    height: usize,
    width: usize,
    geometry: TileGeometry,
) -> Result<Tensor<T>> {
    let gemm = gemm.flat()?;
    let shape = gemm.shape();
    shape.ensure_rank(OP, 3)?;
    let (coefficients, out_channels, tiles) = (shape[0], shape[1], shape[2]);

    let m = geometry.output_tile();
    let (tiles_h, tiles_w) = (geometry.tiles_for(height), geometry.tiles_for(width));
    shape.ensure_dims(
        OP,
        &[geometry.coefficients(), out_channels, batch * tiles_h * tiles_w],
    )?;

    let bias = bias.flat()?;
    bias.shape().ensure_dims(OP, &[out_channels]).map_err(|_| {
        TensorError::shape_mismatch(
            OP,
            &format!("bias shape [{out_channels}]"),
            &format!("bias shape {}", bias.shape()),
        )
    })?;
    let bias: Vec<f32> = bias.contiguous(OP)?.iter().map(|b| b.to_f32()).collect();

    debug!(
        geometry = %geometry,
        batch,
        height,
        width,
        out_channels,
        tiles,
        "inverse transforming"
    );

    let data = gemm.contiguous(OP)?;
    let at = geometry.matrices().at;
    let t = geometry.input_tile();
    let block = m * m;

    // Per tile, `out_channels` spatial blocks of `m×m`
    let mut per_tile = vec![0.0f32; tiles * out_channels * block];
    per_tile
        .par_chunks_mut((out_channels * block).max(1))
        .enumerate()
        .for_each(|(tile, out)| {
            let mut gathered = vec![0.0f32; coefficients];
            let mut scratch = vec![0.0f32; m * t];
            for o in 0..out_channels {
                for (p, value) in gathered.iter_mut().enumerate() {
                    *value = data[(p * out_channels + o) * tiles + tile];
                }
                sandwich(at, m, t, &gathered, &mut scratch, &mut out[o * block..(o + 1) * block]);
            }
        });

    // Scatter rows of the output, cropping overhang
    let row_len = width * out_channels;
    let mut output = vec![T::zero(); batch * height * row_len];
    output
        .par_chunks_mut(row_len.max(1))
        .enumerate()
        .for_each(|(row, dst)| {
            let (n, h) = (row / height, row % height);
            let (th, i) = (h / m, h % m);
            for w in 0..width {
                let (tw, j) = (w / m, w % m);
                let tile = (n * tiles_h + th) * tiles_w + tw;
                for o in 0..out_channels {
                    let y = per_tile[(tile * out_channels + o) * block + i * m + j];
                    dst[w * out_channels + o] = T::from_f32(y + bias[o]);
                }
            }
        });

    Tensor::from_vec(output, &[batch, height, width, out_channels])
}
