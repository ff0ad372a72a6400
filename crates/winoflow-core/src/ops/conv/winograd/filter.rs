//! Filter transform `U = G · g · Gᵗ`.

use rayon::prelude::*;
use tracing::debug;

use super::geometry::{sandwich, TileGeometry, KERNEL_SIZE};
use crate::precision::Element;
use crate::{Result, Tensor};

const OP: &str = "winograd_filter_transform";

/// Transform a `[out_channels, in_channels, 3, 3]` filter (flat or tiled) into
/// the coefficient-major `[P, out_channels, in_channels]` tensor.
///
/// The result depends only on the filter and the geometry, so it can be
/// reused for any number of inputs.
pub fn transform_filter<T: Element>(filter: &Tensor<T>, geometry: TileGeometry) -> Result<Tensor<f32>> {
    let filter = filter.flat()?;
    let shape = filter.shape();
    shape.ensure_rank(OP, 4)?;
    let (out_channels, in_channels) = (shape[0], shape[1]);
    shape.ensure_dims(OP, &[out_channels, in_channels, KERNEL_SIZE, KERNEL_SIZE])?;

    let t = geometry.input_tile();
    let coefficients = geometry.coefficients();
    let g = geometry.matrices().g;
    let data = filter.contiguous(OP)?;

    debug!(
        geometry = %geometry,
        out_channels,
        in_channels,
        "transforming filter"
    );

    // One row of `coefficients` values per (out, in) pair
    let mut pairs = vec![0.0f32; out_channels * in_channels * coefficients];
    pairs
        .par_chunks_mut(coefficients)
        .zip(data.par_chunks(KERNEL_SIZE * KERNEL_SIZE))
        .for_each(|(u, kernel)| {
            let mut slice = [0.0f32; KERNEL_SIZE * KERNEL_SIZE];
            for (dst, src) in slice.iter_mut().zip(kernel) {
                *dst = src.to_f32();
            }
            let mut scratch = vec![0.0f32; t * KERNEL_SIZE];
            sandwich(g, t, KERNEL_SIZE, &slice, &mut scratch, u);
        });

    // Move the coefficient axis outermost
    let plane = out_channels * in_channels;
    let mut transformed = vec![0.0f32; coefficients * plane];
    transformed
        .par_chunks_mut(plane.max(1))
        .enumerate()
        .for_each(|(p, dst)| {
            for (pair, value) in dst.iter_mut().enumerate() {
                *value = pairs[pair * coefficients + p];
            }
        });

    Tensor::from_vec(transformed, &[coefficients, out_channels, in_channels])
}
