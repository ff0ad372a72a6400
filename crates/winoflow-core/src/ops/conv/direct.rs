//! Direct 2D convolution
//!
//! Reference implementation used as the equivalence oracle for the Winograd
//! pipeline. Input is NHWC, the filter is `[out_channels, in_channels, k, k]`
//! and the stride is 1. Accumulation runs in `f32` whatever the storage
//! precision.

use rayon::prelude::*;
use tracing::debug;

use super::padding::Padding;
use crate::precision::Element;
use crate::{Result, Tensor, TensorError};

const OP: &str = "conv2d_direct";

/// Performs direct 2D convolution (cross-correlation)
/// Input shape: [batch, height, width, in_channels] (NHWC format)
/// Filter shape: [out_channels, in_channels, kernel, kernel]
/// Output shape: [batch, out_height, out_width, out_channels]
pub fn conv2d_direct<T: Element>(
    input: &Tensor<T>,
    filter: &Tensor<T>,
    bias: Option<&Tensor<T>>,
    padding: &Padding,
) -> Result<Tensor<T>> {
    let input = input.flat()?;
    let filter = filter.flat()?;
    input.shape().ensure_rank(OP, 4)?;
    filter.shape().ensure_rank(OP, 4)?;

    let (batch_size, in_height, in_width, in_channels) = (
        input.dims()[0],
        input.dims()[1],
        input.dims()[2],
        input.dims()[3],
    );
    let (out_channels, filter_in_channels, kernel_height, kernel_width) = (
        filter.dims()[0],
        filter.dims()[1],
        filter.dims()[2],
        filter.dims()[3],
    );

    if in_channels != filter_in_channels {
        return Err(TensorError::shape_mismatch(
            OP,
            &format!("filter in_channels={in_channels}"),
            &format!("filter in_channels={filter_in_channels}"),
        ));
    }
    if kernel_height != kernel_width {
        return Err(TensorError::shape_mismatch(
            OP,
            "square kernel",
            &format!("{kernel_height}x{kernel_width} kernel"),
        ));
    }
    let kernel = kernel_height;

    let pads = padding.resolve(kernel)?;
    let (out_height, out_width) = pads.output_extent(in_height, in_width, kernel)?;

    let bias: Vec<f32> = match bias {
        Some(bias) => {
            let bias = bias.flat()?;
            bias.shape().ensure_dims(OP, &[out_channels])?;
            bias.contiguous(OP)?.iter().map(|b| b.to_f32()).collect()
        }
        None => vec![0.0; out_channels],
    };

    debug!(
        input = ?input.dims(),
        filter = ?filter.dims(),
        padding = %padding,
        out_height,
        out_width,
        "direct convolution"
    );

    let x: Vec<f32> = input.contiguous(OP)?.iter().map(|v| v.to_f32()).collect();

    // [O, I, K, K] -> [O, K, K, I] so the channel loop is contiguous
    let w_src = filter.contiguous(OP)?;
    let mut w = vec![0.0f32; w_src.len()];
    for oc in 0..out_channels {
        for ic in 0..in_channels {
            for kh in 0..kernel {
                for kw in 0..kernel {
                    w[((oc * kernel + kh) * kernel + kw) * in_channels + ic] =
                        w_src[((oc * in_channels + ic) * kernel + kh) * kernel + kw].to_f32();
                }
            }
        }
    }

    let row_len = out_width * out_channels;
    let mut output = vec![T::zero(); batch_size * out_height * row_len];
    output
        .par_chunks_mut(row_len.max(1))
        .enumerate()
        .for_each(|(row, dst)| {
            let (b, oh) = (row / out_height, row % out_height);
            for ow in 0..out_width {
                for oc in 0..out_channels {
                    let mut sum = bias[oc];
                    for kh in 0..kernel {
                        // Padded coordinates back to input coordinates
                        let Some(ih) = (oh + kh).checked_sub(pads.top) else {
                            continue;
                        };
                        if ih >= in_height {
                            continue;
                        }
                        for kw in 0..kernel {
                            let Some(iw) = (ow + kw).checked_sub(pads.left) else {
                                continue;
                            };
                            if iw >= in_width {
                                continue;
                            }
                            let xs = &x[((b * in_height + ih) * in_width + iw) * in_channels..]
                                [..in_channels];
                            let ws = &w[((oc * kernel + kh) * kernel + kw) * in_channels..]
                                [..in_channels];
                            sum += xs.iter().zip(ws).map(|(xv, wv)| xv * wv).sum::<f32>();
                        }
                    }
                    dst[ow * out_channels + oc] = T::from_f32(sum);
                }
            }
        });

    Tensor::from_vec(output, &[batch_size, out_height, out_width, out_channels])
}
