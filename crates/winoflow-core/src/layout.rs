//! Layout conversion between flat tensors and packed tile images.
//!
//! A tiled tensor is an image of shape `[rows, cols, 4]`: every pixel carries
//! four lanes, and the packed channel axis is zero-padded to a multiple of
//! four. Each [`BufferKind`] fixes one index permutation. Conversions are pure
//! copies, so `to_flat(to_tiled(x, k), k) == x` holds exactly.

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use crate::precision::Element;
use crate::{Result, Shape, Tensor, TensorError};

/// Number of lanes in one image pixel
pub const PIXEL_LANES: usize = 4;

/// Storage reinterpretation applied when packing a flat tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum BufferKind {
    /// Feature map `[batch, height, width, channels]`
    InOutChannel,
    /// Filter `[out_channels, in_channels, kernel_h, kernel_w]`, packed as
    /// `[kernel_h, kernel_w, out_channels, in_channels]`
    Conv2dFilter,
    /// Bias vector `[channels]`
    Argument,
    /// Transformed filter `[coefficients, out_channels, in_channels]`
    WinogradFilter,
}

impl BufferKind {
    pub const ALL: [BufferKind; 4] = [
        BufferKind::InOutChannel,
        BufferKind::Conv2dFilter,
        BufferKind::Argument,
        BufferKind::WinogradFilter,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BufferKind::InOutChannel => "IN_OUT_CHANNEL",
            BufferKind::Conv2dFilter => "CONV2D_FILTER",
            BufferKind::Argument => "ARGUMENT",
            BufferKind::WinogradFilter => "WINOGRAD_FILTER",
        }
    }

    /// Rank of the flat form
    pub fn logical_rank(&self) -> usize {
        match self {
            BufferKind::InOutChannel | BufferKind::Conv2dFilter => 4,
            BufferKind::Argument => 1,
            BufferKind::WinogradFilter => 3,
        }
    }

    /// Image extents `[rows, cols, lanes]` for a flat shape of this kind.
    /// The caller guarantees `logical.len() == self.logical_rank()`.
    pub fn image_dims(&self, logical: &[usize]) -> [usize; 3] {
        match (self, logical) {
            (BufferKind::InOutChannel, &[n, h, w, c]) => [n * h, blocks(c) * w, PIXEL_LANES],
            (BufferKind::Conv2dFilter, &[o, i, kh, kw]) => [kh * kw * o, blocks(i), PIXEL_LANES],
            (BufferKind::Argument, &[c]) => [1, blocks(c), PIXEL_LANES],
            (BufferKind::WinogradFilter, &[p, o, i]) => [p * o, blocks(i), PIXEL_LANES],
            _ => [0, 0, PIXEL_LANES],
        }
    }

    fn check_logical(&self, operation: &str, logical: &Shape) -> Result<()> {
        if logical.rank() != self.logical_rank() {
            return Err(TensorError::shape_mismatch(
                operation,
                &format!("rank {} tensor for {}", self.logical_rank(), self.name()),
                &format!("shape {logical}"),
            ));
        }
        Ok(())
    }

    /// Visit every logical element as `(flat_offset, image_offset)`.
    fn for_each_mapping(&self, logical: &[usize], mut visit: impl FnMut(usize, usize)) {
        let [_, cols, _] = self.image_dims(logical);
        let pixel = |row: usize, col: usize, lane: usize| (row * cols + col) * PIXEL_LANES + lane;

        match (self, logical) {
            (BufferKind::InOutChannel, &[n, h, w, c]) => {
                let mut flat = 0;
                for ni in 0..n {
                    for hi in 0..h {
                        let row = ni * h + hi;
                        for wi in 0..w {
                            for ci in 0..c {
                                let col = (ci / PIXEL_LANES) * w + wi;
                                visit(flat, pixel(row, col, ci % PIXEL_LANES));
                                flat += 1;
                            }
                        }
                    }
                }
            }
            (BufferKind::Conv2dFilter, &[o, i, kh, kw]) => {
                let mut flat = 0;
                for oi in 0..o {
                    for ii in 0..i {
                        for khi in 0..kh {
                            for kwi in 0..kw {
                                let row = (khi * kw + kwi) * o + oi;
                                visit(flat, pixel(row, ii / PIXEL_LANES, ii % PIXEL_LANES));
                                flat += 1;
                            }
                        }
                    }
                }
            }
            (BufferKind::Argument, &[c]) => {
                for ci in 0..c {
                    visit(ci, pixel(0, ci / PIXEL_LANES, ci % PIXEL_LANES));
                }
            }
            (BufferKind::WinogradFilter, &[p, o, i]) => {
                let mut flat = 0;
                for row in 0..p * o {
                    for ii in 0..i {
                        visit(flat, pixel(row, ii / PIXEL_LANES, ii % PIXEL_LANES));
                        flat += 1;
                    }
                }
            }
            _ => {}
        }
    }
}

impl std::fmt::Display for BufferKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Storage layout tag carried by every tensor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StorageLayout {
    #[default]
    Flat,
    /// Packed image of `kind`; `logical` is the flat shape it unpacks to
    Tiled { kind: BufferKind, logical: Shape },
}

#[inline]
fn blocks(channels: usize) -> usize {
    channels.div_ceil(PIXEL_LANES)
}

/// Pack a flat tensor into the image layout of `kind`.
pub fn to_tiled<T: Element>(tensor: &Tensor<T>, kind: BufferKind) -> Result<Tensor<T>> {
    const OP: &str = "to_tiled";
    if let StorageLayout::Tiled { kind: current, .. } = tensor.layout() {
        return Err(TensorError::shape_mismatch(
            OP,
            "flat tensor",
            &format!("tensor already tiled as {current}"),
        ));
    }
    let logical = tensor.shape().clone();
    kind.check_logical(OP, &logical)?;

    let data = tensor.contiguous(OP)?;
    let image_dims = kind.image_dims(logical.dims());
    let mut image = vec![T::zero(); image_dims.iter().product()];
    kind.for_each_mapping(logical.dims(), |flat, pixel| image[pixel] = data[flat]);

    Ok(Tensor::from_vec(image, &image_dims)?.with_layout(StorageLayout::Tiled { kind, logical }))
}

/// Unpack an image of `kind` back to its flat tensor.
pub fn to_flat<T: Element>(tensor: &Tensor<T>, kind: BufferKind) -> Result<Tensor<T>> {
    const OP: &str = "to_flat";
    let logical = match tensor.layout() {
        StorageLayout::Tiled {
            kind: current,
            logical,
        } if *current == kind => logical.clone(),
        StorageLayout::Tiled { kind: current, .. } => {
            return Err(TensorError::shape_mismatch(
                OP,
                &format!("{kind} image"),
                &format!("{current} image"),
            ))
        }
        StorageLayout::Flat => {
            return Err(TensorError::shape_mismatch(
                OP,
                &format!("{kind} image"),
                "flat tensor",
            ))
        }
    };
    kind.check_logical(OP, &logical)?;
    tensor
        .shape()
        .ensure_dims(OP, &kind.image_dims(logical.dims()))?;

    let image = tensor.contiguous(OP)?;
    let mut data = vec![T::zero(); logical.size()];
    kind.for_each_mapping(logical.dims(), |flat, pixel| data[flat] = image[pixel]);

    Tensor::from_vec(data, logical.dims())
}
