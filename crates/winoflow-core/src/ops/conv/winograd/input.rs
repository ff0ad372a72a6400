//! Input transform `V = Bᵗ · d · B` over overlapping tiles.
//!
//! Tiles advance by the output tile edge `m` while each one reads an
//! `(m+2)×(m+2)` window, so neighbouring windows share two rows or columns.
//! Reads outside the real feature map (padding, or tile overhang past the
//! padded edge) yield zero. Interior and border tiles take the same path.

use rayon::prelude::*;
use tracing::debug;

use super::geometry::{sandwich, TileGeometry, KERNEL_SIZE};
use crate::ops::conv::padding::{Padding, ResolvedPadding};
use crate::precision::Element;
use crate::{Result, Tensor, TensorError};

const OP: &str = "winograd_input_transform";

/// Spatial bookkeeping shared by the input and inverse transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    pub geometry: TileGeometry,
    pub batch: usize,
    pub channels: usize,
    pub input_height: usize,
    pub input_width: usize,
    pub padding: ResolvedPadding,
    pub padded_height: usize,
    pub padded_width: usize,
    pub output_height: usize,
    pub output_width: usize,
    pub tiles_h: usize,
    pub tiles_w: usize,
}

impl TileGrid {
    /// Plan the tiling of an NHWC feature map.
    pub fn plan(
        input_dims: &[usize],
        padding: &Padding,
        geometry: TileGeometry,
    ) -> Result<Self> {
        let &[batch, input_height, input_width, channels] = input_dims else {
            return Err(TensorError::shape_mismatch(
                OP,
                "rank 4 NHWC feature map",
                &format!("shape {input_dims:?}"),
            ));
        };
        let padding = padding.resolve(KERNEL_SIZE)?;
        let padded_height = padding.padded_height(input_height);
        let padded_width = padding.padded_width(input_width);

        let minimum = geometry.input_tile();
        if padded_height < minimum || padded_width < minimum {
            return Err(TensorError::padding_underflow(
                OP,
                padded_height,
                padded_width,
                minimum,
            ));
        }

        let (output_height, output_width) =
            padding.output_extent(input_height, input_width, KERNEL_SIZE)?;
        Ok(Self {
            geometry,
            batch,
            channels,
            input_height,
            input_width,
            padding,
            padded_height,
            padded_width,
            output_height,
            output_width,
            tiles_h: geometry.tiles_for(output_height),
            tiles_w: geometry.tiles_for(output_width),
        })
    }

    pub fn tiles_per_image(&self) -> usize {
        self.tiles_h * self.tiles_w
    }

    /// Tiles across the whole batch
    pub fn total_tiles(&self) -> usize {
        self.batch * self.tiles_per_image()
    }

    /// `(batch, tile_row, tile_col)` of a flat tile index
    pub fn locate(&self, tile: usize) -> (usize, usize, usize) {
        let per_image = self.tiles_per_image();
        let within = tile % per_image;
        (tile / per_image, within / self.tiles_w, within % self.tiles_w)
    }
}

/// Transform an NHWC feature map (flat or tiled) into `[P, channels, tiles]`.
pub fn transform_input<T: Element>(
    input: &Tensor<T>,
    padding: &Padding,
    geometry: TileGeometry,
) -> Result<(Tensor<f32>, TileGrid)> {
    let input = input.flat()?;
    let grid = TileGrid::plan(input.dims(), padding, geometry)?;
    let data = input.contiguous(OP)?;

    let TileGrid {
        channels,
        input_height,
        input_width,
        ..
    } = grid;
    let (m, t) = (geometry.output_tile(), geometry.input_tile());
    let coefficients = geometry.coefficients();
    let bt = geometry.matrices().bt;
    let tiles = grid.total_tiles();

    debug!(
        geometry = %geometry,
        input = ?input.dims(),
        padded = ?(grid.padded_height, grid.padded_width),
        tiles_h = grid.tiles_h,
        tiles_w = grid.tiles_w,
        "transforming input"
    );

    // Per tile, `channels` rows of `coefficients` values
    let mut per_tile = vec![0.0f32; tiles * channels * coefficients];
    per_tile
        .par_chunks_mut((channels * coefficients).max(1))
        .enumerate()
        .for_each(|(tile, out)| {
            let (n, th, tw) = grid.locate(tile);
            let top = (th * m) as isize - grid.padding.top as isize;
            let left = (tw * m) as isize - grid.padding.left as isize;

            let mut window = vec![0.0f32; t * t];
            let mut scratch = vec![0.0f32; t * t];
            for c in 0..channels {
                for i in 0..t {
                    let h = top + i as isize;
                    for j in 0..t {
                        let w = left + j as isize;
                        window[i * t + j] = if h >= 0
                            && (h as usize) < input_height
                            && w >= 0
                            && (w as usize) < input_width
                        {
                            let offset = ((n * input_height + h as usize) * input_width
                                + w as usize)
                                * channels
                                + c;
                            data[offset].to_f32()
                        } else {
                            0.0
                        };
                    }
                }
                let v = &mut out[c * coefficients..(c + 1) * coefficients];
                sandwich(bt, t, t, &window, &mut scratch, v);
            }
        });

    // [tiles, C, P] -> [P, C, tiles]
    let mut transformed = vec![0.0f32; coefficients * channels * tiles];
    transformed
        .par_chunks_mut(tiles.max(1))
        .enumerate()
        .for_each(|(row, dst)| {
            let (p, c) = (row / channels, row % channels);
            for (tile, value) in dst.iter_mut().enumerate() {
                *value = per_tile[(tile * channels + c) * coefficients + p];
            }
        });

    Ok((
        Tensor::from_vec(transformed, &[coefficients, channels, tiles])?,
        grid,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{to_tiled, BufferKind};

    #[test]
    fn test_grid_counts_tiles_from_output_extent() {
        let grid = TileGrid::plan(&[1, 32, 32, 3], &Padding::valid(), TileGeometry::F4x4).unwrap();
        assert_eq!((grid.output_height, grid.output_width), (30, 30));
        assert_eq!((grid.tiles_h, grid.tiles_w), (8, 8));

        let grid = TileGrid::plan(&[5, 61, 67, 3], &Padding::same(), TileGeometry::F4x4).unwrap();
        assert_eq!((grid.padded_height, grid.padded_width), (63, 69));
        assert_eq!((grid.output_height, grid.output_width), (61, 67));
        assert_eq!((grid.tiles_h, grid.tiles_w), (16, 17));
        assert_eq!(grid.total_tiles(), 5 * 16 * 17);
        assert_eq!(grid.locate(16 * 17 + 18), (1, 1, 1));
    }

    #[test]
    fn test_padding_underflow() {
        let err = TileGrid::plan(&[1, 5, 9, 1], &Padding::valid(), TileGeometry::F4x4).unwrap_err();
        assert!(matches!(
            err,
            TensorError::PaddingUnderflow { padded_height: 5, padded_width: 9, minimum: 6, .. }
        ));
        // One pixel of padding per side is enough
        assert!(TileGrid::plan(&[1, 5, 9, 1], &Padding::same(), TileGeometry::F4x4).is_ok());
        // The smaller geometry has a smaller footprint
        assert!(TileGrid::plan(&[1, 5, 9, 1], &Padding::valid(), TileGeometry::F2x2).is_ok());
    }

    #[test]
    fn test_constant_window_f2x2() {
        // A constant map of ones: Bᵗ·1·B is nonzero only where both row sums are
        let input = Tensor::from_vec(vec![1.0f32; 4 * 4], &[1, 4, 4, 1]).unwrap();
        let (v, grid) = transform_input(&input, &Padding::valid(), TileGeometry::F2x2).unwrap();
        assert_eq!(grid.total_tiles(), 1);
        assert_eq!(v.dims(), &[16, 1, 1]);
        // Row sums of Bᵗ for F(2,3): [0, 2, 0, 0]
        let values = v.as_slice().unwrap();
        for p in 0..16 {
            let expected = if p == 5 { 4.0 } else { 0.0 };
            assert_eq!(values[p], expected, "coefficient {p}");
        }
    }

    #[test]
    fn test_overhanging_tiles_read_zero() {
        // 7x7 VALID with F(4,3): output 5x5 -> 2x2 tiles, second row/col
        // of windows reads past the map
        let input = Tensor::from_vec(vec![1.0f32; 49], &[1, 7, 7, 1]).unwrap();
        let (v, grid) = transform_input(&input, &Padding::valid(), TileGeometry::F4x4).unwrap();
        assert_eq!((grid.tiles_h, grid.tiles_w), (2, 2));
        assert_eq!(v.dims(), &[36, 1, 4]);
        let values = v.as_slice().unwrap();
        // Interior tile 0 differs from the overhanging tile 3
        assert_ne!(values[0], values[3]);
    }

    #[test]
    fn test_tiled_input_matches_flat() {
        let data: Vec<f32> = (0..2 * 9 * 10 * 5).map(|v| ((v * 13) % 17) as f32 / 17.0).collect();
        let input = Tensor::from_vec(data, &[2, 9, 10, 5]).unwrap();
        let tiled = to_tiled(&input, BufferKind::InOutChannel).unwrap();
        let padding = Padding::symmetric(1);
        assert_eq!(
            transform_input(&input, &padding, TileGeometry::F4x4).unwrap(),
            transform_input(&tiled, &padding, TileGeometry::F4x4).unwrap()
        );
    }
}
