//! Tile geometry and the fixed Winograd transform matrices.
//!
//! `F(m×m, 3×3)` maps an `(m+2)×(m+2)` input tile and a `3×3` kernel to an
//! `m×m` output tile through three constant matrices:
//!
//! - `G`  (`t×3`): filter transform, `U = G·g·Gᵗ`
//! - `Bᵗ` (`t×t`): input transform, `V = Bᵗ·d·B`
//! - `Aᵗ` (`m×t`): output transform, `Y = Aᵗ·M·A`
//!
//! where `t = m + 2`. The tables are plain `static` data and every transform
//! goes through [`sandwich`].

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Edge length of the only supported kernel
pub const KERNEL_SIZE: usize = 3;

/// Output tile size of a Winograd minimal filtering algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum TileGeometry {
    /// `F(2×2, 3×3)`: 16 coefficients per tile
    F2x2,
    /// `F(4×4, 3×3)`: 36 coefficients per tile
    #[default]
    F4x4,
}

/// Row-major transform matrices for one geometry.
#[derive(Debug)]
pub struct TransformMatrices {
    /// `[input_tile, KERNEL_SIZE]`
    pub g: &'static [f32],
    /// `[input_tile, input_tile]`
    pub bt: &'static [f32],
    /// `[output_tile, input_tile]`
    pub at: &'static [f32],
}

#[rustfmt::skip]
static F2X2: TransformMatrices = TransformMatrices {
    g: &[
        1.0,  0.0, 0.0,
        0.5,  0.5, 0.5,
        0.5, -0.5, 0.5,
        0.0,  0.0, 1.0,
    ],
    bt: &[
        1.0,  0.0, -1.0,  0.0,
        0.0,  1.0,  1.0,  0.0,
        0.0, -1.0,  1.0,  0.0,
        0.0,  1.0,  0.0, -1.0,
    ],
    at: &[
        1.0, 1.0,  1.0,  0.0,
        0.0, 1.0, -1.0, -1.0,
    ],
};

const SIXTH: f32 = 1.0 / 6.0;
const TWELFTH: f32 = 1.0 / 12.0;
const TWENTY_FOURTH: f32 = 1.0 / 24.0;

#[rustfmt::skip]
static F4X4: TransformMatrices = TransformMatrices {
    g: &[
        0.25,           0.0,      0.0,
        -SIXTH,         -SIXTH,   -SIXTH,
        -SIXTH,         SIXTH,    -SIXTH,
        TWENTY_FOURTH,  TWELFTH,  SIXTH,
        TWENTY_FOURTH,  -TWELFTH, SIXTH,
        0.0,            0.0,      1.0,
    ],
    bt: &[
        4.0,  0.0, -5.0,  0.0, 1.0, 0.0,
        0.0, -4.0, -4.0,  1.0, 1.0, 0.0,
        0.0,  4.0, -4.0, -1.0, 1.0, 0.0,
        0.0, -2.0, -1.0,  2.0, 1.0, 0.0,
        0.0,  2.0, -1.0, -2.0, 1.0, 0.0,
        0.0,  4.0,  0.0, -5.0, 0.0, 1.0,
    ],
    at: &[
        1.0, 1.0,  1.0, 1.0,  1.0, 0.0,
        0.0, 1.0, -1.0, 2.0, -2.0, 0.0,
        0.0, 1.0,  1.0, 4.0,  4.0, 0.0,
        0.0, 1.0, -1.0, 8.0, -8.0, 1.0,
    ],
};

impl TileGeometry {
    pub const ALL: [TileGeometry; 2] = [TileGeometry::F2x2, TileGeometry::F4x4];

    /// Output tile edge `m`
    pub const fn output_tile(&self) -> usize {
        match self {
            TileGeometry::F2x2 => 2,
            TileGeometry::F4x4 => 4,
        }
    }

    /// Input tile edge `m + KERNEL_SIZE - 1`
    pub const fn input_tile(&self) -> usize {
        self.output_tile() + KERNEL_SIZE - 1
    }

    /// Transform-domain positions per tile
    pub const fn coefficients(&self) -> usize {
        self.input_tile() * self.input_tile()
    }

    pub fn matrices(&self) -> &'static TransformMatrices {
        match self {
            TileGeometry::F2x2 => &F2X2,
            TileGeometry::F4x4 => &F4X4,
        }
    }

    /// Tiles needed to cover an output extent along one axis
    pub fn tiles_for(&self, output_extent: usize) -> usize {
        output_extent.div_ceil(self.output_tile())
    }
}

impl std::fmt::Display for TileGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let m = self.output_tile();
        write!(f, "F({m}x{m},3x3)")
    }
}

/// Compute `L · X · Lᵗ` for row-major `L` (`r×c`) and `X` (`c×c`).
///
/// `scratch` needs `r*c` elements and `out` needs `r*r`.
#[inline]
pub fn sandwich(l: &[f32], r: usize, c: usize, x: &[f32], scratch: &mut [f32], out: &mut [f32]) {
    debug_assert_eq!(l.len(), r * c);
    debug_assert_eq!(x.len(), c * c);

    // scratch = L · X
    for i in 0..r {
        for j in 0..c {
            let mut acc = 0.0f32;
            for k in 0..c {
                acc += l[i * c + k] * x[k * c + j];
            }
            scratch[i * c + j] = acc;
        }
    }
    // out = scratch · Lᵗ
    for i in 0..r {
        for j in 0..r {
            let mut acc = 0.0f32;
            for k in 0..c {
                acc += scratch[i * c + k] * l[j * c + k];
            }
            out[i * r + j] = acc;
        }
    }
}
