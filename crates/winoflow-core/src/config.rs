//! Pipeline configuration.

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use crate::ops::conv::winograd::TileGeometry;

/// Settings shared by every stage of a Winograd invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
pub struct WinogradConfig {
    /// Output tile size of the transform
    pub geometry: TileGeometry,
}

impl WinogradConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_geometry(mut self, geometry: TileGeometry) -> Self {
        self.geometry = geometry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_uses_f4x4() {
        assert_eq!(WinogradConfig::default().geometry, TileGeometry::F4x4);
        assert_eq!(
            WinogradConfig::new().with_geometry(TileGeometry::F2x2).geometry,
            TileGeometry::F2x2
        );
    }
}
