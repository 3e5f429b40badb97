//! Extraction of the initial occupancy from a level's background tile layer.

use blockade_core::TileCoord;
use serde::{Deserialize, Serialize};

/// Tile identifier that marks an empty cell in a level layer.
pub const EMPTY_TILE: u32 = 0;

/// Dense, row-major tile layer as exported by the level editor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelLayer {
    /// Number of tile columns in the layer.
    pub width: u32,
    /// Number of tile rows in the layer.
    pub height: u32,
    /// Tile identifiers, `width * height` entries in row-major order.
    pub data: Vec<u32>,
}

impl LevelLayer {
    /// Lists every non-empty cell as a tile coordinate, in row-major order.
    pub fn occupied_tiles(&self) -> Result<Vec<TileCoord>, LevelError> {
        if self.width == 0 || self.height == 0 {
            return Err(LevelError::EmptyLayer);
        }
        let expected = u64::from(self.width) * u64::from(self.height);
        if self.data.len() as u64 != expected {
            return Err(LevelError::LengthMismatch {
                expected,
                actual: self.data.len(),
            });
        }
        let width = i32::try_from(self.width).map_err(|_| LevelError::TooLarge)?;
        let _ = i32::try_from(self.height).map_err(|_| LevelError::TooLarge)?;

        let mut tiles = Vec::new();
        for (row, cells) in (0..).zip(self.data.chunks(self.width as usize)) {
            for (column, id) in (0..width).zip(cells) {
                if *id != EMPTY_TILE {
                    tiles.push(TileCoord::new(column, row));
                }
            }
        }
        Ok(tiles)
    }
}

/// Errors raised while reading a level layer.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LevelError {
    /// The layer declares zero columns or rows.
    #[error("level layer must be at least 1x1")]
    EmptyLayer,
    /// The data array does not match the declared dimensions.
    #[error("level layer declares {expected} tiles but contains {actual}")]
    LengthMismatch {
        /// Tile count implied by width and height.
        expected: u64,
        /// Tile count found in the data array.
        actual: usize,
    },
    /// The layer dimensions do not fit tile coordinates.
    #[error("level layer dimensions exceed the coordinate range")]
    TooLarge,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_cells_become_tiles() {
        let layer = LevelLayer {
            width: 3,
            height: 2,
            data: vec![0, 4, 0, 1, 0, 9],
        };

        assert_eq!(
            layer.occupied_tiles().expect("layer is well formed"),
            vec![
                TileCoord::new(1, 0),
                TileCoord::new(0, 1),
                TileCoord::new(2, 1)
            ],
        );
    }

    #[test]
    fn length_mismatch_is_reported() {
        let layer = LevelLayer {
            width: 2,
            height: 2,
            data: vec![1, 1, 1],
        };

        assert_eq!(
            layer.occupied_tiles(),
            Err(LevelError::LengthMismatch {
                expected: 4,
                actual: 3
            })
        );
    }

    #[test]
    fn zero_sized_layer_is_rejected() {
        let layer = LevelLayer {
            width: 0,
            height: 5,
            data: Vec::new(),
        };

        assert_eq!(layer.occupied_tiles(), Err(LevelError::EmptyLayer));
    }
}
