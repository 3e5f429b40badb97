#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Blockade build subsystem.
//!
//! This crate defines the value types that connect the authoritative tile
//! grid, the build manager, and the adapters that embed them into a host
//! engine. Positions cross the boundary in world units and are converted to
//! [`TileCoord`] values through [`TileMetrics`]. Placement failures are
//! reported as [`PlacementRejection`] values wrapped in [`BuildError`], and
//! structure health is summarised for presentation as a [`DamageStage`].

pub mod config;
pub mod observer;

pub use config::{BuildConfig, ConfigError, StageThresholds};
pub use glam::Vec2;
pub use observer::{MapObserver, Observer, ObserverList};

use serde::{Deserialize, Serialize};

/// Location of a single tile expressed as column and row indices.
///
/// Coordinates outside the configured [`GridBounds`] are valid values, they
/// are simply never admitted into the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    column: i32,
    row: i32,
}

impl TileCoord {
    /// Creates a new tile coordinate.
    #[must_use]
    pub const fn new(column: i32, row: i32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the tile.
    #[must_use]
    pub const fn column(&self) -> i32 {
        self.column
    }

    /// Zero-based row index of the tile.
    #[must_use]
    pub const fn row(&self) -> i32 {
        self.row
    }

    /// Returns the four cardinal neighbours in north, east, south, west order.
    #[must_use]
    pub fn neighbors(self) -> [TileCoord; 4] {
        [
            Self::new(self.column, self.row.saturating_sub(1)),
            Self::new(self.column.saturating_add(1), self.row),
            Self::new(self.column, self.row.saturating_add(1)),
            Self::new(self.column.saturating_sub(1), self.row),
        ]
    }

    /// Reports whether `other` lies inside the square of half-width `range`
    /// centred on this tile. Each axis is checked independently.
    #[must_use]
    pub fn within_square(self, other: TileCoord, range: u32) -> bool {
        self.column.abs_diff(other.column) <= range && self.row.abs_diff(other.row) <= range
    }
}

/// Dimensions of the playable tile grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridBounds {
    width: u32,
    height: u32,
}

impl GridBounds {
    /// Creates a new bounds descriptor measured in whole tiles.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of tile columns contained in the grid.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Number of tile rows contained in the grid.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Reports whether the tile lies inside `[0, width) × [0, height)`.
    #[must_use]
    pub fn contains(&self, tile: TileCoord) -> bool {
        u32::try_from(tile.column()).map_or(false, |column| column < self.width)
            && u32::try_from(tile.row()).map_or(false, |row| row < self.height)
    }
}

/// Converts between continuous world positions and discrete tiles.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileMetrics {
    tile_size: f32,
}

impl TileMetrics {
    /// Creates a converter for square tiles of the provided side length.
    ///
    /// Non-positive or non-finite sizes fall back to a side length of one so
    /// that conversions stay total.
    #[must_use]
    pub fn new(tile_size: f32) -> Self {
        let tile_size = if tile_size.is_finite() && tile_size > 0.0 {
            tile_size
        } else {
            1.0
        };
        Self { tile_size }
    }

    /// Side length of a single tile in world units.
    #[must_use]
    pub const fn tile_size(&self) -> f32 {
        self.tile_size
    }

    /// Floor-divides each axis of `position` by the tile size.
    #[must_use]
    pub fn world_to_tile(&self, position: Vec2) -> TileCoord {
        let scaled = (position / self.tile_size).floor();
        TileCoord::new(scaled.x as i32, scaled.y as i32)
    }

    /// Returns the top-left corner of the tile in world units.
    #[must_use]
    pub fn tile_to_world(&self, tile: TileCoord) -> Vec2 {
        Vec2::new(tile.column() as f32, tile.row() as f32) * self.tile_size
    }

    /// Snaps a world position onto the origin of the tile containing it.
    #[must_use]
    pub fn snap_to_tile(&self, position: Vec2) -> Vec2 {
        self.tile_to_world(self.world_to_tile(position))
    }
}

/// Visual degradation tier derived from a structure's remaining health.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageStage {
    /// Health above the first threshold.
    #[default]
    Pristine,
    /// Health at or below the first threshold.
    Stage1,
    /// Health at or below the second threshold.
    Stage2,
}

/// Reasons a placement request may be rejected by the build manager.
///
/// Variants are listed in the order the rules are evaluated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlacementRejection {
    /// The level occupancy has not been loaded, so no tile is buildable.
    LevelNotLoaded,
    /// The target tile is the tile the acting entity stands on.
    SelfPlacement,
    /// The target tile lies outside the actor's square build range.
    OutOfRange,
    /// The target tile lies outside the grid bounds.
    OutOfBounds,
    /// The target tile already holds a structure.
    TileOccupied,
    /// None of the target tile's cardinal neighbours is occupied.
    TileDisconnected,
}

impl std::fmt::Display for PlacementRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Self::LevelNotLoaded => "level has not been loaded",
            Self::SelfPlacement => "cannot build on the actor's own tile",
            Self::OutOfRange => "tile is outside the build range",
            Self::OutOfBounds => "tile is outside the map",
            Self::TileOccupied => "tile is already occupied",
            Self::TileDisconnected => "tile is not connected to an occupied tile",
        };
        f.write_str(reason)
    }
}

/// Malformed input supplied by a collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvalidArgument {
    /// Damage amounts must be strictly positive.
    #[error("damage amount must be positive, got {amount}")]
    NonPositiveDamage {
        /// Amount supplied by the caller.
        amount: i32,
    },
    /// The tile lies outside the grid bounds.
    #[error("tile ({}, {}) lies outside the grid", .tile.column(), .tile.row())]
    TileOutsideGrid {
        /// Offending tile.
        tile: TileCoord,
    },
    /// No structure occupies the tile.
    #[error("no structure occupies tile ({}, {})", .tile.column(), .tile.row())]
    EmptyTile {
        /// Offending tile.
        tile: TileCoord,
    },
}

/// Grid consistency violations caused by a caller bypassing validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    /// A structure was inserted into an occupied slot.
    #[error("tile ({}, {}) is already occupied", .tile.column(), .tile.row())]
    TileAlreadyOccupied {
        /// Tile that already held an occupant.
        tile: TileCoord,
    },
    /// A structure was inserted outside the grid bounds.
    #[error("tile ({}, {}) lies outside the grid", .tile.column(), .tile.row())]
    OutsideGrid {
        /// Tile the structure was meant for.
        tile: TileCoord,
    },
    /// A destroyed structure was offered to the grid.
    #[error("structure for tile ({}, {}) is already destroyed", .tile.column(), .tile.row())]
    DestroyedStructure {
        /// Tile the structure was built for.
        tile: TileCoord,
    },
    /// A structure was registered at a tile other than its own position.
    #[error(
        "structure at ({}, {}) registered at ({}, {})",
        .structure.column(),
        .structure.row(),
        .slot.column(),
        .slot.row()
    )]
    PositionMismatch {
        /// Slot requested by the caller.
        slot: TileCoord,
        /// Position the structure was built for.
        structure: TileCoord,
    },
    /// A structure was inserted before the level occupancy was loaded.
    #[error("level occupancy has not been loaded")]
    NotLoaded,
    /// The level occupancy was loaded twice without a teardown in between.
    #[error("level occupancy has already been loaded")]
    AlreadyLoaded,
}

/// Errors surfaced by build and damage operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// Input rejected before any state changed.
    #[error(transparent)]
    InvalidArgument(#[from] InvalidArgument),
    /// Placement rejected by one of the build rules.
    #[error("placement rejected: {0}")]
    RuleViolation(PlacementRejection),
    /// A caller bypassed validation and attempted an inconsistent mutation.
    #[error("grid invariant violated: {0}")]
    InvariantViolation(#[from] InvariantViolation),
}

impl From<PlacementRejection> for BuildError {
    fn from(rejection: PlacementRejection) -> Self {
        Self::RuleViolation(rejection)
    }
}

impl BuildError {
    /// Returns the violated placement rule, if this is a rule violation.
    #[must_use]
    pub const fn rejection(&self) -> Option<PlacementRejection> {
        match self {
            Self::RuleViolation(rejection) => Some(*rejection),
            _ => None,
        }
    }
}
