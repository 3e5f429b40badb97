#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Build manager that validates placements and computes buildable tiles.

use std::time::Duration;

use blockade_core::{BuildConfig, BuildError, PlacementRejection, TileCoord, TileMetrics, Vec2};
use blockade_world::{
    self as world, DamageOutcome, DamageSettings, GridHandle, Structure, StructureRef,
};

/// Declarative cursor preview describing a potential placement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BuildPreview {
    /// Tile under the cursor.
    pub tile: TileCoord,
    /// Cursor snapped onto the top-left corner of `tile`, in world units.
    pub origin: Vec2,
    /// Rule that would reject the placement, if any.
    pub rejection: Option<PlacementRejection>,
}

impl BuildPreview {
    /// Creates a new preview descriptor.
    #[must_use]
    pub const fn new(
        tile: TileCoord,
        origin: Vec2,
        rejection: Option<PlacementRejection>,
    ) -> Self {
        Self {
            tile,
            origin,
            rejection,
        }
    }

    /// Indicates whether the previewed tile accepts a structure.
    #[must_use]
    pub const fn placeable(&self) -> bool {
        self.rejection.is_none()
    }
}

/// Validates and performs placements against a shared tile grid.
#[derive(Debug)]
pub struct BuildManager {
    grid: GridHandle,
    metrics: TileMetrics,
    build_range_tiles: u32,
    damage: DamageSettings,
}

impl BuildManager {
    /// Creates a build manager for `grid` using the tunables in `config`.
    #[must_use]
    pub fn new(grid: GridHandle, config: &BuildConfig) -> Self {
        Self {
            grid,
            metrics: config.tile_metrics(),
            build_range_tiles: config.build_range_tiles,
            damage: DamageSettings::from(config),
        }
    }

    /// Grid the manager places structures into.
    #[must_use]
    pub fn grid(&self) -> &GridHandle {
        &self.grid
    }

    /// Coordinate converter used for world-space requests.
    #[must_use]
    pub const fn metrics(&self) -> TileMetrics {
        self.metrics
    }

    /// Half-width of the square build range, in tiles.
    #[must_use]
    pub const fn build_range_tiles(&self) -> u32 {
        self.build_range_tiles
    }

    /// Evaluates the placement rules in order and reports the first failure.
    pub fn check_placement(
        &self,
        target: TileCoord,
        actor: TileCoord,
    ) -> Result<(), PlacementRejection> {
        let grid = self.grid.borrow();
        if !grid.is_loaded() {
            return Err(PlacementRejection::LevelNotLoaded);
        }
        if target == actor {
            return Err(PlacementRejection::SelfPlacement);
        }
        if !actor.within_square(target, self.build_range_tiles) {
            return Err(PlacementRejection::OutOfRange);
        }
        if !grid.is_inside(target) {
            return Err(PlacementRejection::OutOfBounds);
        }
        if !grid.is_tile_empty(target) {
            return Err(PlacementRejection::TileOccupied);
        }
        if !grid.is_tile_connected(target) {
            return Err(PlacementRejection::TileDisconnected);
        }
        Ok(())
    }

    /// Reports whether a structure may be placed on `target` by an actor
    /// standing on `actor`.
    #[must_use]
    pub fn can_place(&self, target: TileCoord, actor: TileCoord) -> bool {
        self.check_placement(target, actor).is_ok()
    }

    /// Validates and places a new structure, registering it with the grid.
    pub fn place(
        &mut self,
        target: TileCoord,
        actor: TileCoord,
    ) -> Result<StructureRef, BuildError> {
        if let Err(rejection) = self.check_placement(target, actor) {
            log::debug!(
                "placement at ({}, {}) rejected: {rejection}",
                target.column(),
                target.row()
            );
            return Err(rejection.into());
        }

        let structure = Structure::shared(target, self.damage);
        self.grid
            .borrow_mut()
            .add_structure(target, StructureRef::clone(&structure))?;
        log::debug!("placed structure at ({}, {})", target.column(), target.row());
        Ok(structure)
    }

    /// Places a structure under the cursor, converting world positions first.
    pub fn place_at_world(
        &mut self,
        cursor: Vec2,
        actor: Vec2,
    ) -> Result<StructureRef, BuildError> {
        let target = self.metrics.world_to_tile(cursor);
        let actor = self.metrics.world_to_tile(actor);
        self.place(target, actor)
    }

    /// Empty, in-bounds tiles inside the actor's square build range.
    ///
    /// Tiles are listed row by row, so indices stay stable between frames
    /// while the grid is unchanged. Nothing is reachable before the level is
    /// loaded.
    #[must_use]
    pub fn reachable_tiles(&self, actor: TileCoord) -> Vec<TileCoord> {
        let grid = self.grid.borrow();
        if !grid.is_loaded() {
            return Vec::new();
        }
        let range = i64::from(self.build_range_tiles);
        let bounds = grid.bounds();
        let rows = clip(i64::from(actor.row()), range, bounds.height());
        let columns = clip(i64::from(actor.column()), range, bounds.width());

        let mut tiles = Vec::new();
        for row in rows {
            for column in columns.clone() {
                let (Ok(column), Ok(row)) = (i32::try_from(column), i32::try_from(row)) else {
                    continue;
                };
                let tile = TileCoord::new(column, row);
                if grid.is_tile_empty(tile) {
                    tiles.push(tile);
                }
            }
        }
        tiles
    }

    /// Number of overlay elements needed to highlight any reachable set.
    ///
    /// Saturates at `usize::MAX` for ranges too wide to allocate.
    #[must_use]
    pub fn overlay_capacity(&self) -> usize {
        let side = usize::try_from(self.build_range_tiles)
            .unwrap_or(usize::MAX)
            .saturating_mul(2)
            .saturating_add(1);
        side.saturating_mul(side)
    }

    /// Describes the placement under the cursor without mutating the grid.
    #[must_use]
    pub fn preview(&self, cursor: Vec2, actor: Vec2) -> BuildPreview {
        let tile = self.metrics.world_to_tile(cursor);
        let actor = self.metrics.world_to_tile(actor);
        BuildPreview::new(
            tile,
            self.metrics.tile_to_world(tile),
            self.check_placement(tile, actor).err(),
        )
    }

    /// Delivers a hit to the occupant of `tile` at simulated time `now`.
    pub fn inflict_damage(
        &self,
        tile: TileCoord,
        amount: i32,
        now: Duration,
    ) -> Result<DamageOutcome, BuildError> {
        world::inflict_damage(&self.grid, tile, amount, now)
    }
}

/// Indices within `range` of `center` that also lie in `0..len`.
fn clip(center: i64, range: i64, len: u32) -> std::ops::RangeInclusive<i64> {
    let low = (center - range).max(0);
    let high = (center + range).min(i64::from(len) - 1);
    low..=high
}
