#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative tile grid for the Blockade build subsystem.
//!
//! The [`TileGrid`] owns every occupant of the level: permanent terrain loaded
//! once per level and the structures placed by the player. It subscribes to
//! each structure it stores, so a destroyed structure vacates its tile in the
//! same call that destroyed it. Because that notification re-enters the grid,
//! the grid lives behind a [`GridHandle`] and operations that may destroy
//! structures ([`inflict_damage`], [`teardown`]) release the grid borrow
//! before touching a structure.

mod level;
mod structure;

use std::{
    cell::RefCell,
    collections::BTreeMap,
    rc::{Rc, Weak},
    time::Duration,
};

use blockade_core::{
    BuildConfig, BuildError, GridBounds, InvalidArgument, InvariantViolation, MapObserver,
    Observer, ObserverList, TileCoord,
};

pub use level::{LevelError, LevelLayer, EMPTY_TILE};
pub use structure::{
    DamageOutcome, DamageSettings, PermanentStructure, Structure, StructureRef, MAX_HEALTH,
};

/// Shared handle to the grid, required for destruction callbacks.
pub type GridHandle = Rc<RefCell<TileGrid>>;

/// Content of an occupied tile.
#[derive(Clone, Debug)]
pub enum Occupant {
    /// Terrain loaded with the level.
    Permanent(PermanentStructure),
    /// Structure placed by the player.
    Structure(StructureRef),
}

impl Occupant {
    /// Reports whether gameplay may ever remove this occupant.
    #[must_use]
    pub fn can_be_destroyed(&self) -> bool {
        match self {
            Self::Permanent(terrain) => terrain.can_be_destroyed(),
            Self::Structure(structure) => structure.borrow().can_be_destroyed(),
        }
    }

    /// Reports whether the occupant still holds its tile.
    ///
    /// A destroyed structure whose vacancy notice could not reach the grid
    /// no longer holds its tile. A structure borrowed elsewhere is alive.
    fn holds_tile(&self) -> bool {
        match self {
            Self::Permanent(_) => true,
            Self::Structure(structure) => structure
                .try_borrow()
                .map_or(true, |structure| !structure.is_destroyed()),
        }
    }

    /// Returns the placed structure, if this occupant is one.
    #[must_use]
    pub fn as_structure(&self) -> Option<&StructureRef> {
        match self {
            Self::Permanent(_) => None,
            Self::Structure(structure) => Some(structure),
        }
    }
}

/// Mapping from tile coordinate to the occupant of that tile.
#[derive(Debug)]
pub struct TileGrid {
    bounds: GridBounds,
    connectivity_bootstrap: bool,
    cells: BTreeMap<TileCoord, Occupant>,
    loaded: bool,
    handle: Weak<RefCell<dyn MapObserver>>,
    change_observers: ObserverList<dyn Observer>,
}

impl TileGrid {
    /// Creates an empty, shared grid with the provided bounds.
    ///
    /// With `connectivity_bootstrap` set, an empty grid accepts its first
    /// structure without an occupied neighbour.
    #[must_use]
    pub fn shared(bounds: GridBounds, connectivity_bootstrap: bool) -> GridHandle {
        Rc::new_cyclic(|weak: &Weak<RefCell<TileGrid>>| {
            let handle: Weak<RefCell<dyn MapObserver>> = weak.clone();
            RefCell::new(Self {
                bounds,
                connectivity_bootstrap,
                cells: BTreeMap::new(),
                loaded: false,
                handle,
                change_observers: ObserverList::new(),
            })
        })
    }

    /// Creates a shared grid from the bounds and policy in `config`.
    #[must_use]
    pub fn from_config(config: &BuildConfig) -> GridHandle {
        Self::shared(config.grid_bounds(), config.connectivity_bootstrap)
    }

    /// Populates the grid with permanent terrain at level start.
    ///
    /// Duplicate tiles are collapsed. Returns the number of terrain tiles.
    pub fn load<I>(&mut self, initial_occupied: I) -> Result<usize, BuildError>
    where
        I: IntoIterator<Item = TileCoord>,
    {
        if self.loaded {
            log::error!("level occupancy loaded twice");
            return Err(InvariantViolation::AlreadyLoaded.into());
        }
        let _ = self.sweep_destroyed();

        let mut terrain = BTreeMap::new();
        for tile in initial_occupied {
            if !self.bounds.contains(tile) {
                return Err(InvalidArgument::TileOutsideGrid { tile }.into());
            }
            if self.cells.contains_key(&tile) {
                log::error!("terrain overlaps a structure placed before load");
                return Err(InvariantViolation::TileAlreadyOccupied { tile }.into());
            }
            let _ = terrain.insert(tile, Occupant::Permanent(PermanentStructure::new(tile)));
        }

        let count = terrain.len();
        self.cells.extend(terrain);
        self.loaded = true;
        log::debug!("loaded {count} permanent tile(s)");
        let _ = self.change_observers.notify();
        Ok(count)
    }

    /// Grid dimensions.
    #[must_use]
    pub const fn bounds(&self) -> GridBounds {
        self.bounds
    }

    /// Reports whether the level occupancy has been loaded.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Reports whether the tile lies inside the grid bounds.
    #[must_use]
    pub fn is_inside(&self, tile: TileCoord) -> bool {
        self.bounds.contains(tile)
    }

    /// True iff nothing occupies `tile`.
    #[must_use]
    pub fn is_tile_empty(&self, tile: TileCoord) -> bool {
        self.occupant(tile).is_none()
    }

    /// True iff a cardinal neighbour of `tile` is occupied, or the grid is
    /// empty and the bootstrap policy is enabled.
    #[must_use]
    pub fn is_tile_connected(&self, tile: TileCoord) -> bool {
        if self.is_empty() {
            return self.connectivity_bootstrap;
        }
        tile.neighbors()
            .into_iter()
            .any(|neighbor| self.occupant(neighbor).is_some())
    }

    /// Inserts a structure built for `tile` and subscribes to its destruction.
    ///
    /// Inserting before the level is loaded, or into an occupied or
    /// out-of-bounds tile, means a caller skipped placement validation; the
    /// grid is left untouched.
    pub fn add_structure(
        &mut self,
        tile: TileCoord,
        structure: StructureRef,
    ) -> Result<(), BuildError> {
        let _ = self.sweep_destroyed();
        let violation = if !self.loaded {
            Some(InvariantViolation::NotLoaded)
        } else if !self.bounds.contains(tile) {
            Some(InvariantViolation::OutsideGrid { tile })
        } else if self.cells.contains_key(&tile) {
            Some(InvariantViolation::TileAlreadyOccupied { tile })
        } else if structure.borrow().is_destroyed() {
            Some(InvariantViolation::DestroyedStructure { tile })
        } else {
            let built_for = structure.borrow().tile();
            (built_for != tile).then_some(InvariantViolation::PositionMismatch {
                slot: tile,
                structure: built_for,
            })
        };
        if let Some(violation) = violation {
            log::error!("rejected structure insert: {violation}");
            return Err(violation.into());
        }

        let _ = structure.borrow_mut().add_observer(self.handle.clone());
        let _ = self.cells.insert(tile, Occupant::Structure(structure));
        let _ = self.change_observers.notify();
        Ok(())
    }

    /// Removes the structure that vacated `tile`.
    ///
    /// Repeated notifications for the same tile are ignored, and permanent
    /// terrain is never removed.
    pub fn on_structure_destroyed(&mut self, tile: TileCoord) {
        let Some(Occupant::Structure(_)) = self.cells.get(&tile) else {
            return;
        };
        let _ = self.cells.remove(&tile);
        log::debug!("tile ({}, {}) vacated", tile.column(), tile.row());
        let _ = self.change_observers.notify();
    }

    /// Drops entries whose structure was destroyed without the grid being
    /// told, which happens when the grid was borrowed at the time.
    ///
    /// Returns the number of tiles vacated.
    pub fn sweep_destroyed(&mut self) -> usize {
        let stale: Vec<TileCoord> = self
            .cells
            .iter()
            .filter(|(_, occupant)| !occupant.holds_tile())
            .map(|(tile, _)| *tile)
            .collect();
        for tile in &stale {
            let _ = self.cells.remove(tile);
            log::warn!(
                "tile ({}, {}) held a destroyed structure; vacated late",
                tile.column(),
                tile.row()
            );
        }
        if !stale.is_empty() {
            let _ = self.change_observers.notify();
        }
        stale.len()
    }

    /// Returns the occupant of `tile`, if any.
    ///
    /// A destroyed structure not yet swept is reported as vacant.
    #[must_use]
    pub fn occupant(&self, tile: TileCoord) -> Option<&Occupant> {
        self.cells.get(&tile).filter(|occupant| occupant.holds_tile())
    }

    /// Returns a handle to the structure on `tile`, if a placed one exists.
    #[must_use]
    pub fn structure_at(&self, tile: TileCoord) -> Option<StructureRef> {
        self.occupant(tile).and_then(Occupant::as_structure).cloned()
    }

    /// All occupied tiles in deterministic order.
    #[must_use]
    pub fn occupied_tiles(&self) -> Vec<TileCoord> {
        self.cells
            .iter()
            .filter(|(_, occupant)| occupant.holds_tile())
            .map(|(tile, _)| *tile)
            .collect()
    }

    /// Number of occupied tiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.values().filter(|occupant| occupant.holds_tile()).count()
    }

    /// Reports whether no tile is occupied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.cells.values().any(Occupant::holds_tile)
    }

    /// Registers an observer told about every occupancy change.
    ///
    /// Observers run while the grid is borrowed and must not read it
    /// synchronously; flag a recompute instead.
    pub fn add_observer(&mut self, observer: Weak<RefCell<dyn Observer>>) -> bool {
        self.change_observers.register(observer)
    }
}

impl MapObserver for TileGrid {
    fn update(&mut self, tile: TileCoord) {
        self.on_structure_destroyed(tile);
    }
}

/// Delivers a hit to whatever occupies `tile`.
///
/// Terrain absorbs hits without effect. A destroying hit vacates the tile
/// before this function returns.
pub fn inflict_damage(
    grid: &GridHandle,
    tile: TileCoord,
    amount: i32,
    now: Duration,
) -> Result<DamageOutcome, BuildError> {
    if amount <= 0 {
        return Err(InvalidArgument::NonPositiveDamage { amount }.into());
    }
    let occupant = grid.borrow().occupant(tile).cloned();
    match occupant {
        None => Err(InvalidArgument::EmptyTile { tile }.into()),
        Some(Occupant::Permanent(terrain)) => Ok(terrain.inflict_damage(amount, now)),
        Some(Occupant::Structure(structure)) => {
            let outcome = structure.borrow_mut().inflict_damage(amount, now)?;
            if outcome == DamageOutcome::Destroyed {
                if let Ok(mut grid) = grid.try_borrow_mut() {
                    let _ = grid.sweep_destroyed();
                }
            }
            Ok(outcome)
        }
    }
}

/// Clears the level: removes every structure through its regular
/// destruction path, then drops the terrain so a new level can be loaded.
///
/// Returns the number of structures removed.
pub fn teardown(grid: &GridHandle) -> usize {
    let drained = std::mem::take(&mut grid.borrow_mut().cells);
    let mut removed = 0;
    for occupant in drained.into_values() {
        if let Occupant::Structure(structure) = occupant {
            if structure.borrow_mut().remove() {
                removed += 1;
            }
        }
    }

    let mut grid = grid.borrow_mut();
    grid.loaded = false;
    let _ = grid.change_observers.notify();
    log::info!("level torn down, {removed} structure(s) removed");
    removed
}
