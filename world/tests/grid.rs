use std::{
    cell::RefCell,
    rc::{Rc, Weak},
    time::Duration,
};

use blockade_core::{
    BuildError, DamageStage, GridBounds, InvalidArgument, InvariantViolation, MapObserver,
    Observer, StageThresholds, TileCoord,
};
use blockade_world::{
    self as world, DamageOutcome, DamageSettings, GridHandle, LevelLayer, Structure, TileGrid,
};

#[derive(Default)]
struct VacancyLog {
    tiles: Vec<TileCoord>,
}

impl MapObserver for VacancyLog {
    fn update(&mut self, tile: TileCoord) {
        self.tiles.push(tile);
    }
}

#[derive(Default)]
struct DirtyFlag {
    raised: usize,
}

impl Observer for DirtyFlag {
    fn update(&mut self) {
        self.raised += 1;
    }
}

fn loaded_grid(terrain: &[TileCoord]) -> GridHandle {
    let grid = TileGrid::shared(GridBounds::new(10, 10), true);
    let _ = grid
        .borrow_mut()
        .load(terrain.iter().copied())
        .expect("terrain lies inside the grid");
    grid
}

fn test_settings() -> DamageSettings {
    DamageSettings::new(Duration::from_millis(500), StageThresholds::default())
        .with_cooldown_bypass(true)
}

fn add(grid: &GridHandle, tile: TileCoord, settings: DamageSettings) -> Rc<RefCell<Structure>> {
    let structure = Structure::shared(tile, settings);
    grid.borrow_mut()
        .add_structure(tile, Rc::clone(&structure))
        .expect("slot is free");
    structure
}

#[test]
fn added_structure_occupies_tile_and_blocks_second_insert() {
    let grid = loaded_grid(&[TileCoord::new(5, 5)]);
    let tile = TileCoord::new(5, 6);
    let _first = add(&grid, tile, test_settings());

    assert!(!grid.borrow().is_tile_empty(tile));

    let second = Structure::shared(tile, test_settings());
    let error = grid
        .borrow_mut()
        .add_structure(tile, second)
        .expect_err("slot already occupied");
    assert_eq!(
        error,
        BuildError::InvariantViolation(InvariantViolation::TileAlreadyOccupied { tile })
    );
    assert_eq!(grid.borrow().len(), 2, "grid must be left untouched");
}

#[test]
fn out_of_bounds_insert_is_an_invariant_violation() {
    let grid = loaded_grid(&[]);
    let tile = TileCoord::new(10, 0);
    let error = grid
        .borrow_mut()
        .add_structure(tile, Structure::shared(tile, test_settings()))
        .expect_err("outside the grid");
    assert_eq!(
        error,
        BuildError::InvariantViolation(InvariantViolation::OutsideGrid { tile })
    );
}

#[test]
fn mismatched_structure_position_is_rejected() {
    let grid = loaded_grid(&[]);
    let error = grid
        .borrow_mut()
        .add_structure(
            TileCoord::new(1, 1),
            Structure::shared(TileCoord::new(2, 2), test_settings()),
        )
        .expect_err("structure built for another tile");
    assert!(matches!(
        error,
        BuildError::InvariantViolation(InvariantViolation::PositionMismatch { .. })
    ));
}

#[test]
fn combat_destruction_vacates_tile_and_notifies_once() {
    let grid = loaded_grid(&[TileCoord::new(5, 5)]);
    let tile = TileCoord::new(5, 6);
    let structure = add(&grid, tile, test_settings());

    let ai_cache = Rc::new(RefCell::new(VacancyLog::default()));
    let ai_observer: Weak<RefCell<dyn MapObserver>> = Rc::<RefCell<VacancyLog>>::downgrade(&ai_cache);
    assert!(structure.borrow_mut().add_observer(ai_observer));

    let now = Duration::from_millis(16);
    let outcome = world::inflict_damage(&grid, tile, 40, now).expect("valid hit");
    assert_eq!(
        outcome,
        DamageOutcome::Applied {
            health: 60,
            stage: DamageStage::Stage1
        }
    );

    let outcome = world::inflict_damage(&grid, tile, 40, now).expect("valid hit");
    assert_eq!(
        outcome,
        DamageOutcome::Applied {
            health: 20,
            stage: DamageStage::Stage2
        }
    );

    let outcome = world::inflict_damage(&grid, tile, 30, now).expect("valid hit");
    assert_eq!(outcome, DamageOutcome::Destroyed);

    assert!(grid.borrow().is_tile_empty(tile), "tile vacated synchronously");
    assert!(structure.borrow().is_destroyed());
    assert_eq!(ai_cache.borrow().tiles, vec![tile]);

    let error = world::inflict_damage(&grid, tile, 10, now).expect_err("tile is now empty");
    assert_eq!(
        error,
        BuildError::InvalidArgument(InvalidArgument::EmptyTile { tile })
    );
}

#[test]
fn cooldown_limits_hits_delivered_through_the_grid() {
    let grid = loaded_grid(&[TileCoord::new(0, 0)]);
    let tile = TileCoord::new(1, 0);
    let settings = DamageSettings::new(Duration::from_millis(500), StageThresholds::default());
    let structure = add(&grid, tile, settings);

    for frame in 0..30u64 {
        let now = Duration::from_millis(frame * 16);
        let _ = world::inflict_damage(&grid, tile, 10, now).expect("valid hit");
    }

    assert_eq!(
        structure.borrow().health(),
        90,
        "only one hit lands inside the first 500ms window",
    );
}

#[test]
fn repeated_destruction_notifications_are_ignored() {
    let terrain = TileCoord::new(3, 3);
    let grid = loaded_grid(&[terrain]);
    let tile = TileCoord::new(3, 4);
    let _structure = add(&grid, tile, test_settings());

    grid.borrow_mut().on_structure_destroyed(tile);
    grid.borrow_mut().on_structure_destroyed(tile);
    grid.borrow_mut().on_structure_destroyed(terrain);

    assert!(grid.borrow().is_tile_empty(tile));
    assert!(
        !grid.borrow().is_tile_empty(terrain),
        "terrain is never removed by notifications",
    );
}

#[test]
fn terrain_absorbs_damage() {
    let terrain = TileCoord::new(2, 2);
    let grid = loaded_grid(&[terrain]);

    let outcome = world::inflict_damage(&grid, terrain, 500, Duration::ZERO).expect("valid hit");

    assert_eq!(outcome, DamageOutcome::Inert);
    let grid = grid.borrow();
    let occupant = grid.occupant(terrain).expect("terrain stays");
    assert!(!occupant.can_be_destroyed());
}

#[test]
fn connectivity_requires_cardinal_neighbour() {
    let grid = loaded_grid(&[TileCoord::new(5, 5)]);
    let grid = grid.borrow();

    assert!(grid.is_tile_connected(TileCoord::new(5, 4)));
    assert!(grid.is_tile_connected(TileCoord::new(6, 5)));
    assert!(
        !grid.is_tile_connected(TileCoord::new(6, 6)),
        "diagonal neighbours do not count",
    );
    assert!(!grid.is_tile_connected(TileCoord::new(0, 0)));
}

#[test]
fn empty_grid_connectivity_follows_bootstrap_policy() {
    let permissive = TileGrid::shared(GridBounds::new(4, 4), true);
    let strict = TileGrid::shared(GridBounds::new(4, 4), false);

    assert!(permissive.borrow().is_tile_connected(TileCoord::new(2, 2)));
    assert!(!strict.borrow().is_tile_connected(TileCoord::new(2, 2)));
}

#[test]
fn load_rejects_second_call_and_out_of_bounds_tiles() {
    let grid = loaded_grid(&[TileCoord::new(0, 9)]);
    let error = grid
        .borrow_mut()
        .load([TileCoord::new(1, 1)])
        .expect_err("already loaded");
    assert_eq!(
        error,
        BuildError::InvariantViolation(InvariantViolation::AlreadyLoaded)
    );

    let fresh = TileGrid::shared(GridBounds::new(3, 3), true);
    let error = fresh
        .borrow_mut()
        .load([TileCoord::new(0, 0), TileCoord::new(-1, 0)])
        .expect_err("outside the grid");
    assert_eq!(
        error,
        BuildError::InvalidArgument(InvalidArgument::TileOutsideGrid {
            tile: TileCoord::new(-1, 0)
        })
    );
    assert!(fresh.borrow().is_empty());
}

#[test]
fn teardown_removes_structures_through_destruction_path() {
    let grid = loaded_grid(&[TileCoord::new(0, 0), TileCoord::new(1, 0)]);
    let first = add(&grid, TileCoord::new(0, 1), test_settings());
    let second = add(&grid, TileCoord::new(1, 1), test_settings());

    let vacancies = Rc::new(RefCell::new(VacancyLog::default()));
    for structure in [&first, &second] {
        let observer: Weak<RefCell<dyn MapObserver>> = Rc::<RefCell<VacancyLog>>::downgrade(&vacancies);
        assert!(structure.borrow_mut().add_observer(observer));
    }

    assert_eq!(world::teardown(&grid), 2);

    assert!(grid.borrow().is_empty());
    assert!(!grid.borrow().is_loaded());
    assert!(first.borrow().is_destroyed() && second.borrow().is_destroyed());
    assert_eq!(
        vacancies.borrow().tiles,
        vec![TileCoord::new(0, 1), TileCoord::new(1, 1)],
    );

    let reloaded = grid.borrow_mut().load([TileCoord::new(4, 4)]);
    assert_eq!(reloaded, Ok(1), "a torn down grid accepts the next level");
}

#[test]
fn occupancy_changes_raise_grid_observers() {
    let grid = loaded_grid(&[TileCoord::new(5, 5)]);
    let overlay = Rc::new(RefCell::new(DirtyFlag::default()));
    let observer: Weak<RefCell<dyn Observer>> = Rc::<RefCell<DirtyFlag>>::downgrade(&overlay);
    assert!(grid.borrow_mut().add_observer(observer));

    let tile = TileCoord::new(5, 4);
    let _structure = add(&grid, tile, test_settings());
    let _ = world::inflict_damage(&grid, tile, 100, Duration::ZERO).expect("valid hit");

    assert_eq!(overlay.borrow().raised, 2, "one insert, one vacancy");
}

#[test]
fn level_layer_feeds_initial_occupancy() {
    let layer: LevelLayer = toml::from_str(
        r#"
            width = 4
            height = 3
            data = [
                0, 0, 0, 0,
                0, 0, 0, 0,
                7, 7, 0, 7,
            ]
        "#,
    )
    .expect("layer parses");

    let grid = TileGrid::shared(GridBounds::new(layer.width, layer.height), true);
    let count = grid
        .borrow_mut()
        .load(layer.occupied_tiles().expect("layer is well formed"))
        .expect("terrain fits");

    assert_eq!(count, 3);
    assert_eq!(
        grid.borrow().occupied_tiles(),
        vec![
            TileCoord::new(0, 2),
            TileCoord::new(1, 2),
            TileCoord::new(3, 2)
        ],
    );
}

#[test]
fn destruction_while_grid_is_borrowed_still_vacates_tile() {
    let grid = loaded_grid(&[TileCoord::new(5, 5)]);
    let tile = TileCoord::new(5, 6);
    let _structure = add(&grid, tile, test_settings());

    let outcome = {
        let view = grid.borrow();
        let structure = view.structure_at(tile).expect("structure is placed");
        let outcome = structure.borrow_mut().inflict_damage(100, Duration::ZERO);
        outcome
    }
    .expect("valid hit");
    assert_eq!(outcome, DamageOutcome::Destroyed);

    {
        let view = grid.borrow();
        assert!(view.is_tile_empty(tile), "destroyed structure no longer holds the tile");
        assert!(view.structure_at(tile).is_none());
        assert!(!view.occupied_tiles().contains(&tile));
        assert_eq!(view.len(), 1);
    }
    assert_eq!(
        world::inflict_damage(&grid, tile, 10, Duration::ZERO),
        Err(BuildError::InvalidArgument(InvalidArgument::EmptyTile { tile })),
    );

    let _rebuilt = add(&grid, tile, test_settings());
    assert!(!grid.borrow().is_tile_empty(tile), "vacated tile accepts a new structure");
}

#[test]
fn stale_entries_are_swept_once() {
    let grid = loaded_grid(&[TileCoord::new(0, 0)]);
    let tile = TileCoord::new(1, 0);
    let structure = add(&grid, tile, test_settings());

    {
        let _view = grid.borrow();
        assert!(structure.borrow_mut().remove());
    }

    assert_eq!(grid.borrow_mut().sweep_destroyed(), 1);
    assert_eq!(grid.borrow_mut().sweep_destroyed(), 0);
    assert_eq!(grid.borrow().occupied_tiles(), vec![TileCoord::new(0, 0)]);
}

#[test]
fn structures_are_refused_before_load() {
    let grid = TileGrid::shared(GridBounds::new(4, 4), true);
    let tile = TileCoord::new(1, 1);

    let error = grid
        .borrow_mut()
        .add_structure(tile, Structure::shared(tile, test_settings()))
        .expect_err("level not loaded");

    assert_eq!(
        error,
        BuildError::InvariantViolation(InvariantViolation::NotLoaded)
    );
    assert!(grid.borrow().is_empty());
}
