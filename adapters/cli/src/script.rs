//! Scripted build sessions replayed against a build manager.

use std::{io::Write, time::Duration};

use anyhow::{Context, Result};
use blockade_core::{TileCoord, Vec2};
use blockade_system_builder::BuildManager;
use blockade_world as world;
use serde::Deserialize;

/// Ordered list of steps loaded from a TOML session file.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub(crate) struct Script {
    /// Steps executed in file order.
    #[serde(default, rename = "step")]
    pub(crate) steps: Vec<Step>,
}

impl Script {
    /// Parses a session script from TOML source text.
    pub(crate) fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).context("failed to parse session script")
    }
}

/// Single action performed by the session.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub(crate) enum Step {
    /// Attempts a placement from world-space cursor and actor positions.
    Place {
        /// Cursor position in world units.
        cursor: Vec2,
        /// Position of the building actor in world units.
        actor: Vec2,
    },
    /// Delivers a hit to a tile at a simulated timestamp.
    Damage {
        /// Tile receiving the hit.
        tile: TileCoord,
        /// Hit strength.
        amount: i32,
        /// Simulated time of the hit in milliseconds.
        at_ms: u64,
    },
    /// Lists the buildable tiles around an actor.
    Reachable {
        /// Position of the actor in world units.
        actor: Vec2,
    },
    /// Removes every structure and the level terrain.
    Teardown,
}

/// Executes every step, writing one report line per step to `out`.
pub(crate) fn run(manager: &mut BuildManager, script: &Script, out: &mut impl Write) -> Result<()> {
    for step in &script.steps {
        match step {
            Step::Place { cursor, actor } => match manager.place_at_world(*cursor, *actor) {
                Ok(structure) => {
                    let tile = structure.borrow().tile();
                    writeln!(out, "placed {}", format_tile(tile))?;
                }
                Err(error) => writeln!(out, "rejected: {error}")?,
            },
            Step::Damage {
                tile,
                amount,
                at_ms,
            } => {
                let now = Duration::from_millis(*at_ms);
                match manager.inflict_damage(*tile, *amount, now) {
                    Ok(outcome) => writeln!(out, "hit {}: {outcome:?}", format_tile(*tile))?,
                    Err(error) => writeln!(out, "hit {} failed: {error}", format_tile(*tile))?,
                }
            }
            Step::Reachable { actor } => {
                let actor = manager.metrics().world_to_tile(*actor);
                writeln!(out, "{}", format_tiles(&manager.reachable_tiles(actor)))?;
            }
            Step::Teardown => {
                let removed = world::teardown(manager.grid());
                writeln!(out, "teardown removed {removed} structure(s)")?;
            }
        }
    }
    Ok(())
}

/// Formats a tile as `(column, row)`.
pub(crate) fn format_tile(tile: TileCoord) -> String {
    format!("({}, {})", tile.column(), tile.row())
}

/// Formats tiles as a space separated list.
pub(crate) fn format_tiles(tiles: &[TileCoord]) -> String {
    tiles
        .iter()
        .map(|tile| format_tile(*tile))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockade_core::BuildConfig;
    use blockade_world::TileGrid;

    fn manager() -> BuildManager {
        let config = BuildConfig {
            tile_size: 10.0,
            build_range_tiles: 1,
            grid_width: 4,
            grid_height: 4,
            ..BuildConfig::default()
        };
        let grid = TileGrid::from_config(&config);
        let _ = grid
            .borrow_mut()
            .load([TileCoord::new(0, 3), TileCoord::new(1, 3)])
            .expect("terrain fits");
        BuildManager::new(grid, &config)
    }

    #[test]
    fn parses_tagged_steps() {
        let script = Script::from_toml_str(
            r#"
                [[step]]
                action = "place"
                cursor = [15.0, 25.0]
                actor = [5.0, 25.0]

                [[step]]
                action = "damage"
                tile = { column = 1, row = 2 }
                amount = 40
                at_ms = 250

                [[step]]
                action = "teardown"
            "#,
        )
        .expect("script parses");

        assert_eq!(
            script.steps,
            vec![
                Step::Place {
                    cursor: Vec2::new(15.0, 25.0),
                    actor: Vec2::new(5.0, 25.0),
                },
                Step::Damage {
                    tile: TileCoord::new(1, 2),
                    amount: 40,
                    at_ms: 250,
                },
                Step::Teardown,
            ],
        );
    }

    #[test]
    fn session_reports_each_step() {
        let mut manager = manager();
        let script = Script {
            steps: vec![
                Step::Place {
                    cursor: Vec2::new(15.0, 25.0),
                    actor: Vec2::new(5.0, 25.0),
                },
                Step::Place {
                    cursor: Vec2::new(35.0, 5.0),
                    actor: Vec2::new(5.0, 25.0),
                },
                Step::Damage {
                    tile: TileCoord::new(1, 2),
                    amount: 100,
                    at_ms: 0,
                },
                Step::Reachable {
                    actor: Vec2::new(5.0, 25.0),
                },
            ],
        };
        let mut out = Vec::new();

        run(&mut manager, &script, &mut out).expect("session runs");

        let report = String::from_utf8(out).expect("utf-8 output");
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines[0], "placed (1, 2)");
        assert_eq!(lines[1], "rejected: placement rejected: tile is outside the build range");
        assert_eq!(lines[2], "hit (1, 2): Destroyed");
        assert_eq!(lines[3], "(0, 1) (1, 1) (0, 2) (1, 2)");
    }
}
