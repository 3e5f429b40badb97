#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that drives the Blockade build subsystem.

mod script;

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use blockade_core::{BuildConfig, Vec2};
use blockade_system_builder::BuildManager;
use blockade_world::{LevelLayer, TileGrid};
use clap::{Parser, Subcommand};

use crate::script::Script;

/// Command-line arguments for the Blockade build tool.
#[derive(Debug, Parser)]
#[command(name = "blockade", about = "Inspect and replay tile build sessions")]
struct CliArgs {
    /// TOML file overriding the default build configuration.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// TOML tile layer providing the level terrain.
    #[arg(long, value_name = "PATH")]
    level: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

/// Operations exposed by the command-line interface.
#[derive(Debug, Subcommand)]
enum Command {
    /// Lists the tiles an actor may build on.
    Reachable {
        /// Actor position in world units, written as `X,Y`.
        #[arg(long, value_parser = parse_point)]
        actor: Vec2,
    },
    /// Describes the placement under a cursor without building anything.
    Preview {
        /// Cursor position in world units, written as `X,Y`.
        #[arg(long, value_parser = parse_point)]
        cursor: Vec2,
        /// Actor position in world units, written as `X,Y`.
        #[arg(long, value_parser = parse_point)]
        actor: Vec2,
    },
    /// Replays a scripted session of placements and hits.
    Run {
        /// TOML session script.
        script: PathBuf,
    },
}

/// Entry point for the Blockade command-line interface.
fn main() -> Result<()> {
    env_logger::init();
    let args = CliArgs::parse();

    let config = load_config(args.config.as_deref())?;
    let mut manager = build_manager(&config, args.level.as_deref())?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match args.command {
        Command::Reachable { actor } => {
            let actor = manager.metrics().world_to_tile(actor);
            let tiles = manager.reachable_tiles(actor);
            writeln!(out, "{}", script::format_tiles(&tiles))?;
        }
        Command::Preview { cursor, actor } => {
            let preview = manager.preview(cursor, actor);
            match preview.rejection {
                None => writeln!(
                    out,
                    "{} at ({}, {}): placeable",
                    script::format_tile(preview.tile),
                    preview.origin.x,
                    preview.origin.y
                )?,
                Some(rejection) => writeln!(
                    out,
                    "{} at ({}, {}): {rejection}",
                    script::format_tile(preview.tile),
                    preview.origin.x,
                    preview.origin.y
                )?,
            }
        }
        Command::Run { script: path } => {
            let source = fs::read_to_string(&path)
                .with_context(|| format!("failed to read script {}", path.display()))?;
            let session = Script::from_toml_str(&source)?;
            log::info!("replaying {} step(s) from {}", session.steps.len(), path.display());
            script::run(&mut manager, &session, &mut out)?;
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<BuildConfig> {
    let Some(path) = path else {
        return Ok(BuildConfig::default());
    };
    let source = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    BuildConfig::from_toml_str(&source)
        .with_context(|| format!("invalid config {}", path.display()))
}

fn build_manager(config: &BuildConfig, level: Option<&Path>) -> Result<BuildManager> {
    let grid = TileGrid::from_config(config);
    let Some(path) = level else {
        let _ = grid.borrow_mut().load(std::iter::empty())?;
        return Ok(BuildManager::new(grid, config));
    };

    let source = fs::read_to_string(path)
        .with_context(|| format!("failed to read level {}", path.display()))?;
    let layer: LevelLayer = toml::from_str(&source)
        .with_context(|| format!("failed to parse level {}", path.display()))?;
    if layer.width != config.grid_width || layer.height != config.grid_height {
        bail!(
            "level is {}x{} but the grid is configured as {}x{}",
            layer.width,
            layer.height,
            config.grid_width,
            config.grid_height
        );
    }
    let terrain = layer.occupied_tiles()?;
    let count = grid.borrow_mut().load(terrain)?;
    log::info!("loaded {count} terrain tile(s) from {}", path.display());
    Ok(BuildManager::new(grid, config))
}

fn parse_point(value: &str) -> Result<Vec2, String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("expected `X,Y`, got `{value}`"))?;
    let x: f32 = x.trim().parse().map_err(|error| format!("invalid x: {error}"))?;
    let y: f32 = y.trim().parse().map_err(|error| format!("invalid y: {error}"))?;
    Ok(Vec2::new(x, y))
}
