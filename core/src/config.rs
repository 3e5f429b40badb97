//! Configuration surface consumed by the grid and the build manager.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{DamageStage, GridBounds, TileMetrics};

const DEFAULT_TILE_SIZE: f32 = 60.0;
const DEFAULT_BUILD_RANGE_TILES: u32 = 2;
const DEFAULT_GRID_WIDTH: u32 = 32;
const DEFAULT_GRID_HEIGHT: u32 = 18;
const DEFAULT_DAMAGE_COOLDOWN_MS: u64 = 500;
const MAX_HEALTH: i32 = 100;

/// Health thresholds at which a structure enters each damage stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageThresholds {
    /// Health at or below which a structure shows [`DamageStage::Stage1`].
    pub stage1: i32,
    /// Health at or below which a structure shows [`DamageStage::Stage2`].
    pub stage2: i32,
}

impl Default for StageThresholds {
    fn default() -> Self {
        Self {
            stage1: 70,
            stage2: 30,
        }
    }
}

impl StageThresholds {
    /// Derives the damage stage for the provided health value.
    #[must_use]
    pub const fn stage_for(&self, health: i32) -> DamageStage {
        if health <= self.stage2 {
            DamageStage::Stage2
        } else if health <= self.stage1 {
            DamageStage::Stage1
        } else {
            DamageStage::Pristine
        }
    }
}

/// Tunables for the build subsystem, typically loaded from a TOML file.
///
/// Every field has a default, so a partial file only overrides what it names.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Side length of a tile in world units (pixels).
    pub tile_size: f32,
    /// Half-width of the square build range around the actor, in tiles.
    pub build_range_tiles: u32,
    /// Number of tile columns in the level.
    pub grid_width: u32,
    /// Number of tile rows in the level.
    pub grid_height: u32,
    /// Minimum time between two damage applications on one structure.
    pub damage_cooldown_ms: u64,
    /// Health thresholds for the damage stages.
    pub damage_stage_thresholds: StageThresholds,
    /// Disables the damage cooldown entirely. Intended for deterministic tests.
    pub cooldown_bypass: bool,
    /// Allows the first structure anywhere in bounds when the grid is empty.
    pub connectivity_bootstrap: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            build_range_tiles: DEFAULT_BUILD_RANGE_TILES,
            grid_width: DEFAULT_GRID_WIDTH,
            grid_height: DEFAULT_GRID_HEIGHT,
            damage_cooldown_ms: DEFAULT_DAMAGE_COOLDOWN_MS,
            damage_stage_thresholds: StageThresholds::default(),
            cooldown_bypass: false,
            connectivity_bootstrap: true,
        }
    }
}

impl BuildConfig {
    /// Parses and validates a configuration from TOML source text.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every field lies in its permitted range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tile_size.is_finite() && self.tile_size > 0.0) {
            return Err(ConfigError::InvalidTileSize(self.tile_size));
        }
        if self.grid_width == 0 || self.grid_height == 0 {
            return Err(ConfigError::EmptyGrid {
                width: self.grid_width,
                height: self.grid_height,
            });
        }
        let widest = self.grid_width.max(self.grid_height);
        if self.build_range_tiles > widest {
            return Err(ConfigError::BuildRangeTooLarge {
                range: self.build_range_tiles,
                widest,
            });
        }
        let StageThresholds { stage1, stage2 } = self.damage_stage_thresholds;
        if !(0 < stage2 && stage2 < stage1 && stage1 <= MAX_HEALTH) {
            return Err(ConfigError::InvalidThresholds { stage1, stage2 });
        }
        Ok(())
    }

    /// Damage cooldown window as a [`Duration`].
    #[must_use]
    pub const fn damage_cooldown(&self) -> Duration {
        Duration::from_millis(self.damage_cooldown_ms)
    }

    /// Grid dimensions described by this configuration.
    #[must_use]
    pub const fn grid_bounds(&self) -> GridBounds {
        GridBounds::new(self.grid_width, self.grid_height)
    }

    /// Coordinate converter for the configured tile size.
    #[must_use]
    pub fn tile_metrics(&self) -> TileMetrics {
        TileMetrics::new(self.tile_size)
    }
}

/// Errors raised while loading a [`BuildConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The TOML text could not be parsed.
    #[error("could not parse build configuration: {0}")]
    Parse(#[from] toml::de::Error),
    /// The tile size must be a positive, finite number.
    #[error("tile size must be positive, got {0}")]
    InvalidTileSize(f32),
    /// The grid must contain at least one tile on each axis.
    #[error("grid must be at least 1x1, got {width}x{height}")]
    EmptyGrid {
        /// Configured column count.
        width: u32,
        /// Configured row count.
        height: u32,
    },
    /// The build range may not exceed the longest grid side.
    #[error("build range of {range} tiles exceeds the grid's longest side of {widest}")]
    BuildRangeTooLarge {
        /// Configured build range.
        range: u32,
        /// Longest grid side in tiles.
        widest: u32,
    },
    /// Thresholds must satisfy `0 < stage2 < stage1 <= 100`.
    #[error("damage thresholds must satisfy 0 < stage2 < stage1 <= 100, got {stage1}/{stage2}")]
    InvalidThresholds {
        /// Configured first threshold.
        stage1: i32,
        /// Configured second threshold.
        stage2: i32,
    },
}
