//! Destructible structures and the permanent terrain tiles they attach to.

use std::{
    cell::RefCell,
    rc::{Rc, Weak},
    time::Duration,
};

use blockade_core::{
    BuildConfig, BuildError, DamageStage, InvalidArgument, MapObserver, Observer, ObserverList,
    StageThresholds, TileCoord,
};

/// Health every structure starts with.
pub const MAX_HEALTH: i32 = 100;

/// Shared handle to a structure registered in the grid.
pub type StructureRef = Rc<RefCell<Structure>>;

/// Damage behaviour applied to newly built structures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DamageSettings {
    cooldown: Duration,
    thresholds: StageThresholds,
    bypass_cooldown: bool,
}

impl DamageSettings {
    /// Creates settings with an explicit cooldown window and thresholds.
    #[must_use]
    pub const fn new(cooldown: Duration, thresholds: StageThresholds) -> Self {
        Self {
            cooldown,
            thresholds,
            bypass_cooldown: false,
        }
    }

    /// Disables the cooldown so every hit is applied.
    #[must_use]
    pub const fn with_cooldown_bypass(mut self, bypass: bool) -> Self {
        self.bypass_cooldown = bypass;
        self
    }

    /// Minimum simulated time between two applied hits.
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Reports whether the cooldown is disabled.
    #[must_use]
    pub const fn bypasses_cooldown(&self) -> bool {
        self.bypass_cooldown
    }
}

impl Default for DamageSettings {
    fn default() -> Self {
        Self::from(&BuildConfig::default())
    }
}

impl From<&BuildConfig> for DamageSettings {
    fn from(config: &BuildConfig) -> Self {
        Self::new(config.damage_cooldown(), config.damage_stage_thresholds)
            .with_cooldown_bypass(config.cooldown_bypass)
    }
}

/// Result of delivering a hit to a tile occupant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DamageOutcome {
    /// The hit reduced health and the structure survived.
    Applied {
        /// Health remaining after the hit.
        health: i32,
        /// Stage derived from the remaining health.
        stage: DamageStage,
    },
    /// The hit arrived inside the cooldown window and was dropped.
    Suppressed,
    /// The hit reduced health to zero and the structure was destroyed.
    Destroyed,
    /// The occupant cannot take damage: it is permanent or already destroyed.
    Inert,
}

/// A player-placed structure that degrades under damage and can be destroyed.
///
/// States are `Alive` and `Destroyed`; destruction is terminal. On the
/// transition every registered [`MapObserver`] is told which tile was
/// vacated, exactly once, and all registrations are dropped.
#[derive(Debug)]
pub struct Structure {
    tile: TileCoord,
    health: i32,
    stage: DamageStage,
    settings: DamageSettings,
    next_eligible_at: Option<Duration>,
    destroyed: bool,
    vacancy_observers: ObserverList<dyn MapObserver>,
    change_observers: ObserverList<dyn Observer>,
}

impl Structure {
    /// Creates a pristine structure fixed at `tile`.
    #[must_use]
    pub fn new(tile: TileCoord, settings: DamageSettings) -> Self {
        Self {
            tile,
            health: MAX_HEALTH,
            stage: DamageStage::Pristine,
            settings,
            next_eligible_at: None,
            destroyed: false,
            vacancy_observers: ObserverList::new(),
            change_observers: ObserverList::new(),
        }
    }

    /// Creates a structure wrapped in a shared handle.
    #[must_use]
    pub fn shared(tile: TileCoord, settings: DamageSettings) -> StructureRef {
        Rc::new(RefCell::new(Self::new(tile, settings)))
    }

    /// Tile the structure was built on.
    #[must_use]
    pub const fn tile(&self) -> TileCoord {
        self.tile
    }

    /// Remaining health, clamped to `0..=100`.
    #[must_use]
    pub const fn health(&self) -> i32 {
        self.health
    }

    /// Visual degradation stage derived from the remaining health.
    #[must_use]
    pub const fn damage_stage(&self) -> DamageStage {
        self.stage
    }

    /// Reports whether the structure reached its terminal state.
    #[must_use]
    pub const fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Structures placed by the player may always be destroyed.
    #[must_use]
    pub const fn can_be_destroyed(&self) -> bool {
        true
    }

    /// Reports whether a hit delivered at `now` would be dropped.
    #[must_use]
    pub fn is_cooling_down(&self, now: Duration) -> bool {
        if self.settings.bypass_cooldown {
            return false;
        }
        self.next_eligible_at.map_or(false, |eligible| now < eligible)
    }

    /// Registers an observer told about the vacated tile on destruction.
    ///
    /// Returns `false` if the observer was already registered or the
    /// structure is destroyed.
    pub fn add_observer(&mut self, observer: Weak<RefCell<dyn MapObserver>>) -> bool {
        if self.destroyed {
            return false;
        }
        self.vacancy_observers.register(observer)
    }

    /// Registers an observer told about every applied hit.
    pub fn add_change_observer(&mut self, observer: Weak<RefCell<dyn Observer>>) -> bool {
        if self.destroyed {
            return false;
        }
        self.change_observers.register(observer)
    }

    /// Delivers a hit of `amount` at simulated time `now`.
    ///
    /// At most one hit is applied per cooldown window; others are dropped.
    pub fn inflict_damage(
        &mut self,
        amount: i32,
        now: Duration,
    ) -> Result<DamageOutcome, BuildError> {
        if amount <= 0 {
            return Err(InvalidArgument::NonPositiveDamage { amount }.into());
        }
        if self.destroyed {
            return Ok(DamageOutcome::Inert);
        }
        if self.is_cooling_down(now) {
            log::trace!(
                "hit on ({}, {}) dropped during cooldown",
                self.tile.column(),
                self.tile.row()
            );
            return Ok(DamageOutcome::Suppressed);
        }

        self.health = self.health.saturating_sub(amount).max(0);
        if !self.settings.bypass_cooldown {
            self.next_eligible_at = Some(now.saturating_add(self.settings.cooldown));
        }
        self.stage = self.settings.thresholds.stage_for(self.health);
        let _ = self.change_observers.notify();

        if self.health == 0 {
            self.destroy();
            return Ok(DamageOutcome::Destroyed);
        }

        Ok(DamageOutcome::Applied {
            health: self.health,
            stage: self.stage,
        })
    }

    /// Destroys the structure regardless of health.
    ///
    /// Returns `false` if it was already destroyed.
    pub fn remove(&mut self) -> bool {
        if self.destroyed {
            return false;
        }
        self.destroy();
        true
    }

    fn destroy(&mut self) {
        self.destroyed = true;
        let mut observers = std::mem::take(&mut self.vacancy_observers);
        self.change_observers.clear();
        let notified = observers.notify(self.tile);
        log::info!(
            "structure at ({}, {}) destroyed, {notified} observer(s) notified",
            self.tile.column(),
            self.tile.row()
        );
    }
}

/// Terrain tile present from level load. It cannot be damaged or removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PermanentStructure {
    tile: TileCoord,
}

impl PermanentStructure {
    /// Creates a permanent occupant for `tile`.
    #[must_use]
    pub const fn new(tile: TileCoord) -> Self {
        Self { tile }
    }

    /// Tile occupied by the terrain.
    #[must_use]
    pub const fn tile(&self) -> TileCoord {
        self.tile
    }

    /// Permanent terrain is never destroyed by gameplay.
    #[must_use]
    pub const fn can_be_destroyed(&self) -> bool {
        false
    }

    /// Damage against terrain has no effect.
    #[must_use]
    pub const fn inflict_damage(&self, _amount: i32, _now: Duration) -> DamageOutcome {
        DamageOutcome::Inert
    }
}
