//! Engine configuration loaded from `engine.toml`.
//!
//! Every field has a default, so a missing file or section falls back to the
//! observed production cadences (3s combat, 5s respawn, 30s population).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::error::DataError;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub combat: CombatConfig,
    #[serde(default)]
    pub respawn: RespawnConfig,
    #[serde(default)]
    pub population: PopulationConfig,
    #[serde(default)]
    pub regen: RegenConfig,
}

impl EngineConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, DataError> {
        if !path.exists() {
            warn!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| DataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: EngineConfig = toml::from_str(&content).map_err(|source| DataError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        info!("Loaded engine config from {:?}", path);
        Ok(config)
    }
}

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct WorldConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Pilgrim mode: no NPC-initiated combat anywhere on the server
    #[serde(default)]
    pub pilgrim_mode: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            pilgrim_mode: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CombatConfig {
    #[serde(default = "default_combat_tick_ms")]
    pub tick_ms: u64,
    /// Sides on the attack die
    #[serde(default = "default_attack_die")]
    pub attack_die: i32,
    /// Damage multiplier for a first hit against an NPC
    #[serde(default = "default_sneak_multiplier")]
    pub sneak_attack_multiplier: i32,
}

impl CombatConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_combat_tick_ms(),
            attack_die: default_attack_die(),
            sneak_attack_multiplier: default_sneak_multiplier(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RespawnConfig {
    #[serde(default = "default_respawn_sweep_ms")]
    pub sweep_ms: u64,
}

impl RespawnConfig {
    pub fn sweep(&self) -> Duration {
        Duration::from_millis(self.sweep_ms)
    }
}

impl Default for RespawnConfig {
    fn default() -> Self {
        Self {
            sweep_ms: default_respawn_sweep_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PopulationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_population_interval_ms")]
    pub interval_ms: u64,
    /// Desired live monsters per player on a floor
    #[serde(default = "default_target_ratio")]
    pub target_ratio: f64,
    /// Live monsters a floor carries with a single player online
    #[serde(default = "default_baseline_per_floor")]
    pub baseline_per_floor: usize,
    #[serde(default = "default_max_spawns_per_sweep")]
    pub max_spawns_per_sweep: usize,
}

impl PopulationConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: default_population_interval_ms(),
            target_ratio: default_target_ratio(),
            baseline_per_floor: default_baseline_per_floor(),
            max_spawns_per_sweep: default_max_spawns_per_sweep(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegenConfig {
    #[serde(default = "default_regen_interval_ms")]
    pub interval_ms: u64,
    /// Percentage of max health/mana recovered per sweep
    #[serde(default = "default_regen_percent")]
    pub percent: i32,
}

impl RegenConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for RegenConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_regen_interval_ms(),
            percent: default_regen_percent(),
        }
    }
}

fn default_data_dir() -> PathBuf { PathBuf::from("data") }
fn default_combat_tick_ms() -> u64 { 3000 }
fn default_attack_die() -> i32 { 20 }
fn default_sneak_multiplier() -> i32 { 2 }
fn default_respawn_sweep_ms() -> u64 { 5000 }
fn default_true() -> bool { true }
fn default_population_interval_ms() -> u64 { 30_000 }
fn default_target_ratio() -> f64 { 5.0 }
fn default_baseline_per_floor() -> usize { 8 }
fn default_max_spawns_per_sweep() -> usize { 5 }
fn default_regen_interval_ms() -> u64 { 10_000 }
fn default_regen_percent() -> i32 { 10 }
