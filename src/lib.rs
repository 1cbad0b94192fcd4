//! Combat and NPC lifecycle engine for a multi-floor text RPG.
//!
//! The [`Engine`] owns the session registry, the NPC arena and the room
//! graph. Background [`Workers`] drive combat rounds, respawns, population
//! scaling and regeneration over that shared state.

pub mod combat;
pub mod config;
pub mod data;
pub mod engine;
pub mod entity;
pub mod error;
pub mod npc;
pub mod player;
pub mod population;
pub mod regen;
pub mod respawn;
pub mod scheduler;
pub mod services;
pub mod shutdown;
pub mod threat;
pub mod world;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{BossTrackerError, CombatError, DataError};
pub use npc::{Npc, NpcId, NpcState};
pub use player::{CharacterClass, Player};
pub use scheduler::Workers;
pub use services::{BossTracker, Catalog, ChannelNotifier, InMemoryBossTracker, LootCatalog, Notifier};
pub use shutdown::{Shutdown, ShutdownSignal, shutdown_channel};
pub use world::World;
