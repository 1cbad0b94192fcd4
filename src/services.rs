//! Collaborators the engine calls out to: player notification, boss-clear
//! tracking and the item/loot catalog.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::RngCore;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::data::{ItemDefinition, ItemRegistry};
use crate::entity::{self, EntityRegistry};
use crate::error::BossTrackerError;
use crate::npc::Npc;

// ============================================================================
// Notification
// ============================================================================

/// Best-effort, non-blocking delivery of text to a player
pub trait Notifier: Send + Sync {
    fn send_message(&self, player: &str, text: &str);
}

/// Per-player bounded queues drained by the host's connection writers
#[derive(Default)]
pub struct ChannelNotifier {
    senders: DashMap<String, mpsc::Sender<String>>,
}

impl ChannelNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a queue for a player, returning the receiving end
    pub fn open(&self, player: &str, capacity: usize) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.register(player, tx);
        rx
    }

    pub fn register(&self, player: &str, sender: mpsc::Sender<String>) {
        self.senders.insert(player.to_string(), sender);
        debug!("Registered sender for player {}", player);
    }

    pub fn unregister(&self, player: &str) {
        self.senders.remove(player);
        debug!("Unregistered sender for player {}", player);
    }
}

impl Notifier for ChannelNotifier {
    fn send_message(&self, player: &str, text: &str) {
        if let Some(sender) = self.senders.get(player) {
            // A full or closed queue drops the line; it must never stall a tick
            if let Err(e) = sender.try_send(text.to_string()) {
                warn!("Failed to send message to {}: {}", player, e);
            }
        } else {
            debug!("No sender registered for player {}", player);
        }
    }
}

// ============================================================================
// Boss Tracking
// ============================================================================

pub trait BossTracker: Send + Sync {
    /// Record a final-boss kill. Ok(true) on this player's first clear of the area.
    fn record_kill(&self, area_id: &str, player: &str) -> Result<bool, BossTrackerError>;

    /// Whether every tracked area has been cleared at least once
    fn is_fully_unlocked(&self) -> bool;
}

/// Process-local tracker; a persistent backend plugs in behind the same trait
pub struct InMemoryBossTracker {
    areas: Vec<String>,
    clears: DashMap<(String, String), DateTime<Utc>>,
}

impl InMemoryBossTracker {
    pub fn new<I, S>(areas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            areas: areas.into_iter().map(Into::into).collect(),
            clears: DashMap::new(),
        }
    }

    pub fn first_clear(&self, area_id: &str, player: &str) -> Option<DateTime<Utc>> {
        self.clears
            .get(&(area_id.to_string(), player.to_string()))
            .map(|entry| *entry.value())
    }
}

impl BossTracker for InMemoryBossTracker {
    fn record_kill(&self, area_id: &str, player: &str) -> Result<bool, BossTrackerError> {
        if !self.areas.iter().any(|a| a == area_id) {
            return Err(BossTrackerError::UnknownArea(area_id.to_string()));
        }
        let key = (area_id.to_string(), player.to_string());
        let mut first = false;
        self.clears.entry(key).or_insert_with(|| {
            first = true;
            Utc::now()
        });
        Ok(first)
    }

    fn is_fully_unlocked(&self) -> bool {
        !self.areas.is_empty()
            && self
                .areas
                .iter()
                .all(|area| self.clears.iter().any(|entry| &entry.key().0 == area))
    }
}

// ============================================================================
// Item / Loot Catalog
// ============================================================================

pub trait LootCatalog: Send + Sync {
    fn get_item_by_id(&self, id: &str) -> Option<ItemDefinition>;

    /// Item ids dropped by this kill
    fn roll_loot(&self, npc: &Npc, rng: &mut dyn RngCore) -> Vec<String>;

    /// Total gold for this kill, before splitting between attackers
    fn roll_gold(&self, npc: &Npc, rng: &mut dyn RngCore) -> i64;
}

/// Catalog backed by the TOML item and entity registries
pub struct Catalog {
    items: Arc<ItemRegistry>,
    entities: Arc<EntityRegistry>,
}

impl Catalog {
    pub fn new(items: Arc<ItemRegistry>, entities: Arc<EntityRegistry>) -> Self {
        Self { items, entities }
    }
}

impl LootCatalog for Catalog {
    fn get_item_by_id(&self, id: &str) -> Option<ItemDefinition> {
        self.items.get(id).cloned()
    }

    fn roll_loot(&self, npc: &Npc, rng: &mut dyn RngCore) -> Vec<String> {
        match self.entities.get(&npc.prototype_id) {
            Some(prototype) => entity::roll_loot_table(prototype, rng)
                .into_iter()
                .filter(|id| {
                    let known = self.items.contains(id);
                    if !known {
                        warn!(npc = %npc.id, item = %id, "Loot table references unknown item");
                    }
                    known
                })
                .collect(),
            None => Vec::new(),
        }
    }

    fn roll_gold(&self, npc: &Npc, rng: &mut dyn RngCore) -> i64 {
        self.entities
            .get(&npc.prototype_id)
            .map_or(0, |prototype| entity::roll_gold(prototype, npc.level, rng))
    }
}
