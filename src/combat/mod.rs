//! One synchronous combat round over the locked world graph.
//!
//! The engine takes the session, NPC and room locks, builds a [`Battlefield`]
//! over them and runs a round. Everything players should hear is collected in
//! an [`Outbox`] and delivered after the locks are released; NPCs that died
//! are reported as [`Fallen`] so the caller can queue their respawn.

mod aggression;
mod attack;
mod death;

pub use death::split_reward;

use rand::RngCore;
use std::collections::BTreeMap;

use crate::config::CombatConfig;
use crate::npc::{NpcArena, NpcId, RespawnTiming};
use crate::player::Player;
use crate::services::{BossTracker, LootCatalog};
use crate::world::World;

// ============================================================================
// Outbox
// ============================================================================

/// Messages produced while locks are held, delivered once they are released
#[derive(Debug, Default)]
pub struct Outbox {
    messages: Vec<(String, String)>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, player: &str, text: impl Into<String>) {
        self.messages.push((player.to_string(), text.into()));
    }

    /// Send to every player in a room except those listed
    pub fn to_room(&mut self, world: &World, room_id: &str, text: &str, exclude: &[&str]) {
        if let Some(room) = world.room(room_id) {
            for name in &room.players {
                if !exclude.contains(&name.as_str()) {
                    self.messages.push((name.clone(), text.to_string()));
                }
            }
        }
    }

    pub fn messages(&self) -> &[(String, String)] {
        &self.messages
    }

    /// Lines addressed to one player, in send order
    pub fn messages_for(&self, player: &str) -> Vec<&str> {
        self.messages
            .iter()
            .filter(|(to, _)| to == player)
            .map(|(_, text)| text.as_str())
            .collect()
    }

    pub fn into_messages(self) -> Vec<(String, String)> {
        self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// An NPC removed from the world this round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fallen {
    pub npc: NpcId,
    pub respawn: RespawnTiming,
}

/// "a goblin" -> "A goblin", for sentence starts
pub(crate) fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ============================================================================
// Battlefield
// ============================================================================

pub struct Battlefield<'a> {
    pub players: &'a mut BTreeMap<String, Player>,
    pub npcs: &'a mut NpcArena,
    pub world: &'a mut World,
    pub catalog: Option<&'a dyn LootCatalog>,
    pub bosses: &'a dyn BossTracker,
    pub config: &'a CombatConfig,
    pub rng: &'a mut dyn RngCore,
    pub outbox: Outbox,
    pub fallen: Vec<Fallen>,
}

impl<'a> Battlefield<'a> {
    pub fn new(
        players: &'a mut BTreeMap<String, Player>,
        npcs: &'a mut NpcArena,
        world: &'a mut World,
        bosses: &'a dyn BossTracker,
        config: &'a CombatConfig,
        rng: &'a mut dyn RngCore,
    ) -> Self {
        Self {
            players,
            npcs,
            world,
            catalog: None,
            bosses,
            config,
            rng,
            outbox: Outbox::new(),
            fallen: Vec::new(),
        }
    }

    pub fn with_catalog(mut self, catalog: Option<&'a dyn LootCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Resolve one combat round.
    ///
    /// Every in-combat player swings first, then every in-combat NPC room by
    /// room, then each free player is checked for aggressive monsters.
    pub fn run_round(&mut self, pilgrim_mode: bool) {
        let names: Vec<String> = self.players.keys().cloned().collect();

        for name in &names {
            self.player_attack(name);
        }

        let fighting: Vec<NpcId> = self
            .world
            .rooms()
            .flat_map(|room| room.npcs.iter().copied())
            .filter(|id| self.npcs.get(*id).is_some_and(|npc| npc.in_combat()))
            .collect();
        for id in fighting {
            self.npc_attack(id);
        }

        for name in &names {
            self.aggression(name, pilgrim_mode);
        }
    }

    pub fn finish(self) -> (Outbox, Vec<Fallen>) {
        (self.outbox, self.fallen)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::data::{ItemCategory, ItemDefinition, WeaponStats};
    use crate::entity::EntityPrototype;
    use crate::npc::Npc;
    use crate::player::CharacterClass;
    use crate::services::InMemoryBossTracker;
    use crate::world::{Area, Direction, Floor, Room};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    /// Catalog with fixed gold, a fixed loot list and a few weapons
    pub struct FixedCatalog {
        pub gold: i64,
        pub loot: Vec<String>,
    }

    impl LootCatalog for FixedCatalog {
        fn get_item_by_id(&self, id: &str) -> Option<ItemDefinition> {
            let weapon = |min, max| ItemDefinition {
                id: id.to_string(),
                display_name: id.replace('_', " "),
                description: String::new(),
                category: ItemCategory::Weapon,
                weapon: Some(WeaponStats { damage_min: min, damage_max: max }),
                unlocks_floor: None,
            };
            match id {
                "maul" => Some(weapon(85, 85)),
                "pin" => Some(weapon(1, 1)),
                "greatsword" => Some(weapon(500, 500)),
                "ear" | "floor_1_key" => Some(ItemDefinition {
                    id: id.to_string(),
                    display_name: format!("the {}", id.replace('_', " ")),
                    description: String::new(),
                    category: ItemCategory::Material,
                    weapon: None,
                    unlocks_floor: None,
                }),
                _ => None,
            }
        }

        fn roll_loot(&self, _npc: &Npc, _rng: &mut dyn RngCore) -> Vec<String> {
            self.loot.clone()
        }

        fn roll_gold(&self, _npc: &Npc, _rng: &mut dyn RngCore) -> i64 {
            self.gold
        }
    }

    /// Arena with a cave (floor 1) joined east to a tunnel and up to a loft
    pub struct Arena {
        pub players: BTreeMap<String, Player>,
        pub npcs: NpcArena,
        pub world: World,
        pub bosses: InMemoryBossTracker,
        pub catalog: FixedCatalog,
        pub config: CombatConfig,
        pub rng: StdRng,
    }

    impl Arena {
        pub fn new() -> Self {
            let mut world = World::new("cave");
            world.add_room(
                Room::new("cave", 1)
                    .with_exit(Direction::East, "tunnel")
                    .with_exit(Direction::Up, "loft"),
            );
            world.add_room(Room::new("tunnel", 1).with_exit(Direction::West, "cave"));
            world.add_room(Room::new("loft", 2).with_exit(Direction::Down, "cave"));
            world.add_floor(Floor {
                number: 1,
                boss_key: Some("floor_1_key".to_string()),
                spawn_table: vec!["goblin".to_string()],
            });
            world.add_area(Area {
                id: "warrens".to_string(),
                name: "The Warrens".to_string(),
                final_boss: "goblin_king".to_string(),
                title: "Warren Breaker".to_string(),
            });

            Self {
                players: BTreeMap::new(),
                npcs: NpcArena::new(),
                world,
                bosses: InMemoryBossTracker::new(["warrens"]),
                catalog: FixedCatalog { gold: 0, loot: Vec::new() },
                config: CombatConfig::default(),
                rng: StdRng::seed_from_u64(42),
            }
        }

        pub fn add_player(&mut self, name: &str, room: &str) {
            let player = Player::new(name, CharacterClass::Warrior, room);
            self.world.add_player(room, name);
            self.players.insert(name.to_string(), player);
        }

        pub fn player(&mut self, name: &str) -> &mut Player {
            self.players.get_mut(name).unwrap()
        }

        pub fn add_npc(&mut self, prototype: &EntityPrototype, room: &str) -> NpcId {
            let npc = Npc::from_prototype(self.npcs.next_id(), prototype, room, 1);
            let id = self.npcs.insert(npc);
            self.world.add_npc(room, id);
            id
        }

        pub fn npc(&mut self, id: NpcId) -> &mut Npc {
            self.npcs.get_mut(id).unwrap()
        }

        /// Put a player and NPC in combat with each other
        pub fn fight(&mut self, name: &str, id: NpcId) {
            self.npc(id).engage(name);
            self.player(name).start_combat(id);
        }

        pub fn battlefield(&mut self) -> Battlefield<'_> {
            Battlefield::new(
                &mut self.players,
                &mut self.npcs,
                &mut self.world,
                &self.bosses,
                &self.config,
                &mut self.rng,
            )
            .with_catalog(Some(&self.catalog as &dyn LootCatalog))
        }

        pub fn round(&mut self, pilgrim_mode: bool) -> (Outbox, Vec<Fallen>) {
            let mut field = self.battlefield();
            field.run_round(pilgrim_mode);
            field.finish()
        }
    }

    pub fn goblin() -> EntityPrototype {
        let mut proto = EntityPrototype::new("goblin", "a goblin");
        proto.stats.max_hp = 30;
        proto.stats.armor_class = 0;
        proto.stats.damage_min = 2;
        proto.stats.damage_max = 2;
        proto.stats.damage_bonus = 0;
        proto.rewards.exp_base = 100;
        proto
    }
}
