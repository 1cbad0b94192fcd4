use rand::Rng;
use tracing::{debug, warn};

use super::prototype::EntityPrototype;
use super::registry::EntityRegistry;
use crate::npc::{Npc, NpcArena, NpcId};
use crate::world::World;

/// Roll a prototype's loot table, returning item ids in table order
pub fn roll_loot_table<R: Rng + ?Sized>(prototype: &EntityPrototype, rng: &mut R) -> Vec<String> {
    let mut drops = Vec::new();
    for entry in &prototype.loot {
        let chance = f64::from(entry.drop_chance).clamp(0.0, 1.0);
        if rng.gen_bool(chance) {
            drops.push(entry.item_id.clone());
        }
    }
    drops
}

/// Roll gold for a kill, scaled by NPC level
pub fn roll_gold<R: Rng + ?Sized>(prototype: &EntityPrototype, level: i32, rng: &mut R) -> i64 {
    let rewards = &prototype.rewards;
    if rewards.gold_max <= 0 {
        return 0;
    }
    let low = rewards.gold_min.clamp(0, rewards.gold_max);
    rng.gen_range(low..=rewards.gold_max) * i64::from(level.max(1))
}

/// The one creation path for NPCs: initial population and the population
/// controller both come through here.
pub fn spawn_npc(
    registry: &EntityRegistry,
    npcs: &mut NpcArena,
    world: &mut World,
    prototype_id: &str,
    room_id: &str,
    transient: bool,
) -> Option<NpcId> {
    let Some(prototype) = registry.get(prototype_id) else {
        warn!(prototype = prototype_id, room = room_id, "Unknown prototype, spawn skipped");
        return None;
    };
    if world.room(room_id).is_none() {
        warn!(prototype = prototype_id, room = room_id, "Unknown room, spawn skipped");
        return None;
    }
    if prototype.behaviors.unique && npcs.has_prototype(prototype_id) {
        debug!(prototype = prototype_id, "Unique NPC already exists, spawn skipped");
        return None;
    }

    let level = world.floor_of(room_id).map_or(1, |floor| floor.max(1) as i32);
    let mut npc = Npc::from_prototype(npcs.next_id(), prototype, room_id, level);
    npc.transient = transient;
    let id = npcs.insert(npc);
    world.add_npc(room_id, id);

    debug!(npc = %id, prototype = prototype_id, room = room_id, transient, "Spawned NPC");
    Some(id)
}

/// Place every room's configured spawns. Returns how many NPCs were created.
pub fn populate_world(registry: &EntityRegistry, npcs: &mut NpcArena, world: &mut World) -> usize {
    let placements: Vec<(String, String)> = world
        .rooms()
        .flat_map(|room| {
            room.spawns
                .iter()
                .map(move |proto| (proto.clone(), room.id.clone()))
        })
        .collect();

    placements
        .iter()
        .filter(|(proto, room)| spawn_npc(registry, npcs, world, proto, room, false).is_some())
        .count()
}
