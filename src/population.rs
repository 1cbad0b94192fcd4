//! Scales each floor's monster count with the number of players online.

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::config::PopulationConfig;
use crate::entity::{EntityRegistry, spawn_npc};
use crate::npc::{NpcArena, NpcId};
use crate::world::World;

/// Spawns requested for one floor this sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloorDemand {
    pub floor: u32,
    pub live: usize,
    pub target: usize,
    pub spawns: usize,
}

/// Live-monster target shared by every floor for this many players online
pub fn floor_target(config: &PopulationConfig, online: usize, floor_count: usize) -> usize {
    if online == 0 || floor_count == 0 || config.baseline_per_floor == 0 {
        return 0;
    }
    let baseline = config.baseline_per_floor as f64;
    let players_per_floor = online as f64 / floor_count as f64;
    let desired = players_per_floor * config.target_ratio;
    let multiplier = (desired / baseline).clamp(1.0, 10.0);
    (baseline * multiplier).round() as usize
}

/// Work out which floors are short, given `(floor, live npcs)` pairs.
pub fn plan_spawns(config: &PopulationConfig, online: usize, floors: &[(u32, usize)]) -> Vec<FloorDemand> {
    let target = floor_target(config, online, floors.len());
    if target == 0 {
        return Vec::new();
    }

    floors
        .iter()
        .filter_map(|&(floor, live)| {
            let spawns = target.saturating_sub(live).min(config.max_spawns_per_sweep);
            (spawns > 0).then_some(FloorDemand {
                floor,
                live,
                target,
                spawns,
            })
        })
        .collect()
}

/// Fulfil a plan through the standard spawner, picking a random prototype
/// from the floor's spawn table and a random room on that floor per spawn.
pub fn apply_plan<R: Rng + ?Sized>(
    registry: &EntityRegistry,
    npcs: &mut NpcArena,
    world: &mut World,
    plan: &[FloorDemand],
    rng: &mut R,
) -> Vec<NpcId> {
    let mut spawned = Vec::new();

    for demand in plan {
        let table = match world.floor(demand.floor) {
            Some(floor) if !floor.spawn_table.is_empty() => floor.spawn_table.clone(),
            _ => {
                debug!(floor = demand.floor, "No spawn table, skipping floor");
                continue;
            }
        };
        let rooms: Vec<String> = world
            .rooms_on_floor(demand.floor)
            .into_iter()
            .map(str::to_string)
            .collect();
        if rooms.is_empty() {
            continue;
        }

        for _ in 0..demand.spawns {
            let (Some(prototype), Some(room)) = (table.choose(rng), rooms.choose(rng)) else {
                break;
            };
            if let Some(id) = spawn_npc(registry, npcs, world, prototype, room, true) {
                spawned.push(id);
            }
        }
        debug!(
            floor = demand.floor,
            live = demand.live,
            target = demand.target,
            requested = demand.spawns,
            "Population sweep"
        );
    }

    spawned
}
