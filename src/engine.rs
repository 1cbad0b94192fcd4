//! Shared engine state and the operations the host and background workers
//! drive it with.
//!
//! Locks are always taken in the order sessions → NPCs → world → respawn
//! queue. Messages are collected while locks are held and delivered after
//! they are released.

use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::combat::{Battlefield, Fallen, Outbox, capitalize};
use crate::config::EngineConfig;
use crate::entity::{self, EntityRegistry};
use crate::error::CombatError;
use crate::npc::{Npc, NpcArena, NpcId};
use crate::player::Player;
use crate::population;
use crate::regen::{self, RegenReport};
use crate::respawn::RespawnQueue;
use crate::services::{BossTracker, LootCatalog, Notifier};
use crate::world::World;

pub struct Engine {
    config: EngineConfig,
    entities: Arc<EntityRegistry>,
    sessions: RwLock<BTreeMap<String, Player>>,
    npcs: RwLock<NpcArena>,
    world: RwLock<World>,
    respawns: Mutex<RespawnQueue>,
    catalog: Option<Arc<dyn LootCatalog>>,
    bosses: Arc<dyn BossTracker>,
    notifier: Arc<dyn Notifier>,
    pilgrim_mode: AtomicBool,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        world: World,
        entities: Arc<EntityRegistry>,
        notifier: Arc<dyn Notifier>,
        bosses: Arc<dyn BossTracker>,
    ) -> Self {
        let pilgrim_mode = AtomicBool::new(config.world.pilgrim_mode);
        Self {
            config,
            entities,
            sessions: RwLock::new(BTreeMap::new()),
            npcs: RwLock::new(NpcArena::new()),
            world: RwLock::new(world),
            respawns: Mutex::new(RespawnQueue::new()),
            catalog: None,
            bosses,
            notifier,
            pilgrim_mode,
        }
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn LootCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Place every room's configured spawns
    pub async fn populate(&self) -> usize {
        let mut npcs = self.npcs.write().await;
        let mut world = self.world.write().await;
        let spawned = entity::populate_world(&self.entities, &mut npcs, &mut world);
        info!("Initial population: {} NPCs", spawned);
        spawned
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Register a session. Players in an unknown room start at the starting room.
    ///
    /// A name that is already online is disconnected first; its old record is
    /// returned for the host to persist.
    pub async fn connect(&self, mut player: Player) -> Option<Player> {
        let mut outbox = Outbox::new();
        let replaced = {
            let mut sessions = self.sessions.write().await;
            let mut npcs = self.npcs.write().await;
            let mut world = self.world.write().await;

            let replaced = sessions.remove(&player.name).map(|mut previous| {
                previous.end_combat();
                let touched = npcs.forget_attacker(&previous.name);
                world.remove_player(&previous.room_id, &previous.name);
                warn!(player = %previous.name, npcs = touched.len(), "Session replaced by reconnect");
                previous
            });
            if world.room(&player.room_id).is_none() {
                warn!(player = %player.name, room = %player.room_id, "Unknown room on connect, using starting room");
                player.room_id = world.starting_room().to_string();
            }
            world.add_player(&player.room_id, &player.name);
            if let Some(description) = world.describe_room(&player.room_id) {
                outbox.push(&player.name, description);
            }

            info!(player = %player.name, room = %player.room_id, "Player connected");
            sessions.insert(player.name.clone(), player);
            replaced
        };
        self.deliver(outbox);
        replaced
    }

    /// Drop a session, removing the name from every threat table. The
    /// returned record is the host's to persist.
    pub async fn disconnect(&self, name: &str) -> Option<Player> {
        let mut sessions = self.sessions.write().await;
        let mut npcs = self.npcs.write().await;
        let mut world = self.world.write().await;

        let mut player = sessions.remove(name)?;
        player.end_combat();
        let touched = npcs.forget_attacker(name);
        world.remove_player(&player.room_id, name);

        info!(player = name, npcs = touched.len(), "Player disconnected");
        Some(player)
    }

    // ========================================================================
    // Player Commands
    // ========================================================================

    /// Player-initiated attack on an NPC in the same room. Allowed in pilgrim mode.
    pub async fn engage(&self, name: &str, keyword: &str) -> Result<NpcId, CombatError> {
        let mut outbox = Outbox::new();
        let id = {
            let mut sessions = self.sessions.write().await;
            let mut npcs = self.npcs.write().await;
            let world = self.world.read().await;

            let player = sessions
                .get_mut(name)
                .ok_or_else(|| CombatError::UnknownPlayer(name.to_string()))?;
            if !player.is_alive() {
                return Err(CombatError::NotAlive);
            }
            if player.in_combat() {
                return Err(CombatError::AlreadyFighting);
            }

            let id = find_in_room(&npcs, &world, &player.room_id, keyword)
                .ok_or_else(|| CombatError::NoSuchTarget(keyword.to_string()))?;
            let npc = npcs
                .get_mut(id)
                .ok_or_else(|| CombatError::NoSuchTarget(keyword.to_string()))?;
            if !npc.engage(name) {
                return Err(CombatError::NoSuchTarget(keyword.to_string()));
            }
            player.start_combat(id);

            outbox.push(name, format!("You attack {}!", npc.name));
            outbox.to_room(&world, &player.room_id, &format!("{} attacks {}!", name, npc.name), &[name]);
            debug!(player = name, npc = %id, "Player engaged");
            id
        };
        self.deliver(outbox);
        Ok(id)
    }

    /// Stop attacking. The NPC forgets the player.
    pub async fn disengage(&self, name: &str) -> Result<(), CombatError> {
        let mut sessions = self.sessions.write().await;
        let mut npcs = self.npcs.write().await;

        let player = sessions
            .get_mut(name)
            .ok_or_else(|| CombatError::UnknownPlayer(name.to_string()))?;
        if let Some(id) = player.end_combat() {
            if let Some(npc) = npcs.get_mut(id) {
                npc.drop_target(name);
            }
            debug!(player = name, npc = %id, "Player disengaged");
        }
        Ok(())
    }

    /// Move a player. Combat is left alone; the next round notices the distance.
    pub async fn relocate_player(&self, name: &str, room_id: &str) -> bool {
        let mut outbox = Outbox::new();
        {
            let mut sessions = self.sessions.write().await;
            let mut world = self.world.write().await;

            let Some(player) = sessions.get_mut(name) else {
                return false;
            };
            if !world.move_player(name, &player.room_id, room_id) {
                warn!(player = name, room = room_id, "Relocation to unknown room refused");
                return false;
            }
            player.room_id = room_id.to_string();
            if let Some(description) = world.describe_room(room_id) {
                outbox.push(name, description);
            }
        }
        self.deliver(outbox);
        true
    }

    /// Make an NPC lose its next `ticks` combat turns
    pub async fn stun_npc(&self, id: NpcId, ticks: u32) -> bool {
        let mut npcs = self.npcs.write().await;
        match npcs.get_mut(id) {
            Some(npc) if npc.is_alive() => {
                npc.stun_ticks = npc.stun_ticks.saturating_add(ticks);
                true
            }
            _ => false,
        }
    }

    pub fn set_pilgrim_mode(&self, enabled: bool) {
        self.pilgrim_mode.store(enabled, Ordering::Relaxed);
        info!("Pilgrim mode {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn pilgrim_mode(&self) -> bool {
        self.pilgrim_mode.load(Ordering::Relaxed)
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    pub async fn player(&self, name: &str) -> Option<Player> {
        self.sessions.read().await.get(name).cloned()
    }

    pub async fn npc(&self, id: NpcId) -> Option<Npc> {
        self.npcs.read().await.get(id).cloned()
    }

    pub async fn find_npc(&self, room_id: &str, keyword: &str) -> Option<NpcId> {
        let npcs = self.npcs.read().await;
        let world = self.world.read().await;
        find_in_room(&npcs, &world, room_id, keyword)
    }

    pub async fn online_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn live_npc_count(&self, floor: u32) -> usize {
        self.world.read().await.live_npc_count(floor)
    }

    pub async fn respawn_queue_len(&self) -> usize {
        self.respawns.lock().await.len()
    }

    // ========================================================================
    // Periodic Work
    // ========================================================================

    /// Resolve one combat round across the whole world
    pub async fn combat_tick(&self) {
        let (outbox, fallen) = {
            let mut sessions = self.sessions.write().await;
            let mut npcs = self.npcs.write().await;
            let mut world = self.world.write().await;
            let mut rng = StdRng::from_entropy();

            let mut field = Battlefield::new(
                &mut sessions,
                &mut npcs,
                &mut world,
                self.bosses.as_ref(),
                &self.config.combat,
                &mut rng,
            )
            .with_catalog(self.catalog.as_deref());
            field.run_round(self.pilgrim_mode());
            field.finish()
        };

        self.queue_respawns(&fallen).await;
        self.deliver(outbox);
    }

    async fn queue_respawns(&self, fallen: &[Fallen]) {
        if fallen.is_empty() {
            return;
        }
        let mut queue = self.respawns.lock().await;
        let mut rng = StdRng::from_entropy();
        let now = Instant::now();
        for entry in fallen {
            match queue.enqueue(entry.npc, entry.respawn, now, &mut rng) {
                Some(deadline) => debug!(
                    npc = %entry.npc,
                    delay_ms = deadline.duration_since(now).as_millis() as u64,
                    "Queued respawn"
                ),
                None => debug!(npc = %entry.npc, "NPC does not respawn"),
            }
        }
    }

    /// Bring back every NPC whose respawn deadline has passed
    pub async fn respawn_sweep(&self) -> usize {
        let due = self.respawns.lock().await.take_due(Instant::now());
        if due.is_empty() {
            return 0;
        }

        let mut outbox = Outbox::new();
        let mut restored = 0;
        {
            let mut npcs = self.npcs.write().await;
            let mut world = self.world.write().await;

            for entry in due {
                let Some(npc) = npcs.get_mut(entry.npc) else {
                    warn!(npc = %entry.npc, "Respawn entry for unknown NPC");
                    continue;
                };
                npc.reset_for_respawn();
                if !world.add_npc(&npc.origin_room, npc.id) {
                    warn!(npc = %npc.id, room = %npc.origin_room, "Origin room missing, respawn abandoned");
                    continue;
                }
                outbox.to_room(&world, &npc.origin_room, &format!("{} appears.", capitalize(&npc.name)), &[]);
                info!(npc = %npc.id, name = %npc.name, room = %npc.origin_room, "NPC respawned");
                restored += 1;
            }
        }

        self.deliver(outbox);
        restored
    }

    /// Top up floors that are short of monsters for the current player load
    pub async fn population_sweep(&self) -> usize {
        let settings = &self.config.population;
        if !settings.enabled {
            return 0;
        }
        let online = self.sessions.read().await.len();

        let mut npcs = self.npcs.write().await;
        let mut world = self.world.write().await;
        let floors: Vec<(u32, usize)> = world
            .floors()
            .map(|floor| (floor.number, world.live_npc_count(floor.number)))
            .collect();
        let floor_count = world.floor_count();

        let plan = population::plan_spawns(settings, online, &floors);
        if plan.is_empty() {
            return 0;
        }
        let mut rng = StdRng::from_entropy();
        let spawned = population::apply_plan(&self.entities, &mut npcs, &mut world, &plan, &mut rng);
        info!(online, floors = floor_count, arena = npcs.len(), spawned = spawned.len(), "Population sweep");
        spawned.len()
    }

    /// Out-of-combat recovery
    pub async fn regen_sweep(&self) -> RegenReport {
        let mut sessions = self.sessions.write().await;
        let mut npcs = self.npcs.write().await;
        let report = regen::regenerate(&mut sessions, &mut npcs, self.config.regen.percent);
        debug!(players = report.players, npcs = report.npcs, "Regeneration sweep");
        report
    }

    fn deliver(&self, outbox: Outbox) {
        for (player, text) in outbox.into_messages() {
            self.notifier.send_message(&player, &text);
        }
    }
}

fn find_in_room(npcs: &NpcArena, world: &World, room_id: &str, keyword: &str) -> Option<NpcId> {
    world.room(room_id)?.npcs.iter().copied().find(|id| {
        npcs.get(*id)
            .is_some_and(|npc| npc.is_alive() && npc.matches_keyword(keyword))
    })
}
