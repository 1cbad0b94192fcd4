use rand::Rng;
use std::time::Duration;

use crate::entity::EntityPrototype;
use crate::threat::ThreatTable;

// ============================================================================
// NPC Handle
// ============================================================================

/// Arena slot plus generation. An NPC keeps its handle across death and
/// respawn; a released slot gets a new generation, so old handles go stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NpcId {
    pub index: usize,
    pub generation: u32,
}

impl NpcId {
    pub const fn new(index: usize) -> Self {
        Self { index, generation: 0 }
    }
}

impl std::fmt::Display for NpcId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.generation == 0 {
            write!(f, "npc#{}", self.index)
        } else {
            write!(f, "npc#{}.{}", self.index, self.generation)
        }
    }
}

// ============================================================================
// NPC State
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NpcState {
    Idle,
    InCombat,
    Fleeing,
    /// Removed from the world, waiting on the respawn queue
    Dead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageProfile {
    pub min: i32,
    pub max: i32,
    pub bonus: i32,
}

impl DamageProfile {
    /// Roll one hit; never below zero
    pub fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> i32 {
        let low = self.min.min(self.max);
        let high = self.max.max(self.min);
        (rng.gen_range(low..=high) + self.bonus).max(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RespawnTiming {
    pub median: Duration,
    pub variance: Duration,
}

impl RespawnTiming {
    pub fn is_enabled(&self) -> bool {
        !self.median.is_zero()
    }
}

// ============================================================================
// NPC Entity
// ============================================================================

#[derive(Debug, Clone)]
pub struct Npc {
    pub id: NpcId,
    /// Entity prototype this NPC was built from (e.g. "goblin")
    pub prototype_id: String,
    pub name: String,
    pub keywords: Vec<String>,
    pub unique: bool,
    pub level: i32,
    pub hp: i32,
    pub max_hp: i32,
    pub mana: i32,
    pub max_mana: i32,
    pub armor_class: i32,
    pub damage: DamageProfile,
    pub aggressive: bool,
    pub boss: bool,
    /// Health percentage below which the NPC runs (0 = never)
    pub flee_threshold: i32,
    pub xp_reward: i64,
    pub origin_room: String,
    pub room_id: String,
    pub respawn: RespawnTiming,
    pub state: NpcState,
    pub threat: ThreatTable,
    /// Remaining combat turns this NPC loses
    pub stun_ticks: u32,
    /// Spawned by the population controller; never re-queued on death
    pub transient: bool,
}

impl Npc {
    /// Create an NPC from an entity prototype
    pub fn from_prototype(id: NpcId, prototype: &EntityPrototype, room_id: &str, level: i32) -> Self {
        let stats = &prototype.stats;
        Self {
            id,
            prototype_id: prototype.id.clone(),
            name: prototype.display_name.clone(),
            keywords: prototype.keywords.clone(),
            unique: prototype.behaviors.unique,
            level,
            hp: stats.max_hp,
            max_hp: stats.max_hp,
            mana: stats.max_mana,
            max_mana: stats.max_mana,
            armor_class: stats.armor_class,
            damage: DamageProfile {
                min: stats.damage_min,
                max: stats.damage_max,
                bonus: stats.damage_bonus,
            },
            aggressive: prototype.behaviors.aggressive,
            boss: prototype.behaviors.boss,
            flee_threshold: stats.flee_threshold,
            xp_reward: prototype.rewards.exp_base * i64::from(level.max(1)),
            origin_room: room_id.to_string(),
            room_id: room_id.to_string(),
            respawn: RespawnTiming {
                median: Duration::from_secs(stats.respawn_median_secs),
                variance: Duration::from_secs(stats.respawn_variance_secs),
            },
            state: NpcState::Idle,
            threat: ThreatTable::new(),
            stun_ticks: 0,
            transient: false,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.state != NpcState::Dead && self.hp > 0
    }

    pub fn in_combat(&self) -> bool {
        self.state == NpcState::InCombat
    }

    pub fn matches_keyword(&self, keyword: &str) -> bool {
        let keyword = keyword.trim().to_lowercase();
        !keyword.is_empty()
            && (self.keywords.iter().any(|k| k.to_lowercase() == keyword)
                || self.name.to_lowercase().contains(&keyword))
    }

    /// Add an attacker and enter combat. Dead NPCs cannot be engaged.
    pub fn engage(&mut self, attacker: &str) -> bool {
        if !self.is_alive() {
            return false;
        }
        self.threat.engage(attacker);
        self.state = NpcState::InCombat;
        true
    }

    /// Record damage from an attacker, engaging them if needed
    pub fn add_threat(&mut self, attacker: &str, amount: i64) {
        self.threat.add(attacker, amount);
        if self.is_alive() {
            self.state = NpcState::InCombat;
        }
    }

    /// Drop one attacker; with nobody left the NPC leaves combat
    pub fn drop_target(&mut self, attacker: &str) -> bool {
        let removed = self.threat.remove(attacker);
        if self.threat.is_empty() && self.state == NpcState::InCombat {
            self.state = NpcState::Idle;
        }
        removed
    }

    /// Clear every attacker, returning them in engagement order
    pub fn disengage_all(&mut self) -> Vec<String> {
        let attackers = self.threat.clear();
        if self.state == NpcState::InCombat {
            self.state = NpcState::Idle;
        }
        attackers
    }

    /// Apply damage clamped at zero, returning the health actually removed
    pub fn take_damage(&mut self, amount: i32) -> i32 {
        let dealt = amount.clamp(0, self.hp.max(0));
        self.hp -= dealt;
        dealt
    }

    /// Whether health has dropped below the flee threshold
    pub fn should_flee(&self) -> bool {
        self.flee_threshold > 0
            && self.hp > 0
            && i64::from(self.hp) * 100 < i64::from(self.max_hp) * i64::from(self.flee_threshold)
    }

    pub fn start_fleeing(&mut self) -> Vec<String> {
        let attackers = self.threat.clear();
        self.state = NpcState::Fleeing;
        attackers
    }

    /// Mark dead. Threat is cleared and attackers returned in engagement order.
    pub fn die(&mut self) -> Vec<String> {
        let attackers = self.threat.clear();
        self.hp = 0;
        self.state = NpcState::Dead;
        self.stun_ticks = 0;
        attackers
    }

    /// Restore for re-materialization in the origin room
    pub fn reset_for_respawn(&mut self) {
        self.hp = self.max_hp;
        self.mana = self.max_mana;
        self.threat.clear();
        self.stun_ticks = 0;
        self.state = NpcState::Idle;
        self.room_id = self.origin_room.clone();
    }
}

// ============================================================================
// NPC Arena
// ============================================================================

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    npc: Option<Npc>,
}

/// Owns every NPC. Handles of respawning NPCs never change; slots of
/// released NPCs are reused under a new generation.
#[derive(Debug, Default)]
pub struct NpcArena {
    slots: Vec<Slot>,
    free: Vec<usize>,
}

impl NpcArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an NPC, assigning its handle
    pub fn insert(&mut self, mut npc: Npc) -> NpcId {
        let id = self.next_id();
        npc.id = id;
        match self.free.pop() {
            Some(index) => self.slots[index].npc = Some(npc),
            None => self.slots.push(Slot { generation: 0, npc: Some(npc) }),
        }
        id
    }

    /// Handle the next insert will receive
    pub fn next_id(&self) -> NpcId {
        match self.free.last() {
            Some(&index) => NpcId {
                index,
                generation: self.slots[index].generation,
            },
            None => NpcId::new(self.slots.len()),
        }
    }

    /// Remove an NPC for good and free its slot
    pub fn release(&mut self, id: NpcId) -> Option<Npc> {
        let slot = self.slots.get_mut(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        let npc = slot.npc.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        Some(npc)
    }

    pub fn get(&self, id: NpcId) -> Option<&Npc> {
        self.slots
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.npc.as_ref())
    }

    pub fn get_mut(&mut self, id: NpcId) -> Option<&mut Npc> {
        self.slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.npc.as_mut())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Npc> {
        self.slots.iter().filter_map(|slot| slot.npc.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Npc> {
        self.slots.iter_mut().filter_map(|slot| slot.npc.as_mut())
    }

    /// True if any NPC built from this prototype exists, dead or alive
    pub fn has_prototype(&self, prototype_id: &str) -> bool {
        self.iter().any(|n| n.prototype_id == prototype_id)
    }

    /// Remove an attacker from every threat table, returning the NPCs touched
    pub fn forget_attacker(&mut self, attacker: &str) -> Vec<NpcId> {
        let mut touched = Vec::new();
        for npc in self.iter_mut() {
            if npc.drop_target(attacker) {
                touched.push(npc.id);
            }
        }
        touched
    }

    /// NPCs currently held, dead ones waiting on respawn included
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slots allocated so far, free ones included
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn goblin() -> Npc {
        let mut proto = EntityPrototype::new("goblin", "a goblin");
        proto.stats.max_hp = 100;
        proto.stats.flee_threshold = 20;
        proto.rewards.exp_base = 30;
        Npc::from_prototype(NpcId::new(0), &proto, "cave", 2)
    }

    #[test]
    fn test_from_prototype_scales_xp_by_level() {
        let npc = goblin();
        assert_eq!(npc.xp_reward, 60);
        assert_eq!(npc.origin_room, "cave");
        assert_eq!(npc.state, NpcState::Idle);
        assert_eq!(npc.respawn.median, Duration::from_secs(60));
    }

    #[test]
    fn test_engage_and_drop_last_target_goes_idle() {
        let mut npc = goblin();
        assert!(npc.engage("alice"));
        assert!(npc.in_combat());
        npc.engage("bob");

        npc.drop_target("alice");
        assert!(npc.in_combat());
        npc.drop_target("bob");
        assert_eq!(npc.state, NpcState::Idle);
    }

    #[test]
    fn test_damage_is_clamped_at_zero() {
        let mut npc = goblin();
        npc.hp = 5;
        assert_eq!(npc.take_damage(12), 5);
        assert_eq!(npc.hp, 0);
        assert_eq!(npc.take_damage(3), 0);
    }

    #[test]
    fn test_flee_threshold() {
        let mut npc = goblin();
        npc.hp = 20;
        assert!(!npc.should_flee());
        npc.hp = 15;
        assert!(npc.should_flee());

        npc.flee_threshold = 0;
        assert!(!npc.should_flee());
    }

    #[test]
    fn test_die_then_respawn_resets_everything() {
        let mut npc = goblin();
        npc.add_threat("alice", 40);
        npc.add_threat("bob", 10);
        npc.room_id = "tunnel".to_string();
        npc.stun_ticks = 2;
        npc.mana = 0;

        assert_eq!(npc.die(), vec!["alice", "bob"]);
        assert!(!npc.is_alive());
        assert!(!npc.engage("carol"));

        npc.reset_for_respawn();
        assert_eq!(npc.hp, npc.max_hp);
        assert_eq!(npc.mana, npc.max_mana);
        assert!(npc.threat.is_empty());
        assert_eq!(npc.state, NpcState::Idle);
        assert_eq!(npc.room_id, "cave");
        assert_eq!(npc.stun_ticks, 0);
    }

    #[test]
    fn test_damage_roll_stays_in_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let profile = DamageProfile { min: 2, max: 5, bonus: 1 };
        for _ in 0..100 {
            let roll = profile.roll(&mut rng);
            assert!((3..=6).contains(&roll));
        }
    }

    #[test]
    fn test_arena_handles_are_stable() {
        let mut arena = NpcArena::new();
        let a = arena.insert(goblin());
        let b = arena.insert(goblin());
        assert_eq!(a, NpcId::new(0));
        assert_eq!(b, NpcId::new(1));
        assert_eq!(arena.get(b).unwrap().id, b);

        arena.get_mut(a).unwrap().engage("alice");
        arena.get_mut(b).unwrap().engage("alice");
        assert_eq!(arena.forget_attacker("alice"), vec![a, b]);
        assert_eq!(arena.get(a).unwrap().state, NpcState::Idle);
    }

    #[test]
    fn test_released_slot_is_reused_under_new_generation() {
        let mut arena = NpcArena::new();
        let a = arena.insert(goblin());
        let b = arena.insert(goblin());

        assert!(arena.release(a).is_some());
        assert!(arena.get(a).is_none());
        assert!(arena.release(a).is_none());
        assert_eq!(arena.len(), 1);

        let c = arena.insert(goblin());
        assert_eq!(c.index, a.index);
        assert_ne!(c, a);
        assert!(arena.get(a).is_none());
        assert_eq!(arena.get(c).unwrap().id, c);
        assert_eq!(arena.get(b).unwrap().id, b);
        assert_eq!(arena.capacity(), 2);
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_keyword_matching() {
        let npc = goblin();
        assert!(npc.matches_keyword("Goblin"));
        assert!(npc.matches_keyword("gob"));
        assert!(!npc.matches_keyword("rat"));
        assert!(!npc.matches_keyword("  "));
    }
}
