use rand::Rng;
use tracing::{debug, warn};

use super::{Battlefield, capitalize};
use crate::npc::NpcId;
use crate::world::Direction;

impl Battlefield<'_> {
    // ========================================================================
    // Player Attacks
    // ========================================================================

    /// One swing from an in-combat player at their target NPC
    pub(crate) fn player_attack(&mut self, name: &str) {
        let Some(player) = self.players.get(name) else {
            return;
        };
        let Some(target) = player.combat_target else {
            return;
        };
        if !player.is_alive() {
            return;
        }
        let room_id = player.room_id.clone();
        let modifier = player.attack_modifier();
        let weapon = player.weapon.clone();
        let class = player.class;

        let reachable = self
            .npcs
            .get(target)
            .is_some_and(|npc| npc.is_alive() && npc.room_id == room_id);
        if !reachable {
            debug!(player = name, npc = %target, "Combat target unreachable, ending combat");
            if let Some(player) = self.players.get_mut(name) {
                player.end_combat();
            }
            if let Some(npc) = self.npcs.get_mut(target) {
                npc.drop_target(name);
            }
            self.outbox.push(name, "Your opponent has vanished.");
            return;
        }

        let die = self.config.attack_die.max(1);
        let roll = self.rng.gen_range(1..=die) + modifier;

        // Weapon damage range when the catalog knows the weapon, class die otherwise
        let weapon_range = weapon
            .as_deref()
            .and_then(|id| self.catalog.and_then(|catalog| catalog.get_item_by_id(id)))
            .and_then(|item| if item.is_weapon() { item.weapon } else { None });
        let base = match weapon_range {
            Some(stats) => self.rng.gen_range(stats.damage_min..=stats.damage_max.max(stats.damage_min)),
            None => self.rng.gen_range(1..=class.unarmed_die()),
        };

        let Some(npc) = self.npcs.get_mut(target) else {
            return;
        };
        let npc_name = npc.name.clone();

        if roll < npc.armor_class {
            self.outbox.push(name, format!("You miss {}.", npc_name));
            return;
        }

        let sneak = npc.threat.threat_of(name) == 0;
        let mut damage = (base + modifier).max(1);
        if sneak {
            damage = damage.saturating_mul(self.config.sneak_attack_multiplier.max(1));
        }

        let dealt = npc.take_damage(damage);
        npc.add_threat(name, i64::from(dealt));
        let remaining = npc.hp;
        let others: Vec<String> = npc.threat.targets().into_iter().filter(|a| a != name).collect();

        if sneak {
            self.outbox.push(name, format!("You sneak attack {} for {} damage!", npc_name, dealt));
        } else {
            self.outbox.push(name, format!("You hit {} for {} damage.", npc_name, dealt));
        }
        for other in &others {
            self.outbox.push(other, format!("{} hits {} for {} damage.", name, npc_name, dealt));
        }
        debug!(player = name, npc = %target, roll, dealt, remaining, sneak, "Player hit");

        if remaining == 0 {
            self.npc_death(target);
        }
    }

    // ========================================================================
    // NPC Attacks
    // ========================================================================

    /// One action from an in-combat NPC: flee, drop a stale target, or strike
    pub(crate) fn npc_attack(&mut self, id: NpcId) {
        let Some(npc) = self.npcs.get_mut(id) else {
            return;
        };
        if !npc.is_alive() || !npc.in_combat() {
            return;
        }
        if npc.stun_ticks > 0 {
            npc.stun_ticks -= 1;
            let text = format!("{} is stunned and cannot act.", capitalize(&npc.name));
            let room_id = npc.room_id.clone();
            self.outbox.to_room(self.world, &room_id, &text, &[]);
            return;
        }
        let wants_to_flee = npc.should_flee();

        if wants_to_flee && self.flee(id) {
            return;
        }

        let Some(npc) = self.npcs.get_mut(id) else {
            return;
        };
        let Some(target) = npc.threat.highest().map(str::to_string) else {
            npc.disengage_all();
            return;
        };

        let valid = self
            .players
            .get(&target)
            .is_some_and(|p| p.is_alive() && p.room_id == npc.room_id && p.combat_target == Some(id));
        if !valid {
            debug!(npc = %id, player = %target, "Dropping stale combat target");
            npc.drop_target(&target);
            if let Some(player) = self.players.get_mut(&target) {
                player.end_combat_with(id);
            }
            return;
        }

        let damage = npc.damage.roll(&mut *self.rng);
        let npc_name = capitalize(&npc.name);
        let others: Vec<String> = npc.threat.targets().into_iter().filter(|a| *a != target).collect();

        let Some(player) = self.players.get_mut(&target) else {
            return;
        };
        let dealt = player.take_damage(damage);
        let remaining = player.hp;

        self.outbox.push(&target, format!("{} hits you for {} damage.", npc_name, dealt));
        for other in &others {
            self.outbox.push(other, format!("{} hits {} for {} damage.", npc_name, target, dealt));
        }
        debug!(npc = %id, player = %target, dealt, remaining, "NPC hit");

        if remaining == 0 {
            self.player_death(&target);
        }
    }

    /// Run through a random horizontal exit. Returns false when cornered.
    fn flee(&mut self, id: NpcId) -> bool {
        let Some(npc) = self.npcs.get(id) else {
            return false;
        };
        let from = npc.room_id.clone();
        let exits: Vec<(Direction, String)> = match self.world.room(&from) {
            Some(room) => room
                .horizontal_exits()
                .into_iter()
                .map(|(dir, target)| (dir, target.to_string()))
                .collect(),
            None => {
                warn!(npc = %id, room = %from, "NPC is in an unknown room");
                return false;
            }
        };
        if exits.is_empty() {
            debug!(npc = %id, room = %from, "NPC is cornered and fights on");
            return false;
        }

        let (direction, to) = &exits[self.rng.gen_range(0..exits.len())];
        if !self.world.move_npc(id, &from, to) {
            warn!(npc = %id, from = %from, to = %to, "Flee destination missing");
            return false;
        }

        let Some(npc) = self.npcs.get_mut(id) else {
            return false;
        };
        let attackers = npc.start_fleeing();
        npc.room_id = to.clone();
        let npc_name = capitalize(&npc.name);

        for attacker in &attackers {
            if let Some(player) = self.players.get_mut(attacker) {
                player.end_combat_with(id);
            }
        }
        self.outbox.to_room(
            self.world,
            &from,
            &format!("{} flees {}!", npc_name, direction.as_str()),
            &[],
        );
        self.outbox.to_room(
            self.world,
            to,
            &format!("{} arrives in a panic.", npc_name),
            &[],
        );
        debug!(npc = %id, from = %from, to = %to, "NPC fled");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use crate::npc::NpcState;

    #[test]
    fn test_sneak_attack_only_on_first_hit() {
        let mut arena = Arena::new();
        arena.add_player("alice", "cave");
        arena.player("alice").weapon = Some("pin".to_string());
        let mut proto = goblin();
        proto.stats.damage_min = 0;
        proto.stats.damage_max = 0;
        let id = arena.add_npc(&proto, "cave");
        arena.fight("alice", id);

        let mut field = arena.battlefield();
        field.player_attack("alice");
        field.player_attack("alice");
        let (outbox, _) = field.finish();

        assert_eq!(
            outbox.messages_for("alice"),
            vec!["You sneak attack a goblin for 2 damage!", "You hit a goblin for 1 damage."]
        );
        assert_eq!(arena.npcs.get(id).unwrap().hp, 27);
        assert_eq!(arena.npcs.get(id).unwrap().threat.threat_of("alice"), 3);
    }

    #[test]
    fn test_miss_against_high_armor() {
        let mut arena = Arena::new();
        arena.add_player("alice", "cave");
        let mut proto = goblin();
        proto.stats.armor_class = 100;
        let id = arena.add_npc(&proto, "cave");
        arena.fight("alice", id);

        let mut field = arena.battlefield();
        field.player_attack("alice");
        let (outbox, _) = field.finish();

        assert_eq!(outbox.messages_for("alice"), vec!["You miss a goblin."]);
        assert_eq!(arena.npcs.get(id).unwrap().hp, 30);
    }

    #[test]
    fn test_other_engaged_players_see_the_hit() {
        let mut arena = Arena::new();
        arena.add_player("alice", "cave");
        arena.add_player("bob", "cave");
        arena.player("alice").weapon = Some("pin".to_string());
        let id = arena.add_npc(&goblin(), "cave");
        arena.fight("alice", id);
        arena.fight("bob", id);

        let mut field = arena.battlefield();
        field.player_attack("alice");
        let (outbox, _) = field.finish();

        assert_eq!(outbox.messages_for("bob"), vec!["alice hits a goblin for 2 damage."]);
    }

    #[test]
    fn test_vanished_target_ends_combat() {
        let mut arena = Arena::new();
        arena.add_player("alice", "cave");
        let id = arena.add_npc(&goblin(), "tunnel");
        arena.fight("alice", id);

        let mut field = arena.battlefield();
        field.player_attack("alice");
        let (outbox, _) = field.finish();

        assert!(!arena.players["alice"].in_combat());
        assert!(!arena.npcs.get(id).unwrap().threat.contains("alice"));
        assert_eq!(outbox.messages_for("alice"), vec!["Your opponent has vanished."]);
    }

    #[test]
    fn test_flee_relocates_through_horizontal_exit_without_attacking() {
        let mut arena = Arena::new();
        arena.add_player("alice", "cave");
        arena.player("alice").weapon = Some("maul".to_string());
        let mut proto = goblin();
        proto.stats.max_hp = 100;
        proto.stats.flee_threshold = 20;
        let id = arena.add_npc(&proto, "cave");
        arena.fight("alice", id);
        // Prior damage so the maul lands without the sneak bonus
        arena.npc(id).add_threat("alice", 1);

        let (outbox, fallen) = arena.round(false);

        let npc = arena.npcs.get(id).unwrap();
        assert!(fallen.is_empty());
        assert_eq!(npc.hp, 15);
        assert_eq!(npc.state, NpcState::Fleeing);
        assert_eq!(npc.room_id, "tunnel");
        assert!(npc.threat.is_empty());
        assert!(arena.world.room("tunnel").unwrap().npcs.contains(&id));
        assert!(!arena.world.room("cave").unwrap().npcs.contains(&id));
        assert_eq!(arena.players["alice"].hp, 20);
        assert!(!arena.players["alice"].in_combat());
        assert!(outbox.messages_for("alice").contains(&"A goblin flees east!"));
    }

    #[test]
    fn test_cornered_npc_fights_on() {
        let mut arena = Arena::new();
        arena.add_player("alice", "loft");
        let mut proto = goblin();
        proto.stats.max_hp = 100;
        proto.stats.flee_threshold = 20;
        let id = arena.add_npc(&proto, "loft");
        arena.npc(id).hp = 10;
        arena.fight("alice", id);

        let mut field = arena.battlefield();
        field.npc_attack(id);
        drop(field);

        assert_eq!(arena.npcs.get(id).unwrap().room_id, "loft");
        assert_eq!(arena.players["alice"].hp, 18);
    }

    #[test]
    fn test_stunned_npc_loses_its_turn() {
        let mut arena = Arena::new();
        arena.add_player("alice", "cave");
        let id = arena.add_npc(&goblin(), "cave");
        arena.fight("alice", id);
        arena.npc(id).stun_ticks = 1;

        let mut field = arena.battlefield();
        field.npc_attack(id);
        field.npc_attack(id);
        drop(field);

        assert_eq!(arena.npcs.get(id).unwrap().stun_ticks, 0);
        assert_eq!(arena.players["alice"].hp, 18);
    }

    #[test]
    fn test_highest_threat_is_struck_and_stale_target_dropped() {
        let mut arena = Arena::new();
        arena.add_player("alice", "cave");
        arena.add_player("bob", "cave");
        let id = arena.add_npc(&goblin(), "cave");
        arena.fight("alice", id);
        arena.fight("bob", id);
        arena.npc(id).add_threat("bob", 5);
        arena.npc(id).add_threat("alice", 2);

        let mut field = arena.battlefield();
        field.npc_attack(id);
        drop(field);
        assert_eq!(arena.players["bob"].hp, 18);
        assert_eq!(arena.players["alice"].hp, 20);

        // bob walks away; the next swing drops him instead of hitting anyone
        arena.world.move_player("bob", "cave", "tunnel");
        arena.player("bob").room_id = "tunnel".to_string();
        let mut field = arena.battlefield();
        field.npc_attack(id);
        drop(field);
        assert!(!arena.npcs.get(id).unwrap().threat.contains("bob"));
        assert!(!arena.players["bob"].in_combat());
        assert_eq!(arena.players["alice"].hp, 20);
    }

    #[test]
    fn test_target_not_fighting_back_is_stale() {
        let mut arena = Arena::new();
        arena.add_player("alice", "cave");
        let id = arena.add_npc(&goblin(), "cave");
        arena.npc(id).engage("alice");

        let mut field = arena.battlefield();
        field.npc_attack(id);
        drop(field);

        assert_eq!(arena.players["alice"].hp, 20);
        assert!(arena.npcs.get(id).unwrap().threat.is_empty());
        assert_eq!(arena.npcs.get(id).unwrap().state, NpcState::Idle);
    }
}
