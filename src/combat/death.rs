use tracing::{debug, info, warn};

use super::{Battlefield, Fallen, capitalize};
use crate::npc::NpcId;
use crate::world::GroundItem;

/// Even share of a kill reward. The remainder is dropped.
pub fn split_reward(total: i64, attackers: usize) -> i64 {
    if attackers == 0 || total <= 0 {
        return 0;
    }
    total / attackers as i64
}

impl Battlefield<'_> {
    // ========================================================================
    // NPC Death
    // ========================================================================

    /// Resolve a kill: rewards, drops, boss tracking, then removal.
    pub(crate) fn npc_death(&mut self, id: NpcId) {
        let Some(npc) = self.npcs.get(id) else {
            return;
        };
        let gold_total = match self.catalog {
            Some(catalog) => catalog.roll_gold(npc, &mut *self.rng),
            None => 0,
        };
        let loot = match self.catalog {
            Some(catalog) => catalog.roll_loot(npc, &mut *self.rng),
            None => Vec::new(),
        };

        let Some(npc) = self.npcs.get_mut(id) else {
            return;
        };
        let attackers = npc.die();
        let npc_name = npc.name.clone();
        let display = capitalize(&npc.name);
        let room_id = npc.room_id.clone();
        let prototype_id = npc.prototype_id.clone();
        let boss = npc.boss;
        let respawn = npc.respawn;
        let transient = npc.transient;
        let xp_share = split_reward(npc.xp_reward, attackers.len());
        let gold_share = split_reward(gold_total, attackers.len());

        info!(
            npc = %id,
            name = %npc_name,
            room = %room_id,
            attackers = attackers.len(),
            xp_share,
            gold_share,
            "NPC slain"
        );

        // Rewards
        for attacker in &attackers {
            let Some(player) = self.players.get_mut(attacker) else {
                continue;
            };
            player.end_combat_with(id);
            player.kills += 1;
            let levels = player.award_exp(xp_share);
            player.gold += gold_share;
            let level = player.level;

            self.outbox.push(attacker, format!("You have slain {}!", npc_name));
            if xp_share > 0 {
                self.outbox.push(attacker, format!("You gain {} experience.", xp_share));
            }
            if gold_share > 0 {
                self.outbox.push(attacker, format!("You receive {} gold.", gold_share));
            }
            if levels > 0 {
                self.outbox.push(attacker, format!("You have reached level {}!", level));
            }
        }

        // Loot
        let mut dropped = Vec::new();
        for item_id in loot {
            let name = self.item_name(&item_id);
            self.world.place_item(&room_id, GroundItem::new(&item_id, &name));
            dropped.push(name);
        }
        if !dropped.is_empty() {
            self.outbox.to_room(
                self.world,
                &room_id,
                &format!("{} drops: {}.", display, dropped.join(", ")),
                &[],
            );
        }

        if boss {
            self.boss_rewards(&display, &prototype_id, &room_id, &attackers);
        }

        // Removal
        for player in self.players.values_mut() {
            player.end_combat_with(id);
        }
        self.outbox.to_room(self.world, &room_id, &format!("{} is dead!", display), &[]);
        self.world.remove_npc(&room_id, id);

        if transient {
            self.npcs.release(id);
            debug!(npc = %id, "Transient NPC released");
        } else {
            self.fallen.push(Fallen { npc: id, respawn });
        }
    }

    /// Floor boss key drop and final-boss area clears
    fn boss_rewards(&mut self, display: &str, prototype_id: &str, room_id: &str, attackers: &[String]) {
        let key = self
            .world
            .floor_of(room_id)
            .and_then(|floor| self.world.floor(floor))
            .and_then(|floor| floor.boss_key.clone());
        if let Some(key) = key {
            let name = self.item_name(&key);
            self.world.place_item(room_id, GroundItem::new(&key, &name));
            self.outbox.to_room(
                self.world,
                room_id,
                &format!("{} drops {}!", display, name),
                &[],
            );
        }

        let Some(area) = self.world.area_for_final_boss(prototype_id).cloned() else {
            return;
        };
        let was_unlocked = self.bosses.is_fully_unlocked();
        for attacker in attackers {
            if !self.players.contains_key(attacker) {
                continue;
            }
            match self.bosses.record_kill(&area.id, attacker) {
                Ok(true) => {
                    info!(player = %attacker, area = %area.id, "First area clear");
                    self.outbox.push(
                        attacker,
                        format!("You have conquered {}! You earn the title '{}'.", area.name, area.title),
                    );
                }
                Ok(false) => {
                    self.outbox.push(attacker, format!("You have conquered {} once again.", area.name));
                }
                Err(e) => warn!(player = %attacker, area = %area.id, "Failed to record boss kill: {}", e),
            }
        }

        if !was_unlocked && self.bosses.is_fully_unlocked() {
            info!("Every area has been cleared");
            let names: Vec<String> = self.players.keys().cloned().collect();
            for name in names {
                self.outbox.push(&name, "The spire shudders. Every area has been conquered!");
            }
        }
    }

    fn item_name(&self, item_id: &str) -> String {
        self.catalog
            .and_then(|catalog| catalog.get_item_by_id(item_id))
            .map_or_else(|| item_id.to_string(), |item| item.display_name)
    }

    // ========================================================================
    // Player Death
    // ========================================================================

    /// Send a fallen player back to the starting room at full health.
    /// No items or gold are lost.
    pub(crate) fn player_death(&mut self, name: &str) {
        let Some(player) = self.players.get_mut(name) else {
            return;
        };
        player.alive = false;
        player.deaths += 1;
        player.end_combat();
        let from = player.room_id.clone();

        let touched = self.npcs.forget_attacker(name);
        info!(player = name, room = %from, npcs = touched.len(), "Player slain");

        self.outbox.to_room(self.world, &from, &format!("{} has been slain!", name), &[name]);

        let start = self.world.starting_room().to_string();
        let moved = self.world.move_player(name, &from, &start);
        if !moved {
            warn!(player = name, room = %start, "Starting room missing, player left in place");
        }
        if let Some(player) = self.players.get_mut(name) {
            player.restore();
            if moved {
                player.room_id = start.clone();
            }
        }

        self.outbox.push(name, "You have died! You awaken back at the start of your journey.");
        let room = if moved { &start } else { &from };
        if let Some(description) = self.world.describe_room(room) {
            self.outbox.push(name, description);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::npc::NpcState;
    use crate::services::BossTracker;

    #[test]
    fn test_split_reward_drops_remainder() {
        assert_eq!(split_reward(100, 3), 33);
        assert_eq!(split_reward(100, 1), 100);
        assert_eq!(split_reward(7, 0), 0);
        assert_eq!(split_reward(-5, 2), 0);
        for attackers in 1..=7 {
            let total = 100;
            let share = split_reward(total, attackers);
            let attackers = attackers as i64;
            assert!(share * attackers <= total);
            assert_eq!(total - share * attackers, total % attackers);
        }
    }

    #[test]
    fn test_three_way_kill_splits_xp_and_gold() {
        let mut arena = Arena::new();
        arena.catalog.gold = 10;
        for name in ["alice", "bob", "carol"] {
            arena.add_player(name, "cave");
        }
        let id = arena.add_npc(&goblin(), "cave");
        for name in ["alice", "bob", "carol"] {
            arena.fight(name, id);
        }

        let mut field = arena.battlefield();
        field.npc_death(id);
        let (outbox, fallen) = field.finish();

        for name in ["alice", "bob", "carol"] {
            let player = &arena.players[name];
            assert_eq!(player.exp, 33);
            assert_eq!(player.gold, 3);
            assert_eq!(player.kills, 1);
            assert!(!player.in_combat());
            assert!(outbox.messages_for(name).contains(&"You gain 33 experience."));
        }
        assert_eq!(fallen, vec![Fallen { npc: id, respawn: arena.npcs.get(id).unwrap().respawn }]);
        assert!(arena.world.room("cave").unwrap().npcs.is_empty());
        assert_eq!(arena.npcs.get(id).unwrap().state, NpcState::Dead);
    }

    #[test]
    fn test_loot_lands_in_room() {
        let mut arena = Arena::new();
        arena.catalog.loot = vec!["ear".to_string(), "mystery".to_string()];
        arena.add_player("alice", "cave");
        let id = arena.add_npc(&goblin(), "cave");
        arena.fight("alice", id);

        let mut field = arena.battlefield();
        field.npc_death(id);
        let (outbox, _) = field.finish();

        let items: Vec<&str> = arena.world.room("cave").unwrap().items.iter().map(|i| i.item_id.as_str()).collect();
        assert_eq!(items, vec!["ear", "mystery"]);
        assert!(outbox.messages_for("alice").contains(&"A goblin drops: the ear, mystery."));
    }

    #[test]
    fn test_without_catalog_kill_still_resolves() {
        let mut arena = Arena::new();
        arena.catalog.gold = 50;
        arena.catalog.loot = vec!["ear".to_string()];
        arena.add_player("alice", "cave");
        let id = arena.add_npc(&goblin(), "cave");
        arena.fight("alice", id);

        let mut field = arena.battlefield().with_catalog(None);
        field.npc_death(id);
        let (_, fallen) = field.finish();

        assert_eq!(arena.players["alice"].gold, 0);
        assert_eq!(arena.players["alice"].level, 2);
        assert!(arena.world.room("cave").unwrap().items.is_empty());
        assert_eq!(fallen.len(), 1);
    }

    #[test]
    fn test_final_boss_drops_key_and_records_clear() {
        let mut arena = Arena::new();
        arena.add_player("alice", "cave");
        arena.add_player("bob", "tunnel");
        let mut king = goblin();
        king.id = "goblin_king".to_string();
        king.display_name = "the Goblin King".to_string();
        king.behaviors.boss = true;
        let id = arena.add_npc(&king, "cave");
        arena.fight("alice", id);

        let mut field = arena.battlefield();
        field.npc_death(id);
        let (outbox, _) = field.finish();

        assert!(arena.world.room("cave").unwrap().items.iter().any(|i| i.item_id == "floor_1_key"));
        assert!(
            outbox
                .messages_for("alice")
                .contains(&"You have conquered The Warrens! You earn the title 'Warren Breaker'.")
        );
        assert!(arena.bosses.is_fully_unlocked());
        assert_eq!(
            outbox.messages_for("bob"),
            vec!["The spire shudders. Every area has been conquered!"]
        );
    }

    #[test]
    fn test_transient_npc_is_released_not_queued() {
        let mut arena = Arena::new();
        let id = arena.add_npc(&goblin(), "cave");
        arena.npc(id).transient = true;

        let mut field = arena.battlefield();
        field.npc_death(id);
        let (_, fallen) = field.finish();
        assert!(fallen.is_empty());
        assert!(arena.npcs.get(id).is_none());
        assert!(arena.npcs.is_empty());
        assert!(arena.world.room("cave").unwrap().npcs.is_empty());
    }

    #[test]
    fn test_player_death_returns_to_start_without_penalty() {
        let mut arena = Arena::new();
        arena.add_player("alice", "tunnel");
        arena.add_player("bob", "tunnel");
        arena.player("alice").gold = 40;
        arena.player("alice").weapon = Some("pin".to_string());
        let id = arena.add_npc(&goblin(), "tunnel");
        arena.fight("alice", id);
        arena.player("alice").hp = 2;

        let (outbox, _) = arena.round(false);

        let alice = &arena.players["alice"];
        assert_eq!(alice.deaths, 1);
        assert_eq!(alice.hp, alice.max_hp);
        assert_eq!(alice.gold, 40);
        assert_eq!(alice.weapon.as_deref(), Some("pin"));
        assert_eq!(alice.room_id, "cave");
        assert!(!alice.in_combat());
        assert!(arena.world.room("cave").unwrap().players.contains("alice"));
        assert!(!arena.npcs.get(id).unwrap().threat.contains("alice"));
        assert_eq!(arena.npcs.get(id).unwrap().state, NpcState::Idle);
        assert!(outbox.messages_for("bob").contains(&"alice has been slain!"));
        assert!(!outbox.messages_for("alice").contains(&"alice has been slain!"));
        assert!(outbox.messages_for("alice").iter().any(|line| line.starts_with("cave")));
    }
}
