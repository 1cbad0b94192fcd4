use tracing::debug;

use super::{Battlefield, capitalize};
use crate::npc::NpcState;

impl Battlefield<'_> {
    /// Let the first idle aggressive monster in the player's room jump them.
    /// At most one initiation per player per round.
    pub(crate) fn aggression(&mut self, name: &str, pilgrim_mode: bool) -> bool {
        if pilgrim_mode {
            return false;
        }
        let Some(player) = self.players.get(name) else {
            return false;
        };
        if !player.is_alive() || player.in_combat() {
            return false;
        }
        let room_id = player.room_id.clone();

        let Some(room) = self.world.room(&room_id) else {
            return false;
        };
        let attacker = room.npcs.iter().copied().find(|id| {
            self.npcs
                .get(*id)
                .is_some_and(|npc| npc.aggressive && npc.is_alive() && npc.state == NpcState::Idle)
        });
        let Some(id) = attacker else {
            return false;
        };

        let Some(npc) = self.npcs.get_mut(id) else {
            return false;
        };
        if !npc.engage(name) {
            return false;
        }
        let npc_name = capitalize(&npc.name);
        if let Some(player) = self.players.get_mut(name) {
            player.start_combat(id);
        }

        self.outbox.push(name, format!("{} attacks you!", npc_name));
        self.outbox.to_room(
            self.world,
            &room_id,
            &format!("{} attacks {}!", npc_name, name),
            &[name],
        );
        debug!(npc = %id, player = name, room = %room_id, "Aggressive NPC engaged");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use crate::npc::NpcState;

    fn aggressive_goblin() -> crate::entity::EntityPrototype {
        let mut proto = goblin();
        proto.behaviors.aggressive = true;
        proto
    }

    #[test]
    fn test_pilgrim_mode_blocks_aggression() {
        let mut arena = Arena::new();
        arena.add_player("alice", "cave");
        arena.add_npc(&aggressive_goblin(), "cave");

        let mut field = arena.battlefield();
        assert!(!field.aggression("alice", true));
        drop(field);
        assert!(!arena.players["alice"].in_combat());
    }

    #[test]
    fn test_one_initiation_per_player() {
        let mut arena = Arena::new();
        arena.add_player("alice", "cave");
        arena.add_player("bob", "cave");
        let first = arena.add_npc(&aggressive_goblin(), "cave");
        let second = arena.add_npc(&aggressive_goblin(), "cave");

        let mut field = arena.battlefield();
        assert!(field.aggression("alice", false));
        assert!(!field.aggression("alice", false));
        assert!(field.aggression("bob", false));
        let (outbox, _) = field.finish();

        assert_eq!(arena.players["alice"].combat_target, Some(first));
        assert_eq!(arena.players["bob"].combat_target, Some(second));
        assert!(outbox.messages_for("bob").contains(&"A goblin attacks alice!"));
    }

    #[test]
    fn test_passive_fleeing_and_busy_npcs_do_not_aggress() {
        let mut arena = Arena::new();
        arena.add_player("alice", "cave");
        arena.add_npc(&goblin(), "cave");
        let fleeing = arena.add_npc(&aggressive_goblin(), "cave");
        arena.npc(fleeing).state = NpcState::Fleeing;
        let busy = arena.add_npc(&aggressive_goblin(), "cave");
        arena.npc(busy).engage("bob");

        let mut field = arena.battlefield();
        assert!(!field.aggression("alice", false));
    }
}
