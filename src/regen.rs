use std::collections::BTreeMap;

use crate::npc::{NpcArena, NpcState};
use crate::player::Player;

/// Points recovered per sweep: a percentage of the maximum, at least one
pub fn regen_amount(max: i32, percent: i32) -> i32 {
    if max <= 0 || percent <= 0 {
        return 0;
    }
    (max.saturating_mul(percent) / 100).max(1)
}

fn recover(current: &mut i32, max: i32, percent: i32) -> bool {
    if *current >= max {
        return false;
    }
    *current = (*current + regen_amount(max, percent)).min(max);
    true
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RegenReport {
    pub players: usize,
    pub npcs: usize,
}

/// Out-of-combat recovery for players and resting or fleeing NPCs.
/// A fleeing NPC that is back to full health calms down.
pub fn regenerate(players: &mut BTreeMap<String, Player>, npcs: &mut NpcArena, percent: i32) -> RegenReport {
    let mut report = RegenReport::default();

    for player in players.values_mut() {
        if !player.is_alive() || player.in_combat() {
            continue;
        }
        let hp = recover(&mut player.hp, player.max_hp, percent);
        let mana = recover(&mut player.mana, player.max_mana, percent);
        if hp || mana {
            report.players += 1;
        }
    }

    for npc in npcs.iter_mut() {
        if !npc.is_alive() || !matches!(npc.state, NpcState::Idle | NpcState::Fleeing) {
            continue;
        }
        let hp = recover(&mut npc.hp, npc.max_hp, percent);
        let mana = recover(&mut npc.mana, npc.max_mana, percent);
        if hp || mana {
            report.npcs += 1;
        }
        if npc.state == NpcState::Fleeing && npc.hp >= npc.max_hp {
            npc.state = NpcState::Idle;
        }
    }

    report
}
