use crate::npc::NpcId;

const STARTING_HP: i32 = 20;
const STARTING_MANA: i32 = 10;

/// Experience required to advance from `level` to the next one
pub fn exp_for_level(level: i32) -> i64 {
    // 100 * level^1.5
    (100.0 * f64::from(level.max(1)).powf(1.5)) as i64
}

/// Standard ability modifier: (score - 10) / 2, rounded down
pub fn ability_modifier(score: i32) -> i32 {
    (score - 10).div_euclid(2)
}

// ============================================================================
// Abilities & Class
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbilityScores {
    pub strength: i32,
    pub dexterity: i32,
    pub constitution: i32,
    pub intelligence: i32,
    pub wisdom: i32,
    pub charisma: i32,
}

impl AbilityScores {
    pub fn get(&self, ability: Ability) -> i32 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Dexterity => self.dexterity,
            Ability::Constitution => self.constitution,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Charisma => self.charisma,
        }
    }

    pub fn modifier(&self, ability: Ability) -> i32 {
        ability_modifier(self.get(ability))
    }
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self {
            strength: 10,
            dexterity: 10,
            constitution: 10,
            intelligence: 10,
            wisdom: 10,
            charisma: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CharacterClass {
    #[default]
    Warrior,
    Rogue,
    Mage,
    Cleric,
}

impl CharacterClass {
    /// Ability that drives attack rolls and damage
    pub fn attack_ability(self) -> Ability {
        match self {
            CharacterClass::Warrior => Ability::Strength,
            CharacterClass::Rogue => Ability::Dexterity,
            CharacterClass::Mage => Ability::Intelligence,
            CharacterClass::Cleric => Ability::Wisdom,
        }
    }

    /// Die rolled for damage with no weapon equipped
    pub fn unarmed_die(self) -> i32 {
        match self {
            CharacterClass::Warrior => 6,
            CharacterClass::Rogue => 4,
            CharacterClass::Mage | CharacterClass::Cleric => 3,
        }
    }

    pub fn hp_per_level(self) -> i32 {
        match self {
            CharacterClass::Warrior => 10,
            CharacterClass::Rogue | CharacterClass::Cleric => 8,
            CharacterClass::Mage => 6,
        }
    }

    pub fn mana_per_level(self) -> i32 {
        match self {
            CharacterClass::Warrior => 2,
            CharacterClass::Rogue => 4,
            CharacterClass::Cleric => 8,
            CharacterClass::Mage => 10,
        }
    }
}

// ============================================================================
// Player
// ============================================================================

/// Live state of a connected player session
#[derive(Debug, Clone)]
pub struct Player {
    pub name: String,
    pub class: CharacterClass,
    pub abilities: AbilityScores,
    pub level: i32,
    pub exp: i64,
    pub exp_to_next_level: i64,
    pub gold: i64,
    pub hp: i32,
    pub max_hp: i32,
    pub mana: i32,
    pub max_mana: i32,
    /// Equipped weapon item id
    pub weapon: Option<String>,
    pub room_id: String,
    /// NPC this player is fighting; set iff the player is in combat
    pub combat_target: Option<NpcId>,
    pub alive: bool,
    pub deaths: u32,
    pub kills: u32,
}

impl Player {
    pub fn new(name: &str, class: CharacterClass, room_id: &str) -> Self {
        Self {
            name: name.to_string(),
            class,
            abilities: AbilityScores::default(),
            level: 1,
            exp: 0,
            exp_to_next_level: exp_for_level(1),
            gold: 0,
            hp: STARTING_HP,
            max_hp: STARTING_HP,
            mana: STARTING_MANA,
            max_mana: STARTING_MANA,
            weapon: None,
            room_id: room_id.to_string(),
            combat_target: None,
            alive: true,
            deaths: 0,
            kills: 0,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive && self.hp > 0
    }

    pub fn in_combat(&self) -> bool {
        self.combat_target.is_some()
    }

    /// Modifier added to attack rolls and damage
    pub fn attack_modifier(&self) -> i32 {
        self.abilities.modifier(self.class.attack_ability())
    }

    pub fn start_combat(&mut self, npc: NpcId) {
        self.combat_target = Some(npc);
    }

    /// Leave combat. Returns the NPC that was being fought, if any.
    pub fn end_combat(&mut self) -> Option<NpcId> {
        self.combat_target.take()
    }

    /// Leave combat only if currently fighting `npc`
    pub fn end_combat_with(&mut self, npc: NpcId) -> bool {
        if self.combat_target == Some(npc) {
            self.combat_target = None;
            true
        } else {
            false
        }
    }

    /// Apply damage clamped at zero, returning the health actually removed
    pub fn take_damage(&mut self, amount: i32) -> i32 {
        let dealt = amount.clamp(0, self.hp.max(0));
        self.hp -= dealt;
        dealt
    }

    /// Award EXP and handle level ups. Returns the number of levels gained.
    pub fn award_exp(&mut self, amount: i64) -> u32 {
        if amount <= 0 {
            return 0;
        }
        self.exp += amount;

        let mut gained = 0;
        while self.exp >= self.exp_to_next_level {
            self.exp -= self.exp_to_next_level;
            self.level += 1;
            self.exp_to_next_level = exp_for_level(self.level);

            // Level up bonuses: class-scaled max HP/mana, full restore
            let con = self.abilities.modifier(Ability::Constitution).max(0);
            self.max_hp += self.class.hp_per_level() + con;
            self.max_mana += self.class.mana_per_level();
            self.hp = self.max_hp;
            self.mana = self.max_mana;
            gained += 1;

            tracing::info!(player = %self.name, level = self.level, max_hp = self.max_hp, "Level up");
        }
        gained
    }

    /// Full restore after death
    pub fn restore(&mut self) {
        self.hp = self.max_hp;
        self.mana = self.max_mana;
        self.alive = true;
    }
}
