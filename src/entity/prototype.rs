use serde::Deserialize;

// ============================================================================
// Raw TOML Structures (direct deserialization)
// ============================================================================

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawEntityStats {
    pub max_hp: Option<i32>,
    pub max_mana: Option<i32>,
    pub armor_class: Option<i32>,
    pub damage_min: Option<i32>,
    pub damage_max: Option<i32>,
    pub damage_bonus: Option<i32>,
    /// Flee when health drops below this percentage of max (0 = never)
    pub flee_threshold: Option<i32>,
    pub respawn_median_secs: Option<u64>,
    pub respawn_variance_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawEntityRewards {
    pub exp_base: Option<i64>,
    pub gold_min: Option<i64>,
    pub gold_max: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LootEntry {
    pub item_id: String,
    pub drop_chance: f32,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawEntityBehaviors {
    pub aggressive: Option<bool>,
    pub boss: Option<bool>,
    pub unique: Option<bool>,
}

/// Raw entity prototype as loaded directly from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct RawEntityPrototype {
    pub extends: Option<String>,

    pub display_name: Option<String>,
    pub description: Option<String>,
    /// Words a player can use to refer to this NPC
    pub keywords: Option<Vec<String>>,

    #[serde(default)]
    pub stats: RawEntityStats,

    #[serde(default)]
    pub rewards: RawEntityRewards,

    #[serde(default)]
    pub loot: Vec<LootEntry>,

    #[serde(default)]
    pub behaviors: RawEntityBehaviors,
}

// ============================================================================
// Resolved Structures (after inheritance)
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResolvedStats {
    pub max_hp: i32,
    pub max_mana: i32,
    pub armor_class: i32,
    pub damage_min: i32,
    pub damage_max: i32,
    pub damage_bonus: i32,
    pub flee_threshold: i32,
    pub respawn_median_secs: u64,
    pub respawn_variance_secs: u64,
}

impl Default for ResolvedStats {
    fn default() -> Self {
        Self {
            max_hp: 20,
            max_mana: 0,
            armor_class: 10,
            damage_min: 1,
            damage_max: 4,
            damage_bonus: 0,
            flee_threshold: 0,
            respawn_median_secs: 60,
            respawn_variance_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedRewards {
    pub exp_base: i64,
    pub gold_min: i64,
    pub gold_max: i64,
}

impl Default for ResolvedRewards {
    fn default() -> Self {
        Self {
            exp_base: 10,
            gold_min: 0,
            gold_max: 5,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EntityBehaviors {
    pub aggressive: bool,
    pub boss: bool,
    pub unique: bool,
}

/// Fully resolved entity prototype (after inheritance resolution)
#[derive(Debug, Clone)]
pub struct EntityPrototype {
    pub id: String,
    pub display_name: String,
    pub description: String,
    pub keywords: Vec<String>,

    pub stats: ResolvedStats,
    pub rewards: ResolvedRewards,
    pub loot: Vec<LootEntry>,

    pub behaviors: EntityBehaviors,
}

impl EntityPrototype {
    /// Bare prototype with default stats, for spawning from code
    pub fn new(id: &str, display_name: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            description: String::new(),
            keywords: vec![id.to_string()],
            stats: ResolvedStats::default(),
            rewards: ResolvedRewards::default(),
            loot: Vec::new(),
            behaviors: EntityBehaviors::default(),
        }
    }

    pub fn is_boss(&self) -> bool {
        self.behaviors.boss
    }
}
