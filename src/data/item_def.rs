use serde::Deserialize;

// ============================================================================
// Item Categories
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    Weapon,
    Armor,
    /// Boss keys and other progression gates
    Key,
    Consumable,
    #[default]
    Material,
}

// ============================================================================
// Weapon Stats
// ============================================================================

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WeaponStats {
    pub damage_min: i32,
    pub damage_max: i32,
}

// ============================================================================
// Raw Item Definition (direct from TOML)
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RawItemDefinition {
    pub display_name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub category: ItemCategory,
    pub weapon: Option<WeaponStats>,
    /// Floor a key item opens
    pub unlocks_floor: Option<u32>,
}

// ============================================================================
// Resolved Item Definition
// ============================================================================

#[derive(Debug, Clone)]
pub struct ItemDefinition {
    pub id: String,
    pub display_name: String,
    pub description: String,
    pub category: ItemCategory,
    pub weapon: Option<WeaponStats>,
    pub unlocks_floor: Option<u32>,
}

impl ItemDefinition {
    pub fn from_raw(id: &str, raw: &RawItemDefinition) -> Self {
        // Swapped bounds in data files are forgiven rather than rejected
        let weapon = raw.weapon.map(|w| WeaponStats {
            damage_min: w.damage_min.min(w.damage_max).max(0),
            damage_max: w.damage_max.max(w.damage_min).max(0),
        });

        Self {
            id: id.to_string(),
            display_name: raw.display_name.clone()
                .unwrap_or_else(|| id.to_string()),
            description: raw.description.clone()
                .unwrap_or_default(),
            category: raw.category,
            weapon,
            unlocks_floor: raw.unlocks_floor,
        }
    }

    pub fn is_weapon(&self) -> bool {
        self.category == ItemCategory::Weapon && self.weapon.is_some()
    }

    pub fn is_key(&self) -> bool {
        self.category == ItemCategory::Key
    }
}
