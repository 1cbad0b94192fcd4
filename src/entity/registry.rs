use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

use super::prototype::{
    EntityBehaviors, EntityPrototype, LootEntry, RawEntityPrototype, ResolvedRewards,
    ResolvedStats,
};
use crate::error::DataError;

/// Registry for all NPC prototypes
pub struct EntityRegistry {
    prototypes: HashMap<String, EntityPrototype>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self {
            prototypes: HashMap::new(),
        }
    }

    /// Load all entity definitions from `<data_dir>/entities/monsters`
    pub fn load_from_directory(&mut self, data_dir: &Path) -> Result<(), DataError> {
        let monsters_dir = data_dir.join("entities").join("monsters");

        // First pass: load all raw prototypes
        let mut raw_prototypes: HashMap<String, RawEntityPrototype> = HashMap::new();
        if monsters_dir.exists() {
            Self::load_toml_files(&monsters_dir, &mut raw_prototypes)?;
        } else {
            warn!("Monster directory does not exist: {:?}", monsters_dir);
        }

        info!("Loaded {} raw entity prototypes", raw_prototypes.len());

        // Second pass: resolve inheritance
        self.resolve_all_prototypes(raw_prototypes)?;

        info!("Resolved {} entity prototypes", self.prototypes.len());

        Ok(())
    }

    /// Parse a single TOML document of prototypes and resolve it
    pub fn load_str(&mut self, content: &str) -> Result<(), DataError> {
        let raw_prototypes: HashMap<String, RawEntityPrototype> =
            toml::from_str(content).map_err(|source| DataError::Parse {
                path: "<inline>".into(),
                source,
            })?;
        self.resolve_all_prototypes(raw_prototypes)
    }

    fn load_toml_files(
        dir: &Path,
        raw_prototypes: &mut HashMap<String, RawEntityPrototype>,
    ) -> Result<(), DataError> {
        let entries = std::fs::read_dir(dir).map_err(|source| DataError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        for entry in entries {
            let entry = entry.map_err(|source| DataError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();

            if path.extension().map_or(false, |ext| ext == "toml") {
                let content = std::fs::read_to_string(&path).map_err(|source| DataError::Io {
                    path: path.clone(),
                    source,
                })?;

                // Parse as table of entities
                let table: HashMap<String, RawEntityPrototype> = toml::from_str(&content)
                    .map_err(|source| DataError::Parse {
                        path: path.clone(),
                        source,
                    })?;

                for (id, proto) in table {
                    if raw_prototypes.contains_key(&id) {
                        warn!("Duplicate entity ID '{}' in {:?}, overwriting", id, path);
                    }
                    debug!("Loaded entity prototype: {}", id);
                    raw_prototypes.insert(id, proto);
                }
            }
        }

        Ok(())
    }

    fn resolve_all_prototypes(
        &mut self,
        raw_prototypes: HashMap<String, RawEntityPrototype>,
    ) -> Result<(), DataError> {
        // Parents must resolve before their children
        let sorted_ids = Self::topological_sort(&raw_prototypes)?;

        for id in sorted_ids {
            if let Some(raw) = raw_prototypes.get(&id) {
                let resolved = self.resolve_prototype(&id, raw);
                self.prototypes.insert(id, resolved);
            }
        }

        Ok(())
    }

    fn topological_sort(
        raw_prototypes: &HashMap<String, RawEntityPrototype>,
    ) -> Result<Vec<String>, DataError> {
        let mut sorted = Vec::new();
        let mut visited = HashSet::new();
        let mut visiting = HashSet::new();

        fn visit(
            id: &str,
            raw_prototypes: &HashMap<String, RawEntityPrototype>,
            sorted: &mut Vec<String>,
            visited: &mut HashSet<String>,
            visiting: &mut HashSet<String>,
        ) -> Result<(), DataError> {
            if visited.contains(id) {
                return Ok(());
            }
            if visiting.contains(id) {
                return Err(DataError::CircularInheritance(id.to_string()));
            }

            visiting.insert(id.to_string());

            if let Some(raw) = raw_prototypes.get(id) {
                if let Some(parent_id) = &raw.extends {
                    if !raw_prototypes.contains_key(parent_id) {
                        return Err(DataError::UnknownParent {
                            child: id.to_string(),
                            parent: parent_id.clone(),
                        });
                    }
                    visit(parent_id, raw_prototypes, sorted, visited, visiting)?;
                }
            }

            visiting.remove(id);
            visited.insert(id.to_string());
            sorted.push(id.to_string());

            Ok(())
        }

        // Sorted keys keep load order stable between runs
        let mut ids: Vec<&String> = raw_prototypes.keys().collect();
        ids.sort();
        for id in ids {
            visit(id, raw_prototypes, &mut sorted, &mut visited, &mut visiting)?;
        }

        Ok(sorted)
    }

    fn resolve_prototype(&self, id: &str, raw: &RawEntityPrototype) -> EntityPrototype {
        let parent = raw.extends.as_ref().and_then(|parent_id| self.prototypes.get(parent_id));
        let defaults = ResolvedStats::default();

        // Merge stats with parent (child overrides parent)
        let stats = ResolvedStats {
            max_hp: raw.stats.max_hp
                .or_else(|| parent.map(|p| p.stats.max_hp))
                .unwrap_or(defaults.max_hp),
            max_mana: raw.stats.max_mana
                .or_else(|| parent.map(|p| p.stats.max_mana))
                .unwrap_or(defaults.max_mana),
            armor_class: raw.stats.armor_class
                .or_else(|| parent.map(|p| p.stats.armor_class))
                .unwrap_or(defaults.armor_class),
            damage_min: raw.stats.damage_min
                .or_else(|| parent.map(|p| p.stats.damage_min))
                .unwrap_or(defaults.damage_min),
            damage_max: raw.stats.damage_max
                .or_else(|| parent.map(|p| p.stats.damage_max))
                .unwrap_or(defaults.damage_max),
            damage_bonus: raw.stats.damage_bonus
                .or_else(|| parent.map(|p| p.stats.damage_bonus))
                .unwrap_or(defaults.damage_bonus),
            flee_threshold: raw.stats.flee_threshold
                .or_else(|| parent.map(|p| p.stats.flee_threshold))
                .unwrap_or(defaults.flee_threshold)
                .clamp(0, 100),
            respawn_median_secs: raw.stats.respawn_median_secs
                .or_else(|| parent.map(|p| p.stats.respawn_median_secs))
                .unwrap_or(defaults.respawn_median_secs),
            respawn_variance_secs: raw.stats.respawn_variance_secs
                .or_else(|| parent.map(|p| p.stats.respawn_variance_secs))
                .unwrap_or(defaults.respawn_variance_secs),
        };

        let default_rewards = ResolvedRewards::default();
        let rewards = ResolvedRewards {
            exp_base: raw.rewards.exp_base
                .or_else(|| parent.map(|p| p.rewards.exp_base))
                .unwrap_or(default_rewards.exp_base),
            gold_min: raw.rewards.gold_min
                .or_else(|| parent.map(|p| p.rewards.gold_min))
                .unwrap_or(default_rewards.gold_min),
            gold_max: raw.rewards.gold_max
                .or_else(|| parent.map(|p| p.rewards.gold_max))
                .unwrap_or(default_rewards.gold_max),
        };

        // Loot tables: child appends to parent
        let mut loot: Vec<LootEntry> = parent
            .map(|p| p.loot.clone())
            .unwrap_or_default();
        loot.extend(raw.loot.clone());

        let behaviors = EntityBehaviors {
            aggressive: raw.behaviors.aggressive
                .or_else(|| parent.map(|p| p.behaviors.aggressive))
                .unwrap_or(false),
            boss: raw.behaviors.boss
                .or_else(|| parent.map(|p| p.behaviors.boss))
                .unwrap_or(false),
            unique: raw.behaviors.unique
                .or_else(|| parent.map(|p| p.behaviors.unique))
                .unwrap_or(false),
        };

        let display_name = raw.display_name.clone()
            .or_else(|| parent.map(|p| p.display_name.clone()))
            .unwrap_or_else(|| id.to_string());

        let keywords = raw.keywords.clone()
            .or_else(|| parent.map(|p| p.keywords.clone()))
            .unwrap_or_else(|| vec![id.to_string()]);

        EntityPrototype {
            id: id.to_string(),
            display_name,
            description: raw.description.clone()
                .or_else(|| parent.map(|p| p.description.clone()))
                .unwrap_or_default(),
            keywords,
            stats,
            rewards,
            loot,
            behaviors,
        }
    }

    /// Register an already-resolved prototype
    pub fn insert(&mut self, prototype: EntityPrototype) {
        self.prototypes.insert(prototype.id.clone(), prototype);
    }

    /// Get a prototype by ID
    pub fn get(&self, id: &str) -> Option<&EntityPrototype> {
        self.prototypes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.prototypes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
