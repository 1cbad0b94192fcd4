use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use super::item_def::{ItemDefinition, RawItemDefinition};
use crate::error::DataError;

/// Registry for all item definitions
pub struct ItemRegistry {
    items: HashMap<String, ItemDefinition>,
}

impl ItemRegistry {
    pub fn new() -> Self {
        Self {
            items: HashMap::new(),
        }
    }

    /// Load all item definitions from `<data_dir>/items/*.toml`
    pub fn load_from_directory(&mut self, data_dir: &Path) -> Result<(), DataError> {
        let items_dir = data_dir.join("items");

        if !items_dir.exists() {
            warn!("Items directory does not exist: {:?}", items_dir);
            return Ok(());
        }

        let entries = std::fs::read_dir(&items_dir).map_err(|source| DataError::Io {
            path: items_dir.clone(),
            source,
        })?;

        for entry in entries {
            let entry = entry.map_err(|source| DataError::Io {
                path: items_dir.clone(),
                source,
            })?;
            let path = entry.path();

            if path.extension().map_or(false, |ext| ext == "toml") {
                let content = std::fs::read_to_string(&path).map_err(|source| DataError::Io {
                    path: path.clone(),
                    source,
                })?;
                self.load_str(&content).map_err(|source| DataError::Parse {
                    path: path.clone(),
                    source,
                })?;
            }
        }

        info!("Loaded {} item definitions", self.items.len());

        Ok(())
    }

    /// Parse a table of items and merge it into the registry
    pub fn load_str(&mut self, content: &str) -> Result<usize, toml::de::Error> {
        let table: HashMap<String, RawItemDefinition> = toml::from_str(content)?;
        let count = table.len();

        for (id, raw) in table {
            if self.items.contains_key(&id) {
                warn!("Duplicate item ID '{}', overwriting", id);
            }
            let item = ItemDefinition::from_raw(&id, &raw);
            self.items.insert(id, item);
        }

        Ok(count)
    }

    /// Get an item definition by ID
    pub fn get(&self, id: &str) -> Option<&ItemDefinition> {
        self.items.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for ItemRegistry {
    fn default() -> Self {
        Self::new()
    }
}
