pub mod prototype;
pub mod registry;
pub mod spawner;

pub use prototype::{EntityPrototype, LootEntry};
pub use registry::EntityRegistry;
pub use spawner::{populate_world, roll_gold, roll_loot_table, spawn_npc};
