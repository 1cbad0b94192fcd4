use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::DataError;
use crate::npc::NpcId;

// ============================================================================
// Direction
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Direction {
    North,
    East,
    South,
    West,
    Up,
    Down,
}

impl Direction {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "north" | "n" => Some(Direction::North),
            "east" | "e" => Some(Direction::East),
            "south" | "s" => Some(Direction::South),
            "west" | "w" => Some(Direction::West),
            "up" | "u" => Some(Direction::Up),
            "down" | "d" => Some(Direction::Down),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::East => "east",
            Direction::South => "south",
            Direction::West => "west",
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }

    /// Stairs between floors; fleeing monsters never take these
    pub fn is_vertical(&self) -> bool {
        matches!(self, Direction::Up | Direction::Down)
    }
}

// ============================================================================
// Rooms
// ============================================================================

/// An item instance lying on a room's floor
#[derive(Debug, Clone)]
pub struct GroundItem {
    pub instance_id: Uuid,
    pub item_id: String,
    pub name: String,
}

impl GroundItem {
    pub fn new(item_id: &str, name: &str) -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            item_id: item_id.to_string(),
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub description: String,
    pub floor: u32,
    pub exits: BTreeMap<Direction, String>,
    pub players: BTreeSet<String>,
    /// NPCs currently present, in arrival order
    pub npcs: Vec<NpcId>,
    pub items: Vec<GroundItem>,
    /// Prototype ids placed here by the initial population
    pub spawns: Vec<String>,
}

impl Room {
    pub fn new(id: &str, floor: u32) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            floor,
            exits: BTreeMap::new(),
            players: BTreeSet::new(),
            npcs: Vec::new(),
            items: Vec::new(),
            spawns: Vec::new(),
        }
    }

    pub fn with_exit(mut self, direction: Direction, target: &str) -> Self {
        self.exits.insert(direction, target.to_string());
        self
    }

    /// Exits a fleeing monster may take
    pub fn horizontal_exits(&self) -> Vec<(Direction, &str)> {
        self.exits
            .iter()
            .filter(|(dir, _)| !dir.is_vertical())
            .map(|(dir, target)| (*dir, target.as_str()))
            .collect()
    }
}

// ============================================================================
// Floors & Areas
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct Floor {
    pub number: u32,
    /// Item dropped by any boss slain on this floor
    pub boss_key: Option<String>,
    /// Prototypes the population controller may add here
    #[serde(default)]
    pub spawn_table: Vec<String>,
}

/// A region whose final boss grants a clear title
#[derive(Debug, Clone, Deserialize)]
pub struct Area {
    pub id: String,
    pub name: String,
    pub final_boss: String,
    pub title: String,
}

// ============================================================================
// Raw TOML
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawWorld {
    starting_room: String,
    #[serde(default)]
    floors: Vec<Floor>,
    #[serde(default)]
    areas: Vec<Area>,
    #[serde(default)]
    rooms: Vec<RawRoom>,
}

#[derive(Debug, Deserialize)]
struct RawRoom {
    id: String,
    name: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default = "default_floor")]
    floor: u32,
    #[serde(default)]
    exits: BTreeMap<String, String>,
    #[serde(default)]
    spawns: Vec<String>,
}

fn default_floor() -> u32 { 1 }

// ============================================================================
// World
// ============================================================================

/// Room graph plus floor and area metadata
#[derive(Debug, Clone)]
pub struct World {
    rooms: BTreeMap<String, Room>,
    floors: BTreeMap<u32, Floor>,
    areas: Vec<Area>,
    starting_room: String,
}

impl World {
    pub fn new(starting_room: &str) -> Self {
        Self {
            rooms: BTreeMap::new(),
            floors: BTreeMap::new(),
            areas: Vec::new(),
            starting_room: starting_room.to_string(),
        }
    }

    /// Load `world.toml` from the data directory
    pub fn load(path: &Path) -> Result<Self, DataError> {
        let content = std::fs::read_to_string(path).map_err(|source| DataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: RawWorld = toml::from_str(&content).map_err(|source| DataError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let world = Self::from_raw(raw)?;
        info!(
            "Loaded world: {} rooms, {} floors, {} areas",
            world.rooms.len(),
            world.floors.len(),
            world.areas.len()
        );
        Ok(world)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, DataError> {
        let raw: RawWorld = toml::from_str(content).map_err(|source| DataError::Parse {
            path: "<inline>".into(),
            source,
        })?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawWorld) -> Result<Self, DataError> {
        let mut world = World::new(&raw.starting_room);

        for raw_room in raw.rooms {
            if world.rooms.contains_key(&raw_room.id) {
                return Err(DataError::DuplicateRoom(raw_room.id));
            }
            let mut room = Room::new(&raw_room.id, raw_room.floor);
            room.name = raw_room.name.unwrap_or_else(|| raw_room.id.clone());
            room.description = raw_room.description;
            room.spawns = raw_room.spawns;
            for (dir, target) in raw_room.exits {
                match Direction::parse(&dir) {
                    Some(direction) => {
                        room.exits.insert(direction, target);
                    }
                    None => warn!(room = %room.id, "Ignoring exit with unknown direction '{}'", dir),
                }
            }
            world.rooms.insert(room.id.clone(), room);
        }

        for floor in raw.floors {
            world.floors.insert(floor.number, floor);
        }
        world.areas = raw.areas;

        world.validate()?;
        Ok(world)
    }

    fn validate(&self) -> Result<(), DataError> {
        if !self.rooms.contains_key(&self.starting_room) {
            return Err(DataError::MissingStartingRoom(self.starting_room.clone()));
        }
        for room in self.rooms.values() {
            for target in room.exits.values() {
                if !self.rooms.contains_key(target) {
                    return Err(DataError::UnknownExit {
                        room: room.id.clone(),
                        target: target.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Building
    // ------------------------------------------------------------------------

    pub fn add_room(&mut self, room: Room) {
        self.rooms.insert(room.id.clone(), room);
    }

    pub fn add_floor(&mut self, floor: Floor) {
        self.floors.insert(floor.number, floor);
    }

    pub fn add_area(&mut self, area: Area) {
        self.areas.push(area);
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn room(&self, id: &str) -> Option<&Room> {
        self.rooms.get(id)
    }

    /// Rooms in id order
    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn starting_room(&self) -> &str {
        &self.starting_room
    }

    pub fn floor_of(&self, room_id: &str) -> Option<u32> {
        self.rooms.get(room_id).map(|r| r.floor)
    }

    pub fn floor(&self, number: u32) -> Option<&Floor> {
        self.floors.get(&number)
    }

    pub fn floors(&self) -> impl Iterator<Item = &Floor> {
        self.floors.values()
    }

    pub fn floor_count(&self) -> usize {
        self.floors.len()
    }

    pub fn rooms_on_floor(&self, floor: u32) -> Vec<&str> {
        self.rooms
            .values()
            .filter(|r| r.floor == floor)
            .map(|r| r.id.as_str())
            .collect()
    }

    /// NPCs present in rooms on the floor. Dead NPCs are never present.
    pub fn live_npc_count(&self, floor: u32) -> usize {
        self.rooms
            .values()
            .filter(|r| r.floor == floor)
            .map(|r| r.npcs.len())
            .sum()
    }

    /// Area whose final boss is built from this prototype
    pub fn area_for_final_boss(&self, prototype_id: &str) -> Option<&Area> {
        self.areas.iter().find(|a| a.final_boss == prototype_id)
    }

    pub fn areas(&self) -> &[Area] {
        &self.areas
    }

    /// Text shown to a player arriving in a room
    pub fn describe_room(&self, room_id: &str) -> Option<String> {
        let room = self.rooms.get(room_id)?;
        let exits: Vec<&str> = room.exits.keys().map(|d| d.as_str()).collect();
        let exits = if exits.is_empty() {
            "none".to_string()
        } else {
            exits.join(", ")
        };
        let mut text = room.name.clone();
        if !room.description.is_empty() {
            text.push('\n');
            text.push_str(&room.description);
        }
        text.push_str(&format!("\nExits: {}", exits));
        Some(text)
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    pub fn add_npc(&mut self, room_id: &str, npc: NpcId) -> bool {
        match self.rooms.get_mut(room_id) {
            Some(room) => {
                if !room.npcs.contains(&npc) {
                    room.npcs.push(npc);
                }
                true
            }
            None => false,
        }
    }

    pub fn remove_npc(&mut self, room_id: &str, npc: NpcId) -> bool {
        match self.rooms.get_mut(room_id) {
            Some(room) => {
                let before = room.npcs.len();
                room.npcs.retain(|id| *id != npc);
                room.npcs.len() != before
            }
            None => false,
        }
    }

    /// Move an NPC between rooms. Fails without side effects if `to` is unknown.
    pub fn move_npc(&mut self, npc: NpcId, from: &str, to: &str) -> bool {
        if !self.rooms.contains_key(to) {
            return false;
        }
        self.remove_npc(from, npc);
        self.add_npc(to, npc)
    }

    pub fn add_player(&mut self, room_id: &str, name: &str) -> bool {
        match self.rooms.get_mut(room_id) {
            Some(room) => {
                room.players.insert(name.to_string());
                true
            }
            None => false,
        }
    }

    pub fn remove_player(&mut self, room_id: &str, name: &str) -> bool {
        self.rooms
            .get_mut(room_id)
            .map_or(false, |room| room.players.remove(name))
    }

    /// Move a player name between rooms. Fails without side effects if `to` is unknown.
    pub fn move_player(&mut self, name: &str, from: &str, to: &str) -> bool {
        if !self.rooms.contains_key(to) {
            return false;
        }
        self.remove_player(from, name);
        self.add_player(to, name)
    }

    pub fn place_item(&mut self, room_id: &str, item: GroundItem) -> bool {
        match self.rooms.get_mut(room_id) {
            Some(room) => {
                room.items.push(item);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOWER: &str = r#"
starting_room = "gate"

[[floors]]
number = 1
boss_key = "floor_1_key"
spawn_table = ["goblin"]

[[floors]]
number = 2

[[areas]]
id = "warrens"
name = "The Warrens"
final_boss = "goblin_king"
title = "Warren Breaker"

[[rooms]]
id = "gate"
name = "Tower Gate"
description = "A rusted portcullis."
exits = { north = "hall" }

[[rooms]]
id = "hall"
exits = { south = "gate", up = "landing" }
spawns = ["goblin", "goblin"]

[[rooms]]
id = "landing"
floor = 2
exits = { d = "hall" }
"#;

    #[test]
    fn test_load_world_from_toml() {
        let world = World::from_toml_str(TOWER).unwrap();
        assert_eq!(world.starting_room(), "gate");
        assert_eq!(world.floor_count(), 2);
        assert_eq!(world.floor_of("landing"), Some(2));
        assert_eq!(world.rooms_on_floor(1), vec!["gate", "hall"]);
        assert_eq!(world.room("hall").unwrap().spawns.len(), 2);
        assert_eq!(
            world.room("landing").unwrap().exits.get(&Direction::Down),
            Some(&"hall".to_string())
        );
        assert_eq!(world.area_for_final_boss("goblin_king").unwrap().title, "Warren Breaker");
        assert_eq!(world.floor(1).unwrap().boss_key.as_deref(), Some("floor_1_key"));
    }

    #[test]
    fn test_unknown_exit_is_rejected() {
        let err = World::from_toml_str(
            "starting_room = \"a\"\n[[rooms]]\nid = \"a\"\nexits = { north = \"nowhere\" }\n",
        )
        .unwrap_err();
        assert!(matches!(err, DataError::UnknownExit { .. }));
    }

    #[test]
    fn test_missing_starting_room_is_rejected() {
        let err = World::from_toml_str("starting_room = \"a\"\n").unwrap_err();
        assert!(matches!(err, DataError::MissingStartingRoom(_)));
    }

    #[test]
    fn test_horizontal_exits_skip_stairs() {
        let world = World::from_toml_str(TOWER).unwrap();
        let exits = world.room("hall").unwrap().horizontal_exits();
        assert_eq!(exits, vec![(Direction::South, "gate")]);
    }

    #[test]
    fn test_npc_presence_and_floor_counts() {
        let mut world = World::from_toml_str(TOWER).unwrap();
        assert!(world.add_npc("hall", NpcId::new(0)));
        assert!(world.add_npc("hall", NpcId::new(0)));
        assert!(world.add_npc("gate", NpcId::new(1)));
        assert!(world.add_npc("landing", NpcId::new(2)));
        assert!(!world.add_npc("void", NpcId::new(3)));
        assert_eq!(world.live_npc_count(1), 2);
        assert_eq!(world.live_npc_count(2), 1);

        assert!(world.move_npc(NpcId::new(0), "hall", "gate"));
        assert_eq!(world.room("gate").unwrap().npcs, vec![NpcId::new(1), NpcId::new(0)]);
        assert!(!world.move_npc(NpcId::new(0), "gate", "void"));
        assert!(world.remove_npc("gate", NpcId::new(0)));
        assert_eq!(world.live_npc_count(1), 1);
    }

    #[test]
    fn test_player_movement() {
        let mut world = World::from_toml_str(TOWER).unwrap();
        world.add_player("gate", "alice");
        assert!(world.move_player("alice", "gate", "hall"));
        assert!(!world.room("gate").unwrap().players.contains("alice"));
        assert!(world.room("hall").unwrap().players.contains("alice"));
        assert!(!world.move_player("alice", "hall", "void"));
        assert!(world.room("hall").unwrap().players.contains("alice"));
    }

    #[test]
    fn test_describe_room_lists_exits() {
        let world = World::from_toml_str(TOWER).unwrap();
        let text = world.describe_room("gate").unwrap();
        assert!(text.starts_with("Tower Gate\nA rusted portcullis."));
        assert!(text.ends_with("Exits: north"));
        assert!(world.describe_room("void").is_none());
    }
}
