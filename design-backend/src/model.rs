//! Floor-plan data model exchanged across the whole pipeline.

use serde::{Deserialize, Serialize};

/// Default room height in meters when none is specified.
pub const DEFAULT_ROOM_HEIGHT: f64 = 3.0;
/// Default room footprint when dimensions are missing or invalid.
pub const DEFAULT_ROOM_WIDTH: f64 = 4.0;
pub const DEFAULT_ROOM_LENGTH: f64 = 4.0;
/// Default window dimensions (meters).
pub const DEFAULT_WINDOW_WIDTH: f64 = 1.5;
pub const DEFAULT_WINDOW_HEIGHT: f64 = 1.2;
/// Default door dimensions (meters).
pub const DEFAULT_DOOR_WIDTH: f64 = 1.0;
pub const DEFAULT_DOOR_HEIGHT: f64 = 2.1;

/// A room occupies `[x, x+width] x [y, y+height] x [z, z+length]` with
/// (x, y, z) as its minimum corner, in meters. `connected_to` lists rooms
/// this one has a logical adjacency with, not necessarily geometric
/// neighbors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub name: String,
    pub width: f64,
    pub length: f64,
    pub height: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub connected_to: Vec<String>,
}

impl Room {
    pub fn area(&self) -> f64 {
        self.width * self.length
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Wall {
    North,
    South,
    East,
    West,
}

/// `position` is the fractional offset in [0, 1] along the referenced wall
/// where the window's center sits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub room: String,
    pub wall: Wall,
    pub width: f64,
    pub height: f64,
    pub position: f64,
}

/// A door whose endpoints do not share a wall is still valid: it marks a
/// logical connection rendered as a virtual hallway link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Door {
    pub from: String,
    pub to: String,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Model {
    pub rooms: Vec<Room>,
    #[serde(default)]
    pub windows: Vec<Window>,
    #[serde(default)]
    pub doors: Vec<Door>,
}

impl Model {
    pub fn total_area(&self) -> f64 {
        self.rooms.iter().map(Room::area).sum()
    }

    pub fn largest_room(&self) -> Option<&Room> {
        self.rooms
            .iter()
            .max_by(|a, b| a.area().total_cmp(&b.area()))
    }

    pub fn has_room(&self, name: &str) -> bool {
        self.rooms.iter().any(|r| r.name == name)
    }

    pub fn has_door_between(&self, a: &str, b: &str) -> bool {
        self.doors
            .iter()
            .any(|d| (d.from == a && d.to == b) || (d.from == b && d.to == a))
    }
}
