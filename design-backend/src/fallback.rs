//! Deterministic offline generator. Produces a complete model plus template
//! code from the prompt text alone, with no network calls, so the service
//! can always answer even when every backend is down.

use tracing::info;

use crate::model::{
    Door, Model, Room, Wall, Window, DEFAULT_DOOR_HEIGHT, DEFAULT_DOOR_WIDTH, DEFAULT_ROOM_HEIGHT,
};
use crate::renderer::mock_threejs_code;

/// Room-type keywords recognized in prompts, in priority order.
const ROOM_TYPES: [&str; 9] = [
    "bedroom", "bathroom", "kitchen", "living", "dining", "office", "study", "hallway", "entrance",
];

/// Room types that never get windows.
const WINDOWLESS_TYPES: [&str; 2] = ["hallway", "entrance"];

const MIN_ROOMS: usize = 1;
const MAX_ROOMS: usize = 8;

/// Window walls cycled across generated rooms.
const WINDOW_WALLS: [Wall; 4] = [Wall::South, Wall::East, Wall::North, Wall::West];

#[derive(Debug, Clone)]
pub struct FallbackResult {
    pub model_data: Model,
    pub code: String,
}

/// Generate a model without any backend. Sketch-backed requests get a
/// fixed multi-room layout; text-only requests get a layout derived from
/// room keywords and counts in the prompt. Total and deterministic.
pub fn generate(prompt: &str, sketch_present: bool) -> FallbackResult {
    info!(
        "Generating fallback model (sketch present: {})",
        sketch_present
    );

    let model_data = if sketch_present {
        sketch_layout()
    } else {
        simple_layout(prompt)
    };
    let code = mock_threejs_code(&model_data, prompt);

    FallbackResult { model_data, code }
}

/// Canonical footprint for a room type, `(width, length)` in meters.
fn room_dimensions(room_type: &str) -> (f64, f64) {
    match room_type {
        "bedroom" => (4.0, 4.0),
        "bathroom" => (3.0, 2.0),
        "kitchen" => (4.0, 4.0),
        "living" => (5.0, 7.0),
        "dining" => (4.0, 5.0),
        "office" => (4.0, 4.0),
        "study" => (3.0, 3.0),
        "hallway" => (2.0, 5.0),
        "entrance" => (3.0, 3.0),
        _ => (4.0, 4.0),
    }
}

/// Number of rooms asked for, read as a numeric token immediately before a
/// token containing "room" ("3 bedrooms", "5 rooms").
fn requested_room_count(words: &[String]) -> Option<usize> {
    words
        .windows(2)
        .find(|pair| {
            pair[1].contains("room")
                && !pair[0].is_empty()
                && pair[0].chars().all(|c| c.is_ascii_digit())
        })
        .and_then(|pair| pair[0].parse().ok())
}

fn detected_room_types(words: &[String]) -> Vec<&'static str> {
    ROOM_TYPES
        .iter()
        .filter(|room_type| {
            words.iter().any(|word| {
                word == *room_type
                    || word == &format!("{}s", room_type)
                    || word == &format!("{}room", room_type)
            })
        })
        .copied()
        .collect()
}

fn simple_layout(prompt: &str) -> Model {
    let words: Vec<String> = prompt
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .collect();

    let detected = detected_room_types(&words);
    let main_name = if detected.contains(&"living") { "living" } else { "mainRoom" };

    // Every detected type gets a room alongside the main room, unless an
    // explicit count asks for more.
    let implied = detected.len() + usize::from(!detected.contains(&"living"));
    let num_rooms = requested_room_count(&words)
        .unwrap_or(1)
        .max(implied)
        .clamp(MIN_ROOMS, MAX_ROOMS);
    let mut rooms = vec![Room {
        name: main_name.to_string(),
        width: 5.0,
        length: 7.0,
        height: DEFAULT_ROOM_HEIGHT,
        x: 0.0,
        y: 0.0,
        z: 0.0,
        connected_to: Vec::new(),
    }];
    let mut windows = vec![Window {
        room: main_name.to_string(),
        wall: Wall::South,
        width: 2.0,
        height: 1.5,
        position: 0.5,
    }];
    let mut doors = Vec::new();

    // Remaining room types to assign, skipping "living" since the main
    // room already covers it; generic names fill in past the keyword list.
    let extra_types: Vec<&str> = detected
        .iter()
        .filter(|t| **t != "living")
        .copied()
        .collect();

    let mut type_counts: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();

    for i in 0..num_rooms - 1 {
        let room_type = extra_types
            .get(i % extra_types.len().max(1))
            .copied()
            .unwrap_or("room");

        let count = type_counts.entry(room_type).or_insert(0);
        *count += 1;
        let name = if room_type == "room" {
            format!("room{}", i + 2)
        } else if *count == 1 {
            room_type.to_string()
        } else {
            format!("{}{}", room_type, count)
        };

        let (width, length) = room_dimensions(room_type);

        // Anchor to the most recently placed room and cycle the placement
        // direction so layouts never overlap the same edge twice in a row.
        let anchor_index = rooms.len() - 1;
        let (anchor_name, x, z) = {
            let anchor = &rooms[anchor_index];
            let (x, z) = match i % 4 {
                0 => (anchor.x + anchor.width, anchor.z),
                1 => (anchor.x, anchor.z + anchor.length),
                2 => (anchor.x - width, anchor.z),
                _ => (anchor.x, anchor.z - length),
            };
            (anchor.name.clone(), x, z)
        };

        rooms[anchor_index].connected_to.push(name.clone());
        doors.push(Door {
            from: anchor_name.clone(),
            to: name.clone(),
            width: DEFAULT_DOOR_WIDTH,
            height: DEFAULT_DOOR_HEIGHT,
        });

        if !WINDOWLESS_TYPES.contains(&room_type) {
            windows.push(Window {
                room: name.clone(),
                wall: WINDOW_WALLS[i % WINDOW_WALLS.len()],
                width: 1.5,
                height: 1.2,
                position: 0.5,
            });
        }

        rooms.push(Room {
            name,
            width,
            length,
            height: DEFAULT_ROOM_HEIGHT,
            x,
            y: 0.0,
            z,
            connected_to: vec![anchor_name],
        });
    }

    Model { rooms, windows, doors }
}

/// Fixed seven-room layout standing in for a sketch the backends could not
/// process.
fn sketch_layout() -> Model {
    let room = |name: &str, width: f64, length: f64, x: f64, z: f64, connected: &[&str]| Room {
        name: name.to_string(),
        width,
        length,
        height: DEFAULT_ROOM_HEIGHT,
        x,
        y: 0.0,
        z,
        connected_to: connected.iter().map(|s| s.to_string()).collect(),
    };
    let window = |room: &str, wall: Wall, width: f64, height: f64, position: f64| Window {
        room: room.to_string(),
        wall,
        width,
        height,
        position,
    };
    let door = |from: &str, to: &str, width: f64| Door {
        from: from.to_string(),
        to: to.to_string(),
        width,
        height: DEFAULT_DOOR_HEIGHT,
    };

    Model {
        rooms: vec![
            room("living", 5.0, 7.0, 0.0, 0.0, &["kitchen", "hallway"]),
            room("kitchen", 3.5, 4.0, 5.0, 0.0, &["living", "dining"]),
            room("dining", 4.0, 4.0, 5.0, 4.0, &["kitchen"]),
            room("hallway", 2.0, 5.0, 0.0, 7.0, &["living", "bedroom1", "bedroom2", "bathroom"]),
            room("bedroom1", 4.5, 4.0, -4.5, 7.0, &["hallway"]),
            room("bedroom2", 4.0, 4.5, 2.0, 7.0, &["hallway"]),
            room("bathroom", 2.5, 2.0, 0.0, 12.0, &["hallway"]),
        ],
        windows: vec![
            window("living", Wall::South, 2.0, 1.5, 0.5),
            window("kitchen", Wall::East, 1.5, 1.2, 0.7),
            window("bedroom1", Wall::West, 1.5, 1.2, 0.5),
            window("bedroom2", Wall::East, 1.5, 1.2, 0.5),
        ],
        doors: vec![
            door("living", "kitchen", 1.2),
            door("living", "hallway", 1.2),
            door("kitchen", "dining", 1.2),
            door("hallway", "bedroom1", 0.9),
            door("hallway", "bedroom2", 0.9),
            door("hallway", "bathroom", 0.8),
        ],
    }
}
