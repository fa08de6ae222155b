//! Structural repair of raw room/window/door graphs.
//!
//! Generative backends return duck-typed JSON; this module turns whatever
//! came back into a well-formed [`Model`]. It is total: any input value
//! produces a valid model, nothing is ever rejected.

use serde_json::Value;
use tracing::warn;

use crate::model::{
    Door, Model, Room, Wall, Window, DEFAULT_DOOR_HEIGHT, DEFAULT_DOOR_WIDTH,
    DEFAULT_ROOM_HEIGHT, DEFAULT_ROOM_LENGTH, DEFAULT_ROOM_WIDTH, DEFAULT_WINDOW_HEIGHT,
    DEFAULT_WINDOW_WIDTH,
};

/// Repair a raw model so a renderer never receives a structurally broken
/// graph. With `preserve_structure` set, connectivity is taken as-is from
/// the source (sketch-derived models already encode their own doors) and
/// only missing fields are fixed; otherwise doors implied by each room's
/// `connected_to` list are synthesized.
pub fn repair(raw: Value, preserve_structure: bool) -> Model {
    let rooms_raw = raw
        .get("rooms")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let rooms: Vec<Room> = if rooms_raw.is_empty() {
        warn!("Model has no rooms, substituting a default room");
        vec![default_room()]
    } else {
        rooms_raw
            .iter()
            .enumerate()
            .map(|(index, room)| repair_room(room, index))
            .collect()
    };

    let windows_raw = raw
        .get("windows")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let windows: Vec<Window> = windows_raw
        .iter()
        .filter_map(|window| repair_window(window, &rooms))
        .collect();

    let doors_raw = raw
        .get("doors")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut doors: Vec<Door> = doors_raw.iter().filter_map(repair_door).collect();

    if !preserve_structure {
        synthesize_missing_doors(&rooms, &mut doors);
    }

    Model { rooms, windows, doors }
}

/// Parse a JSON value to a positive number, substituting `default` when the
/// value is missing, non-numeric, or not strictly positive. Numeric strings
/// are accepted since backends occasionally quote their numbers.
pub fn ensure_positive_number(value: Option<&Value>, default: f64) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(n) if n > 0.0 => n,
        _ => default,
    }
}

fn default_room() -> Room {
    Room {
        name: "defaultRoom".to_string(),
        width: 5.0,
        length: 5.0,
        height: DEFAULT_ROOM_HEIGHT,
        x: 0.0,
        y: 0.0,
        z: 0.0,
        connected_to: Vec::new(),
    }
}

fn coordinate(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn repair_room(raw: &Value, index: usize) -> Room {
    let name = raw
        .get("name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("room{}", index + 1));

    let connected_to = raw
        .get("connected_to")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Room {
        name,
        width: ensure_positive_number(raw.get("width"), DEFAULT_ROOM_WIDTH),
        length: ensure_positive_number(raw.get("length"), DEFAULT_ROOM_LENGTH),
        height: ensure_positive_number(raw.get("height"), DEFAULT_ROOM_HEIGHT),
        x: coordinate(raw.get("x")),
        y: coordinate(raw.get("y")),
        z: coordinate(raw.get("z")),
        connected_to,
    }
}

fn repair_window(raw: &Value, rooms: &[Room]) -> Option<Window> {
    let room = raw.get("room").and_then(Value::as_str)?;
    if room.is_empty() || !rooms.iter().any(|r| r.name == room) {
        warn!("Dropping window referencing unknown room {:?}", room);
        return None;
    }

    let wall = raw
        .get("wall")
        .cloned()
        .and_then(|w| serde_json::from_value::<Wall>(w).ok())
        .unwrap_or(Wall::South);

    let position = raw
        .get("position")
        .and_then(Value::as_f64)
        .unwrap_or(0.5);

    Some(Window {
        room: room.to_string(),
        wall,
        width: ensure_positive_number(raw.get("width"), DEFAULT_WINDOW_WIDTH),
        height: ensure_positive_number(raw.get("height"), DEFAULT_WINDOW_HEIGHT),
        position,
    })
}

fn repair_door(raw: &Value) -> Option<Door> {
    let from = raw.get("from").and_then(Value::as_str)?.to_string();
    let to = raw.get("to").and_then(Value::as_str)?.to_string();

    Some(Door {
        from,
        to,
        width: ensure_positive_number(raw.get("width"), DEFAULT_DOOR_WIDTH),
        height: ensure_positive_number(raw.get("height"), DEFAULT_DOOR_HEIGHT),
    })
}

/// Every name in a room's `connected_to` that resolves to a real room must
/// have a door between the pair, in either direction.
fn synthesize_missing_doors(rooms: &[Room], doors: &mut Vec<Door>) {
    for room in rooms {
        for connected in &room.connected_to {
            if !rooms.iter().any(|r| &r.name == connected) {
                continue;
            }
            let exists = doors.iter().any(|d| {
                (d.from == room.name && &d.to == connected)
                    || (&d.from == connected && d.to == room.name)
            });
            if !exists {
                doors.push(Door {
                    from: room.name.clone(),
                    to: connected.clone(),
                    width: DEFAULT_DOOR_WIDTH,
                    height: DEFAULT_DOOR_HEIGHT,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_rooms_substitutes_default_room() {
        let model = repair(json!({ "rooms": [] }), false);

        assert_eq!(model.rooms.len(), 1);
        let room = &model.rooms[0];
        assert_eq!(room.name, "defaultRoom");
        assert_eq!(room.width, 5.0);
        assert_eq!(room.length, 5.0);
        assert_eq!(room.height, 3.0);
        assert_eq!((room.x, room.y, room.z), (0.0, 0.0, 0.0));
        assert!(room.connected_to.is_empty());
        assert!(model.windows.is_empty());
        assert!(model.doors.is_empty());
    }

    #[test]
    fn test_missing_rooms_key_substitutes_default_room() {
        let model = repair(json!({}), false);
        assert_eq!(model.rooms.len(), 1);
        assert_eq!(model.rooms[0].name, "defaultRoom");
    }

    #[test]
    fn test_negative_width_replaced_and_door_synthesized() {
        let model = repair(
            json!({
                "rooms": [
                    { "name": "A", "width": -1, "length": 4, "height": 3, "connected_to": ["B"] },
                    { "name": "B", "width": 4, "length": 4, "height": 3, "connected_to": [] },
                ]
            }),
            false,
        );

        assert_eq!(model.rooms[0].width, DEFAULT_ROOM_WIDTH);
        assert!(model.has_door_between("A", "B"));
        assert_eq!(model.doors.len(), 1);
    }

    #[test]
    fn test_all_room_dimensions_positive() {
        let model = repair(
            json!({
                "rooms": [
                    { "name": "a", "width": "oops", "length": 0, "height": -2 },
                    { "width": "3.5", "length": null },
                ]
            }),
            false,
        );

        for room in &model.rooms {
            assert!(room.width > 0.0);
            assert!(room.length > 0.0);
            assert!(room.height > 0.0);
        }
        // Numeric strings parse, falsy names default to room{i+1}
        assert_eq!(model.rooms[1].width, 3.5);
        assert_eq!(model.rooms[1].name, "room2");
    }

    #[test]
    fn test_windows_referencing_unknown_rooms_are_dropped() {
        let model = repair(
            json!({
                "rooms": [{ "name": "living", "width": 5, "length": 7, "height": 3 }],
                "windows": [
                    { "room": "living", "width": 2, "height": 1.5, "position": 0.5 },
                    { "room": "ghost", "wall": "north" },
                    { "width": 1 },
                ]
            }),
            false,
        );

        assert_eq!(model.windows.len(), 1);
        assert_eq!(model.windows[0].room, "living");
        // Missing wall defaults to south
        assert_eq!(model.windows[0].wall, Wall::South);
    }

    #[test]
    fn test_window_defaults() {
        let model = repair(
            json!({
                "rooms": [{ "name": "living", "width": 5, "length": 7, "height": 3 }],
                "windows": [{ "room": "living" }]
            }),
            false,
        );

        let window = &model.windows[0];
        assert_eq!(window.width, DEFAULT_WINDOW_WIDTH);
        assert_eq!(window.height, DEFAULT_WINDOW_HEIGHT);
        assert_eq!(window.position, 0.5);
    }

    #[test]
    fn test_preserve_structure_skips_door_synthesis() {
        let model = repair(
            json!({
                "rooms": [
                    { "name": "A", "width": 4, "length": 4, "height": 3, "connected_to": ["B"] },
                    { "name": "B", "width": 4, "length": 4, "height": 3 },
                ],
                "doors": [{ "from": "A", "to": "C", "width": 0 }]
            }),
            true,
        );

        // No synthesized A-B door, but existing doors still get their
        // dimensions clamped.
        assert!(!model.has_door_between("A", "B"));
        assert_eq!(model.doors.len(), 1);
        assert_eq!(model.doors[0].width, DEFAULT_DOOR_WIDTH);
    }

    #[test]
    fn test_connectivity_closure() {
        let model = repair(
            json!({
                "rooms": [
                    { "name": "A", "width": 4, "length": 4, "height": 3, "connected_to": ["B", "C", "missing"] },
                    { "name": "B", "width": 4, "length": 4, "height": 3, "connected_to": ["A"] },
                    { "name": "C", "width": 4, "length": 4, "height": 3 },
                ],
                "doors": [{ "from": "B", "to": "A", "width": 0.9, "height": 2.1 }]
            }),
            false,
        );

        for room in &model.rooms {
            for connected in &room.connected_to {
                if model.has_room(connected) {
                    assert!(
                        model.has_door_between(&room.name, connected),
                        "no door between {} and {}",
                        room.name,
                        connected
                    );
                }
            }
        }
        // The existing B->A door satisfies both directions; only A-C is new.
        assert_eq!(model.doors.len(), 2);
    }

    #[test]
    fn test_repair_is_idempotent() {
        for preserve in [false, true] {
            let raw = json!({
                "rooms": [
                    { "name": "A", "width": -3, "length": "4", "connected_to": ["B"] },
                    { "name": "B", "height": 0 },
                ],
                "windows": [{ "room": "A", "wall": "east" }, { "room": "nowhere" }],
                "doors": [{ "from": "A", "to": "B" }]
            });

            let once = repair(raw, preserve);
            let twice = repair(serde_json::to_value(&once).unwrap(), preserve);
            assert_eq!(once, twice);
        }
    }
}
