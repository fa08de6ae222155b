//! Designer agent: expands requirements into a full room/window/door graph
//! and repairs it before anything downstream sees it.

use anyhow::Context;
use serde_json::Value;
use tracing::{info, warn};

use azure_ai::{extract_json_block, TextGenerator};

use crate::model::{Door, Model, Room, Wall, Window};
use crate::repair;

const DESIGNER_SYSTEM_PROMPT: &str = "You are an Architectural Designer Agent. \
Your role is to create detailed architectural layouts based on requirements. \
You must follow building codes and design principles. Create layouts with proper \
dimensions and spatial relationships.";

/// Higher temperature than the interpreter, for layout creativity.
const DESIGNER_TEMPERATURE: f32 = 0.4;

/// Room-name keywords that mark a living space. Living spaces without
/// natural light are a design defect, so each of these gets a window.
const LIVING_SPACE_KEYWORDS: [&str; 4] = ["living", "bedroom", "kitchen", "dining"];

pub struct DesignerAgent<G> {
    chat: G,
}

impl<G: TextGenerator> DesignerAgent<G> {
    pub fn new(chat: G) -> Self {
        Self { chat }
    }

    /// Generate a model from requirements. A failed chat call is an error
    /// that poisons the pipeline; output that holds no usable rooms is
    /// replaced with an opinionated default layout, since presenting "no
    /// building" is a worse failure than presenting a canonical one.
    pub async fn design(&self, requirements: &Value) -> anyhow::Result<Model> {
        info!("Designer agent processing requirements");

        let prompt = prepare_prompt(requirements);
        let response = self
            .chat
            .complete(DESIGNER_SYSTEM_PROMPT, &prompt, DESIGNER_TEMPERATURE)
            .await
            .context("Designer agent failed")?;

        let raw_design = match extract_json_block(&response)
            .and_then(|block| serde_json::from_str::<Value>(&block).ok())
        {
            Some(value) => value,
            None => {
                warn!("Designer response held no parseable JSON, using fallback design");
                return Ok(fallback_design());
            }
        };

        let has_rooms = raw_design
            .get("rooms")
            .and_then(Value::as_array)
            .is_some_and(|rooms| !rooms.is_empty());
        if !has_rooms {
            warn!("Designer output missing rooms, using fallback design");
            return Ok(fallback_design());
        }

        let mut model = repair::repair(raw_design, false);
        add_missing_living_space_windows(&mut model);
        Ok(model)
    }
}

fn prepare_prompt(requirements: &Value) -> String {
    format!(
        "Create a detailed architectural design based on these requirements:\n{}\n\n\
         Generate a complete 3D model with:\n\
         1. Multiple rooms with appropriate dimensions and positions\n\
         2. Proper connections between rooms (doors)\n\
         3. Windows placed appropriately on walls\n\
         4. Logical spatial relationships\n\n\
         Your response must be a valid JSON object with the following structure:\n\
         {{\n  \"rooms\": [\n    {{\n      \"name\": \"string\",\n      \"width\": number,\n      \
         \"length\": number,\n      \"height\": number,\n      \"x\": number,\n      \"y\": number,\n      \
         \"z\": number,\n      \"connected_to\": [\"string\"]\n    }}\n  ],\n  \
         \"windows\": [\n    {{\n      \"room\": \"string\",\n      \"wall\": \"north|south|east|west\",\n      \
         \"width\": number,\n      \"height\": number,\n      \"position\": number (0-1 along wall)\n    }}\n  ],\n  \
         \"doors\": [\n    {{\n      \"from\": \"string\",\n      \"to\": \"string\",\n      \
         \"width\": number,\n      \"height\": number\n    }}\n  ]\n}}\n\n\
         IMPORTANT:\n\
         - Ensure all measurements are in meters.\n\
         - Position rooms logically with proper spatial relationships.\n\
         - Include at least one window per living space.\n\
         - Ensure doors connect adjacent rooms correctly.\n\
         - Use standard dimensions (doors: ~0.9m width, windows: ~1.2m width).\n\
         - Make each room's dimensions appropriate for its function.",
        serde_json::to_string_pretty(requirements).unwrap_or_default()
    )
}

/// Every room whose name contains a living-space keyword gets one default
/// south-facing window if it has none.
fn add_missing_living_space_windows(model: &mut Model) {
    let mut additions = Vec::new();
    for room in &model.rooms {
        let room_type = room.name.to_lowercase();
        let is_living_space = LIVING_SPACE_KEYWORDS
            .iter()
            .any(|keyword| room_type.contains(keyword));
        let has_window = model.windows.iter().any(|w| w.room == room.name);

        if is_living_space && !has_window {
            additions.push(Window {
                room: room.name.clone(),
                wall: Wall::South,
                width: 1.2,
                height: 1.0,
                position: 0.5,
            });
        }
    }
    model.windows.extend(additions);
}

/// Canonical four-room layout used when generation produced nothing usable.
fn fallback_design() -> Model {
    let room = |name: &str, width: f64, length: f64, x: f64, z: f64, connected: &[&str]| Room {
        name: name.to_string(),
        width,
        length,
        height: 3.0,
        x,
        y: 0.0,
        z,
        connected_to: connected.iter().map(|s| s.to_string()).collect(),
    };

    Model {
        rooms: vec![
            room("living", 5.0, 7.0, 0.0, 0.0, &["kitchen", "hallway"]),
            room("kitchen", 4.0, 4.0, 5.0, 0.0, &["living"]),
            room("hallway", 2.0, 5.0, 0.0, 7.0, &["living", "bedroom"]),
            room("bedroom", 4.0, 4.0, 2.0, 7.0, &["hallway"]),
        ],
        windows: vec![
            Window {
                room: "living".to_string(),
                wall: Wall::South,
                width: 2.0,
                height: 1.5,
                position: 0.5,
            },
            Window {
                room: "kitchen".to_string(),
                wall: Wall::East,
                width: 1.5,
                height: 1.2,
                position: 0.5,
            },
            Window {
                room: "bedroom".to_string(),
                wall: Wall::East,
                width: 1.5,
                height: 1.2,
                position: 0.5,
            },
        ],
        doors: vec![
            Door { from: "living".to_string(), to: "kitchen".to_string(), width: 1.2, height: 2.1 },
            Door { from: "living".to_string(), to: "hallway".to_string(), width: 1.2, height: 2.1 },
            Door { from: "hallway".to_string(), to: "bedroom".to_string(), width: 0.9, height: 2.1 },
        ],
    }
}
