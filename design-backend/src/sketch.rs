//! Sketch and photo analysis: wraps the vision backend and derives spatial
//! hints (line segments, candidate rooms, architectural features) from what
//! it detects.

use anyhow::Context;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use azure_ai::{DetectedObject, ImageAnalyzer, ImageTag};

/// Confidence assigned to the whole-sketch fallback room candidate when no
/// explicit shapes were detected.
pub const DERIVED_ROOM_CONFIDENCE: f64 = 0.8;

/// Object class names treated as direct room candidates.
const ROOM_SHAPE_NAMES: [&str; 3] = ["rectangle", "square", "shape"];

/// Tags that count as building elements in a photo.
const ARCHITECTURAL_TAGS: [&str; 11] = [
    "building", "wall", "ceiling", "floor", "door", "window", "column", "arch", "stairs",
    "balcony", "facade",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// A wall-candidate segment derived from a detected object's bounding box.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivedLine {
    pub orientation: Orientation,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub confidence: f64,
    pub object_name: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RoomBounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PotentialRoom {
    pub name: String,
    pub bounds: RoomBounds,
    pub confidence: f64,
}

/// Structured spatial hints extracted from a sketch image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SketchAnalysis {
    pub objects: Vec<DetectedObject>,
    pub tags: Vec<ImageTag>,
    pub categories: Vec<azure_ai::ImageCategory>,
    pub description: String,
    pub derived_lines: Vec<DerivedLine>,
    pub potential_rooms: Vec<PotentialRoom>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingElement {
    pub element: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchitecturalFeatures {
    pub building_elements: Vec<BuildingElement>,
    pub style: String,
}

/// Analysis of a real-world photo of a building or space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoAnalysis {
    pub description: String,
    pub objects: Vec<DetectedObject>,
    pub tags: Vec<ImageTag>,
    pub landmarks: Vec<String>,
    pub architectural_features: ArchitecturalFeatures,
}

/// Decode a base64 data URL (`data:image/<fmt>;base64,<payload>`) into raw
/// bytes. Plain base64 without the prefix is accepted too.
pub fn decode_data_url(data_url: &str) -> anyhow::Result<Vec<u8>> {
    let payload = match data_url.find("base64,") {
        Some(idx) => &data_url[idx + "base64,".len()..],
        None => data_url,
    };
    general_purpose::STANDARD
        .decode(payload.trim())
        .context("Failed to decode image data URL")
}

/// Analyze a sketch with the vision backend and derive room candidates.
pub async fn analyze_sketch<V: ImageAnalyzer>(
    vision: &V,
    sketch_data_url: &str,
) -> anyhow::Result<SketchAnalysis> {
    let image_bytes = decode_data_url(sketch_data_url)?;

    let result = vision
        .analyze(&image_bytes, &["Objects", "Categories", "Tags", "Description"])
        .await
        .context("Failed to analyze sketch")?;

    let derived_lines = extract_lines_from_objects(&result.objects);
    let potential_rooms = detect_potential_rooms(&result.objects, &derived_lines);

    info!(
        "Sketch analysis found {} objects, {} derived lines, {} potential rooms",
        result.objects.len(),
        derived_lines.len(),
        potential_rooms.len()
    );

    Ok(SketchAnalysis {
        objects: result.objects,
        tags: result.tags,
        categories: result.categories,
        description: result.description.unwrap_or_default(),
        derived_lines,
        potential_rooms,
    })
}

/// Analyze a photo of a real building and extract architectural features.
pub async fn analyze_photo<V: ImageAnalyzer>(
    vision: &V,
    photo_data_url: &str,
) -> anyhow::Result<PhotoAnalysis> {
    let image_bytes = decode_data_url(photo_data_url)?;

    let result = vision
        .analyze(&image_bytes, &["Objects", "Tags", "Categories", "Description"])
        .await
        .context("Photo analysis failed")?;

    let landmarks: Vec<String> = result
        .categories
        .iter()
        .flat_map(|c| c.landmarks.iter().cloned())
        .collect();

    let architectural_features = extract_architectural_features(&result.tags);

    Ok(PhotoAnalysis {
        description: result
            .description
            .unwrap_or_else(|| "No description available".to_string()),
        objects: result.objects,
        tags: result.tags,
        landmarks,
        architectural_features,
    })
}

/// Synthesize the four bounding edges of every detected object as line
/// segments, tagged horizontal/vertical, retaining the object's confidence.
pub fn extract_lines_from_objects(objects: &[DetectedObject]) -> Vec<DerivedLine> {
    let mut lines = Vec::new();

    for obj in objects {
        let Some(rect) = obj.rectangle else { continue };
        let (x, y, w, h) = (rect.x, rect.y, rect.w, rect.h);

        // Top and bottom edges
        lines.push(DerivedLine {
            orientation: Orientation::Horizontal,
            x1: x,
            y1: y,
            x2: x + w,
            y2: y,
            confidence: obj.confidence,
            object_name: obj.name.clone(),
        });
        lines.push(DerivedLine {
            orientation: Orientation::Horizontal,
            x1: x,
            y1: y + h,
            x2: x + w,
            y2: y + h,
            confidence: obj.confidence,
            object_name: obj.name.clone(),
        });

        // Left and right edges
        lines.push(DerivedLine {
            orientation: Orientation::Vertical,
            x1: x,
            y1: y,
            x2: x,
            y2: y + h,
            confidence: obj.confidence,
            object_name: obj.name.clone(),
        });
        lines.push(DerivedLine {
            orientation: Orientation::Vertical,
            x1: x + w,
            y1: y,
            x2: x + w,
            y2: y + h,
            confidence: obj.confidence,
            object_name: obj.name.clone(),
        });
    }

    lines
}

/// Detect room candidates: rectangle/square/shape objects become one
/// candidate each; when none exist but derived lines do, the bounding box
/// over all line endpoints becomes a single whole-sketch `mainRoom`
/// candidate.
pub fn detect_potential_rooms(
    objects: &[DetectedObject],
    derived_lines: &[DerivedLine],
) -> Vec<PotentialRoom> {
    let mut potential_rooms: Vec<PotentialRoom> = objects
        .iter()
        .filter(|obj| ROOM_SHAPE_NAMES.contains(&obj.name.as_str()))
        .filter_map(|obj| obj.rectangle.map(|rect| (obj, rect)))
        .enumerate()
        .map(|(index, (obj, rect))| PotentialRoom {
            name: format!("room{}", index + 1),
            bounds: RoomBounds {
                x: rect.x,
                y: rect.y,
                width: rect.w,
                height: rect.h,
            },
            confidence: obj.confidence,
        })
        .collect();

    if potential_rooms.is_empty() && !derived_lines.is_empty() {
        let xs = derived_lines.iter().flat_map(|l| [l.x1, l.x2]);
        let ys = derived_lines.iter().flat_map(|l| [l.y1, l.y2]);

        let min_x = xs.clone().fold(f64::INFINITY, f64::min);
        let max_x = xs.fold(f64::NEG_INFINITY, f64::max);
        let min_y = ys.clone().fold(f64::INFINITY, f64::min);
        let max_y = ys.fold(f64::NEG_INFINITY, f64::max);

        potential_rooms.push(PotentialRoom {
            name: "mainRoom".to_string(),
            bounds: RoomBounds {
                x: min_x,
                y: min_y,
                width: max_x - min_x,
                height: max_y - min_y,
            },
            confidence: DERIVED_ROOM_CONFIDENCE,
        });
    }

    potential_rooms
}

fn extract_architectural_features(tags: &[ImageTag]) -> ArchitecturalFeatures {
    let building_elements = tags
        .iter()
        .filter(|tag| ARCHITECTURAL_TAGS.contains(&tag.name.to_lowercase().as_str()))
        .map(|tag| BuildingElement {
            element: tag.name.clone(),
            confidence: tag.confidence,
        })
        .collect();

    let style_keywords: [(&str, &[&str]); 5] = [
        ("modern", &["modern", "contemporary", "minimalist"]),
        ("classical", &["classical", "column", "symmetrical", "ornate"]),
        ("victorian", &["victorian", "ornate", "detailed"]),
        ("industrial", &["industrial", "exposed", "brick", "metal", "concrete"]),
        ("traditional", &["traditional", "conventional"]),
    ];

    let style = style_keywords
        .iter()
        .find(|(_, keywords)| {
            keywords.iter().any(|keyword| {
                tags.iter().any(|tag| tag.name.to_lowercase().contains(keyword))
            })
        })
        .map(|(style, _)| style.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    ArchitecturalFeatures {
        building_elements,
        style,
    }
}

/// Serialize an analysis for embedding into a chat prompt.
pub fn to_prompt_json<T: Serialize>(analysis: &T) -> Value {
    serde_json::to_value(analysis).unwrap_or(Value::Null)
}
