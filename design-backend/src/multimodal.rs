//! Multimodal merger: folds text, sketch, speech transcript, and photo
//! inputs into a single combined generation call.

use anyhow::Context;
use serde_json::{json, Value};
use tracing::{info, warn};

use azure_ai::{extract_json_block, ImageAnalyzer, TextGenerator};

use crate::model::Model;
use crate::sketch::{self, PhotoAnalysis, SketchAnalysis};

const COMBINE_SYSTEM_PROMPT: &str = "You are a Multimodal Design Agent. You combine \
information from text descriptions, sketch analyses, speech transcripts, and photo \
analyses into a single coherent architectural model. Weigh each input source and \
resolve conflicts in favor of explicit user statements. Output a valid JSON model.";

const COMBINE_TEMPERATURE: f32 = 0.2;
/// Retries want variance, not fidelity to the first answer.
const RETRY_TEMPERATURE: f32 = 0.8;

/// Prior contribution weights per modality, normalized at metadata time
/// over the modalities actually used.
const TEXT_WEIGHT: f64 = 0.4;
const SKETCH_WEIGHT: f64 = 0.3;
const SPEECH_WEIGHT: f64 = 0.2;
const PHOTO_WEIGHT: f64 = 0.1;

/// Raw inputs for one multimodal request. `speech` is a transcript, not
/// audio; `sketch` and `photo` are base64 data URLs.
#[derive(Debug, Clone, Default)]
pub struct MultimodalInput {
    pub text: Option<String>,
    pub sketch: Option<String>,
    pub speech: Option<String>,
    pub photo: Option<String>,
}

impl MultimodalInput {
    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.sketch.is_none()
            && self.speech.is_none()
            && self.photo.is_none()
    }

    /// Count of non-text modalities supplied. The merge path only pays off
    /// with two or more; below that the plain pipeline handles the request.
    pub fn non_text_modalities(&self) -> usize {
        [&self.sketch, &self.speech, &self.photo]
            .iter()
            .filter(|m| m.is_some())
            .count()
    }
}

/// Which modalities actually contributed to the merged model. Sketch and
/// photo are flagged only when their analysis succeeded.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModalityFlags {
    pub text: bool,
    pub sketch: bool,
    pub speech: bool,
    pub photo: bool,
}

#[derive(Debug, Clone)]
pub struct MergeResult {
    /// Parsed model JSON, or an `{error, rawContent}` sentinel when the
    /// combined response held no parseable JSON.
    pub model_data: Value,
    pub raw_response: String,
    pub flags: ModalityFlags,
    pub photo_style: Option<String>,
}

impl MergeResult {
    pub fn is_sentinel(&self) -> bool {
        self.model_data.get("error").is_some()
    }
}

pub struct MultimodalProcessor<G, V> {
    chat: G,
    vision: V,
}

impl<G: TextGenerator, V: ImageAnalyzer> MultimodalProcessor<G, V> {
    pub fn new(chat: G, vision: V) -> Self {
        Self { chat, vision }
    }

    /// Merge all supplied modalities into one model with a single combined
    /// generation call. Failed sketch/photo analyses degrade to absent
    /// modalities; only a failed chat call is an error.
    pub async fn process(&self, input: &MultimodalInput) -> anyhow::Result<MergeResult> {
        info!(
            "Multimodal merge over {} non-text modalities",
            input.non_text_modalities()
        );

        let (sketch_analysis, photo_analysis) = tokio::join!(
            self.analyze_sketch_input(input.sketch.as_deref()),
            self.analyze_photo_input(input.photo.as_deref()),
        );

        let flags = ModalityFlags {
            text: input.text.is_some(),
            sketch: sketch_analysis.is_some(),
            speech: input.speech.is_some(),
            photo: photo_analysis.is_some(),
        };
        let photo_style = photo_analysis
            .as_ref()
            .map(|p| p.architectural_features.style.clone());

        let prompt = combine_prompt(input, sketch_analysis.as_ref(), photo_analysis.as_ref());
        let response = self
            .chat
            .complete(COMBINE_SYSTEM_PROMPT, &prompt, COMBINE_TEMPERATURE)
            .await
            .context("Multimodal merge failed")?;

        let mut model_data = parse_model_json(&response);
        let mut raw_response = response;

        // A sketch with several distinct room shapes that merged into a
        // single-room model gets one higher-temperature retry asking for
        // the rooms to be kept separate.
        if let Some(analysis) = &sketch_analysis {
            if should_retry_for_room_count(analysis, &model_data) {
                warn!(
                    "Merged model collapsed {} sketch rooms into one, retrying",
                    analysis.potential_rooms.len()
                );
                let retry_prompt = format!(
                    "{}\n\nIMPORTANT: the sketch clearly shows {} distinct rooms. \
                     Do NOT merge them into a single room. Model each detected \
                     room as its own entry in the rooms array.",
                    prompt,
                    analysis.potential_rooms.len()
                );
                let retry_response = self
                    .chat
                    .complete(COMBINE_SYSTEM_PROMPT, &retry_prompt, RETRY_TEMPERATURE)
                    .await
                    .context("Multimodal merge retry failed")?;

                let retried = parse_model_json(&retry_response);
                if room_count(&retried) > 1 {
                    model_data = retried;
                    raw_response = retry_response;
                }
            }
        }

        Ok(MergeResult {
            model_data,
            raw_response,
            flags,
            photo_style,
        })
    }

    async fn analyze_sketch_input(&self, sketch: Option<&str>) -> Option<SketchAnalysis> {
        let data_url = sketch?;
        match sketch::analyze_sketch(&self.vision, data_url).await {
            Ok(analysis) => Some(analysis),
            Err(e) => {
                warn!("Sketch analysis failed in multimodal merge: {:#}", e);
                None
            }
        }
    }

    async fn analyze_photo_input(&self, photo: Option<&str>) -> Option<PhotoAnalysis> {
        let data_url = photo?;
        match sketch::analyze_photo(&self.vision, data_url).await {
            Ok(analysis) => Some(analysis),
            Err(e) => {
                warn!("Photo analysis failed in multimodal merge: {:#}", e);
                None
            }
        }
    }
}

fn combine_prompt(
    input: &MultimodalInput,
    sketch_analysis: Option<&SketchAnalysis>,
    photo_analysis: Option<&PhotoAnalysis>,
) -> String {
    let mut prompt = String::from(
        "Combine the following inputs into a single coherent architectural model:\n\n",
    );

    if let Some(text) = &input.text {
        prompt.push_str(&format!("TEXT DESCRIPTION:\n{}\n\n", text));
    }
    if let Some(analysis) = sketch_analysis {
        let analysis_json =
            serde_json::to_string_pretty(&sketch::to_prompt_json(analysis)).unwrap_or_default();
        prompt.push_str(&format!("SKETCH ANALYSIS:\n{}\n\n", analysis_json));
    }
    if let Some(speech) = &input.speech {
        prompt.push_str(&format!("SPEECH TRANSCRIPT:\n{}\n\n", speech));
    }
    if let Some(analysis) = photo_analysis {
        let analysis_json =
            serde_json::to_string_pretty(&sketch::to_prompt_json(analysis)).unwrap_or_default();
        prompt.push_str(&format!("PHOTO ANALYSIS:\n{}\n\n", analysis_json));
    }

    prompt.push_str(
        "Your response must be a valid JSON object with this structure:\n\
         {\n  \"rooms\": [{ \"name\": \"string\", \"width\": number, \"length\": number, \
         \"height\": number, \"x\": number, \"y\": number, \"z\": number, \
         \"connected_to\": [\"string\"] }],\n  \
         \"windows\": [{ \"room\": \"string\", \"wall\": \"north|south|east|west\", \
         \"width\": number, \"height\": number, \"position\": number }],\n  \
         \"doors\": [{ \"from\": \"string\", \"to\": \"string\", \"width\": number, \
         \"height\": number }]\n}\n\n\
         Honor the spatial layout from the sketch where present, the style from the \
         photo where present, and explicit requirements from text and speech.",
    );

    prompt
}

fn parse_model_json(response: &str) -> Value {
    if let Some(block) = extract_json_block(response) {
        if let Ok(value) = serde_json::from_str::<Value>(&block) {
            return value;
        }
    }
    warn!("Failed to parse merged model response as JSON");
    json!({ "error": "Failed to parse response", "rawContent": response })
}

fn room_count(model_data: &Value) -> usize {
    model_data
        .get("rooms")
        .and_then(Value::as_array)
        .map_or(0, Vec::len)
}

fn should_retry_for_room_count(analysis: &SketchAnalysis, model_data: &Value) -> bool {
    analysis.potential_rooms.len() > 1 && room_count(model_data) == 1
}

/// Summary metadata for a merged model: which modalities contributed,
/// structure counts, total floor area, suggested style, and the normalized
/// contribution weight of each modality that was used.
pub fn model_metadata(model: &Model, flags: &ModalityFlags, photo_style: Option<&str>) -> Value {
    let suggested_style = match photo_style {
        Some(style) if style != "unknown" => style.to_string(),
        _ => "modern".to_string(),
    };

    let priors = [
        ("text", flags.text, TEXT_WEIGHT),
        ("sketch", flags.sketch, SKETCH_WEIGHT),
        ("speech", flags.speech, SPEECH_WEIGHT),
        ("photo", flags.photo, PHOTO_WEIGHT),
    ];
    let total: f64 = priors
        .iter()
        .filter(|(_, used, _)| *used)
        .map(|(_, _, w)| w)
        .sum();

    let mut modalities = serde_json::Map::new();
    let mut weights = serde_json::Map::new();
    for (name, used, weight) in priors {
        modalities.insert(name.to_string(), json!(used));
        if used && total > 0.0 {
            weights.insert(name.to_string(), json!(weight / total));
        }
    }

    json!({
        "input_modalities": modalities,
        "room_count": model.rooms.len(),
        "window_count": model.windows.len(),
        "door_count": model.doors.len(),
        "total_area": model.total_area(),
        "largest_room": model
            .largest_room()
            .map(|r| json!({ "name": r.name, "area": r.area() })),
        "suggested_style": suggested_style,
        "modality_weights": weights,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repair;
    use crate::testing::{FailingVision, ScriptedChat, StubVision};

    fn input(text: bool, sketch: bool, speech: bool, photo: bool) -> MultimodalInput {
        MultimodalInput {
            text: text.then(|| "a modern house".to_string()),
            sketch: sketch.then(crate::testing::tiny_data_url),
            speech: speech.then(|| "make the kitchen large".to_string()),
            photo: photo.then(crate::testing::tiny_data_url),
        }
    }

    const TWO_ROOMS: &str = r#"{
        "rooms": [
            {"name": "living", "width": 5, "length": 7, "height": 3, "x": 0, "y": 0, "z": 0, "connected_to": []},
            {"name": "kitchen", "width": 4, "length": 4, "height": 3, "x": 5, "y": 0, "z": 0, "connected_to": []}
        ]
    }"#;
    const ONE_ROOM: &str = r#"{"rooms": [{"name": "mainRoom", "width": 10, "length": 10, "height": 3, "x": 0, "y": 0, "z": 0}]}"#;

    #[test]
    fn test_non_text_modality_count() {
        assert_eq!(input(true, false, false, false).non_text_modalities(), 0);
        assert_eq!(input(true, true, false, false).non_text_modalities(), 1);
        assert_eq!(input(false, true, true, true).non_text_modalities(), 3);
    }

    #[tokio::test]
    async fn test_merge_happy_path_sets_flags() {
        let chat = ScriptedChat::new(vec![TWO_ROOMS]);
        let processor = MultimodalProcessor::new(chat, StubVision::with_rectangle_objects(2));

        let result = processor.process(&input(true, true, true, false)).await.unwrap();

        assert!(!result.is_sentinel());
        assert!(result.flags.text);
        assert!(result.flags.sketch);
        assert!(result.flags.speech);
        assert!(!result.flags.photo);
        assert!(result.photo_style.is_none());
    }

    #[tokio::test]
    async fn test_failed_sketch_analysis_clears_flag() {
        let chat = ScriptedChat::new(vec![TWO_ROOMS]);
        let processor = MultimodalProcessor::new(chat, FailingVision);

        let result = processor.process(&input(true, true, true, false)).await.unwrap();
        assert!(!result.flags.sketch);
        assert!(result.flags.text);
    }

    #[tokio::test]
    async fn test_unparseable_merge_becomes_sentinel() {
        let chat = ScriptedChat::new(vec!["I could not combine these inputs."]);
        let processor = MultimodalProcessor::new(chat, StubVision::empty());

        let result = processor.process(&input(true, false, true, false)).await.unwrap();
        assert!(result.is_sentinel());
        assert_eq!(result.model_data["rawContent"], "I could not combine these inputs.");
    }

    #[tokio::test]
    async fn test_single_room_collapse_triggers_retry() {
        // Sketch shows two rooms, first merge collapses them, retry splits.
        let chat = ScriptedChat::new(vec![ONE_ROOM, TWO_ROOMS]);
        let processor =
            MultimodalProcessor::new(chat.clone(), StubVision::with_rectangle_objects(2));

        let result = processor.process(&input(true, true, false, false)).await.unwrap();

        assert_eq!(room_count(&result.model_data), 2);
        let prompts = chat.recorded_prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].contains("2 distinct rooms"));
        assert_eq!(chat.recorded_temperatures(), vec![0.2, 0.8]);
    }

    #[tokio::test]
    async fn test_failed_retry_keeps_first_result() {
        let chat = ScriptedChat::new(vec![ONE_ROOM, ONE_ROOM]);
        let processor = MultimodalProcessor::new(chat.clone(), StubVision::with_rectangle_objects(3));

        let result = processor.process(&input(true, true, false, false)).await.unwrap();

        // Retry also produced one room, so the original result stands and
        // no third call is made.
        assert_eq!(room_count(&result.model_data), 1);
        assert_eq!(chat.recorded_prompts().len(), 2);
    }

    #[tokio::test]
    async fn test_no_retry_for_single_candidate_sketch() {
        let chat = ScriptedChat::new(vec![ONE_ROOM]);
        let processor = MultimodalProcessor::new(chat.clone(), StubVision::with_rectangle_objects(1));

        processor.process(&input(true, true, false, false)).await.unwrap();
        assert_eq!(chat.recorded_prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_photo_style_extracted() {
        let chat = ScriptedChat::new(vec![TWO_ROOMS]);
        let processor = MultimodalProcessor::new(chat, StubVision::with_tags(&["brick", "wall"]));

        let result = processor.process(&input(true, false, false, true)).await.unwrap();
        assert_eq!(result.photo_style.as_deref(), Some("industrial"));
    }

    #[test]
    fn test_metadata_weights_normalized() {
        let model = repair::repair(
            serde_json::from_str(TWO_ROOMS).unwrap(),
            false,
        );
        let flags = ModalityFlags { text: true, sketch: true, speech: false, photo: false };

        let metadata = model_metadata(&model, &flags, None);

        let weights = &metadata["modality_weights"];
        assert!((weights["text"].as_f64().unwrap() - 0.4 / 0.7).abs() < 1e-9);
        assert!((weights["sketch"].as_f64().unwrap() - 0.3 / 0.7).abs() < 1e-9);
        assert!(weights.get("speech").is_none());
        assert_eq!(metadata["room_count"], 2);
        assert_eq!(metadata["largest_room"]["name"], "living");
        assert_eq!(metadata["largest_room"]["area"], 35.0);
        assert_eq!(metadata["total_area"], 51.0);
    }

    #[test]
    fn test_metadata_reports_input_modalities() {
        let model = Model::default();
        let flags = ModalityFlags { text: true, sketch: false, speech: true, photo: false };

        let metadata = model_metadata(&model, &flags, None);

        let modalities = &metadata["input_modalities"];
        assert_eq!(modalities["text"], true);
        assert_eq!(modalities["sketch"], false);
        assert_eq!(modalities["speech"], true);
        assert_eq!(modalities["photo"], false);
        // No rooms: largest_room is absent, weights cover text and speech.
        assert_eq!(metadata["largest_room"], Value::Null);
        let weights = &metadata["modality_weights"];
        assert!((weights["text"].as_f64().unwrap() - 0.4 / 0.6).abs() < 1e-9);
        assert!((weights["speech"].as_f64().unwrap() - 0.2 / 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_metadata_style_prefers_photo() {
        let model = Model::default();
        let flags = ModalityFlags { text: true, ..Default::default() };

        let with_style = model_metadata(&model, &flags, Some("victorian"));
        assert_eq!(with_style["suggested_style"], "victorian");

        let unknown = model_metadata(&model, &flags, Some("unknown"));
        assert_eq!(unknown["suggested_style"], "modern");

        let absent = model_metadata(&model, &flags, None);
        assert_eq!(absent["suggested_style"], "modern");
    }
}
