//! Requirement interpreter: first pipeline stage, turning raw text plus
//! optional sketch hints into a structured requirements object.

use anyhow::Context;
use serde_json::{json, Value};
use tracing::{info, warn};

use azure_ai::{extract_json_block, ImageAnalyzer, TextGenerator};

use crate::sketch::{self, SketchAnalysis};

const INTERPRETER_SYSTEM_PROMPT: &str = "You are an Architectural Interpreter Agent. \
Your role is to analyze sketches and textual descriptions to extract precise architectural \
requirements. Extract room types, dimensions, relationships, and design preferences. \
Format your output as structured JSON.";

const INTERPRETER_TEMPERATURE: f32 = 0.2;

#[derive(Debug, Clone)]
pub struct InterpreterOutput {
    pub requirements: Value,
    pub sketch_analysis: Option<SketchAnalysis>,
}

pub struct InterpreterAgent<G, V> {
    chat: G,
    vision: V,
}

impl<G: TextGenerator, V: ImageAnalyzer> InterpreterAgent<G, V> {
    pub fn new(chat: G, vision: V) -> Self {
        Self { chat, vision }
    }

    /// Interpret the prompt (and sketch, when present) into requirements.
    ///
    /// Vision failures are recoverable: the interpretation proceeds without
    /// sketch hints. A response that cannot be parsed as JSON degrades to a
    /// sentinel object instead of an error, so downstream stages can still
    /// run. Only a failed chat call is an error.
    pub async fn execute(
        &self,
        prompt: &str,
        sketch_data: Option<&str>,
    ) -> anyhow::Result<InterpreterOutput> {
        info!(
            "Interpreter agent processing input with {} and {}",
            if prompt.is_empty() { "no prompt" } else { "text prompt" },
            if sketch_data.is_some() { "sketch data" } else { "no sketch data" }
        );

        let sketch_analysis = match sketch_data {
            Some(data_url) => match sketch::analyze_sketch(&self.vision, data_url).await {
                Ok(analysis) => Some(analysis),
                Err(e) => {
                    warn!("Sketch analysis failed, continuing with prompt only: {:#}", e);
                    None
                }
            },
            None => None,
        };

        let user_prompt = prepare_prompt(prompt, sketch_analysis.as_ref());

        let response = self
            .chat
            .complete(INTERPRETER_SYSTEM_PROMPT, &user_prompt, INTERPRETER_TEMPERATURE)
            .await
            .context("Interpreter agent failed")?;

        Ok(InterpreterOutput {
            requirements: parse_requirements(&response),
            sketch_analysis,
        })
    }
}

fn prepare_prompt(text_prompt: &str, sketch_analysis: Option<&SketchAnalysis>) -> String {
    let mut prompt =
        String::from("Extract architectural requirements from the following information:\n\n");

    if !text_prompt.is_empty() {
        prompt.push_str(&format!("TEXT DESCRIPTION:\n{}\n\n", text_prompt));
    }

    if let Some(analysis) = sketch_analysis {
        let analysis_json =
            serde_json::to_string_pretty(&sketch::to_prompt_json(analysis)).unwrap_or_default();
        prompt.push_str(&format!("SKETCH ANALYSIS:\n{}\n\n", analysis_json));
    }

    prompt.push_str(
        "Based on the above, extract the following in JSON format:\n\
         1. Rooms: types, dimensions, and relationships\n\
         2. Design preferences: style, materials, etc.\n\
         3. Special features: windows, doors, etc.\n\
         4. Constraints: budget, accessibility, etc.\n\n\
         Format your response as a valid JSON object with these elements.",
    );

    prompt
}

/// Parse the model's response into a requirements object, degrading to a
/// sentinel `{error, raw}` value when no JSON can be extracted.
fn parse_requirements(response: &str) -> Value {
    if let Some(block) = extract_json_block(response) {
        if let Ok(value) = serde_json::from_str::<Value>(&block) {
            return value;
        }
    }
    if let Ok(value) = serde_json::from_str::<Value>(response.trim()) {
        return value;
    }

    warn!("Failed to parse interpreter response as JSON");
    json!({ "error": "Failed to parse response", "raw": response })
}
