//! Scripted backend doubles shared by the agent tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use base64::{engine::general_purpose, Engine as _};

use azure_ai::{
    BoundingRect, DetectedObject, ImageAnalysis, ImageAnalyzer, ImageTag, TextGenerator,
};

/// Text backend that replays a fixed queue of responses and records every
/// prompt it was asked to complete. Clones share the same queue and log.
#[derive(Clone)]
pub struct ScriptedChat {
    responses: Arc<Mutex<VecDeque<String>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    temperatures: Arc<Mutex<Vec<f32>>>,
    failure: Option<String>,
}

impl ScriptedChat {
    pub fn new<S: Into<String>>(responses: Vec<S>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into_iter().map(Into::into).collect())),
            prompts: Arc::new(Mutex::new(Vec::new())),
            temperatures: Arc::new(Mutex::new(Vec::new())),
            failure: None,
        }
    }

    /// A chat backend whose every call fails with the given message.
    pub fn failing(message: &str) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
            temperatures: Arc::new(Mutex::new(Vec::new())),
            failure: Some(message.to_string()),
        }
    }

    pub fn recorded_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn recorded_temperatures(&self) -> Vec<f32> {
        self.temperatures.lock().unwrap().clone()
    }
}

impl TextGenerator for ScriptedChat {
    async fn complete(
        &self,
        _system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
    ) -> anyhow::Result<String> {
        self.prompts.lock().unwrap().push(user_prompt.to_string());
        self.temperatures.lock().unwrap().push(temperature);

        if let Some(message) = &self.failure {
            return Err(anyhow::anyhow!("{}", message));
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("scripted chat ran out of responses"))
    }
}

/// Vision backend returning a canned analysis.
#[derive(Clone)]
pub struct StubVision {
    analysis: ImageAnalysis,
}

impl StubVision {
    pub fn empty() -> Self {
        Self { analysis: ImageAnalysis::default() }
    }

    /// An analysis with `n` rectangle-class objects, each a direct room
    /// candidate for sketch analysis.
    pub fn with_rectangle_objects(n: usize) -> Self {
        let objects = (0..n)
            .map(|i| DetectedObject {
                name: "rectangle".to_string(),
                confidence: 0.9,
                rectangle: Some(BoundingRect {
                    x: (i as f64) * 60.0,
                    y: 0.0,
                    w: 50.0,
                    h: 40.0,
                }),
            })
            .collect();
        Self {
            analysis: ImageAnalysis {
                objects,
                tags: Vec::new(),
                categories: Vec::new(),
                description: Some("a hand-drawn floor plan".to_string()),
            },
        }
    }

    /// An analysis carrying only tags, for photo-style detection.
    pub fn with_tags(names: &[&str]) -> Self {
        let tags = names
            .iter()
            .map(|name| ImageTag { name: name.to_string(), confidence: 0.85 })
            .collect();
        Self {
            analysis: ImageAnalysis {
                objects: Vec::new(),
                tags,
                categories: Vec::new(),
                description: Some("a building".to_string()),
            },
        }
    }
}

impl ImageAnalyzer for StubVision {
    async fn analyze(
        &self,
        _image_bytes: &[u8],
        _features: &[&str],
    ) -> anyhow::Result<ImageAnalysis> {
        Ok(self.analysis.clone())
    }
}

/// Vision backend whose every call fails.
#[derive(Clone)]
pub struct FailingVision;

impl ImageAnalyzer for FailingVision {
    async fn analyze(
        &self,
        _image_bytes: &[u8],
        _features: &[&str],
    ) -> anyhow::Result<ImageAnalysis> {
        Err(anyhow::anyhow!("vision backend unavailable"))
    }
}

/// A minimal valid base64 data URL for image inputs.
pub fn tiny_data_url() -> String {
    format!(
        "data:image/png;base64,{}",
        general_purpose::STANDARD.encode(b"tiny-test-image")
    )
}
