use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

/// Maximum completion size for chat calls. Model JSON payloads run to a few
/// thousand tokens, so leave generous headroom.
const MAX_COMPLETION_TOKENS: u32 = 4000;

/// A text-completion backend. The agents are generic over this trait so
/// tests can inject scripted responses instead of a live deployment.
pub trait TextGenerator {
    fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
    ) -> impl std::future::Future<Output = anyhow::Result<String>> + Send;
}

/// An image-understanding backend returning objects/tags/categories for a
/// raw image payload.
pub trait ImageAnalyzer {
    fn analyze(
        &self,
        image_bytes: &[u8],
        features: &[&str],
    ) -> impl std::future::Future<Output = anyhow::Result<ImageAnalysis>> + Send;
}

/// A single-shot speech-to-text backend for one short audio clip.
pub trait SpeechRecognizer {
    fn recognize(
        &self,
        audio_bytes: &[u8],
    ) -> impl std::future::Future<Output = anyhow::Result<String>> + Send;
}

/// Normalized result of an image-analysis call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageAnalysis {
    pub objects: Vec<DetectedObject>,
    pub tags: Vec<ImageTag>,
    pub categories: Vec<ImageCategory>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedObject {
    pub name: String,
    pub confidence: f64,
    pub rectangle: Option<BoundingRect>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoundingRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageTag {
    pub name: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageCategory {
    pub name: String,
    pub score: f64,
    #[serde(default)]
    pub landmarks: Vec<String>,
}

/// Azure OpenAI chat-completions client.
#[derive(Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    deployment: String,
    api_version: String,
}

impl ChatClient {
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            deployment: deployment.into(),
            api_version: api_version.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl TextGenerator for ChatClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
    ) -> anyhow::Result<String> {
        let url = format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.deployment,
            self.api_version
        );

        let request_body = json!({
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_prompt },
            ],
            "temperature": temperature,
            "max_tokens": MAX_COMPLETION_TOKENS,
        });

        info!("Sending chat request to Azure OpenAI (deployment: {})", self.deployment);

        let response = self
            .client
            .post(&url)
            .header("api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            warn!("Azure OpenAI error: {} - {}", status, error_text);
            return Err(anyhow::anyhow!("Azure OpenAI error: {} - {}", status, error_text));
        }

        let api_response: ChatResponse = response.json().await?;

        if api_response.choices.is_empty() {
            return Err(anyhow::anyhow!("No response from Azure OpenAI"));
        }

        Ok(api_response.choices[0].message.content.clone().unwrap_or_default())
    }
}

/// Azure Computer Vision image-analysis client.
#[derive(Clone)]
pub struct VisionClient {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

// Wire format of the v3.2 analyze endpoint. Only the fields the pipeline
// consumes are modeled; everything else is ignored.
#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    #[serde(default)]
    objects: Vec<WireObject>,
    #[serde(default)]
    tags: Vec<ImageTag>,
    #[serde(default)]
    categories: Vec<WireCategory>,
    description: Option<WireDescription>,
}

#[derive(Debug, Deserialize)]
struct WireObject {
    object: String,
    confidence: f64,
    rectangle: Option<BoundingRect>,
}

#[derive(Debug, Deserialize)]
struct WireCategory {
    name: String,
    score: f64,
    detail: Option<WireCategoryDetail>,
}

#[derive(Debug, Deserialize)]
struct WireCategoryDetail {
    #[serde(default)]
    landmarks: Vec<WireLandmark>,
}

#[derive(Debug, Deserialize)]
struct WireLandmark {
    name: String,
}

#[derive(Debug, Deserialize)]
struct WireDescription {
    #[serde(default)]
    captions: Vec<WireCaption>,
}

#[derive(Debug, Deserialize)]
struct WireCaption {
    text: String,
}

impl VisionClient {
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
        }
    }
}

impl ImageAnalyzer for VisionClient {
    async fn analyze(&self, image_bytes: &[u8], features: &[&str]) -> anyhow::Result<ImageAnalysis> {
        let url = format!(
            "{}/vision/v3.2/analyze?visualFeatures={}",
            self.endpoint.trim_end_matches('/'),
            features.join(",")
        );

        info!("Sending image analysis request ({} bytes)", image_bytes.len());

        let response = self
            .client
            .post(&url)
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .header("Content-Type", "application/octet-stream")
            .body(image_bytes.to_vec())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            warn!("Azure Vision error: {} - {}", status, error_text);
            return Err(anyhow::anyhow!("Azure Vision error: {} - {}", status, error_text));
        }

        let wire: AnalyzeResponse = response.json().await?;

        Ok(ImageAnalysis {
            objects: wire
                .objects
                .into_iter()
                .map(|o| DetectedObject {
                    name: o.object,
                    confidence: o.confidence,
                    rectangle: o.rectangle,
                })
                .collect(),
            tags: wire.tags,
            categories: wire
                .categories
                .into_iter()
                .map(|c| ImageCategory {
                    name: c.name,
                    score: c.score,
                    landmarks: c
                        .detail
                        .map(|d| d.landmarks.into_iter().map(|l| l.name).collect())
                        .unwrap_or_default(),
                })
                .collect(),
            description: wire
                .description
                .and_then(|d| d.captions.into_iter().next().map(|c| c.text)),
        })
    }
}

/// Azure Speech short-audio recognition client.
#[derive(Clone)]
pub struct SpeechClient {
    client: reqwest::Client,
    api_key: String,
    region: String,
}

#[derive(Debug, Deserialize)]
struct RecognitionResponse {
    #[serde(rename = "RecognitionStatus")]
    recognition_status: String,
    #[serde(rename = "DisplayText", default)]
    display_text: String,
}

impl SpeechClient {
    pub fn new(api_key: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            region: region.into(),
        }
    }
}

impl SpeechRecognizer for SpeechClient {
    async fn recognize(&self, audio_bytes: &[u8]) -> anyhow::Result<String> {
        let url = format!(
            "https://{}.stt.speech.microsoft.com/speech/recognition/conversation/cognitiveservices/v1?language=en-US",
            self.region
        );

        info!("Sending speech recognition request ({} bytes)", audio_bytes.len());

        let response = self
            .client
            .post(&url)
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .header("Content-Type", "audio/wav; codecs=audio/pcm; samplerate=16000")
            .body(audio_bytes.to_vec())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            warn!("Azure Speech error: {} - {}", status, error_text);
            return Err(anyhow::anyhow!("Azure Speech error: {} - {}", status, error_text));
        }

        let result: RecognitionResponse = response.json().await?;

        if result.recognition_status == "Success" && !result.display_text.is_empty() {
            Ok(result.display_text)
        } else {
            Err(anyhow::anyhow!("No text was recognized from the audio"))
        }
    }
}

/// Extract the first JSON object from a chat response (handles markdown
/// code blocks and surrounding prose). Brace matching is string-aware so
/// braces inside quoted values do not break the scan.
pub fn extract_json_block(content: &str) -> Option<String> {
    let trimmed = content.trim();

    // Strip a markdown code fence if present
    let body = if trimmed.starts_with("```") {
        trimmed
            .lines()
            .skip(1)
            .take_while(|line| !line.starts_with("```"))
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        trimmed.to_string()
    };

    let start = body.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in body[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(body[start..start + offset + ch.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_from_markdown() {
        let response = "```json\n{\"rooms\": []}\n```";
        let json = extract_json_block(response).unwrap();
        assert_eq!(json, "{\"rooms\": []}");
    }

    #[test]
    fn test_extract_json_plain() {
        let response = "{\"rooms\": []}";
        let json = extract_json_block(response).unwrap();
        assert_eq!(json, "{\"rooms\": []}");
    }

    #[test]
    fn test_extract_json_with_surrounding_prose() {
        let response = "Here is the model:\n{\"rooms\": [{\"name\": \"living\"}]}\nLet me know!";
        let json = extract_json_block(response).unwrap();
        assert_eq!(json, "{\"rooms\": [{\"name\": \"living\"}]}");
    }

    #[test]
    fn test_extract_json_ignores_braces_in_strings() {
        let response = r#"{"note": "a } inside", "n": 1}"#;
        let json = extract_json_block(response).unwrap();
        assert_eq!(json, response);
        assert!(serde_json::from_str::<serde_json::Value>(&json).is_ok());
    }

    #[test]
    fn test_extract_json_none_when_absent() {
        assert!(extract_json_block("no json here").is_none());
    }
}
