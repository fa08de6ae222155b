use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Json, State},
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

mod config;
mod designer;
mod fallback;
mod interpreter;
mod model;
mod multimodal;
mod orchestrator;
mod renderer;
mod repair;
mod sketch;
#[cfg(test)]
mod testing;

use azure_ai::{
    ChatClient, ImageAnalyzer, SpeechClient, SpeechRecognizer, TextGenerator, VisionClient,
};
use config::AzureConfig;
use model::Model;
use multimodal::{model_metadata, MultimodalInput, MultimodalProcessor};
use orchestrator::AgentOrchestrator;
use renderer::{mock_threejs_code, RendererAgent};

/// Prompt substituted when a request carries only an image.
const DEFAULT_SKETCH_PROMPT: &str = "Generate a CAD model based on this sketch";

#[derive(Clone)]
struct AppState {
    chat: ChatClient,
    vision: VisionClient,
    speech: SpeechClient,
}

impl AppState {
    fn from_config(config: &AzureConfig) -> Self {
        Self {
            chat: ChatClient::new(
                config.openai.key.clone(),
                config.openai.endpoint.clone(),
                config.openai.deployment.clone(),
                config.openai.api_version.clone(),
            ),
            vision: VisionClient::new(config.vision.key.clone(), config.vision.endpoint.clone()),
            speech: SpeechClient::new(config.speech.key.clone(), config.speech.region.clone()),
        }
    }

    fn orchestrator(&self) -> AgentOrchestrator<ChatClient, VisionClient> {
        AgentOrchestrator::new(self.chat.clone(), self.vision.clone())
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    sketch_data: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    requirements: Option<Value>,
    model_data: Model,
    code: String,
    original_prompt: String,
    sketch_analysis_performed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    processing_time_ms: Option<u128>,
    fallback: bool,
}

fn bad_request(error: &str, message: String) -> (StatusCode, Json<ErrorResponse>) {
    warn!("Rejecting request: {}", message);
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: error.to_string(),
            message,
        }),
    )
}

async fn generate_handler(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, (StatusCode, Json<ErrorResponse>)> {
    let prompt = request.prompt.unwrap_or_default();
    let sketch_data = request.sketch_data.filter(|s| !s.is_empty());

    if prompt.trim().is_empty() && sketch_data.is_none() {
        return Err(bad_request(
            "MISSING_INPUT",
            "Either a prompt or sketch data is required".to_string(),
        ));
    }

    let prompt = if prompt.trim().is_empty() {
        DEFAULT_SKETCH_PROMPT.to_string()
    } else {
        prompt
    };

    info!("Received generate request ({} chars)", prompt.len());

    match state
        .orchestrator()
        .process_design_request_traced(&prompt, sketch_data.as_deref())
        .await
    {
        Ok(response) => Ok(Json(GenerateResponse {
            requirements: Some(response.requirements),
            model_data: response.model_data,
            code: response.code,
            original_prompt: response.original_prompt,
            sketch_analysis_performed: response.sketch_analysis_performed,
            processing_time_ms: response.processing_time_ms,
            fallback: false,
        })),
        Err(e) => {
            warn!("Pipeline failed, answering with offline model: {:#}", e);
            let result = fallback::generate(&prompt, sketch_data.is_some());
            Ok(Json(GenerateResponse {
                requirements: None,
                model_data: result.model_data,
                code: result.code,
                original_prompt: prompt,
                sketch_analysis_performed: false,
                processing_time_ms: None,
                fallback: true,
            }))
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MultimodalRequest {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    sketch_data: Option<String>,
    #[serde(default)]
    speech_text: Option<String>,
    #[serde(default)]
    photo_data: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MultimodalResponse {
    model_data: Model,
    code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    processing_time_ms: Option<u128>,
    fallback: bool,
}

/// Text prompt representing a multimodal request in the single-call
/// pipeline and the offline generator.
fn text_prompt_of(input: &MultimodalInput) -> String {
    let combined = [input.text.as_deref(), input.speech.as_deref()]
        .iter()
        .flatten()
        .copied()
        .collect::<Vec<_>>()
        .join("\n");
    if combined.trim().is_empty() {
        DEFAULT_SKETCH_PROMPT.to_string()
    } else {
        combined
    }
}

fn fallback_multimodal_response(input: &MultimodalInput) -> MultimodalResponse {
    let result = fallback::generate(&text_prompt_of(input), input.sketch.is_some());
    MultimodalResponse {
        model_data: result.model_data,
        code: result.code,
        metadata: None,
        processing_time_ms: None,
        fallback: true,
    }
}

fn pipeline_multimodal_response(response: orchestrator::DesignResponse) -> MultimodalResponse {
    MultimodalResponse {
        model_data: response.model_data,
        code: response.code,
        metadata: None,
        processing_time_ms: response.processing_time_ms,
        fallback: false,
    }
}

/// Route a validated multimodal request. Generic over the backends so the
/// routing decisions are exercised with scripted clients in tests.
async fn process_multimodal_request<G, V>(
    chat: G,
    vision: V,
    input: &MultimodalInput,
) -> MultimodalResponse
where
    G: TextGenerator + Clone,
    V: ImageAnalyzer + Clone,
{
    // Below two non-text modalities the merge brings nothing; the standard
    // pipeline handles text plus at most one image.
    if input.non_text_modalities() < 2 {
        let prompt = text_prompt_of(input);
        let orchestrator = AgentOrchestrator::new(chat, vision);
        return match orchestrator
            .process_design_request_traced(&prompt, input.sketch.as_deref())
            .await
        {
            Ok(response) => pipeline_multimodal_response(response),
            Err(e) => {
                warn!("Pipeline failed for multimodal request: {:#}", e);
                fallback_multimodal_response(input)
            }
        };
    }

    let processor = MultimodalProcessor::new(chat.clone(), vision.clone());
    let result = match processor.process(input).await {
        Ok(result) => result,
        Err(e) => {
            warn!("Multimodal merge failed: {:#}", e);
            return fallback_multimodal_response(input);
        }
    };

    if result.is_sentinel() {
        // The merge produced prose instead of a model. Its raw response
        // still describes the design, so run it through the standard
        // pipeline as a text prompt.
        info!("Merged response was not a model, escalating to the standard pipeline");
        let orchestrator = AgentOrchestrator::new(chat, vision);
        return match orchestrator
            .process_design_request_traced(&result.raw_response, None)
            .await
        {
            Ok(response) => pipeline_multimodal_response(response),
            Err(e) => {
                warn!("Escalation failed: {:#}", e);
                fallback_multimodal_response(input)
            }
        };
    }

    // Sketch-derived structure carries its own doors; do not synthesize.
    let model = repair::repair(result.model_data, result.flags.sketch);
    let metadata = model_metadata(&model, &result.flags, result.photo_style.as_deref());

    let prompt = text_prompt_of(input);
    let renderer = RendererAgent::new(chat);
    let code = match renderer.emit(&model, &prompt).await {
        Ok(code) => code,
        Err(e) => {
            warn!("Code generation failed for merged model: {:#}", e);
            mock_threejs_code(&model, &prompt)
        }
    };

    MultimodalResponse {
        model_data: model,
        code,
        metadata: Some(metadata),
        processing_time_ms: None,
        fallback: false,
    }
}

async fn multimodal_handler(
    State(state): State<AppState>,
    Json(request): Json<MultimodalRequest>,
) -> Result<Json<MultimodalResponse>, (StatusCode, Json<ErrorResponse>)> {
    let input = MultimodalInput {
        text: request.text.filter(|s| !s.trim().is_empty()),
        sketch: request.sketch_data.filter(|s| !s.is_empty()),
        speech: request.speech_text.filter(|s| !s.trim().is_empty()),
        photo: request.photo_data.filter(|s| !s.is_empty()),
    };

    if input.is_empty() {
        return Err(bad_request(
            "MISSING_INPUT",
            "At least one input modality is required".to_string(),
        ));
    }

    Ok(Json(
        process_multimodal_request(state.chat.clone(), state.vision.clone(), &input).await,
    ))
}

#[derive(Debug, Serialize)]
struct SpeechResponse {
    text: String,
}

async fn speech_to_text_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SpeechResponse>, (StatusCode, Json<ErrorResponse>)> {
    if body.is_empty() {
        return Err(bad_request(
            "MISSING_AUDIO",
            "Audio data is required".to_string(),
        ));
    }

    info!("Received speech-to-text request ({} bytes)", body.len());

    match state.speech.recognize(&body).await {
        Ok(text) => Ok(Json(SpeechResponse { text })),
        Err(e) => {
            warn!("Speech recognition failed: {:#}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "SPEECH_RECOGNITION_FAILED".to_string(),
                    message: format!("{:#}", e),
                }),
            ))
        }
    }
}

pub fn create_app(config: &AzureConfig) -> Router {
    // Configure CORS from environment or use localhost for development
    let allowed_origins = std::env::var("ALLOWED_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000,http://127.0.0.1:3000".to_string());

    let origins: Vec<_> = allowed_origins
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    let cors = if origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE])
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE])
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/generate", post(generate_handler))
        .route("/multimodal", post(multimodal_handler))
        .route("/speech-to-text", post(speech_to_text_handler))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024)) // 10MB max for images and audio
        .layer(cors)
        .with_state(AppState::from_config(config))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting design generation server");

    let config = AzureConfig::from_env();
    let app = create_app(&config);

    let addr = "0.0.0.0:3000";
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
