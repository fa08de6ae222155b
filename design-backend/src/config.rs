//! Environment-driven configuration for the Azure backends.

#[derive(Debug, Clone)]
pub struct AzureConfig {
    pub openai: OpenAiConfig,
    pub vision: VisionConfig,
    pub speech: SpeechConfig,
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub key: String,
    pub endpoint: String,
    pub deployment: String,
    pub api_version: String,
}

#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub key: String,
    pub endpoint: String,
}

#[derive(Debug, Clone)]
pub struct SpeechConfig {
    pub key: String,
    pub region: String,
}

impl AzureConfig {
    pub fn from_env() -> Self {
        Self {
            openai: OpenAiConfig {
                key: std::env::var("AZURE_OPENAI_KEY").unwrap_or_default(),
                endpoint: std::env::var("AZURE_OPENAI_ENDPOINT").unwrap_or_default(),
                deployment: std::env::var("AZURE_OPENAI_DEPLOYMENT")
                    .unwrap_or_else(|_| "gpt-4".to_string()),
                api_version: std::env::var("AZURE_OPENAI_API_VERSION")
                    .unwrap_or_else(|_| "2023-12-01-preview".to_string()),
            },
            vision: VisionConfig {
                key: std::env::var("AZURE_VISION_KEY").unwrap_or_default(),
                endpoint: std::env::var("AZURE_VISION_ENDPOINT").unwrap_or_default(),
            },
            speech: SpeechConfig {
                key: std::env::var("AZURE_SPEECH_KEY").unwrap_or_default(),
                region: std::env::var("AZURE_SPEECH_REGION")
                    .unwrap_or_else(|_| "eastus".to_string()),
            },
        }
    }
}
