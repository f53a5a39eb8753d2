use async_trait::async_trait;

use crate::models::api_key::ApiKey;

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub api_key: ApiKey,
}

/// Failure reported by a generation backend. The `Display` text is what gets
/// classified into a [`crate::errors::FailureReason`], so implementations
/// should keep the upstream status code and message in it.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("network error: {0}")]
    Transport(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("failed to decode provider response: {0}")]
    Decode(String),

    #[error("provider returned no text")]
    EmptyResponse,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ProviderInfo {
    pub name: String,
    pub model: String,
}

/// The external text-generation capability.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<String, ProviderError>;
    fn info(&self) -> ProviderInfo;
}
