use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use super::generation_provider::{
    GenerationProvider, GenerationRequest, ProviderError, ProviderInfo,
};
use crate::config::GenerationConfig;

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Debug, Deserialize)]
struct ResponseCandidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Google Generative Language `generateContent` backend.
pub struct GeminiProvider {
    http_client: Client,
    base_url: String,
    model: String,
    request_timeout: Duration,
}

impl GeminiProvider {
    pub fn new(config: &GenerationConfig) -> Self {
        Self {
            http_client: Client::new(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    fn endpoint(&self, api_key: &str) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&format!(
            "{}/models/{}:generateContent",
            self.base_url, self.model
        ))
        .map_err(|e| ProviderError::Transport(format!("invalid endpoint url: {}", e)))?;
        url.query_pairs_mut().append_pair("key", api_key);
        Ok(url)
    }
}

#[async_trait]
impl GenerationProvider for GeminiProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<String, ProviderError> {
        let url = self.endpoint(request.api_key.expose())?;

        let body = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }],
            "generationConfig": {
                "temperature": request.temperature,
                "maxOutputTokens": request.max_output_tokens,
            }
        });

        tracing::debug!(
            "Calling {} (key={}, prompt_len={}, max_tokens={})",
            self.model,
            request.api_key.fingerprint(),
            request.prompt.len(),
            request.max_output_tokens
        );

        let response = self
            .http_client
            .post(url)
            .json(&body)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(self.request_timeout.as_secs())
                } else {
                    // reqwest errors embed the URL, which carries the key
                    ProviderError::Transport(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::Http {
                status: status.as_u16(),
                message: upstream_error_message(&error_text),
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.without_url().to_string()))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(text)
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "gemini".to_string(),
            model: self.model.clone(),
        }
    }
}

/// Pulls `error.status` and `error.message` out of a Google API error body,
/// falling back to the raw text.
fn upstream_error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.trim().to_string();
    };
    let error = &value["error"];
    match (error["status"].as_str(), error["message"].as_str()) {
        (Some(status), Some(message)) => format!("{} {}", status, message),
        (None, Some(message)) => message.to_string(),
        _ => body.trim().to_string(),
    }
}
