use std::sync::Arc;
use std::time::{Duration, Instant};

use super::generation_provider::{GenerationProvider, GenerationRequest, ProviderError};
use super::{prompt_builder, response_validator};
use crate::config::GenerationConfig;
use crate::errors::{FailureReason, QuizError};
use crate::metrics::{GENERATION_DURATION_SECONDS, KEY_VERIFICATIONS_TOTAL, QUIZZES_GENERATED_TOTAL};
use crate::models::api_key::{ApiKey, MIN_API_KEY_LEN};
use crate::models::quiz::{QuestionSet, QuizSettings};

pub const VERIFICATION_PROMPT: &str = "Respond with exactly: 'API key is working correctly'";
pub const VERIFICATION_EXPECTED: &str = "API key is working";
const VERIFICATION_MAX_TOKENS: u32 = 20;

/// Front door to the generation capability: key checks, the generation call
/// and validation of what comes back. Never retries.
#[derive(Clone)]
pub struct GenerationClient {
    provider: Arc<dyn GenerationProvider>,
    config: GenerationConfig,
}

impl GenerationClient {
    pub fn new(provider: Arc<dyn GenerationProvider>, config: GenerationConfig) -> Self {
        Self { provider, config }
    }

    pub fn provider_name(&self) -> String {
        self.provider.info().name
    }

    /// Local format check, no network.
    pub fn preflight(key: &ApiKey) -> Result<(), QuizError> {
        if key.is_empty() {
            return Err(QuizError::InvalidKeyFormat(
                "API key is required. Please enter your generation API key.".into(),
            ));
        }
        if key.len() < MIN_API_KEY_LEN {
            return Err(QuizError::InvalidKeyFormat(
                "Invalid API key format. API keys are typically longer.".into(),
            ));
        }
        Ok(())
    }

    /// Pre-flight, then a tiny generation call that must echo a fixed phrase.
    pub async fn verify_key(&self, key: &ApiKey) -> Result<(), QuizError> {
        Self::preflight(key)?;

        tracing::info!("Verifying API key {}", key.fingerprint());

        let request = GenerationRequest {
            prompt: VERIFICATION_PROMPT.to_string(),
            temperature: 0.0,
            max_output_tokens: VERIFICATION_MAX_TOKENS,
            api_key: key.clone(),
        };

        let timeout = Duration::from_secs(self.config.verification_timeout_secs);
        let outcome = match tokio::time::timeout(timeout, self.provider.generate(request)).await {
            Ok(Ok(text)) if text.contains(VERIFICATION_EXPECTED) => Ok(()),
            Ok(Ok(text)) => Err(QuizError::KeyVerificationFailed {
                reason: FailureReason::Unknown,
                detail: format!("Unexpected response from API: {}", preview(&text)),
            }),
            Ok(Err(e)) => Err(QuizError::KeyVerificationFailed {
                reason: FailureReason::classify(&e.to_string()),
                detail: e.to_string(),
            }),
            Err(_) => Err(QuizError::KeyVerificationFailed {
                reason: FailureReason::Network,
                detail: format!("verification timed out after {}s", timeout.as_secs()),
            }),
        };

        match &outcome {
            Ok(()) => {
                KEY_VERIFICATIONS_TOTAL.with_label_values(&["ok"]).inc();
                tracing::info!("API key {} verified", key.fingerprint());
            }
            Err(e) => {
                let reason = e.failure_reason().unwrap_or(FailureReason::Unknown);
                KEY_VERIFICATIONS_TOTAL
                    .with_label_values(&[reason.as_str()])
                    .inc();
                tracing::warn!(
                    "API key {} failed verification ({}): {:?}",
                    key.fingerprint(),
                    reason,
                    e
                );
            }
        }

        outcome
    }

    /// Re-verifies the key, then asks for the quiz. Returns the raw text.
    pub async fn generate(&self, settings: &QuizSettings) -> Result<String, QuizError> {
        settings.validate()?;
        let key = settings
            .api_key
            .clone()
            .ok_or_else(|| QuizError::InvalidKeyFormat("API key is required.".into()))?;

        self.verify_key(&key).await?;

        let prompt = prompt_builder::build_prompt(settings);
        tracing::info!(
            "Generating {} questions from {} chars of content",
            settings.question_count,
            settings.content.chars().count()
        );

        let request = GenerationRequest {
            prompt,
            temperature: self.config.temperature,
            max_output_tokens: self.config.max_output_tokens,
            api_key: key,
        };

        let started = Instant::now();
        let result = self.provider.generate(request).await;
        GENERATION_DURATION_SECONDS
            .with_label_values(&[if result.is_ok() { "ok" } else { "error" }])
            .observe(started.elapsed().as_secs_f64());

        let text = result.map_err(transport_error)?;
        tracing::debug!("Raw generation response: {} bytes", text.len());
        Ok(text)
    }

    /// Full pipeline: generate, then validate into a question set.
    pub async fn generate_questions(
        &self,
        settings: &QuizSettings,
    ) -> Result<QuestionSet, QuizError> {
        let raw = self.generate(settings).await?;
        let outcome = response_validator::validate_response(
            &raw,
            settings.question_count,
            settings.show_explanations,
        );

        match &outcome {
            Ok(set) => {
                QUIZZES_GENERATED_TOTAL.with_label_values(&["ok"]).inc();
                tracing::info!("Generated {} questions", set.len());
            }
            Err(e) => {
                QUIZZES_GENERATED_TOTAL.with_label_values(&[e.kind()]).inc();
                tracing::error!("Generated response rejected: {}", e);
            }
        }
        outcome
    }
}

fn transport_error(error: ProviderError) -> QuizError {
    let detail = error.to_string();
    QuizError::Transport {
        reason: FailureReason::classify(&detail),
        detail,
    }
}

fn preview(text: &str) -> String {
    text.chars().take(80).collect()
}
