use serde::Serialize;

/// Best-effort classification of a failed call to the generation capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Authentication,
    QuotaOrBilling,
    Network,
    ModelUnavailable,
    MalformedRequest,
    RateLimited,
    Unknown,
}

impl FailureReason {
    /// Classifies raw error text by substring. Order matters: rate limiting is
    /// checked before the generic "limit" quota match, and key/auth problems win
    /// over everything else.
    pub fn classify(error_text: &str) -> Self {
        let text = error_text.to_lowercase();
        let has = |needle: &str| text.contains(needle);

        if (has("api key") || has("api_key"))
            && (has("missing") || has("invalid") || has("not valid"))
        {
            return FailureReason::Authentication;
        }
        if has("authentication") || has("unauthorized") || has("unauthenticated") {
            return FailureReason::Authentication;
        }
        if has("quota") || has("billing") {
            return FailureReason::QuotaOrBilling;
        }
        if has("429") || has("rate limit") || has("too many requests") {
            return FailureReason::RateLimited;
        }
        if has("limit") {
            return FailureReason::QuotaOrBilling;
        }
        if has("network")
            || has("fetch")
            || has("connection")
            || has("timed out")
            || has("timeout")
            || has("dns")
        {
            return FailureReason::Network;
        }
        if has("model") || has("not found") || has("404") {
            return FailureReason::ModelUnavailable;
        }
        if has("403") || has("forbidden") || has("permission") {
            return FailureReason::Authentication;
        }
        if has("400") || has("bad request") || has("invalid_argument") {
            return FailureReason::MalformedRequest;
        }
        FailureReason::Unknown
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::Authentication => "authentication",
            FailureReason::QuotaOrBilling => "quota_or_billing",
            FailureReason::Network => "network",
            FailureReason::ModelUnavailable => "model_unavailable",
            FailureReason::MalformedRequest => "malformed_request",
            FailureReason::RateLimited => "rate_limited",
            FailureReason::Unknown => "unknown",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            FailureReason::Authentication => {
                "Authentication failed. Please verify your API key is correct."
            }
            FailureReason::QuotaOrBilling => {
                "API quota or billing problem. Please check your usage and billing account."
            }
            FailureReason::Network => "Network error. Please check your internet connection.",
            FailureReason::ModelUnavailable => {
                "Model not available. Please check that the model is accessible with your API key."
            }
            FailureReason::MalformedRequest => {
                "Bad request. Please check your API key format and try again."
            }
            FailureReason::RateLimited => "Rate limit exceeded. Please wait a moment and try again.",
            FailureReason::Unknown => "Unexpected error from the generation service.",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything that can go wrong between quiz settings and a usable question set.
#[derive(Debug, thiserror::Error)]
pub enum QuizError {
    #[error("{0}")]
    InvalidSettings(String),

    #[error("{0}")]
    InvalidKeyFormat(String),

    #[error("{}", reason.user_message())]
    KeyVerificationFailed {
        reason: FailureReason,
        detail: String,
    },

    #[error("No valid JSON array found in the generated response")]
    NoJsonFound,

    #[error("Invalid JSON format in the generated response: {0}")]
    MalformedJson(String),

    #[error("Generated response is not an array")]
    NotAnArray,

    #[error("No questions were generated")]
    EmptyArray,

    #[error("No valid questions could be generated from the response")]
    NoValidQuestions,

    #[error("{}", reason.user_message())]
    Transport {
        reason: FailureReason,
        detail: String,
    },
}

impl QuizError {
    /// Stable label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            QuizError::InvalidSettings(_) => "invalid_settings",
            QuizError::InvalidKeyFormat(_) => "invalid_key_format",
            QuizError::KeyVerificationFailed { .. } => "key_verification_failed",
            QuizError::NoJsonFound => "no_json_found",
            QuizError::MalformedJson(_) => "malformed_json",
            QuizError::NotAnArray => "not_an_array",
            QuizError::EmptyArray => "empty_array",
            QuizError::NoValidQuestions => "no_valid_questions",
            QuizError::Transport { .. } => "transport",
        }
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            QuizError::KeyVerificationFailed { reason, .. }
            | QuizError::Transport { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}
