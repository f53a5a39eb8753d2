use serde::{Deserialize, Serialize};

use super::api_key::ApiKey;
use crate::errors::QuizError;

pub const MIN_QUESTION_COUNT: u32 = 1;
pub const MAX_QUESTION_COUNT: u32 = 60;
pub const MIN_CUSTOM_SECONDS: u32 = 5;
pub const DEFAULT_SECONDS_PER_QUESTION: u32 = 30;
pub const OPTIONS_PER_QUESTION: usize = 4;

/// Seconds-per-question as picked by the user: a preset number of seconds,
/// or the `"custom"` sentinel that is resolved against a separate value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeSetting {
    Seconds(u32),
    Text(String),
}

impl Default for TimeSetting {
    fn default() -> Self {
        TimeSetting::Seconds(DEFAULT_SECONDS_PER_QUESTION)
    }
}

impl TimeSetting {
    pub fn resolve(&self, custom_seconds: Option<u32>) -> Result<u32, QuizError> {
        match self {
            TimeSetting::Seconds(0) => Err(QuizError::InvalidSettings(
                "Time per question must be a positive number of seconds".into(),
            )),
            TimeSetting::Seconds(seconds) => Ok(*seconds),
            TimeSetting::Text(text) if text.trim().eq_ignore_ascii_case("custom") => {
                match custom_seconds {
                    Some(seconds) if seconds >= MIN_CUSTOM_SECONDS => Ok(seconds),
                    _ => Err(QuizError::InvalidSettings(format!(
                        "Custom time must be at least {} seconds",
                        MIN_CUSTOM_SECONDS
                    ))),
                }
            }
            TimeSetting::Text(text) => match text.trim().parse::<u32>() {
                Ok(seconds) if seconds > 0 => Ok(seconds),
                _ => Err(QuizError::InvalidSettings(format!(
                    "Invalid time per question: {}",
                    text
                ))),
            },
        }
    }
}

/// Everything needed for one generation call. Consumed once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizSettings {
    pub content: String,
    #[serde(skip)]
    pub api_key: Option<ApiKey>,
    pub question_count: u32,
    pub seconds_per_question: u32,
    pub show_explanations: bool,
}

impl QuizSettings {
    pub fn new(
        content: impl Into<String>,
        api_key: ApiKey,
        question_count: u32,
        seconds_per_question: u32,
        show_explanations: bool,
    ) -> Result<Self, QuizError> {
        let settings = Self {
            content: content.into().trim().to_string(),
            api_key: Some(api_key),
            question_count,
            seconds_per_question,
            show_explanations,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), QuizError> {
        if self.content.trim().is_empty() {
            return Err(QuizError::InvalidSettings(
                "Content is required to generate questions".into(),
            ));
        }
        if !(MIN_QUESTION_COUNT..=MAX_QUESTION_COUNT).contains(&self.question_count) {
            return Err(QuizError::InvalidSettings(format!(
                "Question count must be between {} and {}",
                MIN_QUESTION_COUNT, MAX_QUESTION_COUNT
            )));
        }
        if self.seconds_per_question == 0 {
            return Err(QuizError::InvalidSettings(
                "Time per question must be a positive number of seconds".into(),
            ));
        }
        Ok(())
    }

    /// Copy safe to hand to collaborators: key material stripped.
    pub fn without_key(&self) -> Self {
        Self {
            api_key: None,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: u32,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl Question {
    pub fn is_correct(&self, answer: Option<usize>) -> bool {
        answer == Some(self.correct_answer)
    }
}

/// Validated, ordered questions from one generation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionSet(Vec<Question>);

impl QuestionSet {
    pub fn new(questions: Vec<Question>) -> Self {
        Self(questions)
    }

    pub fn questions(&self) -> &[Question] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<&Question> {
        self.0.get(index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Question> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Vec<Question> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ApiKey {
        ApiKey::new("test-key-0123456789")
    }

    #[test]
    fn time_setting_resolves_presets_and_custom() {
        assert_eq!(TimeSetting::Seconds(30).resolve(None).unwrap(), 30);
        assert_eq!(TimeSetting::Text("45".into()).resolve(None).unwrap(), 45);
        assert_eq!(
            TimeSetting::Text("custom".into()).resolve(Some(12)).unwrap(),
            12
        );
    }

    #[test]
    fn custom_time_below_minimum_is_rejected() {
        let err = TimeSetting::Text("custom".into())
            .resolve(Some(4))
            .unwrap_err();
        assert!(matches!(err, QuizError::InvalidSettings(_)));
        assert!(TimeSetting::Text("custom".into()).resolve(None).is_err());
        assert!(TimeSetting::Seconds(0).resolve(None).is_err());
        assert!(TimeSetting::Text("soon".into()).resolve(None).is_err());
    }

    #[test]
    fn time_setting_deserializes_numbers_and_strings() {
        let n: TimeSetting = serde_json::from_str("60").unwrap();
        assert_eq!(n, TimeSetting::Seconds(60));
        let s: TimeSetting = serde_json::from_str("\"custom\"").unwrap();
        assert_eq!(s, TimeSetting::Text("custom".into()));
    }

    #[test]
    fn settings_bounds_are_enforced() {
        assert!(QuizSettings::new("some content", key(), 0, 30, false).is_err());
        assert!(QuizSettings::new("some content", key(), 61, 30, false).is_err());
        assert!(QuizSettings::new("   ", key(), 10, 30, false).is_err());
        let ok = QuizSettings::new("  some content  ", key(), 60, 30, true).unwrap();
        assert_eq!(ok.content, "some content");
    }

    #[test]
    fn serialized_settings_never_carry_the_key() {
        let settings = QuizSettings::new("content", key(), 3, 30, false).unwrap();
        let json = serde_json::to_string(&settings).unwrap();
        assert!(!json.contains("test-key"));
        assert!(settings.without_key().api_key.is_none());
    }
}
