use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::errors::QuizError;
use crate::metrics::QUESTIONS_DISCARDED_TOTAL;
use crate::models::quiz::{Question, QuestionSet, OPTIONS_PER_QUESTION};

lazy_static! {
    static ref CODE_FENCE: Regex = Regex::new(r"```(?:json|JSON)?\s*").unwrap();
}

/// Why a single candidate was dropped. Never surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateRejection {
    NotAnObject,
    InvalidQuestionText,
    InvalidOptionsArray,
    InvalidOption,
    InvalidCorrectAnswer,
}

impl CandidateRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateRejection::NotAnObject => "not_an_object",
            CandidateRejection::InvalidQuestionText => "invalid_question_text",
            CandidateRejection::InvalidOptionsArray => "invalid_options_array",
            CandidateRejection::InvalidOption => "invalid_option",
            CandidateRejection::InvalidCorrectAnswer => "invalid_correct_answer",
        }
    }
}

struct Candidate {
    question: String,
    options: Vec<String>,
    correct_answer: usize,
    explanation: Option<String>,
}

/// Turns raw model output into a question set.
///
/// Structural problems with the payload as a whole are fatal. Problems with an
/// individual question only drop that question. The result keeps survival
/// order, is renumbered from 1 and never exceeds `requested`.
pub fn validate_response(
    raw: &str,
    requested: u32,
    include_explanations: bool,
) -> Result<QuestionSet, QuizError> {
    let cleaned = CODE_FENCE.replace_all(raw.trim(), "");
    let json_text = extract_array_text(&cleaned).ok_or(QuizError::NoJsonFound)?;

    tracing::debug!(
        "Extracted JSON payload: {} of {} bytes",
        json_text.len(),
        raw.len()
    );

    let parsed: Value = serde_json::from_str(json_text).map_err(|e| {
        tracing::error!("Generated JSON failed to parse: {}", e);
        QuizError::MalformedJson(e.to_string())
    })?;

    let items = parsed.as_array().ok_or(QuizError::NotAnArray)?;
    if items.is_empty() {
        return Err(QuizError::EmptyArray);
    }

    let mut questions: Vec<Question> = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match validate_candidate(item) {
            Ok(candidate) => {
                let id = questions.len() as u32 + 1;
                questions.push(Question {
                    id,
                    question: candidate.question,
                    options: candidate.options,
                    correct_answer: candidate.correct_answer,
                    explanation: if include_explanations {
                        candidate.explanation
                    } else {
                        None
                    },
                });
            }
            Err(rejection) => {
                QUESTIONS_DISCARDED_TOTAL
                    .with_label_values(&[rejection.as_str()])
                    .inc();
                tracing::warn!(
                    candidate = index + 1,
                    reason = rejection.as_str(),
                    "Discarding generated question"
                );
            }
        }
    }

    if questions.is_empty() {
        return Err(QuizError::NoValidQuestions);
    }

    let requested = requested as usize;
    if questions.len() < requested {
        tracing::warn!(
            "Only {} valid questions generated out of {} requested",
            questions.len(),
            requested
        );
    }
    questions.truncate(requested);

    Ok(QuestionSet::new(questions))
}

fn extract_array_text(cleaned: &str) -> Option<&str> {
    let start = cleaned.find('[')?;
    let end = cleaned.rfind(']')?;
    if end < start {
        return None;
    }
    Some(&cleaned[start..=end])
}

fn validate_candidate(item: &Value) -> Result<Candidate, CandidateRejection> {
    let object = item.as_object().ok_or(CandidateRejection::NotAnObject)?;

    let question = object
        .get("question")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .ok_or(CandidateRejection::InvalidQuestionText)?;

    let raw_options = object
        .get("options")
        .and_then(Value::as_array)
        .filter(|options| options.len() == OPTIONS_PER_QUESTION)
        .ok_or(CandidateRejection::InvalidOptionsArray)?;

    let correct_answer = object
        .get("correctAnswer")
        .and_then(integral_index)
        .filter(|index| *index < OPTIONS_PER_QUESTION)
        .ok_or(CandidateRejection::InvalidCorrectAnswer)?;

    let options = raw_options
        .iter()
        .map(|option| {
            option
                .as_str()
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_string)
                .ok_or(CandidateRejection::InvalidOption)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let explanation = object
        .get("explanation")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string);

    Ok(Candidate {
        question: question.to_string(),
        options,
        correct_answer,
        explanation,
    })
}

/// Accepts `2` and `2.0`, rejects `2.5`, negatives and non-numbers.
fn integral_index(value: &Value) -> Option<usize> {
    if let Some(index) = value.as_u64() {
        return usize::try_from(index).ok();
    }
    let float = value.as_f64()?;
    if float >= 0.0 && float.fract() == 0.0 && float <= OPTIONS_PER_QUESTION as f64 {
        return Some(float as usize);
    }
    None
}
