use serde::{Deserialize, Serialize};
use validator::Validate;

pub mod api_key;
pub mod quiz;
pub mod result;
pub mod timer;

use crate::services::export_service::ExportFormat;
use crate::services::quiz_runner::{QuizRunner, RunPhase};
use quiz::{TimeSetting, MAX_QUESTION_COUNT, MIN_QUESTION_COUNT};

/// Minimum pasted content accepted by the quiz endpoint.
pub const MIN_CONTENT_CHARS: usize = 100;

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyKeyRequest {
    #[validate(length(min = 1, max = 128, message = "user_id must be between 1 and 128 characters"))]
    pub user_id: String,

    pub api_key: String,

    /// Store the key for the user once it verifies.
    #[serde(default = "default_true")]
    pub remember: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyKeyResponse {
    pub valid: bool,
    pub remembered: bool,
    pub masked_key: String,
    pub fingerprint: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StoredKeyResponse {
    pub user_id: String,
    pub masked_key: String,
    pub fingerprint: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 128, message = "user_id must be between 1 and 128 characters"))]
    pub user_id: String,

    pub content: String,

    /// Falls back to the key remembered for the user.
    #[serde(default)]
    pub api_key: Option<String>,

    #[validate(range(
        min = MIN_QUESTION_COUNT,
        max = MAX_QUESTION_COUNT,
        message = "question_count must be between 1 and 60"
    ))]
    pub question_count: u32,

    #[serde(default)]
    pub time_per_question: TimeSetting,

    #[serde(default)]
    pub custom_time: Option<u32>,

    #[serde(default)]
    pub show_explanations: bool,

    #[serde(default)]
    #[validate(length(max = 128))]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SelectAnswerRequest {
    pub answer_index: usize,
}

/// A question as the player sees it. Correctness only after submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionView {
    pub id: u32,
    pub number: u32,
    pub question: String,
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSummary {
    pub score: u32,
    pub total_questions: u32,
    pub percentage: u32,
    pub message: String,
    /// Absent when saving the result failed.
    pub result_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSnapshot {
    pub quiz_id: String,
    pub user_id: String,
    pub phase: RunPhase,
    pub question_number: u32,
    pub total_questions: u32,
    pub seconds_per_question: u32,
    pub remaining_seconds: u32,
    pub selected: Option<usize>,
    pub answers: Vec<Option<usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<QuestionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultSummary>,
}

impl RunSnapshot {
    pub fn capture(
        quiz_id: &str,
        user_id: &str,
        runner: &QuizRunner,
        result_id: Option<String>,
    ) -> Self {
        let state = runner.state();
        let phase = runner.phase();
        let reveal = phase != RunPhase::Answering;

        let question = if phase == RunPhase::Completed {
            None
        } else {
            runner.current_question().map(|q| {
                let answer = state.answers.get(state.current_index).copied().flatten();
                QuestionView {
                    id: q.id,
                    number: runner.question_number(),
                    question: q.question.clone(),
                    options: q.options.clone(),
                    correct_answer: reveal.then_some(q.correct_answer),
                    is_correct: reveal.then(|| q.is_correct(answer)),
                    explanation: if reveal && runner.settings().show_explanations {
                        q.explanation.clone()
                    } else {
                        None
                    },
                }
            })
        };

        let result = runner.result().map(|r| ResultSummary {
            score: r.score,
            total_questions: r.total_questions,
            percentage: r.percentage(),
            message: r.score_message().to_string(),
            result_id,
        });

        Self {
            quiz_id: quiz_id.to_string(),
            user_id: user_id.to_string(),
            phase,
            question_number: runner.question_number(),
            total_questions: runner.questions().len() as u32,
            seconds_per_question: runner.settings().seconds_per_question,
            remaining_seconds: state.remaining_seconds,
            selected: state.selected,
            answers: state.answers.clone(),
            question,
            result,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransitionResponse {
    pub applied: bool,
    #[serde(flatten)]
    pub snapshot: RunSnapshot,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: Option<ExportFormat>,
}
