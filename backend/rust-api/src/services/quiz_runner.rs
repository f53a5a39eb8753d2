use serde::Serialize;

use crate::errors::QuizError;
use crate::metrics::ANSWERS_RECORDED_TOTAL;
use crate::models::quiz::{Question, QuestionSet, QuizSettings, OPTIONS_PER_QUESTION};
use crate::models::result::QuizResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Answering,
    FeedbackShown,
    Completed,
}

/// Mutable progress of one quiz attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizRunState {
    pub current_index: usize,
    pub answers: Vec<Option<usize>>,
    pub selected: Option<usize>,
    pub remaining_seconds: u32,
    pub feedback_shown: bool,
    pub completed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not answering, nothing counted down.
    Idle,
    Ticked(u32),
    /// Countdown hit zero and the current selection was submitted.
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    NotApplied,
    NextQuestion(usize),
    Completed,
}

/// Drives a single attempt: one question at a time, countdown, scoring.
///
/// Illegal transitions are no-ops and report `false` / `NotApplied`.
#[derive(Debug, Clone)]
pub struct QuizRunner {
    questions: QuestionSet,
    settings: QuizSettings,
    state: QuizRunState,
    result: Option<QuizResult>,
}

impl QuizRunner {
    pub fn new(questions: QuestionSet, settings: &QuizSettings) -> Result<Self, QuizError> {
        if questions.is_empty() {
            return Err(QuizError::NoValidQuestions);
        }
        let state = QuizRunState {
            current_index: 0,
            answers: vec![None; questions.len()],
            selected: None,
            remaining_seconds: settings.seconds_per_question,
            feedback_shown: false,
            completed: false,
        };
        Ok(Self {
            questions,
            settings: settings.without_key(),
            state,
            result: None,
        })
    }

    pub fn phase(&self) -> RunPhase {
        if self.state.completed {
            RunPhase::Completed
        } else if self.state.feedback_shown {
            RunPhase::FeedbackShown
        } else {
            RunPhase::Answering
        }
    }

    pub fn state(&self) -> &QuizRunState {
        &self.state
    }

    pub fn questions(&self) -> &QuestionSet {
        &self.questions
    }

    pub fn settings(&self) -> &QuizSettings {
        &self.settings
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.state.current_index)
    }

    /// 1-based position of the current question.
    pub fn question_number(&self) -> u32 {
        self.state.current_index as u32 + 1
    }

    pub fn result(&self) -> Option<&QuizResult> {
        self.result.as_ref()
    }

    pub fn select_answer(&mut self, index: usize) -> bool {
        if self.phase() != RunPhase::Answering || index >= OPTIONS_PER_QUESTION {
            return false;
        }
        self.state.selected = Some(index);
        true
    }

    pub fn submit_answer(&mut self) -> bool {
        if self.phase() != RunPhase::Answering {
            return false;
        }
        let index = self.state.current_index;
        let answer = self.state.selected;
        self.state.answers[index] = answer;
        self.state.feedback_shown = true;

        let outcome = match (answer, self.questions.get(index)) {
            (None, _) => "unanswered",
            (Some(_), Some(question)) if question.is_correct(answer) => "correct",
            _ => "incorrect",
        };
        ANSWERS_RECORDED_TOTAL.with_label_values(&[outcome]).inc();
        true
    }

    pub fn advance(&mut self) -> AdvanceOutcome {
        if self.phase() != RunPhase::FeedbackShown {
            return AdvanceOutcome::NotApplied;
        }
        if self.state.current_index + 1 >= self.questions.len() {
            self.state.completed = true;
            self.result = Some(QuizResult::new(
                self.questions.clone(),
                self.state.answers.clone(),
                &self.settings,
            ));
            return AdvanceOutcome::Completed;
        }
        self.state.current_index += 1;
        self.state.selected = None;
        self.state.feedback_shown = false;
        self.state.remaining_seconds = self.settings.seconds_per_question;
        AdvanceOutcome::NextQuestion(self.state.current_index)
    }

    /// One elapsed second.
    pub fn tick(&mut self) -> TickOutcome {
        if self.phase() != RunPhase::Answering {
            return TickOutcome::Idle;
        }
        self.state.remaining_seconds = self.state.remaining_seconds.saturating_sub(1);
        if self.state.remaining_seconds == 0 {
            self.submit_answer();
            return TickOutcome::TimedOut;
        }
        TickOutcome::Ticked(self.state.remaining_seconds)
    }
}
