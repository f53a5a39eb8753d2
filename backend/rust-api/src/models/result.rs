use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::quiz::{Question, QuestionSet, QuizSettings};

pub const CONTENT_EXCERPT_CHARS: usize = 500;
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Count of slots whose answer equals the question's correct index.
/// Unanswered slots never match.
pub fn compute_score(questions: &QuestionSet, answers: &[Option<usize>]) -> u32 {
    questions
        .iter()
        .zip(answers.iter())
        .filter(|(question, answer)| question.is_correct(**answer))
        .count() as u32
}

pub fn percentage(score: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    ((score as f64 / total as f64) * 100.0).round() as u32
}

/// Outcome of one finished quiz attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizResult {
    pub questions: QuestionSet,
    pub answers: Vec<Option<usize>>,
    pub score: u32,
    pub total_questions: u32,
    pub settings: QuizSettings,
}

impl QuizResult {
    pub fn new(questions: QuestionSet, answers: Vec<Option<usize>>, settings: &QuizSettings) -> Self {
        let score = compute_score(&questions, &answers);
        let total_questions = questions.len() as u32;
        Self {
            questions,
            answers,
            score,
            total_questions,
            settings: settings.without_key(),
        }
    }

    pub fn percentage(&self) -> u32 {
        percentage(self.score, self.total_questions)
    }

    pub fn score_message(&self) -> &'static str {
        match self.percentage() {
            90.. => "Excellent!",
            80..=89 => "Great job!",
            70..=79 => "Good work!",
            60..=69 => "Not bad!",
            _ => "Keep studying!",
        }
    }
}

/// Persisted form of a finished quiz, without the storage id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizRecord {
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub questions: Vec<Question>,
    pub answers: Vec<Option<usize>>,
    pub score: u32,
    pub total_questions: u32,
    pub percentage: u32,
    pub seconds_per_question: u32,
    pub show_explanations: bool,
    pub created_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl QuizRecord {
    pub fn from_result(
        user_id: &str,
        result: &QuizResult,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            title: format!("Quiz - {}", completed_at.format("%Y-%m-%d")),
            content: content_excerpt(&result.settings.content),
            questions: result.questions.questions().to_vec(),
            answers: result.answers.clone(),
            score: result.score,
            total_questions: result.total_questions,
            percentage: result.percentage(),
            seconds_per_question: result.settings.seconds_per_question,
            show_explanations: result.settings.show_explanations,
            created_at: started_at,
            completed_at,
        }
    }

    /// Rebuilds a result for rendering. Content is the stored excerpt.
    pub fn to_quiz_result(&self) -> QuizResult {
        let settings = QuizSettings {
            content: self.content.clone(),
            api_key: None,
            question_count: self.total_questions,
            seconds_per_question: self.seconds_per_question,
            show_explanations: self.show_explanations,
        };
        QuizResult::new(
            QuestionSet::new(self.questions.clone()),
            self.answers.clone(),
            &settings,
        )
    }

    pub fn summary(&self, id: &str) -> QuizHistory {
        QuizHistory {
            id: id.to_string(),
            user_id: self.user_id.clone(),
            title: self.title.clone(),
            score: self.score,
            total_questions: self.total_questions,
            percentage: self.percentage,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredQuizResult {
    pub id: String,
    #[serde(flatten)]
    pub record: QuizRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizHistory {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub score: u32,
    pub total_questions: u32,
    pub percentage: u32,
    pub created_at: DateTime<Utc>,
}

fn content_excerpt(content: &str) -> String {
    if content.chars().count() <= CONTENT_EXCERPT_CHARS {
        return content.to_string();
    }
    let head: String = content.chars().take(CONTENT_EXCERPT_CHARS).collect();
    format!("{}...", head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::api_key::ApiKey;

    fn question(id: u32, correct: usize) -> Question {
        Question {
            id,
            question: format!("Question {}?", id),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_answer: correct,
            explanation: None,
        }
    }

    fn settings() -> QuizSettings {
        QuizSettings::new("content", ApiKey::new("test-key-0123456789"), 3, 30, false).unwrap()
    }

    #[test]
    fn unanswered_slots_never_score() {
        let set = QuestionSet::new(vec![question(1, 0), question(2, 1), question(3, 2)]);
        assert_eq!(compute_score(&set, &[Some(0), None, Some(2)]), 2);
        assert_eq!(compute_score(&set, &[None, None, None]), 0);
    }

    #[test]
    fn result_drops_key_and_rounds_percentage() {
        let set = QuestionSet::new(vec![question(1, 0), question(2, 1), question(3, 2)]);
        let result = QuizResult::new(set, vec![Some(0), Some(3), Some(2)], &settings());
        assert_eq!(result.score, 2);
        assert_eq!(result.total_questions, 3);
        assert_eq!(result.percentage(), 67);
        assert_eq!(result.score_message(), "Not bad!");
        assert!(result.settings.api_key.is_none());
    }

    #[test]
    fn score_bands() {
        assert_eq!(percentage(9, 10), 90);
        assert_eq!(percentage(0, 0), 0);
        let set = QuestionSet::new(vec![question(1, 0)]);
        let perfect = QuizResult::new(set.clone(), vec![Some(0)], &settings());
        assert_eq!(perfect.score_message(), "Excellent!");
        let miss = QuizResult::new(set, vec![None], &settings());
        assert_eq!(miss.score_message(), "Keep studying!");
    }

    #[test]
    fn record_truncates_long_content() {
        let mut long = settings();
        long.content = "x".repeat(CONTENT_EXCERPT_CHARS + 20);
        let set = QuestionSet::new(vec![question(1, 0)]);
        let result = QuizResult::new(set, vec![Some(0)], &long);
        let now = Utc::now();
        let record = QuizRecord::from_result("user-1", &result, now, now);
        assert_eq!(record.content.chars().count(), CONTENT_EXCERPT_CHARS + 3);
        assert!(record.title.starts_with("Quiz - "));
        assert_eq!(record.percentage, 100);

        let rebuilt = record.to_quiz_result();
        assert_eq!(rebuilt.score, 1);
        assert_eq!(record.summary("abc").id, "abc");
    }
}
