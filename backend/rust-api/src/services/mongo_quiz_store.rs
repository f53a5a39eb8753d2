use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, from_document, to_document, Bson, Document},
    Client, Collection, Database,
};
use uuid::Uuid;

use super::quiz_storage::{QuizStore, UserStats};
use crate::metrics::track_store_operation;
use crate::models::result::{QuizHistory, QuizRecord, StoredQuizResult};
use crate::utils::retry::{retry_async_with_config, RetryConfig};
use crate::utils::time::{bson_to_chrono, chrono_to_bson};

const BACKEND: &str = "mongo";
const RESULTS: &str = "quiz_results";
const USERS: &str = "users";

pub struct MongoQuizStore {
    mongo: Database,
}

impl MongoQuizStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri)
            .await
            .context("Failed to create MongoDB client")?;
        Ok(Self::new(client.database(database)))
    }

    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn results(&self) -> Collection<Document> {
        self.mongo.collection(RESULTS)
    }

    fn users(&self) -> Collection<Document> {
        self.mongo.collection(USERS)
    }
}

/// Record fields as serialized, plus native BSON dates for sorting.
fn record_to_document(id: &str, record: &QuizRecord) -> Result<Document> {
    let mut document = to_document(record).context("Failed to encode quiz record")?;
    document.insert("_id", id);
    document.insert("created_at_ts", chrono_to_bson(record.created_at));
    document.insert("completed_at_ts", chrono_to_bson(record.completed_at));
    Ok(document)
}

fn document_to_stored(mut document: Document) -> Result<StoredQuizResult> {
    let id = match document.remove("_id") {
        Some(Bson::String(id)) => id,
        Some(Bson::ObjectId(oid)) => oid.to_hex(),
        _ => anyhow::bail!("quiz result without _id"),
    };
    document.remove("created_at_ts");
    document.remove("completed_at_ts");
    let record: QuizRecord = from_document(document).context("Failed to decode quiz record")?;
    Ok(StoredQuizResult { id, record })
}

fn document_to_stats(user_id: &str, document: &Document) -> UserStats {
    UserStats {
        user_id: user_id.to_string(),
        quiz_count: document
            .get_i64("quiz_count")
            .or_else(|_| document.get_i32("quiz_count").map(i64::from))
            .unwrap_or(0) as u32,
        total_score: document
            .get_i64("total_score")
            .or_else(|_| document.get_i32("total_score").map(i64::from))
            .unwrap_or(0) as u64,
        last_quiz_at: document
            .get_datetime("last_quiz_at")
            .ok()
            .map(|dt| bson_to_chrono(*dt)),
    }
}

#[async_trait]
impl QuizStore for MongoQuizStore {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    async fn save_result(&self, record: QuizRecord) -> Result<String> {
        track_store_operation(BACKEND, "save_result", async {
            let id = Uuid::new_v4().to_string();
            let document = record_to_document(&id, &record)?;
            let collection = self.results();

            retry_async_with_config("quiz result insert", RetryConfig::persistent_write(), || async {
                collection.insert_one(document.clone()).await.map(|_| ())
            })
            .await
            .context("Failed to save quiz result")?;

            tracing::info!("Saved quiz result {} for user {}", id, record.user_id);
            Ok(id)
        })
        .await
    }

    async fn user_history(&self, user_id: &str, limit: usize) -> Result<Vec<QuizHistory>> {
        track_store_operation(BACKEND, "user_history", async {
            let mut cursor = self
                .results()
                .find(doc! { "user_id": user_id })
                .sort(doc! { "created_at_ts": -1 })
                .limit(limit as i64)
                .await
                .context("Failed to query quiz history")?;

            let mut history = Vec::new();
            while let Some(document) = cursor.try_next().await? {
                let stored = document_to_stored(document)?;
                history.push(stored.record.summary(&stored.id));
            }
            Ok(history)
        })
        .await
    }

    async fn get_result(&self, id: &str) -> Result<Option<StoredQuizResult>> {
        track_store_operation(BACKEND, "get_result", async {
            self.results()
                .find_one(doc! { "_id": id })
                .await
                .context("Failed to fetch quiz result")?
                .map(document_to_stored)
                .transpose()
        })
        .await
    }

    async fn delete_result(&self, id: &str) -> Result<bool> {
        track_store_operation(BACKEND, "delete_result", async {
            let outcome = self
                .results()
                .delete_one(doc! { "_id": id })
                .await
                .context("Failed to delete quiz result")?;
            Ok(outcome.deleted_count > 0)
        })
        .await
    }

    async fn update_user_stats(&self, user_id: &str, score: u32) -> Result<()> {
        track_store_operation(BACKEND, "update_user_stats", async {
            let collection = self.users();
            let update = doc! {
                "$inc": { "quiz_count": 1_i64, "total_score": i64::from(score) },
                "$set": { "last_quiz_at": chrono_to_bson(Utc::now()) },
            };

            retry_async_with_config("user stats update", RetryConfig::default(), || async {
                collection
                    .update_one(doc! { "_id": user_id }, update.clone())
                    .upsert(true)
                    .await
                    .map(|_| ())
            })
            .await
            .context("Failed to update user stats")
        })
        .await
    }

    async fn user_stats(&self, user_id: &str) -> Result<Option<UserStats>> {
        let document = self
            .users()
            .find_one(doc! { "_id": user_id })
            .await
            .context("Failed to fetch user stats")?;
        Ok(document.map(|d| document_to_stats(user_id, &d)))
    }

    async fn health(&self) -> Result<()> {
        self.mongo
            .run_command(doc! { "ping": 1 })
            .await
            .map(|_| ())
            .context("MongoDB ping failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quiz::Question;
    use chrono::TimeZone;

    fn record() -> QuizRecord {
        let at = Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap();
        QuizRecord {
            user_id: "alice".into(),
            title: "Quiz - 2024-02-01".into(),
            content: "Cells divide by mitosis.".into(),
            questions: vec![Question {
                id: 1,
                question: "How do cells divide?".into(),
                options: vec!["Mitosis".into(), "Osmosis".into(), "Fusion".into(), "Decay".into()],
                correct_answer: 0,
                explanation: Some("Mitosis is cell division.".into()),
            }],
            answers: vec![None],
            score: 0,
            total_questions: 1,
            percentage: 0,
            seconds_per_question: 45,
            show_explanations: true,
            created_at: at,
            completed_at: at,
        }
    }

    #[test]
    fn documents_round_trip_through_bson() {
        let document = record_to_document("abc", &record()).unwrap();
        assert_eq!(document.get_str("_id").unwrap(), "abc");
        assert!(document.get_datetime("created_at_ts").is_ok());

        let stored = document_to_stored(document).unwrap();
        assert_eq!(stored.id, "abc");
        assert_eq!(stored.record.answers, vec![None]);
        assert_eq!(stored.record.questions[0].correct_answer, 0);
        assert_eq!(stored.record.created_at, record().created_at);
    }

    #[test]
    fn stats_read_from_either_integer_width() {
        let at = Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap();
        let document = doc! {
            "_id": "alice",
            "quiz_count": 3_i32,
            "total_score": 12_i64,
            "last_quiz_at": chrono_to_bson(at),
        };
        let stats = document_to_stats("alice", &document);
        assert_eq!(stats.quiz_count, 3);
        assert_eq!(stats.total_score, 12);
        assert_eq!(stats.last_quiz_at, Some(at));
    }
}
