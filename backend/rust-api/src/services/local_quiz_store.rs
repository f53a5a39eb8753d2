use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::quiz_storage::{QuizStore, UserStats};
use crate::metrics::track_store_operation;
use crate::models::result::{QuizHistory, QuizRecord, StoredQuizResult};

const BACKEND: &str = "local";

#[derive(Debug, Default, Serialize, Deserialize)]
struct LocalData {
    #[serde(default)]
    results: Vec<StoredQuizResult>,
    #[serde(default)]
    users: HashMap<String, UserStats>,
}

/// Single JSON file on disk. Every operation loads and rewrites the file
/// under one lock.
pub struct LocalQuizStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl LocalQuizStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<LocalData> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(LocalData::default()),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("corrupt result file {}", self.path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(LocalData::default()),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", self.path.display())),
        }
    }

    async fn persist(&self, data: &LocalData) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(data)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("failed to write {}", self.path.display()))
    }
}

#[async_trait]
impl QuizStore for LocalQuizStore {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    async fn save_result(&self, record: QuizRecord) -> Result<String> {
        track_store_operation(BACKEND, "save_result", async {
            let _guard = self.lock.lock().await;
            let mut data = self.load().await?;
            let id = Uuid::new_v4().to_string();
            data.results.push(StoredQuizResult {
                id: id.clone(),
                record,
            });
            self.persist(&data).await?;
            tracing::info!("Saved quiz result {} locally", id);
            Ok(id)
        })
        .await
    }

    async fn user_history(&self, user_id: &str, limit: usize) -> Result<Vec<QuizHistory>> {
        track_store_operation(BACKEND, "user_history", async {
            let _guard = self.lock.lock().await;
            let data = self.load().await?;
            let mut history: Vec<QuizHistory> = data
                .results
                .iter()
                .filter(|stored| stored.record.user_id == user_id)
                .map(|stored| stored.record.summary(&stored.id))
                .collect();
            history.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            history.truncate(limit);
            Ok(history)
        })
        .await
    }

    async fn get_result(&self, id: &str) -> Result<Option<StoredQuizResult>> {
        track_store_operation(BACKEND, "get_result", async {
            let _guard = self.lock.lock().await;
            let data = self.load().await?;
            Ok(data.results.into_iter().find(|stored| stored.id == id))
        })
        .await
    }

    async fn delete_result(&self, id: &str) -> Result<bool> {
        track_store_operation(BACKEND, "delete_result", async {
            let _guard = self.lock.lock().await;
            let mut data = self.load().await?;
            let before = data.results.len();
            data.results.retain(|stored| stored.id != id);
            if data.results.len() == before {
                return Ok(false);
            }
            self.persist(&data).await?;
            Ok(true)
        })
        .await
    }

    async fn update_user_stats(&self, user_id: &str, score: u32) -> Result<()> {
        track_store_operation(BACKEND, "update_user_stats", async {
            let _guard = self.lock.lock().await;
            let mut data = self.load().await?;
            data.users
                .entry(user_id.to_string())
                .or_insert_with(|| UserStats::empty(user_id))
                .record(score, Utc::now());
            self.persist(&data).await
        })
        .await
    }

    async fn user_stats(&self, user_id: &str) -> Result<Option<UserStats>> {
        let _guard = self.lock.lock().await;
        let mut data = self.load().await?;
        Ok(data.users.remove(user_id))
    }

    async fn health(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.load().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quiz::Question;
    use chrono::{Duration, TimeZone};

    fn temp_store() -> (LocalQuizStore, PathBuf) {
        let path = std::env::temp_dir()
            .join(format!("smartquiz-test-{}", Uuid::new_v4()))
            .join("results.json");
        (LocalQuizStore::new(&path), path)
    }

    fn record(user_id: &str, day: u32) -> QuizRecord {
        let at = Utc.with_ymd_and_hms(2024, 5, day, 10, 0, 0).unwrap();
        QuizRecord {
            user_id: user_id.to_string(),
            title: format!("Quiz - 2024-05-{:02}", day),
            content: "Photosynthesis converts light into chemical energy.".into(),
            questions: vec![Question {
                id: 1,
                question: "What does photosynthesis produce?".into(),
                options: vec![
                    "Glucose".into(),
                    "Iron".into(),
                    "Salt".into(),
                    "Helium".into(),
                ],
                correct_answer: 0,
                explanation: None,
            }],
            answers: vec![Some(0)],
            score: 1,
            total_questions: 1,
            percentage: 100,
            seconds_per_question: 30,
            show_explanations: false,
            created_at: at,
            completed_at: at + Duration::minutes(2),
        }
    }

    #[tokio::test]
    async fn save_then_get_round_trips() {
        let (store, path) = temp_store();
        let id = store.save_result(record("alice", 1)).await.unwrap();
        let stored = store.get_result(&id).await.unwrap().unwrap();
        assert_eq!(stored.id, id);
        assert_eq!(stored.record.user_id, "alice");
        assert_eq!(stored.record.answers, vec![Some(0)]);
        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
    }

    #[tokio::test]
    async fn history_is_most_recent_first_and_bounded() {
        let (store, path) = temp_store();
        for day in [3, 1, 7, 5] {
            store.save_result(record("alice", day)).await.unwrap();
        }
        store.save_result(record("bob", 9)).await.unwrap();

        let history = store.user_history("alice", 3).await.unwrap();
        let titles: Vec<&str> = history.iter().map(|h| h.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Quiz - 2024-05-07", "Quiz - 2024-05-05", "Quiz - 2024-05-03"]
        );
        assert!(history.iter().all(|h| h.user_id == "alice"));
        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
    }

    #[tokio::test]
    async fn delete_reports_whether_anything_matched() {
        let (store, path) = temp_store();
        let id = store.save_result(record("alice", 1)).await.unwrap();
        assert!(store.delete_result(&id).await.unwrap());
        assert!(!store.delete_result(&id).await.unwrap());
        assert!(store.get_result(&id).await.unwrap().is_none());
        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
    }

    #[tokio::test]
    async fn user_stats_accumulate_across_calls() {
        let (store, path) = temp_store();
        assert!(store.user_stats("alice").await.unwrap().is_none());
        store.update_user_stats("alice", 4).await.unwrap();
        store.update_user_stats("alice", 6).await.unwrap();
        let stats = store.user_stats("alice").await.unwrap().unwrap();
        assert_eq!(stats.quiz_count, 2);
        assert_eq!(stats.total_score, 10);
        assert!(stats.last_quiz_at.is_some());
        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let (store, _path) = temp_store();
        assert!(store.user_history("nobody", 10).await.unwrap().is_empty());
        assert!(store.health().await.is_ok());
    }
}
