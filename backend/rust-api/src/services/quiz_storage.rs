use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::local_quiz_store::LocalQuizStore;
use super::mongo_quiz_store::MongoQuizStore;
use crate::config::{StorageBackend, StorageConfig};
use crate::models::result::{QuizHistory, QuizRecord, StoredQuizResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub user_id: String,
    pub quiz_count: u32,
    pub total_score: u64,
    pub last_quiz_at: Option<DateTime<Utc>>,
}

impl UserStats {
    pub fn empty(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            quiz_count: 0,
            total_score: 0,
            last_quiz_at: None,
        }
    }

    pub fn record(&mut self, score: u32, at: DateTime<Utc>) {
        self.quiz_count += 1;
        self.total_score += u64::from(score);
        self.last_quiz_at = Some(at);
    }
}

/// Durable home for finished quizzes.
#[async_trait]
pub trait QuizStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// Returns the new result's id.
    async fn save_result(&self, record: QuizRecord) -> Result<String>;

    /// Most recent first, at most `limit` entries.
    async fn user_history(&self, user_id: &str, limit: usize) -> Result<Vec<QuizHistory>>;

    async fn get_result(&self, id: &str) -> Result<Option<StoredQuizResult>>;

    /// `false` when nothing matched.
    async fn delete_result(&self, id: &str) -> Result<bool>;

    async fn update_user_stats(&self, user_id: &str, score: u32) -> Result<()>;

    async fn user_stats(&self, user_id: &str) -> Result<Option<UserStats>>;

    async fn health(&self) -> Result<()>;
}

/// Hosted store with a local file behind it. Reads and writes go to the
/// primary; any primary failure is logged and served by the fallback.
pub struct FallbackQuizStore {
    primary: Arc<dyn QuizStore>,
    fallback: Arc<dyn QuizStore>,
}

impl FallbackQuizStore {
    pub fn new(primary: Arc<dyn QuizStore>, fallback: Arc<dyn QuizStore>) -> Self {
        Self { primary, fallback }
    }

    fn log_fallback(&self, operation: &str, error: &anyhow::Error) {
        tracing::warn!(
            "{} store failed on {} ({}), using {} store",
            self.primary.backend_name(),
            operation,
            error,
            self.fallback.backend_name()
        );
    }
}

#[async_trait]
impl QuizStore for FallbackQuizStore {
    fn backend_name(&self) -> &'static str {
        self.primary.backend_name()
    }

    async fn save_result(&self, record: QuizRecord) -> Result<String> {
        match self.primary.save_result(record.clone()).await {
            Ok(id) => Ok(id),
            Err(e) => {
                self.log_fallback("save_result", &e);
                self.fallback.save_result(record).await
            }
        }
    }

    async fn user_history(&self, user_id: &str, limit: usize) -> Result<Vec<QuizHistory>> {
        match self.primary.user_history(user_id, limit).await {
            Ok(history) => Ok(history),
            Err(e) => {
                self.log_fallback("user_history", &e);
                self.fallback.user_history(user_id, limit).await
            }
        }
    }

    async fn get_result(&self, id: &str) -> Result<Option<StoredQuizResult>> {
        match self.primary.get_result(id).await {
            Ok(Some(found)) => Ok(Some(found)),
            // results saved during an outage only exist locally
            Ok(None) => self.fallback.get_result(id).await,
            Err(e) => {
                self.log_fallback("get_result", &e);
                self.fallback.get_result(id).await
            }
        }
    }

    async fn delete_result(&self, id: &str) -> Result<bool> {
        match self.primary.delete_result(id).await {
            Ok(true) => Ok(true),
            Ok(false) => self.fallback.delete_result(id).await,
            Err(e) => {
                self.log_fallback("delete_result", &e);
                self.fallback.delete_result(id).await
            }
        }
    }

    async fn update_user_stats(&self, user_id: &str, score: u32) -> Result<()> {
        match self.primary.update_user_stats(user_id, score).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.log_fallback("update_user_stats", &e);
                self.fallback.update_user_stats(user_id, score).await
            }
        }
    }

    async fn user_stats(&self, user_id: &str) -> Result<Option<UserStats>> {
        match self.primary.user_stats(user_id).await {
            Ok(stats) => Ok(stats),
            Err(e) => {
                self.log_fallback("user_stats", &e);
                self.fallback.user_stats(user_id).await
            }
        }
    }

    async fn health(&self) -> Result<()> {
        if let Err(e) = self.primary.health().await {
            self.log_fallback("health", &e);
            return self.fallback.health().await;
        }
        Ok(())
    }
}

pub async fn build_quiz_store(config: &StorageConfig) -> Result<Arc<dyn QuizStore>> {
    let local: Arc<dyn QuizStore> = Arc::new(LocalQuizStore::new(&config.local_path));

    match config.backend {
        StorageBackend::Local => {
            tracing::info!("Using local result store at {}", config.local_path);
            Ok(local)
        }
        StorageBackend::Mongo => {
            let uri = config
                .mongo_uri
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("MONGO_URI is required for the mongo backend"))?;
            let mongo: Arc<dyn QuizStore> =
                Arc::new(MongoQuizStore::connect(uri, &config.mongo_database).await?);
            tracing::info!(
                "Using MongoDB result store (database={}, local_fallback={})",
                config.mongo_database,
                config.local_fallback
            );
            if config.local_fallback {
                Ok(Arc::new(FallbackQuizStore::new(mongo, local)))
            } else {
                Ok(mongo)
            }
        }
    }
}
