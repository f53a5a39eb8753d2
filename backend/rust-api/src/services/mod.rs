use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use generation_client::GenerationClient;
use key_store::KeyStore;
use quiz_storage::QuizStore;
use run_registry::QuizRunRegistry;

pub mod export_service;
pub mod gemini_provider;
pub mod generation_client;
pub mod generation_provider;
pub mod key_store;
pub mod local_quiz_store;
pub mod mongo_quiz_store;
pub mod prompt_builder;
pub mod quiz_runner;
pub mod quiz_storage;
pub mod response_validator;
pub mod run_registry;

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn QuizStore>,
    pub key_store: Arc<dyn KeyStore>,
    pub generation: GenerationClient,
    pub runs: QuizRunRegistry,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = quiz_storage::build_quiz_store(&config.storage).await?;
        let key_store = key_store::build_key_store(&config.key_store).await?;
        let provider = Arc::new(gemini_provider::GeminiProvider::new(&config.generation));
        let generation = GenerationClient::new(provider, config.generation.clone());

        tracing::info!(
            "Generation provider: {} ({})",
            generation.provider_name(),
            config.generation.model
        );

        Ok(Self::from_parts(config, store, key_store, generation))
    }

    /// Wires already-built collaborators; used by tests with fakes.
    pub fn from_parts(
        config: Config,
        store: Arc<dyn QuizStore>,
        key_store: Arc<dyn KeyStore>,
        generation: GenerationClient,
    ) -> Self {
        let runs = QuizRunRegistry::new(
            Duration::from_millis(config.quiz.tick_interval_ms),
            Duration::from_secs(config.quiz.run_ttl_secs),
        );
        Self {
            config,
            store,
            key_store,
            generation,
            runs,
        }
    }
}
