use serde::Deserialize;
use std::{env, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    Mongo,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "local" | "file" => Ok(StorageBackend::Local),
            "mongo" | "mongodb" => Ok(StorageBackend::Mongo),
            other => Err(format!("Invalid storage backend: {}", other)),
        }
    }
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Local => "local",
            StorageBackend::Mongo => "mongo",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStoreBackend {
    Local,
    Redis,
}

impl FromStr for KeyStoreBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "local" | "file" => Ok(KeyStoreBackend::Local),
            "redis" => Ok(KeyStoreBackend::Redis),
            other => Err(format!("Invalid key store backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub local_path: String,
    /// With the mongo backend, fall back to the local file when Mongo errors.
    pub local_fallback: bool,
    pub mongo_uri: Option<String>,
    pub mongo_database: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            local_path: "data/quiz-results.json".to_string(),
            local_fallback: true,
            mongo_uri: None,
            mongo_database: "smartquiz".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeyStoreConfig {
    pub backend: KeyStoreBackend,
    pub local_path: String,
    pub redis_uri: Option<String>,
}

impl Default for KeyStoreConfig {
    fn default() -> Self {
        Self {
            backend: KeyStoreBackend::Local,
            local_path: "data/api-keys.json".to_string(),
            redis_uri: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    pub api_base_url: String,
    pub model: String,
    pub temperature: f32,
    /// Enough room for the largest supported quiz (60 questions with explanations).
    pub max_output_tokens: u32,
    pub verification_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-1.5-flash".to_string(),
            temperature: 0.3,
            max_output_tokens: 8192,
            verification_timeout_secs: 15,
            request_timeout_secs: 90,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuizRuntimeConfig {
    pub tick_interval_ms: u64,
    /// Runs older than this are dropped from memory.
    pub run_ttl_secs: u64,
}

impl Default for QuizRuntimeConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            run_ttl_secs: 4 * 3600,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    pub bind_addr: String,
    pub storage: StorageConfig,
    pub key_store: KeyStoreConfig,
    pub generation: GenerationConfig,
    pub quiz: QuizRuntimeConfig,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/*.toml first, APP__ prefixed env vars on top
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let defaults = Config::default();

        let bind_addr = lookup(&settings, "server.bind_addr", "BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8081".to_string());

        let storage = StorageConfig {
            backend: parse(&settings, "storage.backend", "STORAGE_BACKEND")?
                .unwrap_or(defaults.storage.backend),
            local_path: lookup(&settings, "storage.local_path", "STORAGE_LOCAL_PATH")
                .unwrap_or(defaults.storage.local_path),
            local_fallback: parse_flag(&settings, "storage.local_fallback", "STORAGE_LOCAL_FALLBACK")
                .unwrap_or(defaults.storage.local_fallback),
            mongo_uri: lookup(&settings, "storage.mongo_uri", "MONGO_URI"),
            mongo_database: lookup(&settings, "storage.mongo_database", "MONGO_DATABASE")
                .unwrap_or(defaults.storage.mongo_database),
        };

        if storage.backend == StorageBackend::Mongo && storage.mongo_uri.is_none() {
            return Err(config::ConfigError::Message(
                "MONGO_URI must be set when the mongo storage backend is selected".into(),
            ));
        }

        let key_store = KeyStoreConfig {
            backend: parse(&settings, "key_store.backend", "KEY_STORE_BACKEND")?
                .unwrap_or(defaults.key_store.backend),
            local_path: lookup(&settings, "key_store.local_path", "KEY_STORE_LOCAL_PATH")
                .unwrap_or(defaults.key_store.local_path),
            redis_uri: lookup(&settings, "key_store.redis_uri", "REDIS_URI"),
        };

        if key_store.backend == KeyStoreBackend::Redis && key_store.redis_uri.is_none() {
            return Err(config::ConfigError::Message(
                "REDIS_URI must be set when the redis key store is selected".into(),
            ));
        }

        let generation = GenerationConfig {
            api_base_url: lookup(&settings, "generation.api_base_url", "GENERATION_API_BASE_URL")
                .unwrap_or(defaults.generation.api_base_url),
            model: lookup(&settings, "generation.model", "GENERATION_MODEL")
                .unwrap_or(defaults.generation.model),
            temperature: parse(&settings, "generation.temperature", "GENERATION_TEMPERATURE")?
                .unwrap_or(defaults.generation.temperature),
            max_output_tokens: parse(
                &settings,
                "generation.max_output_tokens",
                "GENERATION_MAX_OUTPUT_TOKENS",
            )?
            .unwrap_or(defaults.generation.max_output_tokens),
            verification_timeout_secs: parse(
                &settings,
                "generation.verification_timeout_secs",
                "GENERATION_VERIFICATION_TIMEOUT_SECS",
            )?
            .unwrap_or(defaults.generation.verification_timeout_secs),
            request_timeout_secs: parse(
                &settings,
                "generation.request_timeout_secs",
                "GENERATION_REQUEST_TIMEOUT_SECS",
            )?
            .unwrap_or(defaults.generation.request_timeout_secs),
        };

        if !generation.api_base_url.starts_with("http://")
            && !generation.api_base_url.starts_with("https://")
        {
            return Err(config::ConfigError::Message(
                "generation.api_base_url must start with http:// or https://".into(),
            ));
        }
        if !(0.0..=2.0).contains(&generation.temperature) {
            return Err(config::ConfigError::Message(
                "generation.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        let quiz = QuizRuntimeConfig {
            tick_interval_ms: parse(&settings, "quiz.tick_interval_ms", "QUIZ_TICK_INTERVAL_MS")?
                .filter(|v: &u64| *v > 0)
                .unwrap_or(defaults.quiz.tick_interval_ms),
            run_ttl_secs: parse(&settings, "quiz.run_ttl_secs", "QUIZ_RUN_TTL_SECS")?
                .filter(|v: &u64| *v > 0)
                .unwrap_or(defaults.quiz.run_ttl_secs),
        };

        Ok(Config {
            bind_addr,
            storage,
            key_store,
            generation,
            quiz,
        })
    }
}

/// Layered value first, then the flat legacy env var.
fn lookup(settings: &config::Config, key: &str, env_key: &str) -> Option<String> {
    settings
        .get_string(key)
        .ok()
        .or_else(|| env::var(env_key).ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse<T>(
    settings: &config::Config,
    key: &str,
    env_key: &str,
) -> Result<Option<T>, config::ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(settings, key, env_key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| config::ConfigError::Message(format!("Invalid {}: {}", key, e))),
        None => Ok(None),
    }
}

fn parse_flag(settings: &config::Config, key: &str, env_key: &str) -> Option<bool> {
    lookup(settings, key, env_key)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}
