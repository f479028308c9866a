use envconfig::Envconfig;
use log::debug;
use std::time::Duration;

#[derive(Envconfig, Clone, Debug)]
pub struct CacheConfig {
    #[envconfig(from = "TRANSLATION_CACHE_PATH", default = "llm_cache.json")]
    pub cache_path: String,

    #[envconfig(from = "TRANSLATION_CACHE_SQL_DIALECT", default = "bigquery")]
    pub sql_dialect: String,

    #[envconfig(from = "TRANSLATION_CACHE_VALIDATE_SQL", default = "true")]
    pub validate_sql: bool,
}

impl CacheConfig {
    pub fn new() -> Result<Self, envconfig::Error> {
        let config = Self::init_from_env()?;
        debug!(
            "CacheConfig loaded: cache_path={}, sql_dialect={}, validate_sql={}",
            config.cache_path, config.sql_dialect, config.validate_sql
        );
        Ok(config)
    }
}

#[derive(Envconfig, Clone, Debug)]
pub struct TranslatorConfig {
    /// Comma-separated models whose cached answers are acceptable for any
    /// request, tried in order after the requested model.
    #[envconfig(
        from = "TRANSLATOR_FALLBACK_MODELS",
        default = "gpt-4o,llama3-70b-8192,o1-mini"
    )]
    pub fallback_models: String,

    #[envconfig(from = "TRANSLATOR_REQUEST_TIMEOUT_SECS", default = "80")]
    pub request_timeout_secs: u64,

    #[envconfig(from = "TRANSLATOR_MAX_ATTEMPTS", default = "5")]
    pub max_attempts: u32,
}

impl TranslatorConfig {
    pub fn new() -> Result<Self, envconfig::Error> {
        let config = Self::init_from_env()?;
        debug!(
            "TranslatorConfig loaded: fallback_models={}, request_timeout_secs={}, max_attempts={}",
            config.fallback_models, config.request_timeout_secs, config.max_attempts
        );
        Ok(config)
    }

    pub fn fallback_models(&self) -> Vec<String> {
        self.fallback_models
            .split(',')
            .map(str::trim)
            .filter(|model| !model.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
