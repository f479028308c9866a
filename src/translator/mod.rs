pub mod rate_limiter;

pub use rate_limiter::RateLimiter;

use crate::cache::{CacheError, CacheStore, TranslationCache};
use crate::config::TranslatorConfig;
use crate::model::{CacheEntry, CacheKey};
use async_trait::async_trait;
use log::info;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranslateError {
    #[error("Translator error: {0}")]
    Translator(String),

    #[error("{label} failed after {attempts} attempts: {last_error}")]
    Exhausted {
        label: String,
        attempts: u32,
        last_error: String,
    },

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Cache write task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Turns a natural-language question into a translation document
/// `{"query_json": {...}, "semantic_layer_json": {...}}`.
///
/// Implementations live outside this crate (typically an LLM client).
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        model: &str,
        query: &str,
    ) -> Result<serde_json::Value, TranslateError>;
}

#[async_trait]
impl<T> Translator for Arc<T>
where
    T: Translator + ?Sized,
{
    async fn translate(
        &self,
        model: &str,
        query: &str,
    ) -> Result<serde_json::Value, TranslateError> {
        (**self).translate(model, query).await
    }
}

/// Read-through front for a [`Translator`].
///
/// A question is answered from the cache if the requested model or any of the
/// fallback models already has it. Otherwise the translator is called through
/// the [`RateLimiter`] and its answer is cached under the requested model.
pub struct CachedTranslator<T, S> {
    translator: T,
    cache: Arc<TranslationCache<S>>,
    limiter: RateLimiter,
    fallback_models: Vec<String>,
}

impl<T, S> CachedTranslator<T, S>
where
    T: Translator,
    S: CacheStore + 'static,
{
    pub fn new(translator: T, cache: Arc<TranslationCache<S>>, config: &TranslatorConfig) -> Self {
        CachedTranslator {
            translator,
            cache,
            limiter: RateLimiter::new(config.request_timeout(), config.max_attempts),
            fallback_models: config.fallback_models(),
        }
    }

    pub fn cache(&self) -> &Arc<TranslationCache<S>> {
        &self.cache
    }

    /// Models whose cached entries may answer a request for `model`, in
    /// lookup order.
    pub fn candidate_models<'a>(&'a self, model: &'a str) -> Vec<&'a str> {
        let mut candidates = vec![model];
        for fallback in &self.fallback_models {
            if !candidates.contains(&fallback.as_str()) {
                candidates.push(fallback);
            }
        }
        candidates
    }

    /// Lookups only take the read lock and run inline. The insert persists the
    /// whole cache, so it runs on the blocking pool.
    pub async fn generate(&self, model: &str, query: &str) -> Result<CacheEntry, TranslateError> {
        for candidate in self.candidate_models(model) {
            if let Some(entry) = self.cache.get(candidate, query) {
                info!("Hit cache for {:?} via {}", query, candidate);
                return Ok(entry);
            }
        }

        info!("No cache hit for {:?}, calling {}", query, model);
        let key = CacheKey::new(model, query).map_err(CacheError::from)?;
        let document = self
            .limiter
            .call("translate", || self.translator.translate(model, query))
            .await?;
        let entry = CacheEntry::from_document(document).map_err(CacheError::from)?;
        let cache = Arc::clone(&self.cache);
        let stored = entry.clone();
        tokio::task::spawn_blocking(move || cache.insert(key, stored)).await??;
        Ok(entry)
    }
}
