pub mod store;

pub use store::{CacheStore, JsonFileStore, MemoryStore};

use crate::config::CacheConfig;
use crate::model::{CacheEntry, CacheKey, EntryError, KeyError};
use crate::sql_check::{SqlCheck, SqlCheckError, SqlDialect};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

pub type Entries = BTreeMap<CacheKey, CacheEntry>;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Malformed entry: {0}")]
    MalformedEntry(String),

    #[error("Corrupt store: {0}")]
    CorruptStore(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<EntryError> for CacheError {
    fn from(e: EntryError) -> Self {
        CacheError::MalformedEntry(e.to_string())
    }
}

impl From<KeyError> for CacheError {
    fn from(e: KeyError) -> Self {
        CacheError::MalformedEntry(e.to_string())
    }
}

impl From<SqlCheckError> for CacheError {
    fn from(e: SqlCheckError) -> Self {
        match e {
            SqlCheckError::UnknownDialect(_) => CacheError::InvalidConfig(e.to_string()),
            SqlCheckError::InvalidFragment { .. } => CacheError::MalformedEntry(e.to_string()),
        }
    }
}

/// Cache of natural-language question translations, keyed by model and
/// verbatim question text.
///
/// The map sits behind a single read/write lock. Writers hold the lock while
/// the store is saved, so concurrent `put`s are serialized and the last one
/// wins. Growth is unbounded.
///
/// This is a synchronous API: `put`, `insert`, `save` and `close` block on
/// file I/O. Async callers run them through `tokio::task::spawn_blocking`.
pub struct TranslationCache<S> {
    store: S,
    entries: RwLock<Entries>,
    sql_check: Option<SqlCheck>,
}

impl TranslationCache<JsonFileStore> {
    /// Opens the file-backed cache described by `config` and loads it.
    pub fn from_config(config: &CacheConfig) -> Result<Self, CacheError> {
        let mut cache = TranslationCache::new(JsonFileStore::new(&config.cache_path));
        if config.validate_sql {
            let dialect: SqlDialect = config.sql_dialect.parse()?;
            info!("Validating cached SQL fragments as {}", dialect);
            cache = cache.with_sql_check(SqlCheck::new(dialect));
        }
        cache.load()?;
        Ok(cache)
    }
}

impl<S> TranslationCache<S>
where
    S: CacheStore,
{
    /// Creates an empty cache over `store`. Nothing is read until [`load`](Self::load).
    pub fn new(store: S) -> Self {
        TranslationCache {
            store,
            entries: RwLock::new(Entries::new()),
            sql_check: None,
        }
    }

    /// Creates a cache over `store` and loads it.
    pub fn open(store: S) -> Result<Self, CacheError> {
        let cache = Self::new(store);
        cache.load()?;
        Ok(cache)
    }

    pub fn with_sql_check(mut self, sql_check: SqlCheck) -> Self {
        self.sql_check = Some(sql_check);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Exact-match lookup. A missing key is `None`, never an error.
    pub fn get(&self, model: &str, query: &str) -> Option<CacheEntry> {
        // a model that cannot form a key was never stored
        let hit = CacheKey::new(model, query)
            .ok()
            .and_then(|key| self.get_key(&key));
        debug!(
            "Cache {} for model={} query={:?}",
            if hit.is_some() { "hit" } else { "miss" },
            model,
            query
        );
        hit
    }

    pub fn get_key(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.read().get(key).cloned()
    }

    /// Parses the two translator documents and inserts (or overwrites) the
    /// entry, then persists the whole cache.
    pub fn put(
        &self,
        model: &str,
        query: &str,
        query_json: serde_json::Value,
        semantic_layer_json: serde_json::Value,
    ) -> Result<(), CacheError> {
        let key = CacheKey::new(model, query)?;
        let entry = CacheEntry::from_json(query_json, semantic_layer_json)?;
        self.insert(key, entry)
    }

    pub fn insert(&self, key: CacheKey, entry: CacheEntry) -> Result<(), CacheError> {
        if let Some(sql_check) = &self.sql_check {
            sql_check.check_entry(&entry)?;
        }
        for inconsistency in entry.inconsistencies() {
            warn!("Caching {} with unresolved names: {}", key, inconsistency);
        }

        let mut entries = self.write();
        let previous = entries.insert(key.clone(), entry);
        if let Err(e) = self.store.save(&entries) {
            match previous {
                Some(previous) => {
                    entries.insert(key, previous);
                }
                None => {
                    entries.remove(&key);
                }
            }
            return Err(e);
        }
        debug!("Cached translation for {}", key);
        Ok(())
    }

    /// Replaces the in-memory map with the persisted one.
    pub fn load(&self) -> Result<(), CacheError> {
        let loaded = self.store.load()?;
        info!("Loaded {} cached translations", loaded.len());
        *self.write() = loaded;
        Ok(())
    }

    pub fn save(&self) -> Result<(), CacheError> {
        let entries = self.read();
        self.store.save(&entries)
    }

    /// Flushes the cache and releases it.
    pub fn close(self) -> Result<(), CacheError> {
        self.save()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn keys(&self) -> Vec<CacheKey> {
        self.read().keys().cloned().collect()
    }

    pub fn entries(&self) -> Entries {
        self.read().clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}
