use super::{CacheError, Entries};
use log::debug;
use serde::Serialize;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tempfile::NamedTempFile;

/// Backing store of a [`TranslationCache`](super::TranslationCache).
///
/// `load` of a store that was never written yields an empty map.
pub trait CacheStore: Send + Sync {
    fn load(&self) -> Result<Entries, CacheError>;
    fn save(&self, entries: &Entries) -> Result<(), CacheError>;
}

impl<T> CacheStore for Arc<T>
where
    T: CacheStore + ?Sized,
{
    fn load(&self) -> Result<Entries, CacheError> {
        (**self).load()
    }

    fn save(&self, entries: &Entries) -> Result<(), CacheError> {
        (**self).save(entries)
    }
}

/// Encodes `entries` as the persisted document: one object keyed by
/// `<model>__<query>`, indented with four spaces.
pub fn encode(entries: &Entries) -> Result<Vec<u8>, CacheError> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    entries
        .serialize(&mut serializer)
        .map_err(std::io::Error::other)?;
    Ok(buffer)
}

/// Decodes a persisted document. Any structural problem, including a key
/// without the `__` separator, is a [`CacheError::CorruptStore`].
pub fn decode(origin: &str, document: &str) -> Result<Entries, CacheError> {
    serde_json::from_str(document)
        .map_err(|e| CacheError::CorruptStore(format!("{}: {}", origin, e)))
}

/// The cache as a single JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn directory(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

impl CacheStore for JsonFileStore {
    fn load(&self) -> Result<Entries, CacheError> {
        let document = match std::fs::read_to_string(&self.path) {
            Ok(document) => document,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No cache at {}, starting empty", self.path.display());
                return Ok(Entries::new());
            }
            Err(e) => return Err(e.into()),
        };
        let entries = decode(&self.path.display().to_string(), &document)?;
        debug!("Loaded {} entries from {}", entries.len(), self.path.display());
        Ok(entries)
    }

    /// Writes to a temporary file next to the target and renames it into
    /// place, so readers only ever see a complete document.
    fn save(&self, entries: &Entries) -> Result<(), CacheError> {
        let document = encode(entries)?;
        let directory = self.directory();
        std::fs::create_dir_all(directory)?;

        let mut file = NamedTempFile::new_in(directory)?;
        file.write_all(&document)?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| e.error)?;

        debug!("Saved {} entries to {}", entries.len(), self.path.display());
        Ok(())
    }
}

/// Keeps the encoded document in memory. Goes through the same codec as
/// [`JsonFileStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    document: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(document: impl Into<String>) -> Self {
        MemoryStore {
            document: Mutex::new(Some(document.into())),
        }
    }

    pub fn document(&self) -> Option<String> {
        self.document
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CacheStore for MemoryStore {
    fn load(&self) -> Result<Entries, CacheError> {
        match self.document().as_deref() {
            Some(document) => decode("memory", document),
            None => Ok(Entries::new()),
        }
    }

    fn save(&self, entries: &Entries) -> Result<(), CacheError> {
        let document = String::from_utf8(encode(entries)?)
            .map_err(|e| CacheError::MalformedEntry(e.to_string()))?;
        *self.document.lock().unwrap_or_else(PoisonError::into_inner) = Some(document);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CacheEntry, CacheKey, MetricDefinition};
    use rstest::*;

    fn revenue_entries() -> Entries {
        let mut entry = CacheEntry::default();
        entry.query_json.metrics.push("total_revenue".to_string());
        entry.semantic_layer_json.metrics.push(MetricDefinition {
            name: "total_revenue".to_string(),
            sql: "SUM(sale_price)".to_string(),
            table: "order_items".to_string(),
        });
        let mut entries = Entries::new();
        entries.insert(
            CacheKey::new("gpt-4o", "Give me the total sales revenue").unwrap(),
            entry,
        );
        entries
    }

    #[fixture]
    fn temp_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[rstest]
    fn test_file_store_missing_file_is_empty(temp_dir: tempfile::TempDir) {
        let store = JsonFileStore::new(temp_dir.path().join("llm_cache.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[rstest]
    fn test_file_store_round_trip(temp_dir: tempfile::TempDir) {
        let store = JsonFileStore::new(temp_dir.path().join("llm_cache.json"));
        let entries = revenue_entries();
        store.save(&entries).unwrap();
        assert_eq!(store.load().unwrap(), entries);
    }

    #[rstest]
    fn test_file_store_empty_round_trip(temp_dir: tempfile::TempDir) {
        let store = JsonFileStore::new(temp_dir.path().join("llm_cache.json"));
        store.save(&Entries::new()).unwrap();
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "{}");
        assert!(store.load().unwrap().is_empty());
    }

    #[rstest]
    fn test_file_store_creates_parent_directories(temp_dir: tempfile::TempDir) {
        let store = JsonFileStore::new(temp_dir.path().join("nested").join("llm_cache.json"));
        store.save(&revenue_entries()).unwrap();
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[rstest]
    fn test_file_store_leaves_no_temporary_files(temp_dir: tempfile::TempDir) {
        let store = JsonFileStore::new(temp_dir.path().join("llm_cache.json"));
        store.save(&revenue_entries()).unwrap();
        store.save(&revenue_entries()).unwrap();
        let names: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("llm_cache.json")]);
    }

    #[rstest]
    #[case::not_json("not json")]
    #[case::empty_document("")]
    #[case::top_level_array("[]")]
    #[case::key_without_separator(r#"{"gpt-4o Give me the total sales revenue": {"query_json": {}, "semantic_layer_json": {}}}"#)]
    #[case::entry_missing_semantic_layer(r#"{"gpt-4o__q": {"query_json": {}}}"#)]
    #[case::metrics_not_a_list(r#"{"gpt-4o__q": {"query_json": {"metrics": "x"}, "semantic_layer_json": {}}}"#)]
    fn test_file_store_corrupt_documents(temp_dir: tempfile::TempDir, #[case] document: &str) {
        let path = temp_dir.path().join("llm_cache.json");
        std::fs::write(&path, document).unwrap();
        let store = JsonFileStore::new(path);
        assert!(matches!(store.load(), Err(CacheError::CorruptStore(_))));
    }

    #[test]
    fn test_encode_uses_persisted_layout() {
        let encoded = String::from_utf8(encode(&revenue_entries()).unwrap()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(
            value["gpt-4o__Give me the total sales revenue"]["semantic_layer_json"]["metrics"][0]["sql"],
            "SUM(sale_price)"
        );
        assert_eq!(
            value["gpt-4o__Give me the total sales revenue"]["query_json"]["filters"],
            serde_json::json!([])
        );
        assert!(encoded.contains("\n    \"gpt-4o__Give me the total sales revenue\""));
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.load().unwrap().is_empty());
        store.save(&revenue_entries()).unwrap();
        assert_eq!(store.load().unwrap(), revenue_entries());
    }
}
