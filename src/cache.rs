//! Persistent offline cache of external records, backed by a JSON file.
//!
//! The file is a mapping from the literal search term to the first external
//! record found for it. It is loaded once and rewritten in full on every
//! `put`. A single writing process is assumed; two processes writing the same
//! file can lose each other's updates.

use std::path::{Path, PathBuf};

use crate::error::{CacheError, CacheResult};
use crate::external::ExternalRecord;

/// Term → record store used when the external source is unreachable.
#[derive(Debug)]
pub struct OfflineCache {
    path: PathBuf,
    /// Entries in insertion (file) order.
    entries: Vec<(String, ExternalRecord)>,
    load_warning: Option<CacheError>,
}

impl OfflineCache {
    /// Load the cache at `path`.
    ///
    /// A missing file yields an empty cache. An unreadable or corrupt file also
    /// yields an empty cache; the failure is kept in [`load_warning`](Self::load_warning)
    /// instead of being returned.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (entries, load_warning) = match Self::read_entries(&path) {
            Ok(entries) => (entries, None),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "offline cache unusable, starting empty");
                (Vec::new(), Some(e))
            }
        };
        tracing::debug!(path = %path.display(), entries = entries.len(), "offline cache loaded");
        Self {
            path,
            entries,
            load_warning,
        }
    }

    fn read_entries(path: &Path) -> CacheResult<Vec<(String, ExternalRecord)>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = std::fs::read_to_string(path).map_err(|e| CacheError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if data.trim().is_empty() {
            return Ok(Vec::new());
        }
        let map: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&data).map_err(|e| CacheError::Read {
                path: path.display().to_string(),
                message: format!("parse: {e}"),
            })?;

        let mut entries = Vec::with_capacity(map.len());
        for (key, value) in map {
            let record: ExternalRecord =
                serde_json::from_value(value).map_err(|e| CacheError::Read {
                    path: path.display().to_string(),
                    message: format!("entry \"{key}\": {e}"),
                })?;
            entries.push((key, record));
        }
        Ok(entries)
    }

    /// Rewrite the whole cache file (temp file + rename).
    fn flush(&self) -> CacheResult<()> {
        let write_err = |source| CacheError::Write {
            path: self.path.display().to_string(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }

        let mut map = serde_json::Map::with_capacity(self.entries.len());
        for (key, record) in &self.entries {
            let value = serde_json::to_value(record).map_err(|e| CacheError::Serialize {
                message: e.to_string(),
            })?;
            map.insert(key.clone(), value);
        }
        let json = serde_json::to_string_pretty(&map).map_err(|e| CacheError::Serialize {
            message: e.to_string(),
        })?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, json).map_err(write_err)?;
        std::fs::rename(&tmp, &self.path).map_err(write_err)?;
        Ok(())
    }

    /// Insert or overwrite the record for `key` and persist synchronously.
    ///
    /// On a write failure the in-memory entry is kept and the error returned.
    pub fn put(&mut self, key: impl Into<String>, record: ExternalRecord) -> CacheResult<()> {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = record,
            None => self.entries.push((key, record)),
        }
        self.flush()
    }

    /// Exact, case-sensitive lookup.
    pub fn get(&self, key: &str) -> Option<&ExternalRecord> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, r)| r)
    }

    /// Every record whose key contains `substring`, ignoring case, in insertion order.
    pub fn search(&self, substring: &str) -> Vec<ExternalRecord> {
        let needle = substring.to_lowercase();
        self.entries
            .iter()
            .filter(|(k, _)| k.to_lowercase().contains(&needle))
            .map(|(_, r)| r.clone())
            .collect()
    }

    /// Why the file on disk was ignored at load time, if it was.
    pub fn load_warning(&self) -> Option<&CacheError> {
        self.load_warning.as_ref()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(label: &str) -> ExternalRecord {
        ExternalRecord::new(format!("http://dbpedia.org/resource/{label}"), label)
            .with_abstract(format!("{label} abstract"))
    }

    #[test]
    fn missing_file_is_empty_cache() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = OfflineCache::open(dir.path().join("cache.json"));
        assert!(cache.is_empty());
        assert!(cache.load_warning().is_none());
    }

    #[test]
    fn put_then_get_and_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("cache.json");
        {
            let mut cache = OfflineCache::open(&path);
            cache.put("Ethereum", record("Ethereum")).unwrap();
            assert_eq!(cache.get("Ethereum"), Some(&record("Ethereum")));
        }
        let reopened = OfflineCache::open(&path);
        assert_eq!(reopened.get("Ethereum"), Some(&record("Ethereum")));
        assert!(reopened.load_warning().is_none());
    }

    #[test]
    fn get_is_case_sensitive() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut cache = OfflineCache::open(dir.path().join("cache.json"));
        cache.put("Ethereum", record("Ethereum")).unwrap();
        assert!(cache.get("ethereum").is_none());
    }

    #[test]
    fn put_overwrites_existing_key() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut cache = OfflineCache::open(dir.path().join("cache.json"));
        cache.put("btc", record("Bitcoin")).unwrap();
        cache.put("btc", record("Bitcoin Cash")).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("btc").unwrap().label, "Bitcoin Cash");
    }

    #[test]
    fn search_is_case_insensitive_in_insertion_order() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let mut cache = OfflineCache::open(&path);
        cache.put("zcash", record("Zcash")).unwrap();
        cache.put("Bitcoin", record("Bitcoin")).unwrap();
        cache.put("bitcoin cash", record("Bitcoin Cash")).unwrap();

        let labels: Vec<String> = cache.search("BITCOIN").into_iter().map(|r| r.label).collect();
        assert_eq!(labels, vec!["Bitcoin", "Bitcoin Cash"]);

        // Order survives a reload.
        let reopened = OfflineCache::open(&path);
        let keys: Vec<&str> = reopened.keys().collect();
        assert_eq!(keys, vec!["zcash", "Bitcoin", "bitcoin cash"]);
    }

    #[test]
    fn corrupt_file_degrades_to_empty_with_warning() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{ not json").unwrap();
        let cache = OfflineCache::open(&path);
        assert!(cache.is_empty());
        assert!(matches!(cache.load_warning(), Some(CacheError::Read { .. })));
    }

    #[test]
    fn write_failure_is_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        // A directory where the file should be makes the rename fail.
        let path = dir.path().join("cache.json");
        std::fs::create_dir_all(path.join("occupied")).unwrap();
        let mut cache = OfflineCache::open(&path);
        let err = cache.put("Bitcoin", record("Bitcoin")).unwrap_err();
        assert!(matches!(err, CacheError::Write { .. }));
    }

    #[test]
    fn file_is_flat_mapping_of_terms() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let mut cache = OfflineCache::open(&path);
        cache.put("Ethereum", record("Ethereum")).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["Ethereum"]["label"], "Ethereum");
        assert_eq!(raw["Ethereum"]["uri"], "http://dbpedia.org/resource/Ethereum");
    }
}
