//! Persistence of group results keyed by principal tax id.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregation::GroupAggregateResult;
use crate::DeMinimisResult;

/// A saved group result plus bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntry {
    pub result: GroupAggregateResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub saved_at: DateTime<Utc>,
}

impl StoredEntry {
    pub fn new(result: GroupAggregateResult) -> Self {
        StoredEntry {
            result,
            note: None,
            saved_at: Utc::now(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

pub trait ResultStore {
    fn load(&self, tax_id: &str) -> DeMinimisResult<Option<StoredEntry>>;

    /// Insert or replace the entry for `entry.result.principal_id`.
    fn save(&mut self, entry: StoredEntry) -> DeMinimisResult<()>;

    /// Returns whether an entry was removed.
    fn remove(&mut self, tax_id: &str) -> DeMinimisResult<bool>;

    /// Stored tax ids in ascending order.
    fn keys(&self) -> DeMinimisResult<Vec<String>>;
}

fn normalize_key(tax_id: &str) -> String {
    tax_id.trim().to_uppercase()
}

/// Volatile store, mostly for tests and one-shot runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, StoredEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ResultStore for MemoryStore {
    fn load(&self, tax_id: &str) -> DeMinimisResult<Option<StoredEntry>> {
        Ok(self.entries.get(&normalize_key(tax_id)).cloned())
    }

    fn save(&mut self, entry: StoredEntry) -> DeMinimisResult<()> {
        self.entries
            .insert(normalize_key(&entry.result.principal_id), entry);
        Ok(())
    }

    fn remove(&mut self, tax_id: &str) -> DeMinimisResult<bool> {
        Ok(self.entries.remove(&normalize_key(tax_id)).is_some())
    }

    fn keys(&self) -> DeMinimisResult<Vec<String>> {
        Ok(self.entries.keys().cloned().collect())
    }
}

#[cfg(feature = "store")]
pub use file::JsonFileStore;

#[cfg(feature = "store")]
mod file {
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::{Path, PathBuf};

    use tracing::debug;

    use super::{normalize_key, ResultStore, StoredEntry};
    use crate::error::DeMinimisError;
    use crate::DeMinimisResult;

    /// A single pretty-printed JSON object on disk, `{tax_id: entry}`.
    ///
    /// Every mutation rewrites the whole file through a sibling temp file
    /// and a rename, so readers never observe a half-written document.
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

        fn read_all(&self) -> DeMinimisResult<BTreeMap<String, StoredEntry>> {
            let text = match fs::read_to_string(&self.path) {
                Ok(t) => t,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
                Err(e) => return Err(e.into()),
            };
            if text.trim().is_empty() {
                return Ok(BTreeMap::new());
            }
            let mut entries: BTreeMap<String, StoredEntry> = serde_json::from_str(&text)
                .map_err(|e| DeMinimisError::Storage(format!("{}: {e}", self.path.display())))?;
            for entry in entries.values_mut() {
                entry.result.summarize();
            }
            Ok(entries)
        }

        fn write_all(&self, entries: &BTreeMap<String, StoredEntry>) -> DeMinimisResult<()> {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let mut tmp = self.path.clone().into_os_string();
            tmp.push(".tmp");
            let tmp = PathBuf::from(tmp);
            fs::write(&tmp, serde_json::to_string_pretty(entries)?)?;
            fs::rename(&tmp, &self.path)?;
            debug!(path = %self.path.display(), entries = entries.len(), "store written");
            Ok(())
        }
    }

    impl ResultStore for JsonFileStore {
        fn load(&self, tax_id: &str) -> DeMinimisResult<Option<StoredEntry>> {
            Ok(self.read_all()?.remove(&normalize_key(tax_id)))
        }

        fn save(&mut self, entry: StoredEntry) -> DeMinimisResult<()> {
            let mut entries = self.read_all()?;
            entries.insert(normalize_key(&entry.result.principal_id), entry);
            self.write_all(&entries)
        }

        fn remove(&mut self, tax_id: &str) -> DeMinimisResult<bool> {
            let mut entries = self.read_all()?;
            let removed = entries.remove(&normalize_key(tax_id)).is_some();
            if removed {
                self.write_all(&entries)?;
            }
            Ok(removed)
        }

        fn keys(&self) -> DeMinimisResult<Vec<String>> {
            Ok(self.read_all()?.into_keys().collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::aggregate;
    use crate::types::{AidRecord, CompanyAidResult};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn group(principal: &str) -> GroupAggregateResult {
        aggregate(principal, &[], |id| {
            let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
            CompanyAidResult::from_records(id, AidRecord::new(d, dec!(1000), "Misura").into_iter().collect())
        })
    }

    #[test]
    fn test_memory_store_keys_are_normalized() {
        let mut store = MemoryStore::new();
        store.save(StoredEntry::new(group("ab123"))).unwrap();
        assert!(store.load(" AB123 ").unwrap().is_some());
        assert_eq!(store.keys().unwrap(), vec!["AB123".to_string()]);
        assert!(store.remove("ab123").unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn test_save_replaces_existing_entry() {
        let mut store = MemoryStore::new();
        store.save(StoredEntry::new(group("01234567890"))).unwrap();
        store
            .save(StoredEntry::new(group("01234567890")).with_note("second run"))
            .unwrap();
        assert_eq!(store.len(), 1);
        let entry = store.load("01234567890").unwrap().unwrap();
        assert_eq!(entry.note.as_deref(), Some("second run"));
        assert_eq!(entry.result.total_amount, dec!(1000));
    }
}
