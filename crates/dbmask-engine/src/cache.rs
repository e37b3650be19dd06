use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use dbmask_core::SqlValue;

use crate::errors::Result;
use crate::scratch::ScratchStore;

/// Longest key a SQL-backed store can index (`NVARCHAR(450)`).
pub const MAX_KEY_CHARS: usize = 450;
const KEY_HASH_PREFIX: &str = "sha256:";
const CSV_HEADERS: [&str; 2] = ["ValueKey", "NewValue"];

/// Dictionary key for a source value; `None` for NULL.
///
/// Values longer than [`MAX_KEY_CHARS`] are replaced by their SHA-256 digest.
pub fn value_key(source: &SqlValue) -> Option<String> {
    let canonical = source.canonical()?;
    if canonical.chars().count() <= MAX_KEY_CHARS {
        return Some(canonical);
    }
    let digest = Sha256::digest(canonical.as_bytes());
    Some(format!("{KEY_HASH_PREFIX}{}", hex::encode(digest)))
}

/// Run-scoped `original -> masked` mapping shared by every deterministic
/// column of the run. The first value recorded for a key wins.
pub struct DeterministicCache<S: ScratchStore> {
    store: S,
    memo: HashMap<String, String>,
}

impl<S: ScratchStore> DeterministicCache<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            memo: HashMap::new(),
        }
    }

    /// Create the backing store, discarding anything left in it.
    pub fn open(&mut self) -> Result<()> {
        self.memo.clear();
        self.store.create()?;
        debug!(store = %self.store.name(), "dictionary opened");
        Ok(())
    }

    pub fn lookup(&mut self, key: &str) -> Result<Option<String>> {
        if let Some(value) = self.memo.get(key) {
            return Ok(Some(value.clone()));
        }
        let found = self.store.lookup(key)?;
        if let Some(value) = &found {
            self.memo.insert(key.to_string(), value.clone());
        }
        Ok(found)
    }

    /// Record `value` for `key` unless one is already present; returns the
    /// value that is in effect afterwards.
    pub fn insert(&mut self, key: &str, value: &str) -> Result<String> {
        if let Some(existing) = self.lookup(key)? {
            return Ok(existing);
        }
        let effective = if self.store.insert(key, value)? {
            value.to_string()
        } else {
            self.store
                .lookup(key)?
                .unwrap_or_else(|| value.to_string())
        };
        self.memo.insert(key.to_string(), effective.clone());
        Ok(effective)
    }

    /// Seed the dictionary from a `ValueKey,NewValue` CSV file.
    pub fn import_csv(&mut self, path: &Path) -> Result<u64> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)?;
        let mut imported = 0_u64;
        for record in reader.records() {
            let record = record?;
            let (Some(key), Some(value)) = (record.get(0), record.get(1)) else {
                continue;
            };
            if key.is_empty() {
                continue;
            }
            if self.lookup(key)?.is_none() {
                self.insert(key, value)?;
                imported += 1;
            }
        }
        info!(path = %path.display(), entries = imported, "dictionary imported");
        Ok(imported)
    }

    /// Write every entry as `ValueKey,NewValue`, ordered by key.
    pub fn export_csv(&self, path: &Path) -> Result<u64> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_writer(BufWriter::new(File::create(path)?));
        writer.write_record(CSV_HEADERS)?;
        let mut written = 0_u64;
        for (key, value) in self.store.entries()? {
            writer.write_record([key.as_str(), value.as_str()])?;
            written += 1;
        }
        writer.flush()?;
        info!(path = %path.display(), entries = written, "dictionary exported");
        Ok(written)
    }

    pub fn len(&self) -> Result<u64> {
        Ok(self.store.len()?)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Drop the backing store.
    pub fn close(&mut self) -> Result<()> {
        self.memo.clear();
        self.store.drop_store()?;
        debug!(store = %self.store.name(), "dictionary dropped");
        Ok(())
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::scratch::MemoryScratchStore;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("dbmask_cache_{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    #[test]
    fn long_keys_are_hashed() {
        let short = SqlValue::Text("Maria".to_string());
        assert_eq!(value_key(&short).as_deref(), Some("Maria"));

        let long = SqlValue::Text("x".repeat(MAX_KEY_CHARS + 1));
        let key = value_key(&long).expect("key");
        assert!(key.starts_with("sha256:"));
        assert_eq!(key.len(), "sha256:".len() + 64);
        assert_eq!(value_key(&long), Some(key));

        assert_eq!(value_key(&SqlValue::Null), None);
    }

    #[test]
    fn first_write_wins() {
        let mut cache = DeterministicCache::new(MemoryScratchStore::new("dict"));
        cache.open().expect("open");
        assert_eq!(cache.insert("Maria", "Ana").expect("insert"), "Ana");
        assert_eq!(cache.insert("Maria", "Beatriz").expect("insert"), "Ana");
        assert_eq!(cache.lookup("Maria").expect("lookup").as_deref(), Some("Ana"));
        assert_eq!(cache.len().expect("len"), 1);
    }

    #[test]
    fn export_then_import_reproduces_entries() {
        let path = temp_path("Shop.dictionary.csv");
        let mut first = DeterministicCache::new(MemoryScratchStore::new("dict"));
        first.open().expect("open");
        first.insert("Maria", "Ana").expect("insert");
        first.insert("O'Brien, Pat", "Smith").expect("insert");
        assert_eq!(first.export_csv(&path).expect("export"), 2);

        let contents = std::fs::read_to_string(&path).expect("read");
        assert!(contents.starts_with("ValueKey,NewValue"));

        let mut second = DeterministicCache::new(MemoryScratchStore::new("dict"));
        second.open().expect("open");
        second.insert("Maria", "Kept").expect("insert");
        assert_eq!(second.import_csv(&path).expect("import"), 1);
        assert_eq!(
            second.lookup("O'Brien, Pat").expect("lookup").as_deref(),
            Some("Smith")
        );
        assert_eq!(second.lookup("Maria").expect("lookup").as_deref(), Some("Kept"));

        second.close().expect("close");
        assert!(second.store().is_dropped());
    }
}
