use crate::{DocumentRecord, StoreError, StoreStats};
use chrono::Utc;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::{Path, PathBuf};

const DOCUMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("documents");

pub struct DocumentStore {
    db: Database,
    path: PathBuf,
}

impl DocumentStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = Database::create(path)?;

        let txn = db.begin_write()?;
        txn.open_table(DOCUMENTS)?;
        txn.commit()?;

        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn upsert(&self, mut record: DocumentRecord) -> Result<DocumentRecord, StoreError> {
        record.last_updated = Utc::now();
        let bytes = serde_json::to_vec(&record)?;

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(DOCUMENTS)?;
            table.insert(record.content_hash.as_str(), bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(record)
    }

    pub fn get(&self, content_hash: &str) -> Result<DocumentRecord, StoreError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DOCUMENTS)?;
        let stored = table.get(content_hash)?.ok_or_else(|| StoreError::NotFound {
            content_hash: content_hash.to_string(),
        })?;
        Ok(serde_json::from_slice(stored.value())?)
    }

    pub fn contains(&self, content_hash: &str) -> Result<bool, StoreError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DOCUMENTS)?;
        let found = table.get(content_hash)?.is_some();
        Ok(found)
    }

    pub fn list(&self) -> Result<Vec<DocumentRecord>, StoreError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DOCUMENTS)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (_key, value) = entry?;
            result.push(serde_json::from_slice(value.value())?);
        }
        Ok(result)
    }

    // Points an existing record at `file_path` without reprocessing it.
    // Returns whether the stored path changed.
    pub fn update_path(&self, content_hash: &str, file_path: &str) -> Result<bool, StoreError> {
        let txn = self.db.begin_write()?;
        let stored = {
            let table = txn.open_table(DOCUMENTS)?;
            let stored = table.get(content_hash)?.map(|value| value.value().to_vec());
            stored
        };

        let Some(bytes) = stored else {
            txn.abort()?;
            return Err(StoreError::NotFound {
                content_hash: content_hash.to_string(),
            });
        };

        let mut record: DocumentRecord = serde_json::from_slice(&bytes)?;
        if record.file_path == file_path {
            txn.abort()?;
            return Ok(false);
        }

        record.file_path = file_path.to_string();
        record.last_updated = Utc::now();
        let bytes = serde_json::to_vec(&record)?;
        {
            let mut table = txn.open_table(DOCUMENTS)?;
            table.insert(content_hash, bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(true)
    }

    pub fn delete(&self, content_hash: &str) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(DOCUMENTS)?;
            let removed = table.remove(content_hash)?.is_some();
            removed
        };

        if !removed {
            txn.abort()?;
            return Err(StoreError::NotFound {
                content_hash: content_hash.to_string(),
            });
        }

        txn.commit()?;
        Ok(())
    }

    pub fn clear(&self) -> Result<usize, StoreError> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(DOCUMENTS)?;
            let keys = table
                .iter()?
                .map(|entry| entry.map(|(key, _)| key.value().to_string()))
                .collect::<Result<Vec<_>, _>>()?;
            for key in &keys {
                table.remove(key.as_str())?;
            }
            keys.len()
        };
        txn.commit()?;
        Ok(removed)
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DOCUMENTS)?;
        let mut count = 0;
        for entry in table.iter()? {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let mut stats = StoreStats::default();
        for record in self.list()? {
            stats.total += 1;
            if record.has_error() {
                stats.errors += 1;
            }
            if let Some(kind) = record
                .document_type
                .as_deref()
                .map(str::trim)
                .filter(|kind| !kind.is_empty())
            {
                *stats.by_type.entry(kind.to_string()).or_insert(0) += 1;
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::DocumentStore;
    use crate::{DocumentRecord, StoreError};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn record(hash: &str, path: &str) -> DocumentRecord {
        DocumentRecord::new(hash, path)
    }

    #[test]
    fn upsert_overwrites_by_content_hash() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = DocumentStore::open(&dir.path().join("vault.redb"))?;

        let first = store.upsert(record("h1", "/old/a.pdf"))?;
        let mut moved = record("h1", "/new/a.pdf");
        moved.subject = Some("Moved".to_string());
        let second = store.upsert(moved)?;

        let stored = store.get("h1")?;
        assert_eq!(stored.file_path, "/new/a.pdf");
        assert_eq!(stored.subject.as_deref(), Some("Moved"));
        assert!(second.last_updated >= first.last_updated);
        assert_eq!(store.len()?, 1);
        Ok(())
    }

    #[test]
    fn unknown_hash_is_not_found() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = DocumentStore::open(&dir.path().join("vault.redb"))?;

        assert!(matches!(store.get("nope"), Err(StoreError::NotFound { .. })));
        assert!(matches!(store.delete("nope"), Err(StoreError::NotFound { .. })));
        assert!(!store.contains("nope")?);
        Ok(())
    }

    #[test]
    fn delete_and_clear_remove_records() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = DocumentStore::open(&dir.path().join("vault.redb"))?;
        store.upsert(record("h1", "/a.pdf"))?;
        store.upsert(record("h2", "/b.pdf"))?;
        store.upsert(record("h3", "/c.pdf"))?;

        store.delete("h2")?;
        assert!(!store.contains("h2")?);
        assert_eq!(store.len()?, 2);

        assert_eq!(store.clear()?, 2);
        assert!(store.is_empty()?);
        assert!(store.list()?.is_empty());
        Ok(())
    }

    #[test]
    fn update_path_only_touches_the_location() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = DocumentStore::open(&dir.path().join("vault.redb"))?;
        let mut original = record("h1", "/old/a.pdf");
        original.subject = Some("Lease".to_string());
        store.upsert(original)?;

        assert!(!store.update_path("h1", "/old/a.pdf")?);
        assert!(store.update_path("h1", "/new/a.pdf")?);

        let moved = store.get("h1")?;
        assert_eq!(moved.file_path, "/new/a.pdf");
        assert_eq!(moved.subject.as_deref(), Some("Lease"));
        assert!(matches!(
            store.update_path("nope", "/x.pdf"),
            Err(StoreError::NotFound { .. })
        ));
        assert_eq!(store.path(), dir.path().join("vault.redb").as_path());
        Ok(())
    }

    #[test]
    fn records_survive_reopen() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("vault.redb");
        {
            let store = DocumentStore::open(&path)?;
            let mut stored = record("h1", "/a.pdf");
            stored.tags = vec!["z".to_string(), "a".to_string()];
            store.upsert(stored)?;
        }

        let store = DocumentStore::open(&path)?;
        assert_eq!(store.get("h1")?.tags, vec!["z", "a"]);
        Ok(())
    }

    #[test]
    fn stats_count_errors_and_types() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = DocumentStore::open(&dir.path().join("vault.redb"))?;

        let mut invoice = record("h1", "/a.pdf");
        invoice.document_type = Some("invoice".to_string());
        let mut other_invoice = record("h2", "/b.pdf");
        other_invoice.document_type = Some("invoice".to_string());
        let mut failed = record("h3", "/c.pdf");
        failed.processing_error = Some("vision service timed out".to_string());
        store.upsert(invoice)?;
        store.upsert(other_invoice)?;
        store.upsert(failed)?;

        let stats = store.stats()?;
        assert_eq!(stats.total, 3);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.by_type.get("invoice"), Some(&2));
        Ok(())
    }

    #[test]
    fn readers_see_whole_records_during_writes() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = Arc::new(DocumentStore::open(&dir.path().join("vault.redb"))?);
        store.upsert(record("h1", "/v0.pdf"))?;

        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || -> Result<(), StoreError> {
                for version in 1..50 {
                    let mut next = record("h1", &format!("/v{version}.pdf"));
                    next.summary = Some(format!("version {version}"));
                    store.upsert(next)?;
                }
                Ok(())
            })
        };

        for _ in 0..50 {
            let seen = store.get("h1")?;
            match seen.summary.as_deref() {
                None => assert_eq!(seen.file_path, "/v0.pdf"),
                Some(summary) => {
                    let version = summary.trim_start_matches("version ");
                    assert_eq!(seen.file_path, format!("/v{version}.pdf"));
                }
            }
        }

        writer.join().map_err(|_| "writer panicked")??;
        Ok(())
    }
}
