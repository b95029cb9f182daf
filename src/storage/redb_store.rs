// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded metadata database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `project_metadata`: canonical project id → serialized ProjectMetadata (JSON bytes)

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use super::{MetadataFields, MetadataStore, ProjectMetadata, StorageError, StorageResult};

const PROJECT_METADATA: TableDefinition<&str, &[u8]> = TableDefinition::new("project_metadata");

/// File name under `DATA_DIR`.
pub const DATABASE_FILE: &str = "metadata.redb";

#[derive(Clone)]
pub struct RedbMetadataStore {
    db: Arc<Database>,
}

impl RedbMetadataStore {
    /// Open (or create) `metadata.redb` inside `data_dir`.
    pub fn open(data_dir: &Path) -> StorageResult<Self> {
        std::fs::create_dir_all(data_dir)?;
        let db = Database::create(data_dir.join(DATABASE_FILE))?;

        // Pre-create the table so read transactions never fail on a fresh file
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(PROJECT_METADATA)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Run a blocking database operation off the async runtime.
    async fn blocking<T, F>(&self, op: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> StorageResult<T> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || op(&db))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))?
    }
}

fn read_record(db: &Database, project_id: &str) -> StorageResult<Option<ProjectMetadata>> {
    let read_txn = db.begin_read()?;
    let table = read_txn.open_table(PROJECT_METADATA)?;
    let record = match table.get(project_id)? {
        Some(guard) => Some(serde_json::from_slice(guard.value())?),
        None => None,
    };
    Ok(record)
}

#[async_trait]
impl MetadataStore for RedbMetadataStore {
    async fn get(&self, project_id: &str) -> StorageResult<Option<ProjectMetadata>> {
        let project_id = project_id.to_string();
        self.blocking(move |db| read_record(db, &project_id)).await
    }

    async fn upsert(
        &self,
        project_id: &str,
        owner: &str,
        fields: MetadataFields,
    ) -> StorageResult<ProjectMetadata> {
        let project_id = project_id.to_string();
        let owner = owner.to_string();

        self.blocking(move |db| {
            let write_txn = db.begin_write()?;
            let record = {
                let mut table = write_txn.open_table(PROJECT_METADATA)?;
                let previous: Option<ProjectMetadata> = match table.get(project_id.as_str())? {
                    Some(guard) => Some(serde_json::from_slice(guard.value())?),
                    None => None,
                };

                let record = ProjectMetadata::upserted(
                    previous.as_ref(),
                    &project_id,
                    &owner,
                    fields,
                    Utc::now(),
                );
                let bytes = serde_json::to_vec(&record)?;
                table.insert(project_id.as_str(), bytes.as_slice())?;
                record
            };
            write_txn.commit()?;
            Ok(record)
        })
        .await
    }

    async fn delete(&self, project_id: &str) -> StorageResult<bool> {
        let project_id = project_id.to_string();

        self.blocking(move |db| {
            let write_txn = db.begin_write()?;
            let removed = {
                let mut table = write_txn.open_table(PROJECT_METADATA)?;
                let existed = table.remove(project_id.as_str())?.is_some();
                existed
            };
            write_txn.commit()?;
            Ok(removed)
        })
        .await
    }

    async fn ping(&self) -> StorageResult<()> {
        self.blocking(|db| {
            let read_txn = db.begin_read()?;
            let _ = read_txn.open_table(PROJECT_METADATA)?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(title: &str) -> MetadataFields {
        MetadataFields {
            title: title.to_string(),
            description: Some("Community solar array".to_string()),
            website_url: Some("https://example.org/solar".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store = RedbMetadataStore::open(dir.path()).unwrap();
            store.upsert("42", "0xabc", fields("Solar")).await.unwrap();
        }

        let store = RedbMetadataStore::open(dir.path()).unwrap();
        let record = store.get("42").await.unwrap().unwrap();
        assert_eq!(record.project_id, "42");
        assert_eq!(record.owner_address, "0xabc");
        assert_eq!(record.fields, fields("Solar"));
    }

    #[tokio::test]
    async fn upsert_keeps_creation_time() {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbMetadataStore::open(dir.path()).unwrap();

        let first = store.upsert("1", "0xabc", fields("One")).await.unwrap();
        let second = store.upsert("1", "0xabc", fields("Uno")).await.unwrap();

        assert_eq!(first.created_at, second.created_at);
        assert_eq!(store.get("1").await.unwrap().unwrap().fields.title, "Uno");
    }

    #[tokio::test]
    async fn delete_reports_whether_a_record_existed() {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbMetadataStore::open(dir.path()).unwrap();

        assert!(!store.delete("7").await.unwrap());
        store.upsert("7", "0xabc", fields("Seven")).await.unwrap();
        assert!(store.delete("7").await.unwrap());
        assert!(store.get("7").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fresh_database_is_ready() {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbMetadataStore::open(&dir.path().join("nested")).unwrap();
        store.ping().await.unwrap();
        assert!(store.get("1").await.unwrap().is_none());
    }
}
