// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory metadata store. Contents are lost on restart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{MetadataFields, MetadataStore, ProjectMetadata, StorageResult};

#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    records: RwLock<HashMap<String, ProjectMetadata>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn get(&self, project_id: &str) -> StorageResult<Option<ProjectMetadata>> {
        Ok(self.records.read().await.get(project_id).cloned())
    }

    async fn upsert(
        &self,
        project_id: &str,
        owner: &str,
        fields: MetadataFields,
    ) -> StorageResult<ProjectMetadata> {
        let mut records = self.records.write().await;
        let record =
            ProjectMetadata::upserted(records.get(project_id), project_id, owner, fields, Utc::now());
        records.insert(project_id.to_string(), record.clone());
        Ok(record)
    }

    async fn delete(&self, project_id: &str) -> StorageResult<bool> {
        Ok(self.records.write().await.remove(project_id).is_some())
    }

    async fn ping(&self) -> StorageResult<()> {
        Ok(())
    }
}
