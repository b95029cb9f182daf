// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Project Metadata Storage
//!
//! Off-chain metadata (title, description, links) for crowdfunding projects,
//! keyed by the canonical decimal project id.
//!
//! The store is a collaborator of the mutation flow, not a source of
//! authority: `owner_address` on a record is stamped from the verified
//! session at write time and is informational only. Ownership decisions are
//! always made against the contract.
//!
//! ## Backends
//!
//! - [`InMemoryMetadataStore`]: default when `DATA_DIR` is unset, and in tests
//! - [`RedbMetadataStore`]: embedded ACID database at `DATA_DIR/metadata.redb`

pub mod memory;
pub mod redb_store;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use memory::InMemoryMetadataStore;
pub use redb_store::RedbMetadataStore;

/// Client-editable fields, already validated and trimmed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetadataFields {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A stored metadata record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMetadata {
    /// Canonical decimal project id
    pub project_id: String,
    /// Lower-case address of the wallet that last wrote the record
    pub owner_address: String,
    #[serde(flatten)]
    pub fields: MetadataFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectMetadata {
    /// Build the record for an upsert, keeping `created_at` from `previous`.
    pub fn upserted(
        previous: Option<&ProjectMetadata>,
        project_id: &str,
        owner: &str,
        fields: MetadataFields,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            project_id: project_id.to_string(),
            owner_address: owner.to_string(),
            fields,
            created_at: previous.map(|p| p.created_at).unwrap_or(now),
            updated_at: now,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("storage task failed: {0}")]
    Task(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence for project metadata.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn get(&self, project_id: &str) -> StorageResult<Option<ProjectMetadata>>;

    /// Insert or replace the record, stamping `owner` as its owner.
    async fn upsert(
        &self,
        project_id: &str,
        owner: &str,
        fields: MetadataFields,
    ) -> StorageResult<ProjectMetadata>;

    /// Remove the record. Returns `false` when none existed.
    async fn delete(&self, project_id: &str) -> StorageResult<bool>;

    /// Cheap readiness probe.
    async fn ping(&self) -> StorageResult<()>;
}
