// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies for the REST API. All types derive `ToSchema`
//! for the OpenAPI document; JSON field names are camelCase.
//!
//! ## Model Categories
//!
//! - **Auth**: challenge, login, session introspection, CSRF bootstrap
//! - **Projects**: metadata update requests (records are
//!   [`ProjectMetadata`](crate::storage::ProjectMetadata))

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

// =============================================================================
// Auth
// =============================================================================

#[derive(Debug, Deserialize, IntoParams)]
pub struct ChallengeQuery {
    /// Wallet address that will sign the challenge
    pub address: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeResponse {
    /// Exact text to sign with `personal_sign`
    pub message: String,
    /// Lower-case wallet address
    pub address: String,
    /// Last moment the signed message is accepted
    pub expires_at: DateTime<Utc>,
}

/// Login body. Fields are optional so missing ones produce a 400 with a
/// field-specific message instead of a generic deserialisation error.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[schema(example = "0x742d35Cc6634C0532925a3b844Bc9e7595f4aB12")]
    pub address: Option<String>,
    /// 65-byte hex signature
    pub signature: Option<String>,
    /// The challenge message that was signed
    pub message: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub address: String,
    pub csrf_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub address: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CsrfResponse {
    pub csrf_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LogoutResponse {
    pub success: bool,
}

// =============================================================================
// Projects
// =============================================================================

/// Metadata update body. Any client-supplied owner field is ignored; the
/// owner is always the verified session address.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetadataUpdateRequest {
    #[schema(example = "Community Solar Array")]
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub website_url: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteResponse {
    pub deleted: bool,
}
