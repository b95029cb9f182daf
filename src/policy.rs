// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Policy Composer
//!
//! Orders the identity and integrity gates for the two sensitive flows. The
//! composer holds no logic of its own beyond sequencing: each gate is a
//! component call whose failure short-circuits with that component's error.
//!
//! ## Login
//!
//! ```text
//! rate-limit(auth) -> inputs -> signature -> allow-list -> session -> CSRF token
//! ```
//!
//! ## Privileged mutation
//!
//! ```text
//! session -> CSRF -> rate-limit(wallet) -> inputs -> on-chain owner -> store
//! ```
//!
//! Ownership is read last because it is the only gate that leaves the
//! process. It is a single fresh contract read per mutation: a missing
//! project is 404, a different owner is 403 and an unreadable chain is a
//! generic 500. None of these outcomes ever lets the write through.

use std::net::IpAddr;

use tracing::{info, warn};

use crate::auth::address::addresses_match;
use crate::auth::extractor::Credentials;
use crate::auth::session::{IdentityClaim, IssuedSession};
use crate::auth::AuthError;
use crate::blockchain::OwnerLookup;
use crate::error::ApiError;
use crate::models::{LoginRequest, MetadataUpdateRequest};
use crate::ratelimit::{derive_key, middleware::enforce, Policy};
use crate::state::AppState;
use crate::storage::ProjectMetadata;
use crate::validation::{canonical_project_id, validate_login, validate_metadata};

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub session: IssuedSession,
    pub csrf_token: String,
}

/// A requested change to a project's metadata.
#[derive(Debug)]
pub enum Mutation {
    /// Upsert; `Err` carries a body that failed to parse.
    Upsert(Result<MetadataUpdateRequest, ApiError>),
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    Upserted(ProjectMetadata),
    Deleted,
}

/// Wallet-signature login.
///
/// `request` is the already-parsed body; a parse failure still counts
/// against the auth limit before it is reported.
pub async fn login(
    state: &AppState,
    client_ip: Option<IpAddr>,
    request: Result<LoginRequest, ApiError>,
) -> Result<LoginOutcome, ApiError> {
    enforce(state, Policy::Auth, &derive_key(None, client_ip))?;

    let input = validate_login(request?)?;

    let signer = state
        .signatures
        .verify(&input.address, &input.signature, &input.message)
        .map_err(|e| {
            warn!(address = %input.address, reason = %e, "Login signature rejected");
            AuthError::from(e)
        })?;

    state.signatures.ensure_allowed(&signer).map_err(|e| {
        warn!(address = %signer.address, "Login refused: wallet not on allow-list");
        AuthError::from(e)
    })?;

    let session = state
        .sessions
        .issue(&signer.address)
        .map_err(ApiError::internal)?;
    let csrf_token = state.csrf.mint().map_err(ApiError::internal)?;

    info!(address = %signer.address, expires_at = %session.claim.expires_at, "Wallet signed in");

    Ok(LoginOutcome {
        session,
        csrf_token,
    })
}

/// Verify the session carried by `credentials`.
pub fn authenticate(state: &AppState, credentials: &Credentials) -> Result<IdentityClaim, AuthError> {
    let token = credentials
        .session_token
        .as_deref()
        .ok_or(AuthError::MissingSession)?;
    state.sessions.verify(token)
}

/// Privileged metadata mutation for `project_id`.
pub async fn mutate_metadata(
    state: &AppState,
    credentials: &Credentials,
    project_id: &str,
    mutation: Mutation,
) -> Result<MutationOutcome, ApiError> {
    let claim = authenticate(state, credentials).map_err(|e| {
        warn!(project_id = %project_id, reason = %e, "Mutation rejected: no valid session");
        e
    })?;
    let address = claim.address;

    state
        .csrf
        .check(
            credentials.csrf_cookie.as_deref(),
            credentials.csrf_header.as_deref(),
        )
        .map_err(|e| {
            warn!(address = %address, project_id = %project_id, reason = %e, "Mutation rejected: CSRF");
            e
        })?;

    enforce(state, Policy::WalletMutation, &derive_key(Some(&address), None))?;

    let project_id = canonical_project_id(project_id)?;
    let fields = match mutation {
        Mutation::Upsert(body) => Some(validate_metadata(body?)?),
        Mutation::Delete => None,
    };

    match state.ownership.lookup(&project_id).await {
        OwnerLookup::Owner(owner) if addresses_match(&owner, &address) => {}
        OwnerLookup::Owner(owner) => {
            warn!(address = %address, owner = %owner, project_id = %project_id, "Mutation rejected: not the on-chain owner");
            return Err(AuthError::NotProjectOwner.into());
        }
        OwnerLookup::NotFound => {
            warn!(address = %address, project_id = %project_id, "Mutation rejected: project not on-chain");
            return Err(ApiError::not_found("Project not found on-chain").with_code("project_not_found"));
        }
        OwnerLookup::InvalidId => {
            return Err(ApiError::validation("projectId must be an unsigned 256-bit decimal integer"));
        }
        OwnerLookup::Unavailable => {
            return Err(ApiError::upstream(format!(
                "ownership of project {project_id} could not be read"
            )));
        }
    }

    match fields {
        Some(fields) => {
            // Owner is always the verified session address.
            let record = state
                .store
                .upsert(&project_id, &address, fields)
                .await
                .map_err(ApiError::upstream)?;
            info!(address = %address, project_id = %project_id, "Project metadata updated");
            Ok(MutationOutcome::Upserted(record))
        }
        None => {
            let existed = state
                .store
                .delete(&project_id)
                .await
                .map_err(ApiError::upstream)?;
            if !existed {
                return Err(ApiError::not_found("No metadata stored for this project")
                    .with_code("metadata_not_found"));
            }
            info!(address = %address, project_id = %project_id, "Project metadata deleted");
            Ok(MutationOutcome::Deleted)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use chrono::Utc;

    use super::*;
    use crate::auth::signature::test_support::{sign, wallet, wallet_address};
    use crate::blockchain::ownership::test_support::StaticRegistry;
    use crate::config::GatewayConfig;

    const PROJECT: u64 = 7;

    fn state_with(registry: Arc<StaticRegistry>) -> AppState {
        AppState::with_registry(GatewayConfig::for_tests(), registry)
    }

    fn credentials(state: &AppState, address: &str) -> Credentials {
        let session = state.sessions.issue(address).unwrap();
        let csrf = state.csrf.mint().unwrap();
        Credentials {
            session_token: Some(session.token),
            csrf_cookie: Some(csrf.clone()),
            csrf_header: Some(csrf),
        }
    }

    fn upsert(title: &str) -> Mutation {
        Mutation::Upsert(Ok(MetadataUpdateRequest {
            title: Some(title.to_string()),
            ..Default::default()
        }))
    }

    fn login_request(state: &AppState, seed: u8) -> (LoginRequest, String) {
        let signer = wallet(seed);
        let address = wallet_address(&signer);
        let challenge = state
            .signatures
            .template()
            .issue(&address, Utc::now())
            .unwrap();
        let request = LoginRequest {
            address: Some(address.to_uppercase().replacen("0X", "0x", 1)),
            signature: Some(sign(&signer, &challenge.message)),
            message: Some(challenge.message),
        };
        (request, address)
    }

    #[tokio::test]
    async fn login_issues_session_and_csrf() {
        let state = AppState::for_tests();
        let (request, address) = login_request(&state, 1);

        let outcome = login(&state, None, Ok(request)).await.unwrap();
        assert_eq!(outcome.session.claim.address, address);
        assert_eq!(outcome.csrf_token.len(), 43);
        assert_eq!(state.sessions.verify(&outcome.session.token).unwrap().address, address);
    }

    #[tokio::test]
    async fn login_with_someone_elses_signature_is_rejected() {
        let state = AppState::for_tests();
        let (mut request, _) = login_request(&state, 1);
        request.address = Some(wallet_address(&wallet(2)));

        let err = login(&state, None, Ok(request)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_honours_allowlist() {
        let mut config = GatewayConfig::for_tests();
        config.wallet_allowlist = Some(vec![wallet_address(&wallet(9))]);
        let state = AppState::with_registry(config, Arc::new(StaticRegistry::default()));

        let (request, _) = login_request(&state, 1);
        let err = login(&state, None, Ok(request)).await.unwrap_err();
        assert_eq!(err.code, "not_whitelisted");

        let (request, _) = login_request(&state, 9);
        assert!(login(&state, None, Ok(request)).await.is_ok());
    }

    #[tokio::test]
    async fn login_is_rate_limited_before_verification() {
        let state = AppState::for_tests();
        let ip: IpAddr = "192.0.2.10".parse().unwrap();
        let ceiling = state.rate_limiter.settings().auth.ceiling;

        for _ in 0..ceiling {
            let _ = login(&state, Some(ip), Ok(LoginRequest::default())).await;
        }
        let err = login(&state, Some(ip), Ok(LoginRequest::default())).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn unparsable_login_bodies_spend_auth_quota() {
        let state = AppState::for_tests();
        let ip: IpAddr = "192.0.2.11".parse().unwrap();
        let ceiling = state.rate_limiter.settings().auth.ceiling;

        for _ in 0..ceiling {
            let err = login(&state, Some(ip), Err(ApiError::validation("expected value")))
                .await
                .unwrap_err();
            assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        }

        let (request, _) = login_request(&state, 1);
        let err = login(&state, Some(ip), Ok(request)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn login_with_missing_fields_is_400() {
        let state = AppState::for_tests();
        let err = login(&state, None, Ok(LoginRequest::default())).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn owner_can_upsert_with_any_case() {
        let owner = wallet_address(&wallet(1));
        let registry = Arc::new(StaticRegistry::with_owner(PROJECT, &owner.to_uppercase().replacen("0X", "0x", 1)));
        let state = state_with(registry);
        let creds = credentials(&state, &owner);

        let outcome = mutate_metadata(&state, &creds, "7", upsert("Solar")).await.unwrap();
        let MutationOutcome::Upserted(record) = outcome else {
            panic!("expected upsert");
        };
        assert_eq!(record.owner_address, owner);
        assert_eq!(record.project_id, "7");
    }

    #[tokio::test]
    async fn non_owner_is_forbidden_and_nothing_is_written() {
        let owner = wallet_address(&wallet(1));
        let state = state_with(Arc::new(StaticRegistry::with_owner(PROJECT, &owner)));
        let creds = credentials(&state, &wallet_address(&wallet(2)));

        let err = mutate_metadata(&state, &creds, "7", upsert("Hijack")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.code, "not_project_owner");
        assert!(state.store.get("7").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ownership_transfer_takes_effect_immediately() {
        let old_owner = wallet_address(&wallet(1));
        let new_owner = wallet_address(&wallet(2));
        let registry = Arc::new(StaticRegistry::with_owner(PROJECT, &old_owner));
        let state = state_with(registry.clone());
        let creds = credentials(&state, &old_owner);

        assert!(mutate_metadata(&state, &creds, "7", upsert("v1")).await.is_ok());
        registry.set_owner(PROJECT, &new_owner);
        let err = mutate_metadata(&state, &creds, "7", upsert("v2")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn missing_project_is_404() {
        let state = state_with(Arc::new(StaticRegistry::default()));
        let creds = credentials(&state, &wallet_address(&wallet(1)));

        let err = mutate_metadata(&state, &creds, "99", upsert("Ghost")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn chain_outage_fails_closed_with_generic_500() {
        let owner = wallet_address(&wallet(1));
        let registry = Arc::new(StaticRegistry::with_owner(PROJECT, &owner));
        registry.set_failing(true);
        let state = state_with(registry);
        let creds = credentials(&state, &owner);

        let err = mutate_metadata(&state, &creds, "7", upsert("Solar")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, crate::error::GENERIC_SERVER_ERROR);
        assert!(state.store.get("7").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn gates_run_in_order() {
        let owner = wallet_address(&wallet(1));
        let registry = Arc::new(StaticRegistry::with_owner(PROJECT, &owner));
        let state = state_with(registry.clone());

        // no session: 401 before anything else
        let err = mutate_metadata(&state, &Credentials::default(), "7", upsert("x"))
            .await
            .unwrap_err();
        assert_eq!(err.code, "missing_session");

        // session without CSRF: 403
        let mut creds = credentials(&state, &owner);
        creds.csrf_header = None;
        let err = mutate_metadata(&state, &creds, "7", upsert("x")).await.unwrap_err();
        assert_eq!(err.code, "csrf_missing");

        creds.csrf_header = Some("tampered".to_string());
        let err = mutate_metadata(&state, &creds, "7", upsert("x")).await.unwrap_err();
        assert_eq!(err.code, "csrf_mismatch");

        // invalid body: 400, still no chain read
        let creds = credentials(&state, &owner);
        let err = mutate_metadata(&state, &creds, "7", upsert("  ")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let err = mutate_metadata(&state, &creds, "seven", upsert("ok")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        assert_eq!(registry.reads(), 0);
    }

    #[tokio::test]
    async fn wallet_mutation_limit_applies_per_address() {
        let owner = wallet_address(&wallet(1));
        let state = state_with(Arc::new(StaticRegistry::with_owner(PROJECT, &owner)));
        let creds = credentials(&state, &owner);
        let ceiling = state.rate_limiter.settings().wallet_mutation.ceiling;

        for _ in 0..ceiling {
            mutate_metadata(&state, &creds, "7", upsert("Solar")).await.unwrap();
        }
        let err = mutate_metadata(&state, &creds, "7", upsert("Solar")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);

        let other = credentials(&state, &wallet_address(&wallet(2)));
        let err = mutate_metadata(&state, &other, "7", upsert("Solar")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn delete_requires_an_existing_record() {
        let owner = wallet_address(&wallet(1));
        let state = state_with(Arc::new(StaticRegistry::with_owner(PROJECT, &owner)));
        let creds = credentials(&state, &owner);

        let err = mutate_metadata(&state, &creds, "7", Mutation::Delete).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        mutate_metadata(&state, &creds, "7", upsert("Solar")).await.unwrap();
        assert_eq!(
            mutate_metadata(&state, &creds, "007", Mutation::Delete).await.unwrap(),
            MutationOutcome::Deleted
        );
    }

    #[tokio::test]
    async fn client_asserted_owner_is_ignored() {
        let owner = wallet_address(&wallet(1));
        let state = state_with(Arc::new(StaticRegistry::with_owner(PROJECT, &owner)));
        let creds = credentials(&state, &owner);

        let body: MetadataUpdateRequest = serde_json::from_value(serde_json::json!({
            "title": "Solar",
            "ownerAddress": "0x000000000000000000000000000000000000dEaD"
        }))
        .unwrap();
        let outcome = mutate_metadata(&state, &creds, "7", Mutation::Upsert(Ok(body)))
            .await
            .unwrap();
        let MutationOutcome::Upserted(record) = outcome else {
            panic!("expected upsert");
        };
        assert_eq!(record.owner_address, owner);
    }
}
