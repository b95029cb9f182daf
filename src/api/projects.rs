// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};

use crate::{
    auth::Credentials,
    error::{ApiError, ErrorBody},
    models::{DeleteResponse, MetadataUpdateRequest},
    policy::{self, Mutation, MutationOutcome},
    state::AppState,
    storage::ProjectMetadata,
    validation::canonical_project_id,
};

#[utoipa::path(
    get,
    path = "/v1/projects/{project_id}/metadata",
    params(
        ("project_id" = String, Path, description = "On-chain project id (decimal)")
    ),
    tag = "Projects",
    responses(
        (status = 200, body = ProjectMetadata),
        (status = 400, body = ErrorBody),
        (status = 404, body = ErrorBody)
    )
)]
pub async fn get_metadata(
    Path(project_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ProjectMetadata>, ApiError> {
    let project_id = canonical_project_id(&project_id)?;
    let record = state
        .store
        .get(&project_id)
        .await
        .map_err(ApiError::upstream)?
        .ok_or_else(|| {
            ApiError::not_found("No metadata stored for this project").with_code("metadata_not_found")
        })?;
    Ok(Json(record))
}

#[utoipa::path(
    put,
    path = "/v1/projects/{project_id}/metadata",
    params(
        ("project_id" = String, Path, description = "On-chain project id (decimal)"),
        ("x-csrf-token" = String, Header, description = "Value of the csrf_token cookie")
    ),
    request_body = MetadataUpdateRequest,
    tag = "Projects",
    responses(
        (status = 200, body = ProjectMetadata),
        (status = 400, body = ErrorBody),
        (status = 401, body = ErrorBody),
        (status = 403, body = ErrorBody),
        (status = 404, body = ErrorBody),
        (status = 429, body = ErrorBody)
    )
)]
pub async fn update_metadata(
    Path(project_id): Path<String>,
    State(state): State<AppState>,
    credentials: Credentials,
    body: Result<Json<MetadataUpdateRequest>, JsonRejection>,
) -> Result<Json<ProjectMetadata>, ApiError> {
    let body = body
        .map(|Json(request)| request)
        .map_err(|e| ApiError::validation(e.body_text()));

    match policy::mutate_metadata(&state, &credentials, &project_id, Mutation::Upsert(body)).await? {
        MutationOutcome::Upserted(record) => Ok(Json(record)),
        MutationOutcome::Deleted => Err(ApiError::internal("upsert reported a delete")),
    }
}

#[utoipa::path(
    delete,
    path = "/v1/projects/{project_id}/metadata",
    params(
        ("project_id" = String, Path, description = "On-chain project id (decimal)"),
        ("x-csrf-token" = String, Header, description = "Value of the csrf_token cookie")
    ),
    tag = "Projects",
    responses(
        (status = 200, body = DeleteResponse),
        (status = 401, body = ErrorBody),
        (status = 403, body = ErrorBody),
        (status = 404, body = ErrorBody),
        (status = 429, body = ErrorBody)
    )
)]
pub async fn delete_metadata(
    Path(project_id): Path<String>,
    State(state): State<AppState>,
    credentials: Credentials,
) -> Result<Json<DeleteResponse>, ApiError> {
    policy::mutate_metadata(&state, &credentials, &project_id, Mutation::Delete).await?;
    Ok(Json(DeleteResponse { deleted: true }))
}
