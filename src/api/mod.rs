// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{csrf::CSRF_HEADER, middleware::ensure_csrf_cookie},
    config::GatewayConfig,
    error::{panic_response, ErrorBody},
    models::{
        ChallengeResponse, CsrfResponse, DeleteResponse, LoginRequest, LoginResponse,
        LogoutResponse, MetadataUpdateRequest, SessionResponse,
    },
    ratelimit::middleware::{general_api_limit, rpc_proxy_limit},
    state::AppState,
    storage::{MetadataFields, ProjectMetadata},
};

pub mod auth;
pub mod health;
pub mod projects;
pub mod rpc;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/auth/challenge", get(auth::challenge))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/session", get(auth::session))
        .route("/auth/csrf", get(auth::csrf))
        .route(
            "/projects/{project_id}/metadata",
            get(projects::get_metadata)
                .put(projects::update_metadata)
                .delete(projects::delete_metadata),
        )
        .layer(from_fn_with_state(state.clone(), ensure_csrf_cookie))
        .layer(from_fn_with_state(state.clone(), general_api_limit));

    // Deliberately outside /v1: no session or CSRF machinery.
    let rpc_routes = Router::new()
        .route("/rpc", post(rpc::proxy))
        .layer(from_fn_with_state(state.clone(), rpc_proxy_limit));

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    let cors = cors_layer(&state.config);

    Router::new()
        .nest("/v1", v1_routes)
        .merge(rpc_routes)
        .merge(health_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(cors)
}

/// Credentialed CORS for the configured origins. With no origins configured
/// no CORS headers are sent and browsers enforce same-origin.
fn cors_layer(config: &GatewayConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return CorsLayer::new();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static(CSRF_HEADER),
        ])
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::challenge,
        auth::login,
        auth::logout,
        auth::session,
        auth::csrf,
        projects::get_metadata,
        projects::update_metadata,
        projects::delete_metadata,
        rpc::proxy,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            ChallengeResponse,
            LoginRequest,
            LoginResponse,
            LogoutResponse,
            SessionResponse,
            CsrfResponse,
            MetadataUpdateRequest,
            MetadataFields,
            ProjectMetadata,
            DeleteResponse,
            ErrorBody,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Auth", description = "Wallet sign-in, sessions and CSRF"),
        (name = "Projects", description = "Off-chain project metadata"),
        (name = "RPC", description = "Read-only JSON-RPC passthrough"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;
