// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::KeyMode;
use crate::state::AppState;

/// Health check response with individual component status.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Overall health status ("ok" or "degraded").
    pub status: String,
    /// Individual health checks and their results.
    pub checks: HealthChecks,
}

/// Individual health check results.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthChecks {
    /// Whether the service process is running.
    pub service: String,
    /// Verification mode in use (`symmetric` or `jwks`).
    pub auth_mode: String,
    /// JWKS (authentication keys) status.
    /// Only present in JWKS mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks: Option<String>,
}

/// Simple health check response for liveness probes.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Check if JWKS is available (JWKS auth mode).
async fn check_jwks(state: &AppState) -> Option<String> {
    let jwks_manager = state.verifier.keys().jwks_manager()?;
    // Check if we have cached keys
    if jwks_manager.is_cached().await {
        return Some("ok".to_string());
    }
    // Try to fetch keys
    match jwks_manager.refresh().await {
        Ok(_) => Some("ok".to_string()),
        Err(e) => {
            tracing::warn!(error = %e, "JWKS unavailable for readiness check");
            Some("unavailable".to_string())
        }
    }
}

/// Health check endpoint handler.
///
/// Returns 200 if all checks pass, 503 if any check fails.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = ReadyResponse),
        (status = 503, description = "Service is unhealthy", body = ReadyResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let mode: KeyMode = state.verifier.keys().mode();
    let jwks = check_jwks(&state).await;
    let all_ok = jwks.as_deref().map(|s| s == "ok").unwrap_or(true);

    let response = ReadyResponse {
        status: if all_ok { "ok" } else { "degraded" }.to_string(),
        checks: HealthChecks {
            service: "ok".to_string(),
            auth_mode: mode.to_string(),
            jwks,
        },
    };

    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

/// Liveness probe handler.
///
/// Always returns 200 if the process is running.
/// Does not check dependencies - use readiness for that.
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness probe handler.
///
/// Returns 200 only if signing keys are available.
/// Use for Kubernetes readiness probes.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Service is ready", body = ReadyResponse),
        (status = 503, description = "Service is not ready", body = ReadyResponse)
    )
)]
pub async fn readiness(state: State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    health(state).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::testutil::{jwks_document, PRIMARY_KID};
    use crate::auth::{ClaimPolicy, JwksManager, KeyProvider, SharedSecret, TokenVerifier};
    use jsonwebtoken::Algorithm;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn jwks_state(url: String) -> AppState {
        let jwks = JwksManager::new(url).unwrap();
        AppState::new(TokenVerifier::new(
            KeyProvider::jwks(jwks, Algorithm::RS256).unwrap(),
            ClaimPolicy::default(),
        ))
    }

    #[tokio::test]
    async fn symmetric_mode_is_always_ready() {
        let state = AppState::new(TokenVerifier::new(
            KeyProvider::symmetric(&SharedSecret::new("s3cret")),
            ClaimPolicy::default(),
        ));
        let (status, Json(body)) = health(State(state)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.checks.auth_mode, "symmetric");
        assert!(body.checks.jwks.is_none());
    }

    #[tokio::test]
    async fn jwks_mode_ready_after_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_document(&[PRIMARY_KID])))
            .expect(1)
            .mount(&server)
            .await;
        let state = jwks_state(format!("{}/jwks", server.uri()));

        let (status, Json(body)) = readiness(State(state.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.checks.jwks.as_deref(), Some("ok"));

        // Second probe is served from cache.
        let (status, _) = readiness(State(state)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn jwks_mode_degraded_when_endpoint_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        let state = jwks_state(format!("{}/jwks", server.uri()));

        let (status, Json(body)) = health(State(state.clone())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.status, "degraded");
        assert_eq!(body.checks.jwks.as_deref(), Some("unavailable"));

        // Repeated probes during the failure backoff do not refetch.
        for _ in 0..5 {
            let (status, _) = readiness(State(state.clone())).await;
            assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        }
    }

    #[tokio::test]
    async fn liveness_is_ok() {
        let Json(body) = liveness().await;
        assert_eq!(body.status, "ok");
    }
}
