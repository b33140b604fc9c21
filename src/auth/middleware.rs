// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication middleware for Axum.
//!
//! Applies authentication to an entire router subtree: requests are verified
//! before any handler runs, and the resulting [`AuthenticatedUser`] is stored
//! in the request extensions where the [`Auth`](super::Auth) extractor picks
//! it up without verifying twice.
//!
//! ```rust,ignore
//! let protected = Router::new()
//!     .route("/checkins", get(list_checkins))
//!     .route_layer(axum::middleware::from_fn_with_state(state.clone(), require_auth));
//! ```

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::AuthenticatedUser;
use crate::state::AppState;

/// Authentication middleware function.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match state.verifier.authenticate_headers(request.headers()).await {
        Ok(user) => {
            tracing::debug!(user_id = %user.user_id, "Request authenticated");
            request.extensions_mut().insert::<AuthenticatedUser>(user);
            next.run(request).await
        }
        Err(e) => {
            if e.is_client_error() {
                tracing::debug!(reason = e.error_code(), "Authentication rejected");
            } else {
                tracing::warn!(reason = e.error_code(), "Authentication unavailable");
            }
            e.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::testutil::{hs256_token, standard_claims, SECRET};
    use crate::auth::{Auth, ClaimPolicy, KeyProvider, SharedSecret, TokenVerifier};
    use axum::{body::Body, http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    fn protected_router() -> Router {
        let state = AppState::new(TokenVerifier::new(
            KeyProvider::symmetric(&SharedSecret::new(SECRET)),
            ClaimPolicy::default(),
        ));
        Router::new()
            .route("/whoami", get(|Auth(user): Auth| async move { user.user_id }))
            .route_layer(axum::middleware::from_fn_with_state(state.clone(), require_auth))
            .with_state(state)
    }

    #[tokio::test]
    async fn authenticated_request_reaches_handler() {
        let token = hs256_token(SECRET, &standard_claims("user_42", 3600));
        let response = protected_router()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/whoami")
                    .header("Authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"user_42");
    }

    #[tokio::test]
    async fn unauthenticated_request_is_rejected() {
        let response = protected_router()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/whoami")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
