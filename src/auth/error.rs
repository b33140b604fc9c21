// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.
//!
//! [`AuthError`] is the closed set of reasons a request can fail to
//! authenticate. It never carries token contents, secret material, or
//! library error text; internal detail is logged where it happens and the
//! caller only sees the category.

use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Authentication error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No authorization header present
    #[error("Authorization header is required")]
    MissingHeader,
    /// Header is not of the form `<scheme> <token>`
    #[error("Invalid authorization header format (expected 'Bearer <token>')")]
    MalformedHeader,
    /// Scheme is something other than `Bearer`
    #[error("Invalid authentication scheme (expected 'Bearer')")]
    UnsupportedScheme,
    /// Signature mismatch, structural corruption, or a disallowed algorithm
    #[error("Token signature is invalid")]
    SignatureInvalid,
    /// Token is outside its validity window
    #[error("Token has expired or is not yet valid")]
    Expired,
    /// `sub`, `iat` or `exp` is absent or unusable
    #[error("Token is missing a required claim")]
    MissingRequiredClaim,
    /// No key in the key set matches the token's key ID
    #[error("No matching key found for token")]
    KeyNotFound,
    /// The signing key set could not be retrieved
    #[error("Signing keys are currently unavailable")]
    KeyFetchFailed,
    /// Anything the verifier did not anticipate
    #[error("Internal authentication error")]
    UnexpectedError,
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingHeader => "missing_auth_header",
            AuthError::MalformedHeader => "malformed_auth_header",
            AuthError::UnsupportedScheme => "unsupported_auth_scheme",
            AuthError::SignatureInvalid => "invalid_signature",
            AuthError::Expired => "token_expired",
            AuthError::MissingRequiredClaim => "missing_required_claim",
            AuthError::KeyNotFound => "no_matching_key",
            AuthError::KeyFetchFailed => "key_fetch_failed",
            AuthError::UnexpectedError => "internal_error",
        }
    }

    /// Whether the failure was caused by the credential the client sent.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, AuthError::KeyFetchFailed | AuthError::UnexpectedError)
    }

    /// Whether a caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::KeyFetchFailed)
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::KeyFetchFailed => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::UnexpectedError => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn missing_header_returns_401_with_challenge() {
        let response = AuthError::MissingHeader.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[WWW_AUTHENTICATE], "Bearer");

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error_code"], "missing_auth_header");
    }

    #[tokio::test]
    async fn key_fetch_failure_is_service_unavailable() {
        let response = AuthError::KeyFetchFailed.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().get(WWW_AUTHENTICATE).is_none());
    }

    #[test]
    fn unexpected_error_is_internal() {
        assert_eq!(
            AuthError::UnexpectedError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert!(!AuthError::UnexpectedError.is_client_error());
        assert!(!AuthError::UnexpectedError.is_retryable());
    }

    #[test]
    fn client_errors_are_unauthorized_and_not_retryable() {
        let client_errors = [
            AuthError::MissingHeader,
            AuthError::MalformedHeader,
            AuthError::UnsupportedScheme,
            AuthError::SignatureInvalid,
            AuthError::Expired,
            AuthError::MissingRequiredClaim,
            AuthError::KeyNotFound,
        ];
        for err in client_errors {
            assert!(err.is_client_error(), "{err:?}");
            assert!(!err.is_retryable(), "{err:?}");
            assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED, "{err:?}");
        }
        assert!(AuthError::KeyFetchFailed.is_retryable());
    }
}
