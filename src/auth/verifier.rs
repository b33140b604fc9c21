// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token verification.
//!
//! One pass per request:
//!
//! 1. parse the `Authorization` header into a [`Credential`]
//! 2. reject any token whose header declares an algorithm other than the
//!    key provider's pinned one
//! 3. resolve key material ([`KeyProvider`])
//! 4. verify the signature (`jsonwebtoken`, single-algorithm allow-list)
//! 5. enforce required claims and the validity window ([`ClaimPolicy`])
//! 6. resolve the [`AuthenticatedUser`]
//!
//! Audience is deliberately not checked: Clerk session tokens do not carry
//! a dependable `aud`, and the deployment trusts every token its key
//! material verifies.

use axum::http::HeaderMap;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Validation};
use serde_json::{Map, Value};

use super::{AuthError, AuthenticatedUser, ClaimPolicy, Credential, KeyProvider, VerifiedClaims};

/// Result of verifying one request's credentials.
pub type VerificationOutcome = Result<AuthenticatedUser, AuthError>;

/// Verifies bearer tokens against the configured key material.
///
/// Shared across requests (behind an `Arc` in `AppState`); the only mutable
/// state it reaches is the JWKS cache.
pub struct TokenVerifier {
    keys: KeyProvider,
    policy: ClaimPolicy,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(keys: KeyProvider, policy: ClaimPolicy) -> Self {
        let mut validation = Validation::new(keys.algorithm());
        // Temporal and required-claim rules live in ClaimPolicy.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        Self {
            keys,
            policy,
            validation,
        }
    }

    pub fn keys(&self) -> &KeyProvider {
        &self.keys
    }

    pub fn policy(&self) -> &ClaimPolicy {
        &self.policy
    }

    /// Authenticate a raw `Authorization` header value.
    pub async fn authenticate(&self, header: Option<&str>) -> VerificationOutcome {
        let credential = Credential::from_header(header)?;
        self.verify(&credential).await
    }

    /// Authenticate from request headers.
    pub async fn authenticate_headers(&self, headers: &HeaderMap) -> VerificationOutcome {
        let credential = Credential::from_headers(headers)?;
        self.verify(&credential).await
    }

    /// Verify an extracted credential and resolve the user it identifies.
    pub async fn verify(&self, credential: &Credential) -> VerificationOutcome {
        let now = chrono::Utc::now().timestamp();
        let claims = self.verify_token_at(credential.token(), now).await?;
        Ok(AuthenticatedUser::from_claims(claims))
    }

    /// Verify a raw token as of `now` (Unix seconds).
    pub async fn verify_token_at(&self, token: &str, now: i64) -> Result<VerifiedClaims, AuthError> {
        let header = decode_header(token).map_err(|e| {
            tracing::debug!(kind = ?e.kind(), "Undecodable token header");
            AuthError::SignatureInvalid
        })?;

        let expected = self.keys.algorithm();
        if header.alg != expected {
            tracing::debug!(alg = ?header.alg, expected = ?expected, "Token declares a disallowed algorithm");
            return Err(AuthError::SignatureInvalid);
        }

        let key = self.keys.decoding_key(&header).await?;

        let token_data = decode::<Map<String, Value>>(token, &key, &self.validation)
            .map_err(|e| classify(e.kind()))?;

        self.policy.enforce(token_data.claims, now).inspect_err(|e| {
            tracing::debug!(reason = e.error_code(), "Token failed claim policy");
        })
    }
}

/// Map a `jsonwebtoken` failure onto the authentication taxonomy.
fn classify(kind: &ErrorKind) -> AuthError {
    match kind {
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidToken
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::MissingAlgorithm
        | ErrorKind::InvalidAlgorithmName
        | ErrorKind::InvalidKeyFormat
        | ErrorKind::InvalidRsaKey(_)
        | ErrorKind::InvalidEcdsaKey
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_) => {
            tracing::debug!(?kind, "Token signature rejected");
            AuthError::SignatureInvalid
        }
        ErrorKind::ExpiredSignature | ErrorKind::ImmatureSignature => AuthError::Expired,
        ErrorKind::MissingRequiredClaim(_) => AuthError::MissingRequiredClaim,
        other => {
            tracing::warn!(kind = ?other, "Unexpected token verification failure");
            AuthError::UnexpectedError
        }
    }
}
