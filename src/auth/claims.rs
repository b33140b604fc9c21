// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verified JWT claims and authenticated user representation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// Claims of a token whose signature and policy checks have passed.
///
/// Only [`ClaimPolicy`](super::policy::ClaimPolicy) builds these, so holding
/// one means verification succeeded. The subject is never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedClaims {
    subject: String,
    issued_at: i64,
    expires_at: i64,
    claims: Map<String, Value>,
}

impl VerifiedClaims {
    pub(super) fn new(
        subject: String,
        issued_at: i64,
        expires_at: i64,
        claims: Map<String, Value>,
    ) -> Self {
        debug_assert!(!subject.is_empty());
        Self {
            subject,
            issued_at,
            expires_at,
            claims,
        }
    }

    /// Subject (`sub`) claim.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Issued-at (`iat`) as Unix seconds.
    pub fn issued_at(&self) -> i64 {
        self.issued_at
    }

    /// Expiry (`exp`) as Unix seconds.
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    /// Look up any claim by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// The full claim set, including the registered claims.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.claims
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.claims
    }
}

/// Authenticated user information extracted from a verified token.
///
/// This is the type request handlers receive; `user_id` is the `sub` claim
/// exactly as the identity provider issued it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Canonical user ID (Clerk `sub` claim)
    pub user_id: String,

    /// Clerk session ID (`sid` claim, if present)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Token issue time (Unix timestamp)
    pub issued_at: i64,

    /// Token expiration (Unix timestamp)
    pub expires_at: i64,

    /// Every claim carried by the token
    #[schema(value_type = Object)]
    pub claims: Map<String, Value>,
}

impl AuthenticatedUser {
    /// Resolve the identity carried by verified claims.
    pub fn from_claims(claims: VerifiedClaims) -> Self {
        let session_id = claims
            .get("sid")
            .and_then(Value::as_str)
            .map(str::to_string);

        Self {
            user_id: claims.subject,
            session_id,
            issued_at: claims.issued_at,
            expires_at: claims.expires_at,
            claims: claims.claims,
        }
    }

    /// Look up an additional claim (e.g. `email`, `org_id`).
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }
}
