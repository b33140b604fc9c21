// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Verifies Clerk-issued bearer tokens and yields the user identity that
//! downstream handlers act on.
//!
//! ## Auth Flow
//!
//! 1. Frontend (Next.js) authenticates the user with Clerk
//! 2. Frontend sends `Authorization: Bearer <Clerk JWT>`
//! 3. Server:
//!    - Parses the header ([`Credential`])
//!    - Resolves key material ([`KeyProvider`]): the shared secret, or the
//!      Clerk JWKS entry named by the token's `kid`
//!    - Verifies the signature with the one algorithm the mode allows
//!    - Enforces `sub`/`iat`/`exp` and the validity window ([`ClaimPolicy`])
//!    - Extracts `sub` → canonical `user_id` ([`AuthenticatedUser`])
//!
//! ## Security
//!
//! - The accepted algorithm is fixed by configuration, never by the token
//! - JWKS is cached with TTL; concurrent refreshes share one fetch
//! - Tokens and secrets never appear in errors or logs
//! - Clock skew tolerance defaults to 5 seconds

pub mod claims;
pub mod credential;
pub mod error;
pub mod extractor;
pub mod jwks;
pub mod keys;
pub mod middleware;
pub mod policy;
pub mod verifier;

#[cfg(test)]
pub(crate) mod testutil;

pub use claims::{AuthenticatedUser, VerifiedClaims};
pub use credential::Credential;
pub use error::AuthError;
pub use extractor::{Auth, OptionalAuth};
pub use jwks::{JwksManager, KeyFetchError, SigningKeySet};
pub use keys::{KeyMode, KeyProvider, SharedSecret};
pub use policy::ClaimPolicy;
pub use verifier::{TokenVerifier, VerificationOutcome};
