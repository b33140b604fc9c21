// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verification key material, selected by deployment mode.
//!
//! - **Symmetric**: one shared secret (`CLERK_SECRET_KEY`), `HS256` only.
//! - **JWKS**: public keys fetched from the provider, looked up by `kid`,
//!   one configured asymmetric algorithm.
//!
//! The mode is fixed at startup. Nothing here inspects a token to decide
//! which kind of key to use.

use std::fmt;

use jsonwebtoken::{Algorithm, DecodingKey, Header};

use super::{AuthError, JwksManager};

/// Algorithm accepted in symmetric mode.
pub const SYMMETRIC_ALGORITHM: Algorithm = Algorithm::HS256;

/// Shared HMAC secret. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret(String);

impl SharedSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{0:?} is not an asymmetric signing algorithm")]
pub struct NotAsymmetric(pub Algorithm);

/// Deployment mode of a [`KeyProvider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMode {
    Symmetric,
    Jwks,
}

impl fmt::Display for KeyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMode::Symmetric => write!(f, "symmetric"),
            KeyMode::Jwks => write!(f, "jwks"),
        }
    }
}

/// Source of verification keys for the token verifier.
#[derive(Clone)]
pub enum KeyProvider {
    Symmetric { key: DecodingKey },
    Jwks { jwks: JwksManager, algorithm: Algorithm },
}

impl KeyProvider {
    /// Shared-secret mode.
    pub fn symmetric(secret: &SharedSecret) -> Self {
        KeyProvider::Symmetric {
            key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// JWKS mode, accepting only `algorithm`.
    ///
    /// # Errors
    /// Rejects HMAC algorithms: public keys must never be used as HMAC secrets.
    pub fn jwks(jwks: JwksManager, algorithm: Algorithm) -> Result<Self, NotAsymmetric> {
        if is_symmetric(algorithm) {
            return Err(NotAsymmetric(algorithm));
        }
        Ok(KeyProvider::Jwks { jwks, algorithm })
    }

    pub fn mode(&self) -> KeyMode {
        match self {
            KeyProvider::Symmetric { .. } => KeyMode::Symmetric,
            KeyProvider::Jwks { .. } => KeyMode::Jwks,
        }
    }

    /// The single algorithm tokens must declare in this mode.
    pub fn algorithm(&self) -> Algorithm {
        match self {
            KeyProvider::Symmetric { .. } => SYMMETRIC_ALGORITHM,
            KeyProvider::Jwks { algorithm, .. } => *algorithm,
        }
    }

    /// The JWKS manager, in JWKS mode.
    pub fn jwks_manager(&self) -> Option<&JwksManager> {
        match self {
            KeyProvider::Jwks { jwks, .. } => Some(jwks),
            KeyProvider::Symmetric { .. } => None,
        }
    }

    /// Key material for a token with the given (unverified) header.
    pub async fn decoding_key(&self, header: &Header) -> Result<DecodingKey, AuthError> {
        match self {
            KeyProvider::Symmetric { key } => Ok(key.clone()),
            KeyProvider::Jwks { jwks, .. } => {
                let kid = header.kid.as_deref().ok_or_else(|| {
                    tracing::debug!("Token header carries no key ID");
                    AuthError::KeyNotFound
                })?;
                jwks.decoding_key(kid).await
            }
        }
    }
}

pub(crate) fn is_symmetric(algorithm: Algorithm) -> bool {
    matches!(
        algorithm,
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
    )
}
