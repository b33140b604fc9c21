// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the startup loaders that turn
//! them into typed settings. Configuration is read once at startup; any
//! error here is fatal.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `AUTH_MODE` | `symmetric` (shared secret) or `jwks` | `symmetric` |
//! | `CLERK_SECRET_KEY` | Shared secret for HS256 tokens | Required in symmetric mode |
//! | `CLERK_JWKS_URL` | Clerk JWKS endpoint (https only) | `https://api.clerk.dev/v1/jwks` |
//! | `AUTH_JWKS_ALGORITHM` | Algorithm accepted in JWKS mode | `RS256` |
//! | `AUTH_CLOCK_SKEW_SECS` | Leeway for future `iat`/`nbf` (never `exp`) | `5` |
//! | `JWKS_CACHE_TTL_SECS` | JWKS cache lifetime | `300` |
//! | `JWKS_MIN_REFRESH_SECS` | Minimum key set age before an unknown `kid` refetches | `30` |
//! | `JWKS_FETCH_TIMEOUT_SECS` | HTTP timeout for one JWKS request | `10` |
//! | `JWKS_WAIT_TIMEOUT_SECS` | How long a request waits on a JWKS fetch | `5` |
//! | `JWKS_FAILURE_BACKOFF_SECS` | How long a failed JWKS fetch is reused before retrying | `5` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use url::Url;

use crate::auth::jwks::{
    DEFAULT_CACHE_TTL, DEFAULT_FAILURE_BACKOFF, DEFAULT_FETCH_TIMEOUT, DEFAULT_MIN_REFRESH_INTERVAL,
    DEFAULT_WAIT_TIMEOUT,
};
use crate::auth::keys::is_symmetric;
use crate::auth::policy::DEFAULT_CLOCK_SKEW_LEEWAY;
use crate::auth::{ClaimPolicy, JwksManager, KeyProvider, SharedSecret, TokenVerifier};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const AUTH_MODE_ENV: &str = "AUTH_MODE";
pub const CLERK_SECRET_KEY_ENV: &str = "CLERK_SECRET_KEY";
pub const CLERK_JWKS_URL_ENV: &str = "CLERK_JWKS_URL";
pub const JWKS_ALGORITHM_ENV: &str = "AUTH_JWKS_ALGORITHM";
pub const CLOCK_SKEW_ENV: &str = "AUTH_CLOCK_SKEW_SECS";
pub const JWKS_CACHE_TTL_ENV: &str = "JWKS_CACHE_TTL_SECS";
pub const JWKS_MIN_REFRESH_ENV: &str = "JWKS_MIN_REFRESH_SECS";
pub const JWKS_FETCH_TIMEOUT_ENV: &str = "JWKS_FETCH_TIMEOUT_SECS";
pub const JWKS_WAIT_TIMEOUT_ENV: &str = "JWKS_WAIT_TIMEOUT_SECS";
pub const JWKS_FAILURE_BACKOFF_ENV: &str = "JWKS_FAILURE_BACKOFF_SECS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

/// Clerk's public JWKS endpoint.
pub const DEFAULT_CLERK_JWKS_URL: &str = "https://api.clerk.dev/v1/jwks";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    MissingVar(&'static str),

    #[error("{var} has an invalid value: {reason}")]
    InvalidValue { var: &'static str, reason: String },

    #[error("Failed to initialise JWKS client: {0}")]
    JwksClient(String),
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            host: lookup(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or(&lookup, PORT_ENV, DEFAULT_PORT)?,
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::InvalidValue {
                var: HOST_ENV,
                reason: format!("{e}"),
            })
    }
}

/// Where verification keys come from.
#[derive(Debug, Clone, PartialEq)]
pub enum KeySettings {
    Symmetric {
        secret: SharedSecret,
    },
    Jwks {
        url: Url,
        algorithm: Algorithm,
        cache_ttl: Duration,
        min_refresh_interval: Duration,
        fetch_timeout: Duration,
        wait_timeout: Duration,
        failure_backoff: Duration,
    },
}

/// Authentication settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSettings {
    pub keys: KeySettings,
    pub clock_skew_secs: u64,
}

impl AuthSettings {
    /// Load from the process environment.
    ///
    /// # Errors
    /// Missing `CLERK_SECRET_KEY` in symmetric mode, an unknown mode or
    /// algorithm, a non-https JWKS URL, or an unparseable number.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mode = lookup(AUTH_MODE_ENV).unwrap_or_else(|| "symmetric".to_string());
        let keys = match mode.to_ascii_lowercase().as_str() {
            "symmetric" => KeySettings::Symmetric {
                secret: SharedSecret::new(
                    lookup(CLERK_SECRET_KEY_ENV).ok_or(ConfigError::MissingVar(CLERK_SECRET_KEY_ENV))?,
                ),
            },
            "jwks" => KeySettings::Jwks {
                url: parse_jwks_url(
                    &lookup(CLERK_JWKS_URL_ENV).unwrap_or_else(|| DEFAULT_CLERK_JWKS_URL.to_string()),
                )?,
                algorithm: parse_algorithm(lookup(JWKS_ALGORITHM_ENV).as_deref())?,
                cache_ttl: secs_or(&lookup, JWKS_CACHE_TTL_ENV, DEFAULT_CACHE_TTL)?,
                min_refresh_interval: secs_or(
                    &lookup,
                    JWKS_MIN_REFRESH_ENV,
                    DEFAULT_MIN_REFRESH_INTERVAL,
                )?,
                fetch_timeout: secs_or(&lookup, JWKS_FETCH_TIMEOUT_ENV, DEFAULT_FETCH_TIMEOUT)?,
                wait_timeout: secs_or(&lookup, JWKS_WAIT_TIMEOUT_ENV, DEFAULT_WAIT_TIMEOUT)?,
                failure_backoff: secs_or(
                    &lookup,
                    JWKS_FAILURE_BACKOFF_ENV,
                    DEFAULT_FAILURE_BACKOFF,
                )?,
            },
            other => {
                return Err(ConfigError::InvalidValue {
                    var: AUTH_MODE_ENV,
                    reason: format!("unknown mode '{other}' (expected 'symmetric' or 'jwks')"),
                })
            }
        };

        Ok(Self {
            keys,
            clock_skew_secs: parse_or(&lookup, CLOCK_SKEW_ENV, DEFAULT_CLOCK_SKEW_LEEWAY)?,
        })
    }

    /// Build the verifier these settings describe.
    pub fn build_verifier(&self) -> Result<TokenVerifier, ConfigError> {
        let keys = match &self.keys {
            KeySettings::Symmetric { secret } => KeyProvider::symmetric(secret),
            KeySettings::Jwks {
                url,
                algorithm,
                cache_ttl,
                min_refresh_interval,
                fetch_timeout,
                wait_timeout,
                failure_backoff,
            } => {
                let client = reqwest::Client::builder()
                    .timeout(*fetch_timeout)
                    .build()
                    .map_err(|e| ConfigError::JwksClient(e.to_string()))?;
                let jwks = JwksManager::with_client(url.as_str(), client)
                    .with_cache_ttl(*cache_ttl)
                    .with_min_refresh_interval(*min_refresh_interval)
                    .with_wait_timeout(*wait_timeout)
                    .with_failure_backoff(*failure_backoff);
                KeyProvider::jwks(jwks, *algorithm).map_err(|e| ConfigError::InvalidValue {
                    var: JWKS_ALGORITHM_ENV,
                    reason: e.to_string(),
                })?
            }
        };
        Ok(TokenVerifier::new(keys, ClaimPolicy::new(self.clock_skew_secs)))
    }
}

fn parse_jwks_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidValue {
        var: CLERK_JWKS_URL_ENV,
        reason: e.to_string(),
    })?;
    if url.scheme() != "https" {
        return Err(ConfigError::InvalidValue {
            var: CLERK_JWKS_URL_ENV,
            reason: "JWKS must be fetched over https".to_string(),
        });
    }
    Ok(url)
}

fn parse_algorithm(raw: Option<&str>) -> Result<Algorithm, ConfigError> {
    let Some(raw) = raw else {
        return Ok(Algorithm::RS256);
    };
    let algorithm = Algorithm::from_str(&raw.to_ascii_uppercase()).map_err(|_| {
        ConfigError::InvalidValue {
            var: JWKS_ALGORITHM_ENV,
            reason: format!("unknown algorithm '{raw}'"),
        }
    })?;
    if is_symmetric(algorithm) {
        return Err(ConfigError::InvalidValue {
            var: JWKS_ALGORITHM_ENV,
            reason: format!("{algorithm:?} is symmetric; JWKS mode needs an asymmetric algorithm"),
        });
    }
    Ok(algorithm)
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            var,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn secs_or(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    parse_or(lookup, var, default.as_secs()).map(Duration::from_secs)
}

/// Trimmed, non-empty environment value.
fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
