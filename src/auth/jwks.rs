// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS (JSON Web Key Set) fetching and caching.
//!
//! ## Cache rules
//!
//! - The key set is fetched over HTTP(S) and replaced wholesale; readers
//!   always see a complete set behind an `Arc`.
//! - A set older than the cache TTL is refreshed on the next lookup.
//! - An unknown `kid` forces one refresh, unless the current set is younger
//!   than the minimum refresh interval.
//! - At most one fetch is in flight. Concurrent callers that need fresh keys
//!   join it instead of issuing their own request.
//! - A failed fetch is reported to every caller for a short backoff window
//!   before the endpoint is tried again.
//! - The fetch runs on its own task: a caller that gives up (wait timeout or
//!   request cancellation) does not abort it, and the result still lands in
//!   the cache.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt, Shared};
use jsonwebtoken::jwk::{JwkSet, PublicKeyUse};
use jsonwebtoken::DecodingKey;
use tokio::sync::{Mutex, RwLock};

use super::error::AuthError;

/// Default JWKS cache TTL (5 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default minimum age before an unknown `kid` may force a refresh.
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Default HTTP timeout for a single JWKS request.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time a caller waits on an in-flight fetch.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time a failed fetch is reused before the endpoint is retried.
pub const DEFAULT_FAILURE_BACKOFF: Duration = Duration::from_secs(5);

/// Why the key set could not be obtained.
///
/// Kept internal to the key provider; callers see
/// [`AuthError::KeyFetchFailed`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyFetchError {
    #[error("JWKS request failed: {0}")]
    Request(String),

    #[error("HTTP {0} from JWKS endpoint")]
    Status(u16),

    #[error("JWKS response was invalid: {0}")]
    InvalidBody(String),

    #[error("Gave up waiting for JWKS after {0:?}")]
    WaitTimedOut(Duration),

    #[error("JWKS fetch task failed: {0}")]
    TaskFailed(String),
}

impl From<KeyFetchError> for AuthError {
    fn from(_: KeyFetchError) -> Self {
        AuthError::KeyFetchFailed
    }
}

/// Verification keys indexed by key ID, as fetched at one point in time.
pub struct SigningKeySet {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Instant,
}

impl SigningKeySet {
    /// Build from a JWKS document.
    ///
    /// Keys without a `kid`, encryption keys, and keys `jsonwebtoken` cannot
    /// use for verification are skipped.
    pub fn from_jwks(jwks: &JwkSet) -> Self {
        let mut keys = HashMap::with_capacity(jwks.keys.len());
        for jwk in &jwks.keys {
            let Some(kid) = jwk.common.key_id.as_deref() else {
                tracing::warn!("Skipping JWK without key ID");
                continue;
            };
            if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
                tracing::debug!(kid, "Skipping encryption JWK");
                continue;
            }
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => {
                    keys.insert(kid.to_string(), key);
                }
                Err(e) => tracing::warn!(kid, error = %e, "Skipping unusable JWK"),
            }
        }
        Self {
            keys,
            fetched_at: Instant::now(),
        }
    }

    pub fn get(&self, kid: &str) -> Option<&DecodingKey> {
        self.keys.get(kid)
    }

    pub fn contains(&self, kid: &str) -> bool {
        self.keys.contains_key(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Time since this set was fetched.
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }
}

impl fmt::Debug for SigningKeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeySet")
            .field("kids", &self.keys.keys().collect::<Vec<_>>())
            .field("fetched_at", &self.fetched_at)
            .finish()
    }
}

type InFlightFetch = Shared<BoxFuture<'static, Result<Arc<SigningKeySet>, KeyFetchError>>>;

/// JWKS manager with caching and fetch coalescing.
///
/// Cheap to clone; clones share one cache.
#[derive(Clone)]
pub struct JwksManager {
    /// JWKS URL (Clerk endpoint)
    jwks_url: String,
    /// Cache TTL
    cache_ttl: Duration,
    /// Minimum key set age before a `kid` miss triggers a refetch
    min_refresh_interval: Duration,
    /// Upper bound on a caller's wait for an in-flight fetch
    wait_timeout: Duration,
    /// How long a failed fetch is reported before retrying
    failure_backoff: Duration,
    /// When the last fetch failed, cleared on success
    failed_at: Arc<RwLock<Option<Instant>>>,
    /// Cached key set
    cache: Arc<RwLock<Option<Arc<SigningKeySet>>>>,
    /// Coalescing gate: the fetch currently running, if any
    in_flight: Arc<Mutex<Option<InFlightFetch>>>,
    /// HTTP client
    client: reqwest::Client,
}

impl JwksManager {
    /// Create a new JWKS manager with default timeouts.
    ///
    /// # Arguments
    /// - `jwks_url`: The JWKS endpoint URL (e.g., `https://api.clerk.dev/v1/jwks`)
    ///
    /// # Errors
    /// Fails if the HTTP client cannot be constructed.
    pub fn new(jwks_url: impl Into<String>) -> Result<Self, KeyFetchError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_FETCH_TIMEOUT)
            .build()
            .map_err(|e| KeyFetchError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(jwks_url, client))
    }

    /// Create a manager that fetches through an existing client.
    pub fn with_client(jwks_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            jwks_url: jwks_url.into(),
            cache_ttl: DEFAULT_CACHE_TTL,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            failure_backoff: DEFAULT_FAILURE_BACKOFF,
            failed_at: Arc::new(RwLock::new(None)),
            cache: Arc::new(RwLock::new(None)),
            in_flight: Arc::new(Mutex::new(None)),
            client,
        }
    }

    /// Create with custom cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Create with a custom minimum interval between `kid`-miss refreshes.
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Create with a custom bound on how long callers wait for a fetch.
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Create with a custom window during which a failed fetch is not retried.
    pub fn with_failure_backoff(mut self, backoff: Duration) -> Self {
        self.failure_backoff = backoff;
        self
    }

    /// Get the JWKS URL.
    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    /// Get the verification key for `kid`.
    ///
    /// Unknown key IDs trigger at most one refresh before failing with
    /// [`AuthError::KeyNotFound`].
    pub async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        let keys = self.fresh_keys().await.map_err(fetch_failed)?;
        if let Some(key) = keys.get(kid) {
            return Ok(key.clone());
        }

        if keys.age() < self.min_refresh_interval {
            tracing::debug!(kid, "Unknown key ID, key set too recent to refresh");
            return Err(AuthError::KeyNotFound);
        }

        tracing::info!(kid, "Unknown key ID, refreshing JWKS");
        let keys = self
            .refresh_after(Some(keys.fetched_at))
            .await
            .map_err(fetch_failed)?;
        keys.get(kid).cloned().ok_or(AuthError::KeyNotFound)
    }

    /// Force refresh the JWKS cache.
    ///
    /// Joins a fetch that is already running instead of starting another.
    pub async fn refresh(&self) -> Result<Arc<SigningKeySet>, KeyFetchError> {
        let seen = self.cached().await.map(|keys| keys.fetched_at);
        self.refresh_after(seen).await
    }

    /// Check if JWKS is currently cached and valid.
    pub async fn is_cached(&self) -> bool {
        self.cached()
            .await
            .is_some_and(|keys| keys.age() < self.cache_ttl)
    }

    /// The cached key set, whether or not it has expired.
    pub async fn cached(&self) -> Option<Arc<SigningKeySet>> {
        self.cache.read().await.clone()
    }

    /// Cached keys if still within TTL, otherwise a refreshed set.
    async fn fresh_keys(&self) -> Result<Arc<SigningKeySet>, KeyFetchError> {
        match self.cached().await {
            Some(keys) if keys.age() < self.cache_ttl => Ok(keys),
            stale => self.refresh_after(stale.map(|keys| keys.fetched_at)).await,
        }
    }

    /// Wait for a key set fetched after `seen` (`None`: any set).
    async fn refresh_after(
        &self,
        seen: Option<Instant>,
    ) -> Result<Arc<SigningKeySet>, KeyFetchError> {
        let fetch = {
            let mut in_flight = self.in_flight.lock().await;

            // Someone else refreshed while we waited for the gate.
            if let Some(current) = self.cached().await {
                if Some(current.fetched_at) > seen {
                    return Ok(current);
                }
            }

            let previous = in_flight
                .as_ref()
                .map(|fetch| (fetch.clone(), fetch.peek().cloned()));
            let backing_off = self
                .failed_at
                .read()
                .await
                .is_some_and(|at| at.elapsed() < self.failure_backoff);

            match previous {
                Some((fetch, None)) => fetch,
                Some((_, Some(Err(e)))) if backing_off => return Err(e),
                _ => {
                    let fetch = self.spawn_fetch();
                    *in_flight = Some(fetch.clone());
                    fetch
                }
            }
        };

        match tokio::time::timeout(self.wait_timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(KeyFetchError::WaitTimedOut(self.wait_timeout)),
        }
    }

    /// Start a fetch on a detached task and return a joinable handle to it.
    fn spawn_fetch(&self) -> InFlightFetch {
        let client = self.client.clone();
        let jwks_url = self.jwks_url.clone();
        let cache = Arc::clone(&self.cache);
        let failed_at = Arc::clone(&self.failed_at);

        let task = tokio::spawn(async move {
            let jwks = match fetch_jwks(&client, &jwks_url).await {
                Ok(jwks) => jwks,
                Err(e) => {
                    tracing::warn!(url = %jwks_url, error = %e, "JWKS fetch failed");
                    *failed_at.write().await = Some(Instant::now());
                    return Err(e);
                }
            };
            let keys = Arc::new(SigningKeySet::from_jwks(&jwks));
            tracing::info!(url = %jwks_url, keys = keys.len(), "JWKS cache refreshed");
            *cache.write().await = Some(Arc::clone(&keys));
            *failed_at.write().await = None;
            Ok::<_, KeyFetchError>(keys)
        });

        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(KeyFetchError::TaskFailed(e.to_string())),
            }
        }
        .boxed()
        .shared()
    }
}

/// Fetch JWKS from the endpoint.
async fn fetch_jwks(client: &reqwest::Client, jwks_url: &str) -> Result<JwkSet, KeyFetchError> {
    let response = client
        .get(jwks_url)
        .send()
        .await
        .map_err(|e| KeyFetchError::Request(e.to_string()))?;

    if !response.status().is_success() {
        return Err(KeyFetchError::Status(response.status().as_u16()));
    }

    response
        .json::<JwkSet>()
        .await
        .map_err(|e| KeyFetchError::InvalidBody(e.to_string()))
}

fn fetch_failed(e: KeyFetchError) -> AuthError {
    tracing::warn!(error = %e, "Signing keys unavailable");
    e.into()
}
