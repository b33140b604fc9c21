// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Claim policy applied to a signature-verified payload.
//!
//! `jsonwebtoken` is configured to check the signature only; required
//! claims and the validity window are enforced here so that every temporal
//! rule shares one clock and one leeway.

use serde_json::{Map, Value};

use super::{AuthError, VerifiedClaims};

/// Default clock skew tolerance (5 seconds).
pub const DEFAULT_CLOCK_SKEW_LEEWAY: u64 = 5;

/// Required-claim and validity-window rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimPolicy {
    leeway: i64,
}

impl Default for ClaimPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_CLOCK_SKEW_LEEWAY)
    }
}

impl ClaimPolicy {
    /// Create a policy tolerating `leeway_secs` of clock drift.
    pub fn new(leeway_secs: u64) -> Self {
        Self {
            leeway: i64::try_from(leeway_secs).unwrap_or(i64::MAX),
        }
    }

    pub fn leeway_secs(&self) -> u64 {
        self.leeway as u64
    }

    /// Check `claims` at time `now` (Unix seconds).
    ///
    /// - `sub` must be a non-empty string; `iat` and `exp` must be numeric.
    /// - `exp`: valid while `now < exp`. Leeway never extends expiry.
    /// - `iat` and `nbf` (when present) may not lie beyond `now + leeway`.
    pub fn enforce(&self, claims: Map<String, Value>, now: i64) -> Result<VerifiedClaims, AuthError> {
        let subject = match claims.get("sub").and_then(Value::as_str) {
            Some(sub) if !sub.is_empty() => sub.to_string(),
            _ => return Err(AuthError::MissingRequiredClaim),
        };
        let issued_at = numeric_claim(&claims, "iat")?.ok_or(AuthError::MissingRequiredClaim)?;
        let expires_at = numeric_claim(&claims, "exp")?.ok_or(AuthError::MissingRequiredClaim)?;

        if now >= expires_at {
            return Err(AuthError::Expired);
        }

        let latest_start = now.saturating_add(self.leeway);
        if issued_at > latest_start {
            tracing::debug!(issued_at, now, "Token issued in the future");
            return Err(AuthError::Expired);
        }
        if let Some(not_before) = numeric_claim(&claims, "nbf")? {
            if not_before > latest_start {
                tracing::debug!(not_before, now, "Token not yet valid");
                return Err(AuthError::Expired);
            }
        }

        Ok(VerifiedClaims::new(subject, issued_at, expires_at, claims))
    }
}

/// Read a NumericDate claim. Absent → `Ok(None)`; present but not a finite
/// number → `MissingRequiredClaim`.
fn numeric_claim(claims: &Map<String, Value>, name: &str) -> Result<Option<i64>, AuthError> {
    let Some(value) = claims.get(name) else {
        return Ok(None);
    };
    if let Some(secs) = value.as_i64() {
        return Ok(Some(secs));
    }
    match value.as_f64() {
        Some(secs) if secs.is_finite() => Ok(Some(secs.trunc() as i64)),
        _ => Err(AuthError::MissingRequiredClaim),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW: i64 = 1_700_000_000;

    fn claims(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("claims must be an object"),
        }
    }

    fn valid() -> Map<String, Value> {
        claims(json!({ "sub": "user_42", "iat": NOW - 60, "exp": NOW + 3600 }))
    }

    #[test]
    fn valid_claims_pass() {
        let verified = ClaimPolicy::default().enforce(valid(), NOW).unwrap();
        assert_eq!(verified.subject(), "user_42");
        assert_eq!(verified.issued_at(), NOW - 60);
        assert_eq!(verified.expires_at(), NOW + 3600);
    }

    #[test]
    fn each_required_claim_is_enforced() {
        for name in ["sub", "iat", "exp"] {
            let mut map = valid();
            map.remove(name);
            assert_eq!(
                ClaimPolicy::default().enforce(map, NOW),
                Err(AuthError::MissingRequiredClaim),
                "{name}"
            );
        }
    }

    #[test]
    fn empty_or_non_string_subject_is_rejected() {
        for sub in [json!(""), json!(42), json!(null), json!(["user"])] {
            let mut map = valid();
            map.insert("sub".to_string(), sub.clone());
            assert_eq!(
                ClaimPolicy::default().enforce(map, NOW),
                Err(AuthError::MissingRequiredClaim),
                "{sub}"
            );
        }
    }

    #[test]
    fn unparseable_timestamps_are_rejected() {
        let mut map = valid();
        map.insert("iat".to_string(), json!("yesterday"));
        assert_eq!(
            ClaimPolicy::default().enforce(map, NOW),
            Err(AuthError::MissingRequiredClaim)
        );
    }

    #[test]
    fn fractional_timestamps_are_truncated() {
        let mut map = valid();
        map.insert("exp".to_string(), json!((NOW + 10) as f64 + 0.75));
        let verified = ClaimPolicy::default().enforce(map, NOW).unwrap();
        assert_eq!(verified.expires_at(), NOW + 10);
    }

    #[test]
    fn expiry_is_strict_without_leeway() {
        let policy = ClaimPolicy::new(0);

        let mut map = valid();
        map.insert("exp".to_string(), json!(NOW));
        assert_eq!(policy.enforce(map, NOW), Err(AuthError::Expired));

        let mut map = valid();
        map.insert("exp".to_string(), json!(NOW + 1));
        assert!(policy.enforce(map, NOW).is_ok());
    }

    #[test]
    fn leeway_does_not_extend_expiry() {
        let policy = ClaimPolicy::new(5);

        let mut map = valid();
        map.insert("exp".to_string(), json!(NOW - 4));
        assert_eq!(policy.enforce(map, NOW), Err(AuthError::Expired));

        let mut map = valid();
        map.insert("exp".to_string(), json!(NOW));
        assert_eq!(policy.enforce(map, NOW), Err(AuthError::Expired));

        let mut map = valid();
        map.insert("exp".to_string(), json!(NOW - 10));
        assert_eq!(policy.enforce(map, NOW), Err(AuthError::Expired));
    }

    #[test]
    fn issued_in_the_future_is_rejected() {
        let policy = ClaimPolicy::new(5);

        let mut map = valid();
        map.insert("iat".to_string(), json!(NOW + 3));
        assert!(policy.enforce(map, NOW).is_ok());

        let mut map = valid();
        map.insert("iat".to_string(), json!(NOW + 60));
        assert_eq!(policy.enforce(map, NOW), Err(AuthError::Expired));
    }

    #[test]
    fn not_before_is_honoured_when_present() {
        let mut map = valid();
        map.insert("nbf".to_string(), json!(NOW + 600));
        assert_eq!(
            ClaimPolicy::default().enforce(map, NOW),
            Err(AuthError::Expired)
        );

        let mut map = valid();
        map.insert("nbf".to_string(), json!(NOW - 600));
        assert!(ClaimPolicy::default().enforce(map, NOW).is_ok());
    }

    #[test]
    fn extra_claims_are_preserved() {
        let mut map = valid();
        map.insert("sid".to_string(), json!("sess_1"));
        let verified = ClaimPolicy::default().enforce(map, NOW).unwrap();
        assert_eq!(verified.get("sid"), Some(&json!("sess_1")));
    }
}
