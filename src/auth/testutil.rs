// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token minting helpers and key fixtures for tests.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};

/// Shared secret used by symmetric-mode tests.
pub const SECRET: &str = "s3cret";

pub const PRIMARY_KID: &str = "clerk-2026-primary";
pub const ROTATED_KID: &str = "clerk-2026-rotated";

/// RSA private keys (PKCS#1) whose public halves are in `testdata/jwks.json`.
pub const PRIMARY_PEM: &str = include_str!("testdata/primary_rsa.pem");
pub const ROTATED_PEM: &str = include_str!("testdata/rotated_rsa.pem");

const JWKS_FIXTURE: &str = include_str!("testdata/jwks.json");

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// `sub`, `iat = now`, `exp = now + expires_in`, plus a Clerk session ID.
pub fn standard_claims(subject: &str, expires_in: i64) -> Value {
    let now = now();
    json!({
        "sub": subject,
        "iat": now,
        "exp": now + expires_in,
        "sid": "sess_test",
    })
}

pub fn hs256_token(secret: &str, claims: &Value) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("HS256 signing")
}

pub fn rs256_token(kid: &str, private_pem: &str, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let key = EncodingKey::from_rsa_pem(private_pem.as_bytes()).expect("fixture key");
    encode(&header, claims, &key).expect("RS256 signing")
}

/// JWKS document containing only the fixture keys named in `kids`.
pub fn jwks_document(kids: &[&str]) -> Value {
    let fixture: Value = serde_json::from_str(JWKS_FIXTURE).expect("jwks fixture");
    let keys: Vec<Value> = fixture["keys"]
        .as_array()
        .expect("keys array")
        .iter()
        .filter(|key| kids.iter().any(|kid| key["kid"] == *kid))
        .cloned()
        .collect();
    json!({ "keys": keys })
}

/// Flip every bit of one byte of the token's decoded signature.
pub fn tamper_signature(token: &str, index: usize) -> String {
    let (signing_input, signature) = token.rsplit_once('.').expect("three-part token");
    let mut bytes = URL_SAFE_NO_PAD.decode(signature).expect("base64url signature");
    bytes[index] ^= 0xff;
    format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(bytes))
}
