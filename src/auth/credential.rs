// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer credential extraction from the `Authorization` header.

use std::fmt;

use axum::http::{header::AUTHORIZATION, HeaderMap};

use super::AuthError;

/// Scheme accepted by [`Credential::from_header`] (compared case-insensitively).
pub const BEARER_SCHEME: &str = "Bearer";

/// A `(scheme, token)` pair taken from an `Authorization` header.
///
/// Request-scoped. The `Debug` output never includes the token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    scheme: String,
    token: String,
}

impl Credential {
    /// Parse a raw `Authorization` header value.
    ///
    /// The value must split on whitespace into exactly two non-empty parts,
    /// the first of which is `Bearer` in any letter case.
    pub fn from_header(header: Option<&str>) -> Result<Self, AuthError> {
        let header = header.ok_or(AuthError::MissingHeader)?;

        let mut parts = header.split_whitespace();
        let (scheme, token) = match (parts.next(), parts.next(), parts.next()) {
            (Some(scheme), Some(token), None) => (scheme, token),
            _ => return Err(AuthError::MalformedHeader),
        };

        if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
            return Err(AuthError::UnsupportedScheme);
        }

        Ok(Self {
            scheme: scheme.to_string(),
            token: token.to_string(),
        })
    }

    /// Extract the credential from request headers.
    ///
    /// A header value that is not visible ASCII counts as malformed.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AuthError> {
        let value = match headers.get(AUTHORIZATION) {
            Some(value) => Some(value.to_str().map_err(|_| AuthError::MalformedHeader)?),
            None => None,
        };
        Self::from_header(value)
    }

    /// The scheme exactly as the client sent it.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The raw token.
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("scheme", &self.scheme)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn missing_header_is_rejected() {
        assert_eq!(Credential::from_header(None), Err(AuthError::MissingHeader));
    }

    #[test]
    fn bearer_token_is_extracted() {
        let credential = Credential::from_header(Some("Bearer abc.def.ghi")).unwrap();
        assert_eq!(credential.scheme(), "Bearer");
        assert_eq!(credential.token(), "abc.def.ghi");
    }

    #[test]
    fn scheme_is_case_insensitive() {
        for header in ["bearer tok", "BEARER tok", "bEaReR tok"] {
            let credential = Credential::from_header(Some(header)).unwrap();
            assert_eq!(credential.token(), "tok");
        }
    }

    #[test]
    fn surrounding_whitespace_is_tolerated() {
        let credential = Credential::from_header(Some("  Bearer \t tok  ")).unwrap();
        assert_eq!(credential.token(), "tok");
    }

    #[test]
    fn wrong_number_of_parts_is_malformed() {
        for header in ["", "   ", "Bearer", "Bearer a b", "tok", "Bearer  a  b  c"] {
            assert_eq!(
                Credential::from_header(Some(header)),
                Err(AuthError::MalformedHeader),
                "{header:?}"
            );
        }
    }

    #[test]
    fn other_schemes_are_unsupported() {
        for header in ["Token abc.def.ghi", "Basic dXNlcjpwYXNz", "Bearer: tok"] {
            assert_eq!(
                Credential::from_header(Some(header)),
                Err(AuthError::UnsupportedScheme),
                "{header:?}"
            );
        }
    }

    #[test]
    fn from_headers_reads_authorization() {
        let mut headers = HeaderMap::new();
        assert_eq!(
            Credential::from_headers(&headers),
            Err(AuthError::MissingHeader)
        );

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer tok"));
        assert_eq!(Credential::from_headers(&headers).unwrap().token(), "tok");
    }

    #[test]
    fn non_ascii_header_is_malformed() {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_bytes(b"Bearer \xfftoken").unwrap(),
        );
        assert_eq!(
            Credential::from_headers(&headers),
            Err(AuthError::MalformedHeader)
        );
    }

    #[test]
    fn debug_redacts_token() {
        let credential = Credential::from_header(Some("Bearer super-secret-token")).unwrap();
        let rendered = format!("{credential:?}");
        assert!(!rendered.contains("super-secret-token"));
        assert!(rendered.contains("<redacted>"));
    }
}
