// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use subtle::ConstantTimeEq;

use crate::domain::auth::{AuthError, AuthRequest, Authenticator, API_KEY_HEADER};

const BEARER_PREFIX: &str = "bearer ";

/// Shared-secret check against `X-API-Key`, falling back to
/// `Authorization: Bearer <key>`.
pub struct ApiKeyAuthenticator {
    api_key: String,
}

impl ApiKeyAuthenticator {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into().trim().to_string(),
        }
    }

    fn provided_key(request: &AuthRequest<'_>) -> Option<String> {
        let header = request
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(key) = header {
            return Some(key.to_string());
        }

        let authorization = request
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())?;
        let prefix = authorization.get(..BEARER_PREFIX.len())?;
        if !prefix.eq_ignore_ascii_case(BEARER_PREFIX) {
            return None;
        }
        let token = authorization[BEARER_PREFIX.len()..].trim();
        (!token.is_empty()).then(|| token.to_string())
    }
}

impl Authenticator for ApiKeyAuthenticator {
    fn authenticate(&self, request: &AuthRequest<'_>, _body: &[u8]) -> Result<(), AuthError> {
        let provided = Self::provided_key(request).ok_or(AuthError::MissingApiKey)?;

        if bool::from(provided.as_bytes().ct_eq(self.api_key.as_bytes())) {
            Ok(())
        } else {
            Err(AuthError::InvalidApiKey)
        }
    }

    fn name(&self) -> &'static str {
        "api_key"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, HeaderValue};

    fn check(headers: &HeaderMap) -> Result<(), AuthError> {
        let auth = ApiKeyAuthenticator::new("secret-key");
        auth.authenticate(
            &AuthRequest {
                method: "POST",
                path: "/webhook",
                headers,
            },
            b"",
        )
    }

    #[test]
    fn test_header_key() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("  secret-key "));
        assert!(check(&headers).is_ok());

        headers.insert("x-api-key", HeaderValue::from_static("wrong"));
        assert_eq!(check(&headers), Err(AuthError::InvalidApiKey));
    }

    #[test]
    fn test_bearer_fallback_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("bEaReR secret-key"));
        assert!(check(&headers).is_ok());
    }

    #[test]
    fn test_missing_key() {
        assert_eq!(check(&HeaderMap::new()), Err(AuthError::MissingApiKey));

        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(check(&headers), Err(AuthError::MissingApiKey));
    }

    #[test]
    fn test_prefix_of_key_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("secret"));
        assert_eq!(check(&headers), Err(AuthError::InvalidApiKey));
    }
}
