// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Authenticator strategies
//!
//! Selected once per listener from [`SecurityConfig`]: HMAC secret → HMAC,
//! else API key → API key, else none.

mod api_key;
mod signature;

use std::sync::Arc;

pub use self::api_key::ApiKeyAuthenticator;
pub use self::signature::{sign_request, HmacAuthenticator};

use crate::domain::auth::{AuthError, AuthRequest, Authenticator};
use crate::domain::gateway_config::{AuthMode, SecurityConfig};

/// Accepts every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAuthenticator;

impl Authenticator for NoAuthenticator {
    fn authenticate(&self, _request: &AuthRequest<'_>, _body: &[u8]) -> Result<(), AuthError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

pub fn build_authenticator(security: &SecurityConfig) -> Arc<dyn Authenticator> {
    match (security.mode(), &security.hmac_secret, &security.api_key) {
        (AuthMode::Hmac, Some(secret), _) => Arc::new(HmacAuthenticator::new(
            secret.clone(),
            security.signature_header.clone(),
            security.timestamp_header.clone(),
            security.max_clock_skew_ms,
        )),
        (AuthMode::ApiKey, _, Some(key)) => Arc::new(ApiKeyAuthenticator::new(key.clone())),
        _ => Arc::new(NoAuthenticator),
    }
}
