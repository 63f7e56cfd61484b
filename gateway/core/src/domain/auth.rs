// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Request authentication port.
//!
//! Implementations live in `infrastructure::auth`; the front door calls
//! [`Authenticator::authenticate`] once per request, before anything else,
//! with the verbatim body bytes.

use http::HeaderMap;

/// Canonical name of the API key header.
pub const API_KEY_HEADER: &str = "X-API-Key";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing API key")]
    MissingApiKey,

    #[error("invalid API key")]
    InvalidApiKey,

    #[error("missing signature or timestamp")]
    MissingSignature,

    #[error("invalid timestamp format")]
    InvalidTimestamp,

    #[error("timestamp out of range")]
    TimestampOutOfRange,

    #[error("invalid signature")]
    InvalidSignature,
}

/// The parts of a request an authenticator may inspect.
#[derive(Debug, Clone, Copy)]
pub struct AuthRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub headers: &'a HeaderMap,
}

pub trait Authenticator: Send + Sync {
    fn authenticate(&self, request: &AuthRequest<'_>, body: &[u8]) -> Result<(), AuthError>;

    /// Short strategy name for logs.
    fn name(&self) -> &'static str;
}
