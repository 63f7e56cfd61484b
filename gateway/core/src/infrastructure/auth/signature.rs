// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Signed-request authentication
//!
//! Signature = hex(HMAC-SHA256(secret, "METHOD|PATH|TIMESTAMP|BODY")), where
//! TIMESTAMP is the verbatim header value in Unix milliseconds.

use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::domain::auth::{AuthError, AuthRequest, Authenticator};

type HmacSha256 = Hmac<Sha256>;

pub struct HmacAuthenticator {
    secret: String,
    signature_header: String,
    timestamp_header: String,
    max_clock_skew_ms: u64,
}

impl HmacAuthenticator {
    pub fn new(
        secret: impl Into<String>,
        signature_header: impl Into<String>,
        timestamp_header: impl Into<String>,
        max_clock_skew_ms: u64,
    ) -> Self {
        Self {
            secret: secret.into(),
            signature_header: signature_header.into(),
            timestamp_header: timestamp_header.into(),
            max_clock_skew_ms,
        }
    }

    fn header<'a>(request: &'a AuthRequest<'_>, name: &str) -> Option<&'a str> {
        request
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

fn mac_for(
    secret: &str,
    method: &str,
    path: &str,
    timestamp: &str,
    body: &[u8],
) -> Result<HmacSha256, InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
    mac.update(method.as_bytes());
    mac.update(b"|");
    mac.update(path.as_bytes());
    mac.update(b"|");
    mac.update(timestamp.as_bytes());
    mac.update(b"|");
    mac.update(body);
    Ok(mac)
}

/// Produce the lower-case hex signature a client must send.
pub fn sign_request(
    secret: &str,
    method: &str,
    path: &str,
    timestamp: &str,
    body: &[u8],
) -> Result<String, InvalidLength> {
    let mac = mac_for(secret, method, path, timestamp, body)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

impl Authenticator for HmacAuthenticator {
    fn authenticate(&self, request: &AuthRequest<'_>, body: &[u8]) -> Result<(), AuthError> {
        let signature = Self::header(request, &self.signature_header);
        let timestamp = Self::header(request, &self.timestamp_header);
        let (Some(signature), Some(timestamp)) = (signature, timestamp) else {
            return Err(AuthError::MissingSignature);
        };

        let ts_ms: i64 = timestamp.parse().map_err(|_| AuthError::InvalidTimestamp)?;
        let now_ms = chrono::Utc::now().timestamp_millis();
        if now_ms.abs_diff(ts_ms) > self.max_clock_skew_ms {
            return Err(AuthError::TimestampOutOfRange);
        }

        let provided = hex::decode(signature).map_err(|_| AuthError::InvalidSignature)?;
        mac_for(&self.secret, request.method, request.path, timestamp, body)
            .map_err(|_| AuthError::InvalidSignature)?
            .verify_slice(&provided)
            .map_err(|_| AuthError::InvalidSignature)
    }

    fn name(&self) -> &'static str {
        "hmac"
    }
}
