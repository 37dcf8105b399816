//! HMAC request signing for watch-originated calls.
//!
//! Once a device has a secret, every protected request must carry:
//!
//! | header             | value                                   |
//! |--------------------|-----------------------------------------|
//! | `X-Watch-UUID`     | device id                               |
//! | `X-Timestamp`      | epoch milliseconds, within ±5 minutes   |
//! | `X-Nonce`          | single use within 300 s                 |
//! | `X-Content-SHA256` | lowercase hex SHA-256 of the raw body   |
//! | `X-Signature`      | base64 HMAC-SHA256 of the canonical form |
//!
//! Canonical form: `METHOD\nPATH[?QUERY]\nTIMESTAMP\nNONCE\nCONTENT_SHA256`.
//! A device without a secret passes through unsigned so it can bootstrap.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::storage::KeyValueStore;

type HmacSha256 = Hmac<Sha256>;

pub const HEADER_UUID: &str = "x-watch-uuid";
pub const HEADER_TIMESTAMP: &str = "x-timestamp";
pub const HEADER_NONCE: &str = "x-nonce";
pub const HEADER_CONTENT_SHA256: &str = "x-content-sha256";
pub const HEADER_SIGNATURE: &str = "x-signature";

const MAX_SKEW_MS: i64 = 5 * 60 * 1000;
const NONCE_TTL: Duration = Duration::from_secs(300);
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
const SECRET_PREFIX: &str = "device:secret:";
const NONCE_PREFIX: &str = "device:nonce:";

/// Device secrets and nonce bookkeeping in the key-value store.
#[derive(Clone)]
pub struct DeviceAuth {
    kv: Arc<dyn KeyValueStore>,
}

impl DeviceAuth {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub async fn secret(&self, uuid: &str) -> Result<Option<String>, AppError> {
        Ok(self
            .kv
            .get(&format!("{SECRET_PREFIX}{uuid}"))
            .await?
            .filter(|s| !s.trim().is_empty()))
    }

    /// Provisions a 32-byte random secret if the device has none.
    /// Returns the new secret, or `None` if one already existed.
    pub async fn provision_secret(&self, uuid: &str) -> Result<Option<String>, AppError> {
        if self.secret(uuid).await?.is_some() {
            return Ok(None);
        }
        let mut buf = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut buf);
        let secret = STANDARD.encode(buf);
        self.kv.set(&format!("{SECRET_PREFIX}{uuid}"), &secret).await?;
        info!(device = uuid, "Provisioned device secret");
        Ok(Some(secret))
    }

    /// Returns false when the nonce was already seen inside the window.
    async fn register_nonce(&self, uuid: &str, nonce: &str) -> Result<bool, AppError> {
        self.kv
            .set_if_absent(&format!("{NONCE_PREFIX}{uuid}:{nonce}"), "1", NONCE_TTL)
            .await
    }
}

pub fn content_sha256(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

pub fn canonical_string(
    method: &str,
    path_and_query: &str,
    timestamp: &str,
    nonce: &str,
    content_sha: &str,
) -> String {
    [
        method.to_uppercase().as_str(),
        path_and_query,
        timestamp,
        nonce,
        content_sha,
    ]
    .join("\n")
}

/// Base64 HMAC-SHA256 keyed by the secret's text form.
pub fn sign(secret: &str, canonical: &str) -> Result<String, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid HMAC key: {e}")))?;
    mac.update(canonical.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

struct SignedHeaders {
    timestamp: String,
    nonce: String,
    content_sha: String,
    signature: String,
}

impl SignedHeaders {
    fn from_headers(headers: &HeaderMap) -> Result<Self, AppError> {
        let get = |name: &str| -> Result<String, AppError> {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| AppError::Validation("missing HMAC headers".into()))
        };
        Ok(Self {
            timestamp: get(HEADER_TIMESTAMP)?,
            nonce: get(HEADER_NONCE)?,
            content_sha: get(HEADER_CONTENT_SHA256)?,
            signature: get(HEADER_SIGNATURE)?,
        })
    }
}

/// Middleware guarding watch endpoints.
pub async fn verify_device_signature(
    State(auth): State<DeviceAuth>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let uuid = request
        .headers()
        .get(HEADER_UUID)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    let secret = match &uuid {
        Some(uuid) => auth.secret(uuid).await?,
        None => None,
    };
    let (Some(uuid), Some(secret)) = (uuid, secret) else {
        return Ok(next.run(request).await);
    };

    let (parts, body) = request.into_parts();
    let signed = SignedHeaders::from_headers(&parts.headers)?;

    let timestamp: i64 = signed
        .timestamp
        .parse()
        .map_err(|_| AppError::Validation("invalid timestamp".into()))?;
    if !within_skew(Utc::now().timestamp_millis(), timestamp) {
        warn!(device = %uuid, timestamp, "Signed request outside the time window");
        return Err(AppError::Forbidden("timestamp skew too large".into()));
    }

    let body = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| AppError::Validation(format!("failed to read body: {e}")))?;
    if !constant_time_eq(&content_sha256(&body), &signed.content_sha.to_lowercase()) {
        warn!(device = %uuid, "Body hash mismatch");
        return Err(AppError::Unauthorized("content SHA mismatch".into()));
    }

    if !auth.register_nonce(&uuid, &signed.nonce).await? {
        warn!(device = %uuid, nonce = %signed.nonce, "Nonce replay");
        return Err(AppError::Forbidden("replay detected".into()));
    }

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| parts.uri.path());
    let canonical = canonical_string(
        parts.method.as_str(),
        path_and_query,
        &signed.timestamp,
        &signed.nonce,
        &signed.content_sha,
    );
    if !constant_time_eq(&sign(&secret, &canonical)?, &signed.signature) {
        warn!(device = %uuid, "Invalid request signature");
        return Err(AppError::Unauthorized("invalid signature".into()));
    }

    Ok(next.run(Request::from_parts(parts, Body::from(body))).await)
}

/// A distance too large for `i64` is outside any window.
fn within_skew(now_ms: i64, timestamp_ms: i64) -> bool {
    now_ms
        .checked_sub(timestamp_ms)
        .is_some_and(|skew| skew.unsigned_abs() <= MAX_SKEW_MS.unsigned_abs())
}
