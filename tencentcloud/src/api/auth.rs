//! Request authorization
//!
//! Signing is delegated to an [`Authorizer`] so credentials can come from
//! static keys, a role, or a test double. [`Tc3Signer`] implements the
//! cloud's TC3-HMAC-SHA256 scheme.

use async_trait::async_trait;
use chrono::DateTime;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use super::ApiError;
use crate::config::ProviderConfig;

pub(crate) const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

const ALGORITHM: &str = "TC3-HMAC-SHA256";
const SIGNED_HEADERS: &str = "content-type;host";

type HmacSha256 = Hmac<Sha256>;

/// Everything an authorizer may sign over
#[derive(Debug, Clone, Copy)]
pub struct SignRequest<'a> {
    pub service: &'a str,
    pub action: &'a str,
    pub host: &'a str,
    pub payload: &'a [u8],
    pub timestamp: u64,
}

#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Produce the `Authorization` header value for one request
    async fn authorize(&self, request: &SignRequest<'_>) -> Result<String, ApiError>;
}

/// Signs each request with a secret id and key
#[derive(Clone)]
pub struct Tc3Signer {
    secret_id: String,
    secret_key: String,
}

impl Tc3Signer {
    pub fn new(secret_id: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            secret_id: secret_id.into(),
            secret_key: secret_key.into(),
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(config.secret_id.clone(), config.secret_key.clone())
    }

    fn sign(&self, request: &SignRequest<'_>) -> Result<String, ApiError> {
        if self.secret_id.is_empty() || self.secret_key.is_empty() {
            return Err(ApiError::Auth("secret id and key are required".to_string()));
        }

        let date = sign_date(request.timestamp)?;
        let scope = format!("{}/{}/tc3_request", date, request.service);
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            request.timestamp,
            scope,
            hex::encode(Sha256::digest(canonical_request(request.host, request.payload)))
        );

        let secret_date = hmac_sha256(format!("TC3{}", self.secret_key).as_bytes(), date.as_bytes())?;
        let secret_service = hmac_sha256(&secret_date, request.service.as_bytes())?;
        let secret_signing = hmac_sha256(&secret_service, b"tc3_request")?;
        let signature = hex::encode(hmac_sha256(&secret_signing, string_to_sign.as_bytes())?);

        Ok(format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, self.secret_id, scope, SIGNED_HEADERS, signature
        ))
    }
}

impl std::fmt::Debug for Tc3Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tc3Signer")
            .field("secret_id", &self.secret_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Authorizer for Tc3Signer {
    async fn authorize(&self, request: &SignRequest<'_>) -> Result<String, ApiError> {
        self.sign(request)
    }
}

/// Sends a fixed, pre-computed authorization value
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl Authorizer for StaticToken {
    async fn authorize(&self, _request: &SignRequest<'_>) -> Result<String, ApiError> {
        if self.0.is_empty() {
            return Err(ApiError::Auth("empty authorization token".to_string()));
        }
        Ok(self.0.clone())
    }
}

fn canonical_request(host: &str, payload: &[u8]) -> String {
    format!(
        "POST\n/\n\ncontent-type:{}\nhost:{}\n\n{}\n{}",
        JSON_CONTENT_TYPE,
        host.to_ascii_lowercase(),
        SIGNED_HEADERS,
        hex::encode(Sha256::digest(payload))
    )
}

// UTC date of the request, as used in the credential scope
fn sign_date(timestamp: u64) -> Result<String, ApiError> {
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|time| time.format("%Y-%m-%d").to_string())
        .ok_or_else(|| ApiError::Auth(format!("timestamp {} out of range", timestamp)))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, ApiError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| ApiError::Auth(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}
