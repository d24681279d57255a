use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use url::Url;

use converge::Context;

use super::auth::{Authorizer, SignRequest, JSON_CONTENT_TYPE};
use super::error::ApiError;
use super::ratelimit::RateLimiter;
use super::response;
use crate::config::ProviderConfig;

const REQUEST_CLIENT: &str = concat!("terraform-provider-tencentcloud-rs/", env!("CARGO_PKG_VERSION"));

/// Tencent Cloud API client for one service
///
/// The client sends each action once; wrap calls in [`crate::retry`] helpers
/// to retry transient failures. Requests are signed by the given
/// [`Authorizer`], normally a [`Tc3Signer`](super::auth::Tc3Signer) built from
/// the provider credentials.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    endpoint: Url,
    service: String,
    version: String,
    region: String,
    security_token: Option<String>,
    authorizer: Arc<dyn Authorizer>,
    limiter: RateLimiter,
}

impl Client {
    /// Create a client with its own rate limiter
    pub fn new(
        service: &str,
        version: &str,
        config: &ProviderConfig,
        authorizer: Arc<dyn Authorizer>,
    ) -> Result<Self, ApiError> {
        let limiter = RateLimiter::new(config.rate_limit);
        Self::with_rate_limiter(service, version, config, authorizer, limiter)
    }

    /// Create a client sharing `limiter` with other service clients
    pub fn with_rate_limiter(
        service: &str,
        version: &str,
        config: &ProviderConfig,
        authorizer: Arc<dyn Authorizer>,
        limiter: RateLimiter,
    ) -> Result<Self, ApiError> {
        let endpoint = match &config.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!("https://{}.tencentcloudapi.com", service),
        };
        let endpoint = Url::parse(&endpoint)
            .map_err(|e| ApiError::Encode(format!("invalid endpoint '{}': {}", endpoint, e)))?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                endpoint,
                service: service.to_string(),
                version: version.to_string(),
                region: config.region.clone(),
                security_token: config.security_token.clone(),
                authorizer,
                limiter,
            }),
        })
    }

    pub fn service(&self) -> &str {
        &self.inner.service
    }

    pub fn region(&self) -> &str {
        &self.inner.region
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.inner.limiter
    }

    /// Send `action` with `request` as its JSON payload
    pub async fn call<Req, Resp>(&self, ctx: &Context, action: &str, request: &Req) -> Result<Resp, ApiError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_vec(request).map_err(|e| ApiError::Encode(e.to_string()))?;

        self.inner.limiter.check(action).await;

        let result = self.send(action, &payload).await;
        let body = String::from_utf8_lossy(&payload);
        match &result {
            Ok(_) => tracing::debug!(
                log_id = %ctx.log_id(),
                "api[{}] success, request body [{}]",
                action,
                body
            ),
            Err(e) => tracing::error!(
                log_id = %ctx.log_id(),
                "api[{}] fail, request body [{}], reason[{}]",
                action,
                body,
                e
            ),
        }
        result
    }

    async fn send<Resp: DeserializeOwned>(&self, action: &str, payload: &[u8]) -> Result<Resp, ApiError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let host = self.inner.endpoint.host_str().unwrap_or_default();

        let authorization = self
            .inner
            .authorizer
            .authorize(&SignRequest {
                service: &self.inner.service,
                action,
                host,
                payload,
                timestamp,
            })
            .await?;

        let mut request = self
            .inner
            .http_client
            .post(self.inner.endpoint.clone())
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .header(AUTHORIZATION, authorization)
            .header("X-TC-Action", action)
            .header("X-TC-Version", &self.inner.version)
            .header("X-TC-Region", &self.inner.region)
            .header("X-TC-Timestamp", timestamp.to_string())
            .header("X-TC-RequestClient", REQUEST_CLIENT);
        if let Some(token) = &self.inner.security_token {
            request = request.header("X-TC-Token", token);
        }

        let response = request.body(payload.to_vec()).send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        tracing::trace!("API response body: {}", text);

        response::decode(status, &text)
    }
}
