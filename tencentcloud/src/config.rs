//! Provider configuration
//!
//! Values set explicitly (from the provider block) win; anything left unset
//! falls back to the `TENCENTCLOUD_*` environment variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::api::ratelimit::DEFAULT_REQUESTS_PER_SECOND;
use crate::retry::Timeouts;

pub const ENV_ENDPOINT: &str = "TENCENTCLOUD_ENDPOINT";
pub const ENV_REGION: &str = "TENCENTCLOUD_REGION";
pub const ENV_SECRET_ID: &str = "TENCENTCLOUD_SECRET_ID";
pub const ENV_SECRET_KEY: &str = "TENCENTCLOUD_SECRET_KEY";
pub const ENV_SECURITY_TOKEN: &str = "TENCENTCLOUD_SECURITY_TOKEN";
pub const ENV_READ_RETRY_TIMEOUT: &str = "TENCENTCLOUD_READ_RETRY_TIMEOUT";
pub const ENV_WRITE_RETRY_TIMEOUT: &str = "TENCENTCLOUD_WRITE_RETRY_TIMEOUT";
pub const ENV_RATE_LIMIT: &str = "TENCENTCLOUD_RATE_LIMIT";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} is required (set in provider config or {env} env var)")]
    Missing {
        field: &'static str,
        env: &'static str,
    },

    #[error("invalid endpoint '{0}': {1}")]
    InvalidEndpoint(String, String),

    #[error("invalid value '{value}' for {field}: expected a positive integer")]
    InvalidNumber { field: &'static str, value: String },
}

/// Settings as given in the provider block; every field is optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderSettings {
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub secret_id: Option<String>,
    pub secret_key: Option<String>,
    pub security_token: Option<String>,
    pub read_retry_timeout: Option<u64>,
    pub write_retry_timeout: Option<u64>,
    pub rate_limit: Option<u32>,
}

/// Fully resolved provider configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Overrides the per-service `https://<service>.tencentcloudapi.com` endpoint
    pub endpoint: Option<String>,
    pub region: String,
    pub secret_id: String,
    #[serde(skip_serializing)]
    pub secret_key: String,
    pub security_token: Option<String>,
    #[serde(default)]
    pub timeouts: Timeouts,
    pub rate_limit: u32,
}

impl ProviderConfig {
    /// Resolve `settings`, consulting the environment for unset fields
    pub fn resolve(settings: ProviderSettings) -> Result<Self, ConfigError> {
        let endpoint = settings.endpoint.or_else(|| env(ENV_ENDPOINT));
        if let Some(endpoint) = &endpoint {
            Url::parse(endpoint)
                .map_err(|e| ConfigError::InvalidEndpoint(endpoint.clone(), e.to_string()))?;
        }

        let region = settings
            .region
            .or_else(|| env(ENV_REGION))
            .ok_or(ConfigError::Missing {
                field: "region",
                env: ENV_REGION,
            })?;
        let secret_id = settings
            .secret_id
            .or_else(|| env(ENV_SECRET_ID))
            .ok_or(ConfigError::Missing {
                field: "secret_id",
                env: ENV_SECRET_ID,
            })?;
        let secret_key = settings
            .secret_key
            .or_else(|| env(ENV_SECRET_KEY))
            .ok_or(ConfigError::Missing {
                field: "secret_key",
                env: ENV_SECRET_KEY,
            })?;
        let security_token = settings.security_token.or_else(|| env(ENV_SECURITY_TOKEN));

        let defaults = Timeouts::default();
        let read = match settings.read_retry_timeout {
            Some(secs) => Some(positive("read_retry_timeout", secs)?),
            None => env_number("read_retry_timeout", ENV_READ_RETRY_TIMEOUT)?,
        };
        let write = match settings.write_retry_timeout {
            Some(secs) => Some(positive("write_retry_timeout", secs)?),
            None => env_number("write_retry_timeout", ENV_WRITE_RETRY_TIMEOUT)?,
        };
        let timeouts = Timeouts {
            read: read.map(Duration::from_secs).unwrap_or(defaults.read),
            write: write.map(Duration::from_secs).unwrap_or(defaults.write),
        };

        let rate_limit = match settings.rate_limit {
            Some(limit) => positive("rate_limit", u64::from(limit))?,
            None => env_number("rate_limit", ENV_RATE_LIMIT)?
                .unwrap_or(u64::from(DEFAULT_REQUESTS_PER_SECOND)),
        };
        let rate_limit = u32::try_from(rate_limit).unwrap_or(u32::MAX);

        Ok(Self {
            endpoint,
            region,
            secret_id,
            secret_key,
            security_token,
            timeouts,
            rate_limit,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(ProviderSettings::default())
    }
}

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn positive(field: &'static str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidNumber {
            field,
            value: value.to_string(),
        });
    }
    Ok(value)
}

fn env_number(field: &'static str, name: &str) -> Result<Option<u64>, ConfigError> {
    match env(name) {
        None => Ok(None),
        Some(value) => match value.parse::<u64>() {
            Ok(n) => positive(field, n).map(Some),
            Err(_) => Err(ConfigError::InvalidNumber { field, value }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ALL_VARS: &[&str] = &[
        ENV_ENDPOINT,
        ENV_REGION,
        ENV_SECRET_ID,
        ENV_SECRET_KEY,
        ENV_SECURITY_TOKEN,
        ENV_READ_RETRY_TIMEOUT,
        ENV_WRITE_RETRY_TIMEOUT,
        ENV_RATE_LIMIT,
    ];

    fn clear_env() {
        for var in ALL_VARS {
            std::env::remove_var(var);
        }
    }

    fn explicit() -> ProviderSettings {
        ProviderSettings {
            region: Some("ap-guangzhou".into()),
            secret_id: Some("AKIDexample".into()),
            secret_key: Some("secret".into()),
            ..Default::default()
        }
    }

    #[test]
    #[serial]
    fn explicit_settings_resolve_with_defaults() {
        clear_env();

        let config = ProviderConfig::resolve(explicit()).unwrap();
        assert_eq!(config.region, "ap-guangzhou");
        assert_eq!(config.endpoint, None);
        assert_eq!(config.timeouts, Timeouts::default());
        assert_eq!(config.rate_limit, DEFAULT_REQUESTS_PER_SECOND);
    }

    #[test]
    #[serial]
    fn environment_fills_unset_fields() {
        clear_env();
        std::env::set_var(ENV_REGION, "ap-shanghai");
        std::env::set_var(ENV_SECRET_ID, "AKIDenv");
        std::env::set_var(ENV_SECRET_KEY, "env-secret");
        std::env::set_var(ENV_READ_RETRY_TIMEOUT, "60");
        std::env::set_var(ENV_RATE_LIMIT, "5");

        let config = ProviderConfig::from_env().unwrap();
        assert_eq!(config.region, "ap-shanghai");
        assert_eq!(config.secret_id, "AKIDenv");
        assert_eq!(config.timeouts.read, Duration::from_secs(60));
        assert_eq!(config.timeouts.write, Duration::from_secs(300));
        assert_eq!(config.rate_limit, 5);

        let config = ProviderConfig::resolve(explicit()).unwrap();
        assert_eq!(config.region, "ap-guangzhou");

        clear_env();
    }

    #[test]
    #[serial]
    fn missing_region_is_reported() {
        clear_env();

        let err = ProviderConfig::resolve(ProviderSettings {
            region: None,
            ..explicit()
        })
        .unwrap_err();

        assert_eq!(
            err,
            ConfigError::Missing {
                field: "region",
                env: ENV_REGION
            }
        );
        assert!(err.to_string().contains("TENCENTCLOUD_REGION"));
    }

    #[test]
    #[serial]
    fn invalid_values_are_rejected() {
        clear_env();

        let err = ProviderConfig::resolve(ProviderSettings {
            endpoint: Some("not a url".into()),
            ..explicit()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEndpoint(..)));

        std::env::set_var(ENV_WRITE_RETRY_TIMEOUT, "soon");
        let err = ProviderConfig::resolve(explicit()).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidNumber {
                field: "write_retry_timeout",
                value: "soon".into()
            }
        );

        clear_env();
    }

    #[test]
    #[serial]
    fn explicit_zero_is_rejected_like_env() {
        clear_env();

        let err = ProviderConfig::resolve(ProviderSettings {
            write_retry_timeout: Some(0),
            ..explicit()
        })
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidNumber {
                field: "write_retry_timeout",
                value: "0".into()
            }
        );

        let err = ProviderConfig::resolve(ProviderSettings {
            read_retry_timeout: Some(0),
            ..explicit()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { field: "read_retry_timeout", .. }));

        let err = ProviderConfig::resolve(ProviderSettings {
            rate_limit: Some(0),
            ..explicit()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { field: "rate_limit", .. }));

        let config = ProviderConfig::resolve(ProviderSettings {
            read_retry_timeout: Some(u64::MAX),
            ..explicit()
        })
        .unwrap();
        assert_eq!(config.timeouts.read, Duration::from_secs(u64::MAX));

        std::env::set_var(ENV_READ_RETRY_TIMEOUT, "0");
        let err = ProviderConfig::resolve(explicit()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { field: "read_retry_timeout", .. }));

        clear_env();
    }

    #[test]
    #[serial]
    fn settings_deserialize_from_provider_block() {
        clear_env();

        let settings: ProviderSettings = serde_json::from_str(
            r#"{
                "region": "ap-beijing",
                "secret_id": "AKIDjson",
                "secret_key": "json-secret",
                "write_retry_timeout": 900
            }"#,
        )
        .unwrap();

        let config = ProviderConfig::resolve(settings).unwrap();
        assert_eq!(config.timeouts.write, Duration::from_secs(900));

        let rendered = serde_json::to_string(&config).unwrap();
        assert!(!rendered.contains("json-secret"));
    }
}
