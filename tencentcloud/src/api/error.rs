use converge::ErrorCode;
use thiserror::Error;

use crate::retry::codes;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("[TencentCloudSDKError] Code={code}, Message={message}, RequestId={request_id}")]
    Service {
        code: String,
        message: String,
        request_id: String,
    },

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Failed to encode request: {0}")]
    Encode(String),
}

impl ApiError {
    pub fn service(
        code: impl Into<String>,
        message: impl Into<String>,
        request_id: impl Into<String>,
    ) -> Self {
        ApiError::Service {
            code: code.into(),
            message: message.into(),
            request_id: request_id.into(),
        }
    }

    /// Request id assigned by the API, when the request reached it
    pub fn request_id(&self) -> Option<&str> {
        match self {
            ApiError::Service { request_id, .. } => Some(request_id),
            _ => None,
        }
    }

    /// Whether the API reported the target resource as missing
    pub fn is_not_found(&self) -> bool {
        self.code().is_some_and(|code| {
            code == codes::RESOURCE_NOT_FOUND
                || code.starts_with(&format!("{}.", codes::RESOURCE_NOT_FOUND))
        })
    }
}

impl ErrorCode for ApiError {
    fn code(&self) -> Option<&str> {
        match self {
            ApiError::Service { code, .. } => Some(code),
            ApiError::Request(_) => Some(codes::CLIENT_NETWORK_ERROR),
            ApiError::HttpStatus { .. } => Some(codes::CLIENT_HTTP_STATUS_ERROR),
            ApiError::Parse(_) => Some(codes::CLIENT_PARSE_ERROR),
            ApiError::Auth(_) => Some(codes::AUTH_FAILURE),
            ApiError::Encode(_) => None,
        }
    }
}
