//! Response envelope handling for the Tencent Cloud API
//!
//! Every action answers `{"Response": {...}}`. Failures carry an `Error`
//! object inside `Response`; successes carry the action's fields next to
//! `RequestId`.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::ApiError;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "Response")]
    response: Value,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "Code")]
    code: String,
    #[serde(rename = "Message", default)]
    message: String,
}

/// Decode a response body into `T`, surfacing API errors as [`ApiError::Service`]
pub fn decode<T: DeserializeOwned>(status: u16, text: &str) -> Result<T, ApiError> {
    let envelope = match serde_json::from_str::<Envelope>(text) {
        Ok(envelope) => envelope,
        Err(e) if (200..300).contains(&status) => {
            tracing::error!("Failed to parse response: {}, body: {}", e, text);
            return Err(ApiError::Parse(e.to_string()));
        }
        Err(_) => {
            return Err(ApiError::HttpStatus {
                status,
                body: text.to_string(),
            })
        }
    };

    let request_id = envelope
        .response
        .get("RequestId")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if let Some(error) = envelope.response.get("Error") {
        let body: ErrorBody =
            serde_json::from_value(error.clone()).map_err(|e| ApiError::Parse(e.to_string()))?;
        return Err(ApiError::Service {
            code: body.code,
            message: body.message,
            request_id,
        });
    }

    if !(200..300).contains(&status) {
        return Err(ApiError::HttpStatus {
            status,
            body: text.to_string(),
        });
    }

    serde_json::from_value(envelope.response).map_err(|e| {
        tracing::error!("Failed to deserialize response: {}, body: {}", e, text);
        ApiError::Parse(e.to_string())
    })
}
