//! HTTP utilities for GCP REST API calls

use super::error::{Error, Result};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = match body.char_indices().nth(MAX_LOG_BODY_LENGTH) {
        Some((cut, _)) => format!("{}... [truncated, {} bytes total]", &body[..cut], body.len()),
        None => body.to_string(),
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Google API error envelope: `{"error": {"code": 404, "message": "...", "status": "NOT_FOUND"}}`
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Build the lookup error for a non-success response
fn remote_error(status: StatusCode, body: &str) -> Error {
    let detail = serde_json::from_str::<ErrorEnvelope>(body).ok().map(|e| e.error);
    let (message, code) = match detail {
        Some(detail) => (detail.message, detail.status),
        None => (None, None),
    };

    Error::RemoteLookup {
        status: Some(status.as_u16()),
        code,
        message: message.unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("API request failed")
                .to_string()
        }),
    }
}

/// HTTP client wrapper for GCP API calls
#[derive(Clone)]
pub struct GcpHttpClient {
    client: Client,
}

impl GcpHttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(format!("cloud-run-image/{}", crate::VERSION))
            .build()
            .map_err(|e| Error::transport(&e))?;

        Ok(Self { client })
    }

    /// Make a GET request to a GCP API and decode the JSON body
    pub async fn get<T: DeserializeOwned>(&self, url: &str, token: &str) -> Result<T> {
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Request to {} failed: {}", url, e);
                Error::transport(&e)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| Error::transport(&e))?;

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(remote_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| Error::RemoteLookup {
            status: Some(status.as_u16()),
            code: None,
            message: format!("Failed to parse response JSON: {}", e),
        })
    }
}
