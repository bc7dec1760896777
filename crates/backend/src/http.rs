//! Response handling shared by all backend clients.

use crate::config::BackendConfig;
use crate::error::BackendError;

/// Build the pooled HTTP client used by every API wrapper.
pub fn build_client(config: &BackendConfig) -> Result<reqwest::Client, BackendError> {
    Ok(reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()?)
}

/// Ensure the response has a success status code. Returns the response
/// unchanged on success, or a [`BackendError::Api`] containing the
/// status and body text on failure.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(BackendError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

/// Parse a successful JSON response body into the expected type.
///
/// Body decoding failures are reported as [`BackendError::Decode`]
/// tagged with `endpoint`.
pub(crate) async fn parse_response<T: serde::de::DeserializeOwned>(
    endpoint: &'static str,
    response: reqwest::Response,
) -> Result<T, BackendError> {
    let response = ensure_success(response).await?;
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| BackendError::Decode {
        endpoint,
        reason: e.to_string(),
    })
}

/// Assert the response has a success status code, discarding the body.
pub(crate) async fn check_status(response: reqwest::Response) -> Result<(), BackendError> {
    ensure_success(response).await?;
    Ok(())
}
