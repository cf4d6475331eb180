//! Shared error type and response helpers for the REST clients.

use turnero_core::ports::FetchError;

/// Errors from the REST collaborator layer.
#[derive(Debug, thiserror::Error)]
pub enum RestApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("backend API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl From<RestApiError> for FetchError {
    fn from(err: RestApiError) -> Self {
        match err {
            RestApiError::Request(e) => FetchError::Request(e.to_string()),
            RestApiError::ApiError { status, body } => FetchError::Response { status, body },
        }
    }
}

/// Ensure the response has a success status code. Returns the response
/// unchanged on success, or [`RestApiError::ApiError`] with the status
/// and body text on failure.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, RestApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(RestApiError::ApiError {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

/// Parse a successful JSON response body into the expected type.
pub(crate) async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, RestApiError> {
    let response = ensure_success(response).await?;
    Ok(response.json::<T>().await?)
}
