use futures::stream::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

use super::types::SourceSettings;

const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while loading a page from an upstream API.
///
/// There is no retry here: a failed load is reported once and the next
/// trigger starts over.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// Body is not JSON, or lacks the `results` array
    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Request URL for the primary feed: the endpoint plus the API key.
pub fn primary_request_url(source: &SourceSettings, api_key: Option<&SecretString>) -> Url {
    let mut url = source.endpoint.clone();
    if let Some(key) = api_key {
        url.query_pairs_mut()
            .append_pair("api-key", key.expose_secret());
    }
    url
}

/// Request URL for one secondary page.
pub fn secondary_request_url(
    source: &SourceSettings,
    api_key: Option<&SecretString>,
    offset: usize,
    limit: usize,
) -> Url {
    let mut url = primary_request_url(source, api_key);
    url.query_pairs_mut()
        .append_pair("offset", &offset.to_string())
        .append_pair("limit", &limit.to_string());
    url
}

/// GET a JSON document and return it undecoded past `serde_json::Value`.
///
/// The raw value is what the cache stores; envelope validation happens in
/// the caller so cached and fresh payloads go through the same check.
///
/// # Errors
///
/// - [`FetchError::Network`] - Connection or TLS errors
/// - [`FetchError::HttpStatus`] - Non-2xx HTTP response
/// - [`FetchError::ResponseTooLarge`] - Response exceeded 10MB
/// - [`FetchError::IncompleteResponse`] - Body shorter than Content-Length
/// - [`FetchError::Malformed`] - Body is not valid JSON
pub async fn fetch_payload(
    client: &reqwest::Client,
    url: Url,
) -> Result<serde_json::Value, FetchError> {
    let endpoint = redacted(&url);
    // `without_url` keeps the API key out of error messages.
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| FetchError::Network(e.without_url()))?;

    if !response.status().is_success() {
        tracing::debug!(endpoint = %endpoint, status = %response.status(), "Upstream returned error status");
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    let bytes = read_limited_bytes(response, MAX_RESPONSE_SIZE).await?;
    tracing::debug!(endpoint = %endpoint, bytes = bytes.len(), "Fetched upstream payload");

    serde_json::from_slice(&bytes).map_err(|e| FetchError::Malformed(e.to_string()))
}

/// Endpoint without its query string, for logs. Keeps the API key out of them.
fn redacted(url: &Url) -> String {
    let mut clean = url.clone();
    clean.set_query(None);
    clean.into()
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| FetchError::Network(e.without_url()))?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
