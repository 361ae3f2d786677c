//! HTTP transport for signed requests.

use std::future::Future;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::error::WatermarkError;
use crate::types::{Params, WatermarkingConfig};

/// HTTP method of an API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// Parameters travel in the query string.
    Get,
    /// Parameters travel in a form-encoded body.
    Post,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
        }
    }
}

/// A fully signed request, independent of the host it is sent to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    /// Path below `/watermarking/`, e.g. `deliver` or `available_files.json`.
    pub path: String,
    /// HTTP method.
    pub method: HttpMethod,
    /// Business parameters followed by `stamp`, `sig` and `token`.
    pub params: Params,
}

impl SignedRequest {
    /// Absolute URL of this request on `host`.
    pub fn url(&self, host: &str) -> String {
        format!("{}/watermarking/{}", host, self.path)
    }
}

/// Raw outcome of one attempt that reached the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: String,
}

/// Sends a signed request to one host.
///
/// Implementations return [`WatermarkError::Connection`] when no HTTP response
/// was obtained; status codes are classified by the dispatcher.
pub trait Transport: Send + Sync {
    /// Send `request` to the base URL `host`.
    fn send(
        &self,
        host: &str,
        request: &SignedRequest,
    ) -> impl Future<Output = Result<RawResponse, WatermarkError>> + Send;
}

/// [`Transport`] backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build the HTTP client from configuration.
    ///
    /// Certificates are verified unless
    /// [`danger_accept_invalid_certs`](WatermarkingConfig::danger_accept_invalid_certs)
    /// is set.
    pub fn new(config: &WatermarkingConfig) -> Result<Self, WatermarkError> {
        if config.danger_accept_invalid_certs {
            tracing::warn!("TLS certificate verification is disabled");
        }

        let client = reqwest::Client::builder()
            .default_headers(default_headers())
            .timeout(config.attempt_timeout)
            .danger_accept_invalid_certs(config.danger_accept_invalid_certs)
            .build()?;

        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    async fn send(
        &self,
        host: &str,
        request: &SignedRequest,
    ) -> Result<RawResponse, WatermarkError> {
        let url = request.url(host);
        let pairs = request.params.as_pairs();

        let builder = match request.method {
            HttpMethod::Get => self.client.get(&url).query(pairs),
            HttpMethod::Post => self.client.post(&url).form(pairs),
        };

        let resp = builder
            .send()
            .await
            .map_err(|e| WatermarkError::Connection(Box::new(e)))?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| WatermarkError::Connection(Box::new(e)))?;

        Ok(RawResponse { status, body })
    }
}

/// Headers sent with every request.
fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(concat!("elibri-watermarking/", env!("CARGO_PKG_VERSION"))),
    );
    headers
}
