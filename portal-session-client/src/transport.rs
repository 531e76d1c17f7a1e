//! HTTP transport behind the session client.
//!
//! The [`Transport`] trait is the seam between the coordinator and the
//! network. [`HttpTransport`] is the reqwest implementation; tests swap in
//! scripted transports.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method};
use tracing::debug;
use url::Url;

use crate::types::{ApiResponse, ClientError};

/// A fully decorated request, ready for the wire.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

/// Failure to obtain any response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The uniform request timeout elapsed.
    #[error("request timed out")]
    Timeout,

    /// Connection, TLS, or body read failure.
    #[error("server unreachable: {message}")]
    Unreachable { message: String },
}

/// Sends decorated requests.
///
/// Any HTTP status, including 401 and 5xx, is a successful send; only the
/// absence of a response is a [`TransportError`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<ApiResponse, TransportError>;
}

/// reqwest-backed transport.
///
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport applying `timeout` to every request.
    pub fn new(timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

fn classify(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Unreachable {
            message: error.to_string(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: OutboundRequest) -> Result<ApiResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(classify)?;

        debug!(method = %request.method, url = %request.url, %status, "Received response");

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}
