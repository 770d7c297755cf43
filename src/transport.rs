//! HTTP transport boundary.
//!
//! The client hands a fully built and signed [`WireRequest`] to a
//! [`Transport`] and gets back the buffered response. The default
//! implementation uses `reqwest`; tests and embedders inject their own.

use crate::client::create_rest_client;
use crate::error::Result;
use crate::request::{Body, HttpMethod, WireRequest};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Client;
use thiserror::Error;

/// Failure of the transport before any response was obtained
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
    timeout: bool,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        TransportError {
            message: message.into(),
            timeout: false,
            source: None,
        }
    }

    /// A transport error that wraps an underlying cause
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        TransportError {
            message: message.into(),
            timeout: false,
            source: Some(source.into()),
        }
    }

    /// A transport error caused by a caller or client timeout
    pub fn timed_out(message: impl Into<String>) -> Self {
        TransportError {
            message: message.into(),
            timeout: true,
            source: None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.timeout
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError {
            message: err.to_string(),
            timeout: err.is_timeout(),
            source: Some(Box::new(err)),
        }
    }
}

/// Buffered HTTP response as seen by the normalizer
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        TransportResponse {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Body as text, replacing invalid UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Injectable HTTP capability
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and buffer its response. Called exactly once per request.
    async fn send(&self, request: WireRequest) -> std::result::Result<TransportResponse, TransportError>;
}

/// Transport backed by a pooled `reqwest` client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport with the default client settings
    pub fn new() -> Result<Self> {
        Ok(ReqwestTransport {
            client: create_rest_client()?,
        })
    }

    /// Wrap an existing reqwest client
    pub fn with_client(client: Client) -> Self {
        ReqwestTransport { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: WireRequest) -> std::result::Result<TransportResponse, TransportError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
        };

        let mut builder = self
            .client
            .request(method, request.url)
            .headers(request.headers);

        builder = match request.body {
            Body::Empty => builder,
            Body::Json(bytes) => builder.body(bytes),
            Body::Multipart { bytes, .. } => builder.body(bytes),
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(TransportResponse { status, headers, body })
    }
}
