//! HTTP transport seam.
//!
//! The gateway only ever talks to an [`HttpTransport`]: a request goes in as
//! method, path, headers and an optional JSON body; status, content type and
//! raw body come back. [`ReqwestTransport`] is the production implementation.
//! Tests substitute a scripted transport.

use crate::config::ClientConfig;
use crate::errors::{Error, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

/// HTTP verbs used by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outbound call, relative to the configured base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl HttpRequest {
    /// A body-less request that accepts JSON.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: vec![("accept".to_string(), "application/json".to_string())],
            body: None,
        }
    }

    /// A request carrying a JSON body.
    #[must_use]
    pub fn with_json(method: Method, path: impl Into<String>, body: Value) -> Self {
        let mut request = Self::new(method, path);
        request
            .headers
            .push(("content-type".to_string(), "application/json".to_string()));
        request.body = Some(body);
        request
    }
}

/// What came back, uninterpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl HttpResponse {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// The injectable request/response primitive.
///
/// An `Err` means the request could not be completed at all (DNS, connect,
/// reset). Any HTTP status, including 5xx, is an `Ok` response.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Transport over `reqwest`, bound to one base URL.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    /// Builds a client from configuration. No timeout unless one is configured.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().map_err(|e| Error::Config {
            message: format!("Failed to build HTTP client: {e}"),
        })?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };
        let mut builder = self.client.request(method, self.url(&request.path));
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;
        debug!("Received {} ({:?}, {} bytes)", status, content_type, body.len());

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}
