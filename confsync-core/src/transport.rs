//! HTTP transport with bounded retry.
//!
//! A single network attempt is delegated to an `HttpExchange`. The `Transport` wraps an exchange
//! and retries attempts which fail at the network level: connection, DNS, timeout or body read
//! errors. HTTP status codes are never retried, a 4xx or 5xx is a normal response which callers
//! must interpret.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode};

use crate::error::{Error, Result};

/// The maximum number of attempts made for a single request.
pub const MAX_ATTEMPTS: u32 = 5;
/// The default per-attempt timeout used by the reqwest exchange.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// An outbound HTTP request.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    /// Create a new request with no headers and no body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Set a header on this request, replacing any previous value.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the body of this request.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// A fully buffered HTTP response.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self { status, body: body.into() }
    }

    /// A short human readable description of a non-success response, for error reporting.
    pub fn describe_failure(&self) -> String {
        let body = String::from_utf8_lossy(&self.body);
        let body = body.trim();
        if body.is_empty() {
            format!("server responded with status {}", self.status)
        } else {
            format!("server responded with status {}: {}", self.status, truncate(body, 256))
        }
    }
}

/// A type capable of performing a single HTTP request attempt.
///
/// Returning an `Err` signals a network level failure, which the `Transport` may retry. Any
/// response received from the server, regardless of status, must be returned as `Ok`.
#[async_trait]
pub trait HttpExchange: Send + Sync + 'static {
    async fn exchange(&self, req: &HttpRequest) -> anyhow::Result<HttpResponse>;
}

/// An `HttpExchange` backed by a `reqwest` client.
pub struct ReqwestExchange {
    client: reqwest::Client,
}

impl ReqwestExchange {
    /// Create a new instance where each attempt is bounded by the given timeout.
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("error building HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpExchange for ReqwestExchange {
    async fn exchange(&self, req: &HttpRequest) -> anyhow::Result<HttpResponse> {
        let mut builder = self.client.request(req.method.clone(), req.url.as_str()).headers(req.headers.clone());
        if let Some(body) = &req.body {
            builder = builder.body(body.clone());
        }
        let res = builder.send().await.context("error sending request")?;
        let status = res.status();
        let body = res.bytes().await.context("error reading response body")?;
        Ok(HttpResponse { status, body })
    }
}

/// Retry policy of a transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// The maximum number of attempts made per request, including the first. Values outside of
    /// `1..=MAX_ATTEMPTS` are clamped into that range.
    pub max_attempts: u32,
    /// The fixed delay between attempts. Zero by default, in which case attempts are made
    /// back-to-back.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            delay: Duration::ZERO,
        }
    }
}

/// A cheaply cloneable handle used to send requests with bounded retry.
#[derive(Clone)]
pub struct Transport {
    exchange: Arc<dyn HttpExchange>,
    policy: RetryPolicy,
}

impl Transport {
    /// Create a new transport from the given exchange.
    pub fn new(exchange: Arc<dyn HttpExchange>, policy: RetryPolicy) -> Self {
        Self { exchange, policy }
    }

    /// Create a new transport backed by `reqwest`.
    pub fn with_reqwest(timeout: Duration, policy: RetryPolicy) -> anyhow::Result<Self> {
        let exchange = ReqwestExchange::new(timeout)?;
        Ok(Self::new(Arc::new(exchange), policy))
    }

    /// Send the given request, retrying network level failures.
    #[tracing::instrument(level = "debug", skip(self, req), fields(method = %req.method, url = %req.url))]
    pub async fn send(&self, req: HttpRequest) -> Result<HttpResponse> {
        let max_attempts = self.policy.max_attempts.clamp(1, MAX_ATTEMPTS);
        let mut attempts = 0;
        loop {
            attempts += 1;
            let err = match self.exchange.exchange(&req).await {
                Ok(res) => {
                    tracing::debug!(status = %res.status, attempts, "response received");
                    return Ok(res);
                }
                Err(err) => err,
            };
            if attempts >= max_attempts {
                return Err(Error::Transport {
                    url: req.url.clone(),
                    attempts,
                    last_error: format!("{:#}", err),
                });
            }
            tracing::warn!(error = ?err, attempt = attempts, max_attempts, "request attempt failed, retrying");
            if !self.policy.delay.is_zero() {
                tokio::time::sleep(self.policy.delay).await;
            }
        }
    }
}

/// Truncate the given string to at most `max` characters.
fn truncate(val: &str, max: usize) -> String {
    match val.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &val[..idx]),
        None => val.to_string(),
    }
}
