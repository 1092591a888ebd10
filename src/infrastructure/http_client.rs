//! HTTP client shared by the platform API clients
//!
//! Wraps `reqwest::Client` with a per-client request rate limit, timeouts
//! and uniform status / decode error handling. There is no retry here: a
//! failed request is reported and the pipeline moves on to the next item.

use anyhow::{Result, anyhow};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, ClientBuilder, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

use crate::domain::errors::ClientError;
use crate::infrastructure::config::HttpConfig;

/// Response bodies quoted in errors are cut to this many characters
const ERROR_BODY_LIMIT: usize = 512;

/// Configuration for HTTP client behavior
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Maximum requests per second; 0 disables limiting
    pub max_requests_per_second: u32,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Connect timeout in seconds
    pub connect_timeout_seconds: u64,
    /// User agent string
    pub user_agent: String,
    /// Idle connections kept per host
    pub pool_max_idle_per_host: usize,
}

impl HttpClientConfig {
    pub fn from_http_config(config: &HttpConfig) -> Self {
        Self {
            max_requests_per_second: config.max_requests_per_second,
            timeout_seconds: config.request_timeout_seconds,
            connect_timeout_seconds: config.connect_timeout_seconds,
            user_agent: config.user_agent.clone(),
            pool_max_idle_per_host: config.pool_max_idle_per_host,
        }
    }
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self::from_http_config(&HttpConfig::default())
    }
}

/// HTTP client with built-in rate limiting and error handling
///
/// Clones share one limiter, so build a separate client per remote service.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
    /// Label for provenance in logs (e.g. "alibaba", "shopify")
    context_label: String,
}

impl HttpClient {
    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: &HttpClientConfig) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent)
            .gzip(true)
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        let limiter = NonZeroU32::new(config.max_requests_per_second)
            .map(|rate| Arc::new(RateLimiter::direct(Quota::per_second(rate))));

        Ok(Self {
            client,
            limiter,
            context_label: "http".to_string(),
        })
    }

    /// Set a human-readable context label for logging provenance
    pub fn with_context_label(mut self, label: &str) -> Self {
        self.context_label = label.to_string();
        self
    }

    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client.request(method, url)
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    pub fn put(&self, url: &str) -> RequestBuilder {
        self.request(Method::PUT, url)
    }

    /// Send after waiting for the rate limiter; any 2xx is accepted
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let response = self.dispatch(request).await?;
        if response.status().is_success() {
            return Ok(response);
        }
        Err(self.status_error(response).await)
    }

    /// Send and require one exact status code
    pub async fn send_expecting(
        &self,
        request: RequestBuilder,
        expected: StatusCode,
    ) -> Result<Response, ClientError> {
        let response = self.dispatch(request).await?;
        if response.status() == expected {
            return Ok(response);
        }
        Err(self.status_error(response).await)
    }

    /// Decode a JSON body. Reads the text first so malformed JSON is a
    /// decode error rather than a transport one.
    pub async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(ClientError::from)
    }

    /// Download a resource; returns the bytes and the reported content type
    pub async fn fetch_bytes(&self, url: &str) -> Result<(Vec<u8>, Option<String>), ClientError> {
        let response = self.send(self.get(url)).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?;
        Ok((bytes.to_vec(), content_type))
    }

    async fn dispatch(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let request = request.build()?;
        debug!("🌐 [{}] {} {}", self.context_label, request.method(), request.url().path());
        Ok(self.client.execute(request).await?)
    }

    async fn status_error(&self, response: Response) -> ClientError {
        let status = response.status();
        let url_path = response.url().path().to_string();
        let body = response.text().await.unwrap_or_default();
        error!("❌ [{}] HTTP error {} from {}", self.context_label, status, url_path);
        ClientError::HttpStatus {
            status: status.as_u16(),
            body: truncate(&body, ERROR_BODY_LIMIT),
        }
    }
}

impl Default for HttpClient {
    /// Client without rate limiting, mostly for tests
    fn default() -> Self {
        Self {
            client: Client::new(),
            limiter: None,
            context_label: "http".to_string(),
        }
    }
}

fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((index, _)) => format!("{}…", &text[..index]),
        None => text.to_string(),
    }
}
