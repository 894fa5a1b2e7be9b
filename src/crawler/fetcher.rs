//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients from the TLS policy and user agent
//! - GET requests following up to 10 redirects
//! - Retry with linear backoff for connection-level failures
//! - Error classification
//!
//! HTTP error statuses are never retried and never raised: they come back
//! as a [`FetchResult`] with the status set.

use crate::config::{CrawlConfig, TlsPolicy};
use reqwest::{redirect::Policy, Certificate, Client};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

const MAX_REDIRECTS: usize = 10;

/// Transport metadata and raw bytes of one request
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub requested_url: Url,
    /// URL after redirects; equals `requested_url` on transport failure
    pub final_url: Url,
    /// HTTP status, absent when no response was received
    pub status: Option<u16>,
    pub body: Vec<u8>,
    /// Declared Content-Type header value
    pub content_type: Option<String>,
    /// Transport error after retries were exhausted
    pub error: Option<String>,
}

impl FetchResult {
    /// A result carrying only a transport error
    pub fn failed(url: &Url, error: impl Into<String>) -> Self {
        Self {
            requested_url: url.clone(),
            final_url: url.clone(),
            status: None,
            body: Vec::new(),
            content_type: None,
            error: Some(error.into()),
        }
    }

    /// True for a 2xx response without transport error
    pub fn is_success(&self) -> bool {
        self.error.is_none() && matches!(self.status, Some(200..=299))
    }

    /// Human-readable failure reason, if the fetch did not succeed
    pub fn failure_reason(&self) -> Option<String> {
        if let Some(error) = &self.error {
            return Some(error.clone());
        }
        match self.status {
            Some(s) if !(200..=299).contains(&s) => Some(format!("HTTP {}", s)),
            None => Some("no response".to_string()),
            _ => None,
        }
    }
}

/// Transport-level failures
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("failed to read CA bundle {path}: {message}")]
    CaBundle { path: String, message: String },

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    #[error("too many redirects: {0}")]
    Redirect(String),

    #[error("failed to read body: {0}")]
    Body(String),

    #[error("request failed: {0}")]
    Other(String),
}

impl FetchError {
    /// Only connection-level failures are worth another attempt
    pub fn should_retry(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::Timeout | Self::Body(_))
    }

    pub fn from_reqwest_error(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_redirect() {
            Self::Redirect(err.to_string())
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else if err.is_body() || err.is_decode() {
            Self::Body(err.to_string())
        } else {
            Self::Other(err.to_string())
        }
    }
}

/// Builds an HTTP client honouring the TLS policy
///
/// # Arguments
///
/// * `config` - The crawl configuration (user agent, timeout, TLS policy)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(FetchError)` - The CA bundle could not be read or the client failed to build
pub fn build_http_client(config: &CrawlConfig) -> Result<Client, FetchError> {
    let mut builder = Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.timeout)
        .connect_timeout(config.timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true);

    builder = match &config.tls_policy {
        TlsPolicy::VerifySystem => builder,
        TlsPolicy::NoVerify => builder.danger_accept_invalid_certs(true),
        TlsPolicy::VerifyCustomBundle(path) => {
            let pem = std::fs::read(path).map_err(|e| FetchError::CaBundle {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            let cert = Certificate::from_pem(&pem).map_err(|e| FetchError::CaBundle {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            builder
                .tls_built_in_root_certs(false)
                .add_root_certificate(cert)
        }
    };

    builder
        .build()
        .map_err(|e| FetchError::Client(e.to_string()))
}

/// Network retrieval with retry policy
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    max_retries: u32,
    retry_backoff: Duration,
}

impl Fetcher {
    /// Creates a fetcher from the crawl configuration
    pub fn new(config: &CrawlConfig) -> Result<Self, FetchError> {
        Ok(Self {
            client: build_http_client(config)?,
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff,
        })
    }

    /// Fetches a URL
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Any HTTP status | Returned as-is, not retried |
    /// | Connect failure / timeout / truncated body | Retried up to `max_retries` times, backoff `retry_backoff * attempt` |
    /// | Redirect loop, other errors | Returned as failed immediately |
    pub async fn fetch(&self, url: &Url) -> FetchResult {
        let mut attempt: u32 = 0;
        loop {
            match self.fetch_once(url).await {
                Ok(result) => return result,
                Err(e) if e.should_retry() && attempt < self.max_retries => {
                    attempt += 1;
                    let wait = self.retry_backoff * attempt;
                    debug!(
                        "Retrying {} in {:?} (attempt {}/{}): {}",
                        url, wait, attempt, self.max_retries, e
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(e) => {
                    warn!("Fetch failed for {}: {}", url, e);
                    return FetchResult::failed(url, e.to_string());
                }
            }
        }
    }

    async fn fetch_once(&self, url: &Url) -> Result<FetchResult, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(FetchError::from_reqwest_error)?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response
            .bytes()
            .await
            .map_err(FetchError::from_reqwest_error)?
            .to_vec();

        Ok(FetchResult {
            requested_url: url.clone(),
            final_url,
            status: Some(status),
            body,
            content_type,
            error: None,
        })
    }
}
