//! HTTP fetcher implementation
//!
//! This module owns every network request the resolver makes:
//! - Building the HTTP client with the fixed header template
//! - Transparent HTTP 30x following (reported through `final_url`)
//! - Retry with exponential backoff on 429/500/502/503/504 and transient errors
//!
//! Meta-refresh and script navigation are not followed here; that is the
//! redirect chaser's job.

use crate::config::HttpConfig;
use crate::ResolverError;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, CONTENT_TYPE, REFERER,
};
use reqwest::{redirect::Policy, Client, ClientBuilder, Response};
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::RetryIf;
use url::Url;

/// Status codes worth another attempt
const RETRY_STATUSES: &[u16] = &[429, 500, 502, 503, 504];

/// Upper bound on a single backoff delay
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Errors surfaced by the fetcher
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to read body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// A fetched response, after HTTP redirects
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL reached after HTTP 30x redirects
    pub final_url: Url,
    /// HTTP status code of the last response
    pub status: u16,
    /// Response headers of the last response
    pub headers: HeaderMap,
    /// Response body decoded as text
    pub body: String,
}

impl FetchedPage {
    /// Content-Type header value, or an empty string
    pub fn content_type(&self) -> &str {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }

    /// True for a non-empty `text/html` body
    pub fn is_html(&self) -> bool {
        self.content_type().to_lowercase().contains("text/html") && !self.body.trim().is_empty()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Builds a client builder carrying the header template and timeouts
///
/// Exposed so callers can add transport settings (proxies, DNS overrides)
/// before building.
pub fn client_builder(config: &HttpConfig) -> Result<ClientBuilder, ResolverError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, header_value("Accept", &config.accept)?);
    headers.insert(
        ACCEPT_LANGUAGE,
        header_value("Accept-Language", &config.accept_language)?,
    );
    headers.insert(
        CACHE_CONTROL,
        header_value("Cache-Control", &config.cache_control)?,
    );

    Ok(Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .redirect(Policy::limited(config.max_redirects))
        .gzip(true)
        .brotli(true))
}

/// Builds an HTTP client with the configured header template
///
/// # Example
///
/// ```
/// use deal_resolver::config::HttpConfig;
/// use deal_resolver::resolver::build_http_client;
///
/// let client = build_http_client(&HttpConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &HttpConfig) -> Result<Client, ResolverError> {
    Ok(client_builder(config)?.build()?)
}

fn header_value(name: &'static str, value: &str) -> Result<HeaderValue, ResolverError> {
    HeaderValue::from_str(value).map_err(|_| ResolverError::InvalidHeader {
        name,
        value: value.to_string(),
    })
}

/// The single HTTP entry point used by every resolution tier
///
/// Cloning is cheap and shares the connection pool.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    max_retries: usize,
    backoff_base_ms: u64,
}

impl Fetcher {
    /// Creates a fetcher with a client built from configuration
    pub fn new(config: &HttpConfig) -> Result<Self, ResolverError> {
        Ok(Self::with_client(build_http_client(config)?, config))
    }

    /// Creates a fetcher around an existing client
    ///
    /// The client should come from [`client_builder`] so it carries the
    /// header template.
    pub fn with_client(client: Client, config: &HttpConfig) -> Self {
        Self {
            client,
            max_retries: config.max_retries,
            backoff_base_ms: config.backoff_base_ms,
        }
    }

    /// Fetches a URL, retrying transient failures
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 429/500/502/503/504 | Retry, then return the last response |
    /// | Timeout / connection failure | Retry, then return `FetchError::Network` |
    /// | Any other status | Returned as-is, no retry |
    ///
    /// Delays start at `backoff-base-ms` and double on each retry.
    pub async fn fetch(&self, url: &Url, referer: Option<&Url>) -> Result<FetchedPage, FetchError> {
        let strategy = retry_strategy(self.backoff_base_ms).take(self.max_retries);

        let outcome = RetryIf::start(
            strategy,
            || self.send_once(url, referer),
            |attempt: &Attempt| attempt.is_retryable(),
        )
        .await;

        let response = match outcome {
            Ok(response) => response,
            Err(Attempt::Status(response)) => {
                tracing::warn!(
                    "Giving up retries for {}: HTTP {}",
                    url,
                    response.status().as_u16()
                );
                response
            }
            Err(Attempt::Network(source)) => {
                return Err(FetchError::Network {
                    url: url.to_string(),
                    source,
                })
            }
        };

        let final_url = response.url().clone();
        let status = response.status().as_u16();
        let headers = response.headers().clone();

        let body = response.text().await.map_err(|source| FetchError::Body {
            url: final_url.to_string(),
            source,
        })?;

        tracing::trace!("Fetched {} -> {} ({})", url, final_url, status);

        Ok(FetchedPage {
            final_url,
            status,
            headers,
            body,
        })
    }

    async fn send_once(&self, url: &Url, referer: Option<&Url>) -> Result<Response, Attempt> {
        let mut request = self.client.get(url.as_str());
        if let Some(referer) = referer {
            request = request.header(REFERER, referer.as_str());
        }

        match request.send().await {
            Ok(response) if RETRY_STATUSES.contains(&response.status().as_u16()) => {
                tracing::debug!("HTTP {} from {}", response.status().as_u16(), url);
                Err(Attempt::Status(response))
            }
            Ok(response) => Ok(response),
            Err(e) => {
                tracing::debug!("Request to {} failed: {}", url, e);
                Err(Attempt::Network(e))
            }
        }
    }
}

/// Outcome of one attempt that did not produce a usable response
enum Attempt {
    Status(Response),
    Network(reqwest::Error),
}

impl Attempt {
    fn is_retryable(&self) -> bool {
        match self {
            Attempt::Status(_) => true,
            Attempt::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
        }
    }
}

/// Exponential backoff: `base`, `2 * base`, `4 * base`, ...
fn retry_strategy(backoff_base_ms: u64) -> ExponentialBackoff {
    ExponentialBackoff::from_millis(2)
        .factor((backoff_base_ms / 2).max(1))
        .max_delay(MAX_BACKOFF)
}
