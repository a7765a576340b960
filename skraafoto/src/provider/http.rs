//! HTTP client abstraction for testability
//!
//! [`HttpClient`] is the seam every remote call goes through. The production
//! [`ReqwestClient`] shares one connection pool for the whole run and caps
//! the number of concurrent requests per remote host.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::{StatusCode, Url};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, trace};

use super::types::HttpError;

/// Default User-Agent string for HTTP requests.
const DEFAULT_USER_AGENT: &str = concat!("skraafoto/", env!("CARGO_PKG_VERSION"));

/// Default per-request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Bytes returned for a ranged GET.
#[derive(Debug, Clone)]
pub struct RangeResponse {
    /// The requested bytes (may be shorter at end of file)
    pub data: Bytes,
    /// Full length of the remote resource, when the server reported it
    pub total_len: Option<u64>,
}

/// Trait for asynchronous HTTP client operations.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock HTTP clients in tests.
pub trait HttpClient: Send + Sync {
    /// Performs a GET request and returns the body of a 2xx response.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to request
    /// * `query` - Query parameters, URL-encoded by the client
    /// * `headers` - Slice of (header_name, header_value) tuples
    fn get(
        &self,
        url: &str,
        query: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> impl Future<Output = Result<Bytes, HttpError>> + Send;

    /// Fetches `len` bytes starting at `offset`.
    ///
    /// A read past the end of the resource returns the available bytes.
    fn get_range(
        &self,
        url: &str,
        offset: u64,
        len: u64,
    ) -> impl Future<Output = Result<RangeResponse, HttpError>> + Send;
}

/// Async HTTP client implementation using reqwest.
///
/// Clones share the connection pool and the per-host limits.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
    host_limits: Arc<DashMap<String, Arc<Semaphore>>>,
    limit_per_host: usize,
}

impl ReqwestClient {
    /// Creates a client allowing at most `limit_per_host` concurrent requests per host.
    pub fn new(limit_per_host: usize) -> Result<Self, HttpError> {
        Self::with_timeout(limit_per_host, DEFAULT_TIMEOUT)
    }

    /// Creates a client with a custom request timeout.
    pub fn with_timeout(limit_per_host: usize, timeout: Duration) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .pool_max_idle_per_host(limit_per_host.max(1))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| HttpError::Client(e.to_string()))?;

        Ok(Self {
            client,
            host_limits: Arc::new(DashMap::new()),
            limit_per_host: limit_per_host.max(1),
        })
    }

    /// Waits for a connection slot on the URL's host.
    async fn acquire_host(&self, url: &Url) -> Result<OwnedSemaphorePermit, HttpError> {
        let host = url.host_str().unwrap_or_default().to_string();
        let semaphore = self
            .host_limits
            .entry(host)
            .or_insert_with(|| Arc::new(Semaphore::new(self.limit_per_host)))
            .clone();

        semaphore
            .acquire_owned()
            .await
            .map_err(|_| HttpError::Client("host limiter closed".to_string()))
    }
}

fn parse_url(url: &str) -> Result<Url, HttpError> {
    Url::parse(url).map_err(|_| HttpError::InvalidUrl(url.to_string()))
}

fn transport(e: reqwest::Error) -> HttpError {
    HttpError::Transport(e.without_url().to_string())
}

/// Total resource length from a `Content-Range: bytes a-b/total` header.
pub(crate) fn parse_content_range_total(value: &str) -> Option<u64> {
    value
        .trim()
        .strip_prefix("bytes")?
        .rsplit_once('/')
        .and_then(|(_, total)| total.trim().parse().ok())
}

impl HttpClient for ReqwestClient {
    async fn get(
        &self,
        url: &str,
        query: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<Bytes, HttpError> {
        let parsed = parse_url(url)?;
        let _permit = self.acquire_host(&parsed).await?;

        let mut request = self.client.get(parsed).query(query);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            debug!(url, status = status.as_u16(), "Request returned error status");
            return Err(HttpError::Status {
                status: status.as_u16(),
            });
        }

        response.bytes().await.map_err(transport)
    }

    async fn get_range(&self, url: &str, offset: u64, len: u64) -> Result<RangeResponse, HttpError> {
        if len == 0 {
            return Ok(RangeResponse {
                data: Bytes::new(),
                total_len: None,
            });
        }

        let parsed = parse_url(url)?;
        let _permit = self.acquire_host(&parsed).await?;

        let end = offset.saturating_add(len - 1);
        trace!(url, offset, len, "Range request");
        let response = self
            .client
            .get(parsed)
            .header(RANGE, format!("bytes={}-{}", offset, end))
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        match status {
            StatusCode::PARTIAL_CONTENT => {
                let total_len = response
                    .headers()
                    .get(CONTENT_RANGE)
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_content_range_total);
                let data = response.bytes().await.map_err(transport)?;
                Ok(RangeResponse { data, total_len })
            }
            // Server ignored the Range header and sent everything
            StatusCode::OK => {
                let body = response.bytes().await.map_err(transport)?;
                let total_len = Some(body.len() as u64);
                let start = (offset as usize).min(body.len());
                let stop = (start as u64 + len).min(body.len() as u64) as usize;
                Ok(RangeResponse {
                    data: body.slice(start..stop),
                    total_len,
                })
            }
            StatusCode::RANGE_NOT_SATISFIABLE => Ok(RangeResponse {
                data: Bytes::new(),
                total_len: response
                    .headers()
                    .get(CONTENT_RANGE)
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_content_range_total),
            }),
            other => Err(HttpError::Status {
                status: other.as_u16(),
            }),
        }
    }
}
