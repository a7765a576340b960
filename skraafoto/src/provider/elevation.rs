//! Terrain elevation lookup against the DHM "HentKoter" service.

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::http::HttpClient;
use super::types::{ElevationSample, HttpError};
use crate::coord::Coordinate;
use crate::retry::{with_retry, RetryError, RetryPolicy, Retryable};

/// Errors from a single elevation request.
#[derive(Debug, Clone, Error)]
pub enum ElevationError {
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Body did not match the expected response envelope
    #[error("invalid elevation response: {0}")]
    InvalidResponse(String),
}

impl Retryable for ElevationError {
    fn is_retryable(&self) -> bool {
        match self {
            ElevationError::Http(e) => e.is_retryable(),
            ElevationError::InvalidResponse(_) => true,
        }
    }

    fn http_status(&self) -> Option<u16> {
        match self {
            ElevationError::Http(e) => e.http_status(),
            ElevationError::InvalidResponse(_) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "HentKoterRespons")]
    respons: KoteRespons,
}

#[derive(Debug, Deserialize)]
struct KoteRespons {
    #[serde(default)]
    data: Vec<KoteEntry>,
}

#[derive(Debug, Deserialize)]
struct KoteEntry {
    #[serde(default)]
    kote: Option<f64>,
}

/// Extracts the first kote from a response body.
///
/// An empty `data` list or a null kote is a valid answer meaning "no data".
fn parse_kote(body: &[u8]) -> Result<Option<f64>, ElevationError> {
    let envelope: Envelope = serde_json::from_slice(body)
        .map_err(|e| ElevationError::InvalidResponse(e.to_string()))?;
    Ok(envelope.respons.data.first().and_then(|entry| entry.kote))
}

/// Client for the terrain elevation service.
pub struct ElevationClient<C: HttpClient> {
    http: Arc<C>,
    url: String,
    username: String,
    password: String,
    policy: RetryPolicy,
}

impl<C: HttpClient> ElevationClient<C> {
    pub fn new(
        http: Arc<C>,
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            http,
            url: url.into(),
            username: username.into(),
            password: password.into(),
            policy,
        }
    }

    async fn request(&self, coordinate: Coordinate) -> Result<Option<f64>, ElevationError> {
        let geop = coordinate.to_wkt();
        let query = [
            ("username", self.username.as_str()),
            ("password", self.password.as_str()),
            ("geop", geop.as_str()),
        ];
        let body = self.http.get(&self.url, &query, &[]).await?;
        parse_kote(&body)
    }

    /// Looks up the terrain elevation at `coordinate`, retrying per policy.
    pub async fn get_elevation(
        &self,
        coordinate: Coordinate,
        cancel: &CancellationToken,
    ) -> Result<ElevationSample, RetryError<ElevationError>> {
        let kote = with_retry(&self.policy, cancel, "elevation", |_| self.request(coordinate)).await?;
        debug!(%coordinate, ?kote, "Elevation lookup complete");
        Ok(ElevationSample { coordinate, kote })
    }
}
