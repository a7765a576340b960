//! STAC catalogue search for the image covering a point from one direction.
//!
//! Requests go to `<base>/search` with a CQL-JSON filter conjoining a
//! point-intersects predicate with direction and collection equality. The
//! filter and the response are both expressed in EPSG:25832.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::http::HttpClient;
use super::types::{HttpError, ImageItem, SearchResult};
use crate::coord::{Coordinate, Direction, GROUND_CRS_EPSG};
use crate::projection::CameraModel;
use crate::retry::{with_retry, RetryError, RetryPolicy, Retryable};

/// Errors from a single catalogue request.
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Body was not a feature collection
    #[error("invalid search response: {0}")]
    InvalidResponse(String),

    /// The matching feature lacks camera metadata or a raster asset
    #[error("invalid catalogue item: {0}")]
    InvalidItem(String),
}

impl Retryable for SearchError {
    fn is_retryable(&self) -> bool {
        match self {
            SearchError::Http(e) => e.is_retryable(),
            SearchError::InvalidResponse(_) => true,
            SearchError::InvalidItem(_) => false,
        }
    }

    fn http_status(&self) -> Option<u16> {
        match self {
            SearchError::Http(e) => e.http_status(),
            _ => None,
        }
    }
}

fn crs_uri() -> String {
    format!("http://www.opengis.net/def/crs/EPSG/0/{}", GROUND_CRS_EPSG)
}

/// CQL-JSON filter selecting images of `collection` that cover `coordinate`
/// seen from `direction`.
pub fn build_filter(coordinate: Coordinate, direction: Direction, collection: &str) -> String {
    json!({
        "and": [
            {"intersects": [
                {"property": "geometry"},
                {"type": "Point", "coordinates": [coordinate.easting, coordinate.northing]}
            ]},
            {"eq": [{"property": "direction"}, direction.as_str()]},
            {"eq": [{"property": "collection"}, collection]}
        ]
    })
    .to_string()
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    id: String,
    properties: Properties,
    assets: Assets,
}

#[derive(Debug, Deserialize)]
struct Properties {
    #[serde(rename = "pers:perspective_center")]
    perspective_center: [f64; 3],
    #[serde(rename = "pers:omega")]
    omega: f64,
    #[serde(rename = "pers:phi")]
    phi: f64,
    #[serde(rename = "pers:kappa")]
    kappa: f64,
    #[serde(rename = "pers:interior_orientation")]
    interior: InteriorOrientation,
}

#[derive(Debug, Deserialize)]
struct InteriorOrientation {
    principal_point_offset: [f64; 2],
    focal_length: f64,
    pixel_spacing: Vec<f64>,
    sensor_array_dimensions: [u32; 2],
}

#[derive(Debug, Deserialize)]
struct Assets {
    data: Asset,
}

#[derive(Debug, Deserialize)]
struct Asset {
    href: String,
}

/// Interprets a search response body.
pub(crate) fn parse_search_response(
    body: &[u8],
    direction: Direction,
) -> Result<SearchResult, SearchError> {
    let collection: FeatureCollection = serde_json::from_slice(body)
        .map_err(|e| SearchError::InvalidResponse(e.to_string()))?;

    let Some(first) = collection.features.into_iter().next() else {
        return Ok(SearchResult::NoCoverage);
    };

    let feature: Feature =
        serde_json::from_value(first).map_err(|e| SearchError::InvalidItem(e.to_string()))?;

    let pixel_spacing = feature
        .properties
        .interior
        .pixel_spacing
        .first()
        .copied()
        .ok_or_else(|| SearchError::InvalidItem("empty pixel_spacing".to_string()))?;

    if feature.assets.data.href.trim().is_empty() {
        return Err(SearchError::InvalidItem("empty data asset href".to_string()));
    }

    let props = feature.properties;
    let camera = CameraModel {
        perspective_center: props.perspective_center,
        omega: props.omega,
        phi: props.phi,
        kappa: props.kappa,
        principal_point_offset: props.interior.principal_point_offset,
        focal_length: props.interior.focal_length,
        pixel_spacing,
        columns: props.interior.sensor_array_dimensions[0],
        rows: props.interior.sensor_array_dimensions[1],
    };

    Ok(SearchResult::Found(ImageItem {
        id: feature.id,
        direction,
        camera,
        asset_url: feature.assets.data.href,
    }))
}

/// Client for the image catalogue.
pub struct ImageSearchClient<C: HttpClient> {
    http: Arc<C>,
    base_url: String,
    token: Option<String>,
    policy: RetryPolicy,
}

impl<C: HttpClient> ImageSearchClient<C> {
    pub fn new(
        http: Arc<C>,
        base_url: impl Into<String>,
        token: Option<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            token,
            policy,
        }
    }

    async fn request(
        &self,
        coordinate: Coordinate,
        direction: Direction,
        collection: &str,
    ) -> Result<SearchResult, SearchError> {
        let url = format!("{}/search", self.base_url.trim_end_matches('/'));
        let filter = build_filter(coordinate, direction, collection);
        let crs = crs_uri();
        let query = [
            ("limit", "1"),
            ("filter", filter.as_str()),
            ("filter-lang", "cql-json"),
            ("filter-crs", crs.as_str()),
            ("crs", crs.as_str()),
        ];

        let body = match &self.token {
            Some(token) => {
                self.http
                    .get(&url, &query, &[("token", token.as_str())])
                    .await?
            }
            None => self.http.get(&url, &query, &[]).await?,
        };
        parse_search_response(&body, direction)
    }

    /// Finds the first image of `collection` covering `coordinate` from `direction`.
    pub async fn search(
        &self,
        coordinate: Coordinate,
        direction: Direction,
        collection: &str,
        cancel: &CancellationToken,
    ) -> Result<SearchResult, RetryError<SearchError>> {
        let result = with_retry(&self.policy, cancel, "search", |_| {
            self.request(coordinate, direction, collection)
        })
        .await?;

        match &result {
            SearchResult::Found(item) => {
                debug!(%coordinate, %direction, item = %item.id, "Found covering image")
            }
            SearchResult::NoCoverage => debug!(%coordinate, %direction, "No covering image"),
        }
        Ok(result)
    }
}
