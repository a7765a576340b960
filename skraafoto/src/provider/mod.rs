//! Remote service clients
//!
//! This module provides the HTTP seam and the two JSON services a job
//! consults before touching imagery: the terrain elevation service and the
//! STAC image catalogue.
//!
//! ```ignore
//! use skraafoto::provider::{ElevationClient, ReqwestClient};
//!
//! let http = Arc::new(ReqwestClient::new(5)?);
//! let elevation = ElevationClient::new(http, url, user, pass, policy);
//! let sample = elevation.get_elevation(coordinate, &cancel).await?;
//! ```

mod elevation;
pub(crate) mod http;
mod search;
mod types;

pub use elevation::{ElevationClient, ElevationError};
pub use http::{HttpClient, RangeResponse, ReqwestClient};
pub use search::{build_filter, ImageSearchClient, SearchError};
pub use types::{ElevationSample, HttpError, ImageItem, SearchResult, NODATA_SENTINEL};

#[cfg(test)]
pub use http::tests::MockHttpClient;
