//! Raster openers: where a [`super::TileFetcher`] gets its bytes from.

use std::collections::HashMap;
use std::io::{Read, Seek};
use std::sync::Arc;

use bytes::Bytes;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use super::FetchError;
use crate::provider::HttpClient;
use crate::raster::{
    HttpRangeSource, MemoryRangeSource, RangeReader, TransferStats, DEFAULT_READ_AHEAD,
};

/// Opens a raster URL as a seekable byte stream.
///
/// `open` runs on a blocking thread.
pub trait RasterOpener: Send + Sync + 'static {
    type Reader: Read + Seek + Send + 'static;

    fn open(&self, url: &str, cancel: &CancellationToken) -> Result<Self::Reader, FetchError>;
}

/// Opens remote rasters through HTTP range requests.
pub struct HttpRasterOpener<C: HttpClient> {
    http: Arc<C>,
    handle: Handle,
    read_ahead: usize,
}

impl<C: HttpClient> HttpRasterOpener<C> {
    /// `handle` is the runtime the range requests are driven on.
    pub fn new(http: Arc<C>, handle: Handle) -> Self {
        Self {
            http,
            handle,
            read_ahead: DEFAULT_READ_AHEAD,
        }
    }

    pub fn with_read_ahead(mut self, read_ahead: usize) -> Self {
        self.read_ahead = read_ahead;
        self
    }
}

impl<C: HttpClient + 'static> RasterOpener for HttpRasterOpener<C> {
    type Reader = RangeReader<HttpRangeSource<C>>;

    fn open(&self, url: &str, cancel: &CancellationToken) -> Result<Self::Reader, FetchError> {
        let source =
            HttpRangeSource::new(Arc::clone(&self.http), url, self.handle.clone(), cancel.clone());
        Ok(RangeReader::with_read_ahead(source, self.read_ahead))
    }
}

/// Serves rasters held in memory, keyed by URL.
///
/// Byte counters are shared across every reader opened for the same URL.
#[derive(Default)]
pub struct MemoryRasterOpener {
    files: HashMap<String, MemoryRangeSource>,
}

impl MemoryRasterOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `data` under `url`.
    pub fn insert(&mut self, url: impl Into<String>, data: impl Into<Bytes>) {
        self.files.insert(url.into(), MemoryRangeSource::new(data));
    }

    /// Transfer counters for `url`.
    pub fn stats(&self, url: &str) -> Option<Arc<TransferStats>> {
        self.files.get(url).map(MemoryRangeSource::stats)
    }
}

impl RasterOpener for MemoryRasterOpener {
    type Reader = RangeReader<MemoryRangeSource>;

    fn open(&self, url: &str, _cancel: &CancellationToken) -> Result<Self::Reader, FetchError> {
        let source = self.files.get(url).cloned().ok_or_else(|| FetchError::Transport {
            message: format!("no raster registered for {}", url),
            status: Some(404),
        })?;
        Ok(RangeReader::new(source))
    }
}
