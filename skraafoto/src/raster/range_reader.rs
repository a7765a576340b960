//! Byte-range access to remote files.
//!
//! [`RangeReader`] adapts any [`RangeSource`] into `Read + Seek` so that a
//! TIFF decoder can walk a remote file while only the bytes it touches are
//! transferred.

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use super::ReadCancelled;
use crate::provider::HttpClient;

/// Default number of bytes fetched per request.
pub const DEFAULT_READ_AHEAD: usize = 16 * 1024;

/// A random-access byte source.
pub trait RangeSource {
    /// Reads up to `len` bytes at `offset`.
    ///
    /// Fewer bytes than requested means the end of the resource was reached.
    fn read_range(&mut self, offset: u64, len: usize) -> io::Result<Bytes>;

    /// Total size in bytes, once known.
    fn total_len(&self) -> Option<u64>;
}

/// Transfer counters shared between a source and its observers.
#[derive(Debug, Default)]
pub struct TransferStats {
    bytes: AtomicU64,
    requests: AtomicUsize,
}

impl TransferStats {
    fn record(&self, bytes: usize) {
        self.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }
}

/// In-memory source, mainly for tests and local files already in memory.
#[derive(Debug, Clone)]
pub struct MemoryRangeSource {
    data: Bytes,
    stats: Arc<TransferStats>,
}

impl MemoryRangeSource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            stats: Arc::new(TransferStats::default()),
        }
    }

    /// Counters of the bytes served so far.
    pub fn stats(&self) -> Arc<TransferStats> {
        Arc::clone(&self.stats)
    }
}

impl RangeSource for MemoryRangeSource {
    fn read_range(&mut self, offset: u64, len: usize) -> io::Result<Bytes> {
        let start = (offset.min(self.data.len() as u64)) as usize;
        let end = start.saturating_add(len).min(self.data.len());
        let chunk = self.data.slice(start..end);
        self.stats.record(chunk.len());
        Ok(chunk)
    }

    fn total_len(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }
}

/// Source issuing HTTP range requests through an [`HttpClient`].
///
/// Must be driven from a blocking thread (e.g. `spawn_blocking`); each read
/// blocks on the runtime `handle`. Reads fail once the token is cancelled.
pub struct HttpRangeSource<C: HttpClient> {
    http: Arc<C>,
    url: String,
    handle: Handle,
    cancel: CancellationToken,
    total_len: Option<u64>,
    stats: Arc<TransferStats>,
}

impl<C: HttpClient> HttpRangeSource<C> {
    pub fn new(http: Arc<C>, url: impl Into<String>, handle: Handle, cancel: CancellationToken) -> Self {
        Self {
            http,
            url: url.into(),
            handle,
            cancel,
            total_len: None,
            stats: Arc::new(TransferStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<TransferStats> {
        Arc::clone(&self.stats)
    }
}

impl<C: HttpClient> RangeSource for HttpRangeSource<C> {
    fn read_range(&mut self, offset: u64, len: usize) -> io::Result<Bytes> {
        if self.cancel.is_cancelled() {
            return Err(io::Error::other(ReadCancelled));
        }
        if let Some(total) = self.total_len {
            if offset >= total {
                return Ok(Bytes::new());
            }
        }

        let response = self
            .handle
            .block_on(self.http.get_range(&self.url, offset, len as u64))
            .map_err(io::Error::other)?;

        if response.total_len.is_some() {
            self.total_len = response.total_len;
        }
        self.stats.record(response.data.len());
        Ok(response.data)
    }

    fn total_len(&self) -> Option<u64> {
        self.total_len
    }
}

/// `Read + Seek` view over a [`RangeSource`] with a read-ahead buffer.
pub struct RangeReader<S: RangeSource> {
    source: S,
    pos: u64,
    buffer: Bytes,
    buffer_start: u64,
    read_ahead: usize,
}

impl<S: RangeSource> RangeReader<S> {
    pub fn new(source: S) -> Self {
        Self::with_read_ahead(source, DEFAULT_READ_AHEAD)
    }

    pub fn with_read_ahead(source: S, read_ahead: usize) -> Self {
        Self {
            source,
            pos: 0,
            buffer: Bytes::new(),
            buffer_start: 0,
            read_ahead: read_ahead.max(1),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn buffered(&self) -> Option<&[u8]> {
        let end = self.buffer_start + self.buffer.len() as u64;
        if self.pos >= self.buffer_start && self.pos < end {
            Some(&self.buffer[(self.pos - self.buffer_start) as usize..])
        } else {
            None
        }
    }
}

impl<S: RangeSource> Read for RangeReader<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        if self.buffered().is_none() {
            // Large reads bypass the buffer size so one request covers them
            let want = buf.len().max(self.read_ahead);
            self.buffer = self.source.read_range(self.pos, want)?;
            self.buffer_start = self.pos;
        }

        let Some(available) = self.buffered() else {
            return Ok(0);
        };
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl<S: RangeSource> Seek for RangeReader<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
            SeekFrom::End(delta) => {
                let total = match self.source.total_len() {
                    Some(total) => total,
                    None => {
                        // One small read reveals the length
                        self.buffer = self.source.read_range(0, self.read_ahead)?;
                        self.buffer_start = 0;
                        self.source.total_len().ok_or_else(|| {
                            io::Error::new(io::ErrorKind::Unsupported, "resource length unknown")
                        })?
                    }
                };
                total.checked_add_signed(delta)
            }
        };

        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of resource")
        })?;
        self.pos = target;
        Ok(target)
    }
}
