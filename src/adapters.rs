use std::{
    fs::File,
    io::{self, Read},
};

use tracing::{info, span, Level};

use crate::{
    model::object::{AdapterError, ObjectMeta, ObjectPage},
    progress::ProgressSink,
    util::{
        locator::{Provider, RepositoryLocation},
        poll::Poller,
    },
};

pub mod gcs;
pub mod mock;
pub mod s3;

/// Bytes fetched per ranged request while reading an object.
pub const DOWNLOAD_CHUNK_SIZE: u64 = 4 * 1024 * 1024;

/// Blocking primitives a storage backend offers to the transfer client.
pub trait ObjectAdapter: Send + Sync {
    /// `None` when the store reports no object at `key`.
    fn head_object(&self, bucket: &str, key: &str) -> Result<Option<ObjectMeta>, AdapterError>;

    /// One page of the objects whose key starts with `prefix`.
    fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<String>,
    ) -> Result<ObjectPage, AdapterError>;

    /// `range` is an inclusive `(first, last)` byte range.
    fn download_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<(u64, u64)>,
    ) -> Result<Vec<u8>, AdapterError>;

    /// Streams `size` bytes of `source` into the object at `key`, replacing
    /// it. `progress` sees every chunk as the store takes it. A failed upload
    /// leaves no object behind.
    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        source: File,
        size: u64,
        progress: &mut dyn ProgressSink,
    ) -> Result<(), AdapterError>;
}

/// Reads an object of known size through ranged downloads of
/// `DOWNLOAD_CHUNK_SIZE` bytes.
pub struct ObjectReader<'a> {
    adapter: &'a dyn ObjectAdapter,
    bucket: &'a str,
    key: &'a str,
    size: u64,
    offset: u64,
    chunk: Vec<u8>,
    chunk_pos: usize,
}

impl<'a> ObjectReader<'a> {
    pub fn new(adapter: &'a dyn ObjectAdapter, bucket: &'a str, meta: &'a ObjectMeta) -> Self {
        Self {
            adapter,
            bucket,
            key: &meta.key,
            size: meta.size,
            offset: 0,
            chunk: Vec::new(),
            chunk_pos: 0,
        }
    }

    fn fill_chunk(&mut self) -> io::Result<()> {
        let last = (self.offset + DOWNLOAD_CHUNK_SIZE).min(self.size) - 1;

        let bytes = self
            .adapter
            .download_object(self.bucket, self.key, Some((self.offset, last)))
            .map_err(io::Error::other)?;

        if bytes.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("object shrank while reading: {}", self.key),
            ));
        }

        self.offset += bytes.len() as u64;
        self.chunk = bytes;
        self.chunk_pos = 0;

        Ok(())
    }
}

impl Read for ObjectReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.chunk_pos == self.chunk.len() {
            if self.offset >= self.size {
                return Ok(0);
            }
            self.fill_chunk()?;
        }

        let n = (self.chunk.len() - self.chunk_pos).min(buf.len());
        buf[..n].copy_from_slice(&self.chunk[self.chunk_pos..self.chunk_pos + n]);
        self.chunk_pos += n;

        Ok(n)
    }
}

/// Supplies a storage handle for a repository location at connect time.
pub trait Connector {
    fn connect(&self, location: &RepositoryLocation) -> Result<Box<dyn ObjectAdapter>, AdapterError>;
}

/// Builds S3 or GCS adapters from the ambient credentials of the environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct AmbientConnector;

impl Connector for AmbientConnector {
    fn connect(&self, location: &RepositoryLocation) -> Result<Box<dyn ObjectAdapter>, AdapterError> {
        let span = span!(Level::INFO, "connect", context = "connect");
        let _e = span.enter();
        info!(bucket = location.bucket, provider = ?location.provider, "called");

        let poller = Poller::new().map_err(|err| AdapterError::new("start runtime", &location.bucket, err))?;

        match location.provider {
            Provider::AWS => Ok(Box::new(s3::S3Adapter::from_env(poller))),
            Provider::GCS => Ok(Box::new(gcs::GcsAdapter::from_env(poller)?)),
        }
    }
}
