//! Transfer client that moves artifacts between local files and a bucket.
//!
//! Every resource is addressed by `base_directory + resource_name`. The join
//! is a literal string concatenation: a base directory that should act as a
//! folder must already end with `/`.

use std::{fs::File, path::Path};

use tracing::{error, info, span, Level};

use crate::{
    adapters::{AmbientConnector, Connector, ObjectAdapter, ObjectReader},
    model::{
        object::ObjectMeta,
        transfer::{TransferError, TransferResult},
    },
    progress::ProgressSink,
    util::{copy::copy_with_progress, locator},
};

/// Operations a storage transport offers to a publishing host.
///
/// `connect` must succeed before any other operation; between `disconnect`
/// and the next `connect` every operation fails with
/// [`TransferError::IllegalState`].
pub trait Transport {
    fn connect(&mut self, repository: &str) -> TransferResult<()>;

    fn disconnect(&mut self);

    fn exists(&self, resource_name: &str) -> TransferResult<bool>;

    fn is_newer_than(&self, resource_name: &str, timestamp_millis: i64) -> TransferResult<bool>;

    fn list(&self, directory: &str) -> TransferResult<Vec<String>>;

    fn download(
        &self,
        resource_name: &str,
        destination: &Path,
        progress: &mut dyn ProgressSink,
    ) -> TransferResult<()>;

    fn upload(
        &self,
        source: &Path,
        resource_name: &str,
        progress: &mut dyn ProgressSink,
    ) -> TransferResult<()>;
}

/// Storage handle, bucket and base directory of a live connection.
pub struct Connection {
    pub adapter: Box<dyn ObjectAdapter>,
    pub bucket: String,
    pub base_directory: String,
}

impl Connection {
    pub fn key(&self, resource_name: &str) -> String {
        format!("{}{}", self.base_directory, resource_name)
    }
}

pub struct TransferClient {
    connector: Box<dyn Connector>,
    connection: Option<Connection>,
}

impl Default for TransferClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferClient {
    /// A client that connects with ambient credentials.
    pub fn new() -> Self {
        Self::with_connector(Box::new(AmbientConnector))
    }

    pub fn with_connector(connector: Box<dyn Connector>) -> Self {
        Self {
            connector,
            connection: None,
        }
    }

    /// A client already bound to `adapter`. The next `connect` keeps this
    /// handle instead of building one from the repository URL.
    pub fn with_adapter(adapter: Box<dyn ObjectAdapter>, bucket: &str, base_directory: &str) -> Self {
        Self {
            connector: Box::new(AmbientConnector),
            connection: Some(Connection {
                adapter,
                bucket: bucket.to_string(),
                base_directory: base_directory.to_string(),
            }),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn connection(&self) -> TransferResult<&Connection> {
        self.connection.as_ref().ok_or(TransferError::IllegalState)
    }

    fn head(&self, conn: &Connection, resource_name: &str) -> TransferResult<Option<ObjectMeta>> {
        let key = conn.key(resource_name);
        conn.adapter.head_object(&conn.bucket, &key).map_err(|err| {
            error!(error_message=%err, error_group="head_object");
            TransferError::from(err)
        })
    }
}

impl Transport for TransferClient {
    fn connect(&mut self, repository: &str) -> TransferResult<()> {
        let span = span!(Level::INFO, "connect", context = "connect");
        let _e = span.enter();
        info!(repository = repository, "called");

        if self.connection.is_some() {
            return Ok(());
        }

        let location = locator::parse_location(repository)?;
        let adapter = self.connector.connect(&location).map_err(|err| {
            error!(error_message=%err, error_group="connect");
            TransferError::Connect(err)
        })?;

        info!(
            bucket = location.bucket,
            base_directory = location.base_directory,
            "connected"
        );

        self.connection = Some(Connection {
            adapter,
            bucket: location.bucket,
            base_directory: location.base_directory,
        });

        Ok(())
    }

    fn disconnect(&mut self) {
        let span = span!(Level::INFO, "disconnect", context = "disconnect");
        let _e = span.enter();
        info!("called");

        self.connection = None;
    }

    fn exists(&self, resource_name: &str) -> TransferResult<bool> {
        let span = span!(Level::INFO, "exists", context = "exists");
        let _e = span.enter();
        info!(resource = resource_name, "called");

        let conn = self.connection()?;
        Ok(self.head(conn, resource_name)?.is_some())
    }

    fn is_newer_than(&self, resource_name: &str, timestamp_millis: i64) -> TransferResult<bool> {
        let span = span!(Level::INFO, "is_newer_than", context = "is_newer_than");
        let _e = span.enter();
        info!(resource = resource_name, timestamp = timestamp_millis, "called");

        let conn = self.connection()?;
        let meta = self
            .head(conn, resource_name)?
            .ok_or_else(|| TransferError::not_found(resource_name))?;

        Ok(meta.modified_millis() > timestamp_millis)
    }

    fn list(&self, directory: &str) -> TransferResult<Vec<String>> {
        let span = span!(Level::INFO, "list", context = "list");
        let _e = span.enter();
        info!(directory = directory, "called");

        let conn = self.connection()?;
        let prefix = conn.key(directory);

        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let page = conn
                .adapter
                .list_objects(&conn.bucket, &prefix, continuation_token)
                .map_err(|err| {
                    error!(error_message=%err, error_group="list_objects");
                    TransferError::from(err)
                })?;

            keys.extend(page.objects.into_iter().map(|o| o.key));

            continuation_token = page.continuation_token;
            if continuation_token.is_none() {
                break;
            }
        }

        info!(prefix = prefix, count = keys.len(), "listed");

        Ok(keys)
    }

    fn download(
        &self,
        resource_name: &str,
        destination: &Path,
        progress: &mut dyn ProgressSink,
    ) -> TransferResult<()> {
        let span = span!(Level::INFO, "download", context = "download");
        let _e = span.enter();
        info!(resource = resource_name, destination = %destination.display(), "called");

        let conn = self.connection()?;
        let meta = self
            .head(conn, resource_name)?
            .ok_or_else(|| TransferError::not_found(resource_name))?;

        let mut reader = ObjectReader::new(conn.adapter.as_ref(), &conn.bucket, &meta);
        let mut out = File::create(destination).map_err(|err| {
            error!(error_message=%err, error_group="create_destination");
            TransferError::cannot_write(destination, err)
        })?;

        let total = copy_with_progress(&mut reader, &mut out, progress).map_err(|err| {
            error!(error_message=%err, error_group="copy");
            TransferError::cannot_copy(resource_name, destination, err)
        })?;

        info!(resource = resource_name, bytes = total, "downloaded");

        Ok(())
    }

    fn upload(
        &self,
        source: &Path,
        resource_name: &str,
        progress: &mut dyn ProgressSink,
    ) -> TransferResult<()> {
        let span = span!(Level::INFO, "upload", context = "upload");
        let _e = span.enter();
        info!(source = %source.display(), resource = resource_name, "called");

        let conn = self.connection()?;
        let key = conn.key(resource_name);

        let (input, size) = File::open(source)
            .and_then(|input| input.metadata().map(|meta| (input, meta.len())))
            .map_err(|err| {
                error!(error_message=%err, error_group="open_source");
                TransferError::cannot_copy(source, resource_name, err)
            })?;

        let mut total = 0u64;
        let mut counting = |n: usize| {
            total += n as u64;
            progress.on_bytes_transferred(n);
        };

        conn.adapter
            .put_object(&conn.bucket, &key, input, size, &mut counting)
            .map_err(|err| {
                error!(error_message=%err, error_group="put_object");
                TransferError::cannot_write(resource_name, err)
            })?;

        info!(resource = resource_name, bytes = total, "uploaded");

        Ok(())
    }
}
