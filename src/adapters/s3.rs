use std::fs::File;

use aws_sdk_s3::{
    error::DisplayErrorContext,
    primitives::{ByteStream, DateTime},
};
use futures::TryStreamExt;
use http_body::Frame;
use http_body_util::StreamBody;

use crate::{
    adapters::ObjectAdapter,
    model::object::{system_time_from_parts, AdapterError, ObjectMeta, ObjectPage},
    progress::ProgressSink,
    util::{
        poll::Poller,
        stream::{counted_file_stream, drive_with_progress},
    },
};

pub struct S3Adapter {
    client: aws_sdk_s3::Client,
    poller: Poller,
}

impl S3Adapter {
    pub fn new(client: aws_sdk_s3::Client, poller: Poller) -> Self {
        Self { client, poller }
    }

    /// Region, credentials and endpoint come from the standard AWS
    /// environment and profile chain.
    pub fn from_env(poller: Poller) -> Self {
        let config = poller.poll_until_ready(aws_config::load_from_env());
        let client = aws_sdk_s3::Client::new(&config);
        Self::new(client, poller)
    }
}

fn modified_time(last_modified: Option<&DateTime>) -> std::time::SystemTime {
    match last_modified {
        Some(dt) => system_time_from_parts(dt.secs(), dt.subsec_nanos()),
        None => std::time::SystemTime::UNIX_EPOCH,
    }
}

impl ObjectAdapter for S3Adapter {
    fn head_object(&self, bucket: &str, key: &str) -> Result<Option<ObjectMeta>, AdapterError> {
        let req = self.client.head_object().bucket(bucket).key(key);

        let ho = match self.poller.poll_until_ready(req.send()) {
            Err(err) => {
                if let Some(svc_err) = err.as_service_error() {
                    if svc_err.is_not_found() {
                        return Ok(None);
                    }
                }

                return Err(AdapterError::new("head_object", key, DisplayErrorContext(&err)));
            }
            Ok(ho) => ho,
        };

        Ok(Some(ObjectMeta {
            key: key.to_string(),
            size: ho.content_length().unwrap_or(0).max(0) as u64,
            modified_time: modified_time(ho.last_modified()),
        }))
    }

    fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<String>,
    ) -> Result<ObjectPage, AdapterError> {
        let mut req = self.client.list_objects_v2().bucket(bucket).prefix(prefix);

        if let Some(tok) = continuation_token {
            req = req.continuation_token(tok);
        }

        let lo = self
            .poller
            .poll_until_ready(req.send())
            .map_err(|err| AdapterError::new("list_objects", prefix, DisplayErrorContext(&err)))?;

        let objects = lo
            .contents()
            .iter()
            .map(|o| ObjectMeta {
                key: o.key().unwrap_or("").to_string(),
                size: o.size().unwrap_or(0).max(0) as u64,
                modified_time: modified_time(o.last_modified()),
            })
            .collect();

        Ok(ObjectPage {
            objects,
            continuation_token: lo.next_continuation_token().map(|tok| tok.to_string()),
        })
    }

    fn download_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<(u64, u64)>,
    ) -> Result<Vec<u8>, AdapterError> {
        let mut req = self.client.get_object().bucket(bucket).key(key);

        if let Some((first, last)) = range {
            req = req.range(format!("bytes={}-{}", first, last));
        }

        let o = self
            .poller
            .poll_until_ready(req.send())
            .map_err(|err| AdapterError::new("get_object", key, DisplayErrorContext(&err)))?;

        let bytes = self
            .poller
            .poll_until_ready(o.body.collect())
            .map_err(|err| AdapterError::new("collect body", key, err))?;

        Ok(bytes.into_bytes().to_vec())
    }

    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        source: File,
        size: u64,
        progress: &mut dyn ProgressSink,
    ) -> Result<(), AdapterError> {
        let (stream, counts) = counted_file_stream(source);
        let body = ByteStream::from_body_1_x(StreamBody::new(stream.map_ok(Frame::data)));

        let req = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_length(size as i64)
            .body(body);

        self.poller
            .poll_until_ready(drive_with_progress(req.send(), counts, progress))
            .map_err(|err| AdapterError::new("put_object", key, DisplayErrorContext(&err)))?;

        Ok(())
    }
}
