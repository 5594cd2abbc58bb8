use std::{fs::File, time::SystemTime};

use google_cloud_storage::{
    client::{Client, ClientConfig},
    http::{
        objects::{
            download::Range,
            get::GetObjectRequest,
            list::ListObjectsRequest,
            upload::{Media, UploadObjectRequest, UploadType},
            Object,
        },
        Error,
    },
};

use crate::{
    adapters::ObjectAdapter,
    model::object::{AdapterError, ObjectMeta, ObjectPage},
    progress::ProgressSink,
    util::{
        poll::Poller,
        stream::{counted_file_stream, drive_with_progress},
    },
};

pub struct GcsAdapter {
    client: Client,
    poller: Poller,
}

impl GcsAdapter {
    pub fn new(client: Client, poller: Poller) -> Self {
        Self { client, poller }
    }

    /// Authenticates with application default credentials
    /// (`GOOGLE_APPLICATION_CREDENTIALS` or the metadata server).
    pub fn from_env(poller: Poller) -> Result<Self, AdapterError> {
        let config = poller
            .poll_until_ready(ClientConfig::default().with_auth())
            .map_err(|err| AdapterError::new("authenticate", "gcs", err))?;

        Ok(Self::new(Client::new(config), poller))
    }
}

fn modified_time(updated: Option<time::OffsetDateTime>) -> SystemTime {
    updated.map(SystemTime::from).unwrap_or(SystemTime::UNIX_EPOCH)
}

fn to_meta(obj: Object) -> ObjectMeta {
    ObjectMeta {
        modified_time: modified_time(obj.updated),
        size: obj.size.max(0) as u64,
        key: obj.name,
    }
}

fn is_not_found(err: &Error) -> bool {
    matches!(err, Error::Response(res) if res.code == 404)
}

impl ObjectAdapter for GcsAdapter {
    fn head_object(&self, bucket: &str, key: &str) -> Result<Option<ObjectMeta>, AdapterError> {
        let req = GetObjectRequest {
            bucket: bucket.to_string(),
            object: key.to_string(),
            ..Default::default()
        };

        match self.poller.poll_until_ready(self.client.get_object(&req)) {
            Err(err) if is_not_found(&err) => Ok(None),
            Err(err) => Err(AdapterError::new("get_object", key, err)),
            Ok(obj) => Ok(Some(to_meta(obj))),
        }
    }

    fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<String>,
    ) -> Result<ObjectPage, AdapterError> {
        let req = ListObjectsRequest {
            bucket: bucket.to_string(),
            prefix: Some(prefix.to_string()),
            page_token: continuation_token,
            ..Default::default()
        };

        let lo = self
            .poller
            .poll_until_ready(self.client.list_objects(&req))
            .map_err(|err| AdapterError::new("list_objects", prefix, err))?;

        Ok(ObjectPage {
            objects: lo.items.unwrap_or_default().into_iter().map(to_meta).collect(),
            continuation_token: lo.next_page_token,
        })
    }

    fn download_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<(u64, u64)>,
    ) -> Result<Vec<u8>, AdapterError> {
        let req = GetObjectRequest {
            bucket: bucket.to_string(),
            object: key.to_string(),
            ..Default::default()
        };

        let range = match range {
            Some((first, last)) => Range(Some(first), Some(last)),
            None => Range::default(),
        };

        self.poller
            .poll_until_ready(self.client.download_object(&req, &range))
            .map_err(|err| AdapterError::new("download_object", key, err))
    }

    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        source: File,
        size: u64,
        progress: &mut dyn ProgressSink,
    ) -> Result<(), AdapterError> {
        let req = UploadObjectRequest {
            bucket: bucket.to_string(),
            ..Default::default()
        };

        let mut media = Media::new(key.to_string());
        media.content_length = Some(size);
        let upload_type = UploadType::Simple(media);

        let (stream, counts) = counted_file_stream(source);

        self.poller
            .poll_until_ready(drive_with_progress(
                self.client.upload_streamed_object(&req, stream, &upload_type),
                counts,
                progress,
            ))
            .map_err(|err| AdapterError::new("upload_object", key, err))?;

        Ok(())
    }
}
