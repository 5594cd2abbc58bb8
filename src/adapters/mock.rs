use std::{
    collections::{BTreeMap, HashMap},
    fs::File,
    io::{self, Write},
    ops::Bound,
    sync::{Arc, Mutex, MutexGuard},
    time::SystemTime,
};

use crate::{
    adapters::ObjectAdapter,
    model::object::{AdapterError, ObjectMeta, ObjectPage},
    progress::ProgressSink,
    util::copy::copy_with_progress,
};

pub const DEFAULT_PAGE_SIZE: usize = 1000;

type ObjectId = (String, String);

#[derive(Clone, Debug)]
struct MockObject {
    data: Vec<u8>,
    modified_time: SystemTime,
}

#[derive(Debug, Default)]
struct MockFailures {
    heads: bool,
    lists: bool,
    puts: bool,
    downloads_after: Option<u64>,
    writes_after: Option<usize>,
}

#[derive(Debug)]
struct MockState {
    objects: BTreeMap<ObjectId, MockObject>,
    // bytes received by uploads that have not completed yet
    in_flight: HashMap<ObjectId, Vec<u8>>,
    page_size: usize,
    failures: MockFailures,
    list_calls: usize,
}

/// In-memory object store. Clones share the same objects, so one store can
/// back several clients at once.
#[derive(Clone, Debug)]
pub struct MockAdapter {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn object_id(bucket: &str, key: &str) -> ObjectId {
    (bucket.to_string(), key.to_string())
}

impl MockAdapter {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                objects: BTreeMap::new(),
                in_flight: HashMap::new(),
                page_size: DEFAULT_PAGE_SIZE,
                failures: MockFailures::default(),
                list_calls: 0,
            })),
        }
    }

    pub fn with_page_size(self, page_size: usize) -> Self {
        self.lock().page_size = page_size.max(1);
        self
    }

    pub fn insert(&self, bucket: &str, key: &str, data: Vec<u8>) {
        self.insert_with_time(bucket, key, data, SystemTime::now());
    }

    pub fn insert_with_time(&self, bucket: &str, key: &str, data: Vec<u8>, modified_time: SystemTime) {
        self.lock()
            .objects
            .insert(object_id(bucket, key), MockObject { data, modified_time });
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.lock()
            .objects
            .get(&object_id(bucket, key))
            .map(|o| o.data.clone())
    }

    /// Bytes an unfinished upload to `key` has delivered so far.
    pub fn received(&self, bucket: &str, key: &str) -> Option<usize> {
        self.lock()
            .in_flight
            .get(&object_id(bucket, key))
            .map(|buf| buf.len())
    }

    /// Makes `head_object` fail as an access-denied store would.
    pub fn fail_heads(&self, fail: bool) {
        self.lock().failures.heads = fail;
    }

    pub fn fail_lists(&self, fail: bool) {
        self.lock().failures.lists = fail;
    }

    /// Makes `put_object` reject every upload before reading the source.
    pub fn reject_puts(&self, reject: bool) {
        self.lock().failures.puts = reject;
    }

    /// Makes ranged downloads starting at or past `offset` fail.
    pub fn fail_downloads_after(&self, offset: Option<u64>) {
        self.lock().failures.downloads_after = offset;
    }

    /// Makes uploads fail once more than `limit` bytes were received.
    pub fn fail_writes_after(&self, limit: Option<usize>) {
        self.lock().failures.writes_after = limit;
    }

    pub fn list_calls(&self) -> usize {
        self.lock().list_calls
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // a panicking test thread must not take the store down with it
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ObjectAdapter for MockAdapter {
    fn head_object(&self, bucket: &str, key: &str) -> Result<Option<ObjectMeta>, AdapterError> {
        let state = self.lock();
        if state.failures.heads {
            return Err(AdapterError::new("head_object", key, "access denied"));
        }

        Ok(state.objects.get(&object_id(bucket, key)).map(|o| ObjectMeta {
            key: key.to_string(),
            size: o.data.len() as u64,
            modified_time: o.modified_time,
        }))
    }

    fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<String>,
    ) -> Result<ObjectPage, AdapterError> {
        let mut state = self.lock();
        state.list_calls += 1;

        if state.failures.lists {
            return Err(AdapterError::new("list_objects", prefix, "bucket does not exist"));
        }

        let start = match continuation_token {
            Some(tok) => Bound::Excluded((bucket.to_string(), tok)),
            None => Bound::Included((bucket.to_string(), prefix.to_string())),
        };

        let mut matching = state
            .objects
            .range((start, Bound::Unbounded))
            .take_while(|((b, k), _)| b == bucket && k.starts_with(prefix))
            .map(|((_, k), o)| ObjectMeta {
                key: k.clone(),
                size: o.data.len() as u64,
                modified_time: o.modified_time,
            });

        let objects: Vec<ObjectMeta> = matching.by_ref().take(state.page_size).collect();
        let continuation_token = if matching.next().is_some() {
            objects.last().map(|o| o.key.clone())
        } else {
            None
        };

        Ok(ObjectPage {
            objects,
            continuation_token,
        })
    }

    fn download_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<(u64, u64)>,
    ) -> Result<Vec<u8>, AdapterError> {
        let state = self.lock();

        if let Some(limit) = state.failures.downloads_after {
            let first = range.map(|(first, _)| first).unwrap_or(0);
            if first >= limit {
                return Err(AdapterError::new("download_object", key, "connection reset"));
            }
        }

        let object = state
            .objects
            .get(&object_id(bucket, key))
            .ok_or_else(|| AdapterError::new("download_object", key, "no such key"))?;

        let data = &object.data;
        let bytes = match range {
            None => data.clone(),
            Some((first, last)) => {
                let len = data.len() as u64;
                if first >= len {
                    Vec::new()
                } else {
                    let end = last.saturating_add(1).min(len);
                    data[first as usize..end as usize].to_vec()
                }
            }
        };

        Ok(bytes)
    }

    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        mut source: File,
        _size: u64,
        progress: &mut dyn ProgressSink,
    ) -> Result<(), AdapterError> {
        let fail_after = {
            let mut state = self.lock();
            if state.failures.puts {
                return Err(AdapterError::new("put_object", key, "permission denied"));
            }
            state.in_flight.insert(object_id(bucket, key), Vec::new());
            state.failures.writes_after
        };

        let mut receiver = Receiver {
            adapter: self,
            id: object_id(bucket, key),
            fail_after,
        };

        let copied = copy_with_progress(&mut source, &mut receiver, progress);

        let mut state = self.lock();
        let data = state.in_flight.remove(&receiver.id).unwrap_or_default();
        copied.map_err(|err| AdapterError::new("put_object", key, err))?;

        state.objects.insert(
            receiver.id,
            MockObject {
                data,
                modified_time: SystemTime::now(),
            },
        );

        Ok(())
    }
}

/// Store side of an upload: appends what the client sends to the in-flight
/// buffer of the object.
struct Receiver<'a> {
    adapter: &'a MockAdapter,
    id: ObjectId,
    fail_after: Option<usize>,
}

impl Write for Receiver<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.adapter.lock();
        let received = state.in_flight.entry(self.id.clone()).or_default();

        if let Some(limit) = self.fail_after {
            if received.len() + buf.len() > limit {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "connection reset by store"));
            }
        }

        received.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
