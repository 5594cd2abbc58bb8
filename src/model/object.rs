use std::{
    fmt,
    time::{Duration, SystemTime},
};

/// Metadata of a remote object as reported by the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    pub modified_time: SystemTime,
}

impl ObjectMeta {
    /// Last-modified time in milliseconds since the unix epoch. Negative for
    /// timestamps before the epoch.
    pub fn modified_millis(&self) -> i64 {
        match self.modified_time.duration_since(SystemTime::UNIX_EPOCH) {
            Ok(since) => since.as_millis() as i64,
            Err(err) => -(err.duration().as_millis() as i64),
        }
    }
}

/// One bounded page of a prefix listing.
#[derive(Clone, Debug, Default)]
pub struct ObjectPage {
    pub objects: Vec<ObjectMeta>,
    pub continuation_token: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AdapterError {
    pub message: String,
}

impl AdapterError {
    pub fn new(op: &str, key: &str, cause: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to {} at: {}, {}", op, key, cause),
        }
    }
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for AdapterError {}

pub fn system_time_from_parts(secs: i64, nanos: u32) -> SystemTime {
    if secs >= 0 {
        SystemTime::UNIX_EPOCH + Duration::new(secs as u64, nanos)
    } else {
        SystemTime::UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs()) + Duration::from_nanos(nanos as u64)
    }
}
