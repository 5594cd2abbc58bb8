use tracing::debug;

/// Receives byte counts while a transfer copies data. Called once per copied
/// chunk, so implementations must return quickly.
pub trait ProgressSink {
    fn on_bytes_transferred(&mut self, count: usize);
}

impl<F> ProgressSink for F
where
    F: FnMut(usize),
{
    fn on_bytes_transferred(&mut self, count: usize) {
        self(count)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ByteCounter {
    total: u64,
}

impl ByteCounter {
    pub fn total(&self) -> u64 {
        self.total
    }
}

impl ProgressSink for ByteCounter {
    fn on_bytes_transferred(&mut self, count: usize) {
        self.total += count as u64;
    }
}

/// Emits a debug event for every chunk with the running total.
#[derive(Debug)]
pub struct LoggingProgress {
    resource: String,
    counter: ByteCounter,
}

impl LoggingProgress {
    pub fn new(resource: &str) -> Self {
        Self {
            resource: resource.to_string(),
            counter: ByteCounter::default(),
        }
    }
}

impl ProgressSink for LoggingProgress {
    fn on_bytes_transferred(&mut self, count: usize) {
        self.counter.on_bytes_transferred(count);
        debug!(
            resource = self.resource,
            chunk = count,
            total = self.counter.total(),
            "transferred"
        );
    }
}
