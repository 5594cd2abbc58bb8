use std::{future::Future, io};

use tokio::runtime::{Builder, Runtime};

/// Drives SDK futures to completion on a runtime owned by the adapter, so the
/// adapters can expose a blocking API.
///
/// Must not be used from inside an async task; `block_on` panics there.
pub struct Poller {
    runtime: Runtime,
}

impl Poller {
    pub fn new() -> io::Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self { runtime })
    }

    pub fn poll_until_ready<Fut, T>(&self, future: Fut) -> T
    where
        Fut: Future<Output = T>,
    {
        self.runtime.block_on(future)
    }
}
