pub mod adapters;
pub mod client;
pub mod model;
pub mod progress;
pub mod util;

pub use client::{TransferClient, Transport};
pub use model::transfer::{TransferError, TransferResult};
pub use progress::ProgressSink;
