use std::{error::Error, io, path::Path};

use thiserror::Error;

use crate::{model::object::AdapterError, util::locator::LocatorError};

pub type TransferResult<T> = Result<T, TransferError>;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("'{resource}' does not exist")]
    ResourceNotFound { resource: String },

    #[error("{message}")]
    TransferFailed {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },

    #[error("not connected to a repository")]
    IllegalState,

    #[error(transparent)]
    Backend(#[from] AdapterError),

    #[error("invalid repository: {0}")]
    InvalidRepository(#[from] LocatorError),

    #[error("failed to connect: {0}")]
    Connect(#[source] AdapterError),
}

impl TransferError {
    pub fn not_found(resource: &str) -> Self {
        TransferError::ResourceNotFound {
            resource: resource.to_string(),
        }
    }

    pub fn cannot_write(destination: impl AsRef<Path>, source: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        TransferError::TransferFailed {
            message: format!("Cannot write file to '{}'", destination.as_ref().display()),
            source: source.into(),
        }
    }

    pub fn cannot_copy(from: impl AsRef<Path>, to: impl AsRef<Path>, source: io::Error) -> Self {
        TransferError::TransferFailed {
            message: format!(
                "Cannot read from '{}' and write to '{}'",
                from.as_ref().display(),
                to.as_ref().display()
            ),
            source: Box::new(source),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TransferError::ResourceNotFound { .. })
    }

    pub fn is_transfer_failed(&self) -> bool {
        matches!(self, TransferError::TransferFailed { .. })
    }
}
