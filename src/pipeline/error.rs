use thiserror::Error;

use crate::network::FetchError;
use crate::provider::ProviderError;
use crate::resource::ResourceError;
use crate::upload::UploadError;

/// Why a transfer did not complete.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Cancelled while waiting for a transfer slot")]
    ResourceExhausted,

    #[error("Provider {provider} could not resolve media: {reason}")]
    ResolveFailed { provider: String, reason: String },

    #[error("Fetch failed at offset {offset}: {source}")]
    FetchFailed {
        offset: u64,
        #[source]
        source: FetchError,
    },

    #[error("Upload of part {part} failed after {attempts} attempts: {source}")]
    UploadFailed {
        part: u32,
        attempts: u32,
        #[source]
        source: UploadError,
    },

    #[error("Transfer cancelled")]
    Cancelled,

    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TransferError {
    /// Low-cardinality label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            TransferError::ResourceExhausted => "resource_exhausted",
            TransferError::ResolveFailed { .. } => "resolve",
            TransferError::FetchFailed { .. } => "fetch",
            TransferError::UploadFailed { .. } => "upload",
            TransferError::Cancelled => "cancelled",
            TransferError::InvalidDescriptor(_) => "invalid_descriptor",
            TransferError::Internal(_) => "internal",
        }
    }
}

impl From<FetchError> for TransferError {
    fn from(source: FetchError) -> Self {
        TransferError::FetchFailed {
            offset: source.offset().unwrap_or(0),
            source,
        }
    }
}

impl From<ProviderError> for TransferError {
    fn from(err: ProviderError) -> Self {
        TransferError::ResolveFailed {
            provider: err.provider().unwrap_or("none").to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<ResourceError> for TransferError {
    fn from(err: ResourceError) -> Self {
        match err {
            ResourceError::Cancelled => TransferError::ResourceExhausted,
            ResourceError::Closed => TransferError::Internal(err.to_string()),
        }
    }
}

pub type TransferResult<T> = Result<T, TransferError>;
