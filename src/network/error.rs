use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed at offset {offset}: {source}")]
    Http {
        offset: u64,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unexpected status {status} at offset {offset}")]
    Status { offset: u64, status: u16 },

    #[error("Body truncated at offset {offset} (expected {expected} bytes)")]
    Truncated { offset: u64, expected: u64 },

    #[error("No response headers within {after:?} at offset {offset}")]
    Timeout { offset: u64, after: Duration },

    #[error("Invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

impl FetchError {
    /// Byte offset at which the failure happened, when it is tied to one.
    pub fn offset(&self) -> Option<u64> {
        match self {
            FetchError::Http { offset, .. }
            | FetchError::Status { offset, .. }
            | FetchError::Truncated { offset, .. }
            | FetchError::Timeout { offset, .. } => Some(*offset),
            FetchError::InvalidHeader { .. } | FetchError::Client(_) => None,
        }
    }
}

pub type FetchResult<T> = Result<T, FetchError>;
