use thiserror::Error;

use crate::upload::sink::SizeClass;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Upload rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upload failed: {0}")]
    Failed(String),

    #[error("Sink does not accept {0:?} uploads")]
    Unsupported(SizeClass),

    #[error("Small uploads require an MD5 checksum")]
    MissingChecksum,

    #[error("Invalid upload endpoint: {0}")]
    InvalidEndpoint(String),
}

impl UploadError {
    /// Whether trying again could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            UploadError::Rejected { status, .. } => *status == 429 || *status >= 500,
            UploadError::Http(_) | UploadError::Failed(_) => true,
            UploadError::Unsupported(_)
            | UploadError::MissingChecksum
            | UploadError::InvalidEndpoint(_) => false,
        }
    }
}

pub type UploadResult<T> = Result<T, UploadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let server = UploadError::Rejected {
            status: 503,
            body: String::new(),
        };
        let throttled = UploadError::Rejected {
            status: 429,
            body: String::new(),
        };
        let client = UploadError::Rejected {
            status: 400,
            body: "FILE_PART_INVALID".into(),
        };

        assert!(server.is_retryable());
        assert!(throttled.is_retryable());
        assert!(!client.is_retryable());
        assert!(UploadError::Failed("reset".into()).is_retryable());
        assert!(!UploadError::MissingChecksum.is_retryable());
    }
}
