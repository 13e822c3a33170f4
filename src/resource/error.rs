use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    #[error("Cancelled while waiting for a transfer slot")]
    Cancelled,

    #[error("Resource manager is closed")]
    Closed,
}

pub type ResourceResult<T> = Result<T, ResourceError>;
