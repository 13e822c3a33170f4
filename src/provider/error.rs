use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("No provider supports {0}")]
    NoProvider(String),

    #[error("Provider {provider} returned no usable media")]
    EmptyResult { provider: String },

    #[error("Provider {provider} failed: {reason}")]
    Failed { provider: String, reason: String },

    #[error("Fetch error: {0}")]
    Fetch(#[from] crate::network::FetchError),
}

impl ProviderError {
    pub fn provider(&self) -> Option<&str> {
        match self {
            ProviderError::EmptyResult { provider } | ProviderError::Failed { provider, .. } => {
                Some(provider)
            }
            ProviderError::NoProvider(_) | ProviderError::Fetch(_) => None,
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;
