use std::sync::Arc;

use crate::provider::error::{ProviderError, ProviderResult};
use crate::provider::types::{Provider, ResolveOptions, Resolved};

/// Ordered list of providers consulted on every resolve.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        tracing::debug!(provider = provider.name(), "registered provider");
        self.providers.push(provider);
    }

    pub fn with(mut self, provider: Arc<dyn Provider>) -> Self {
        self.register(provider);
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Return the first matching provider's result whose first descriptor has
    /// a URL. Failing that, the last error seen, or `NoProvider`.
    pub async fn resolve(&self, url: &str, opts: &ResolveOptions) -> ProviderResult<Resolved> {
        let mut last_error = None;

        for provider in self.providers.iter().filter(|p| p.supports(url)) {
            match provider.get_media_info(url, opts).await {
                Ok(descriptors)
                    if descriptors
                        .first()
                        .map(|d| !d.url.is_empty())
                        .unwrap_or(false) =>
                {
                    tracing::info!(
                        provider = provider.name(),
                        count = descriptors.len(),
                        "resolved media"
                    );
                    return Ok(Resolved {
                        provider: provider.name().to_string(),
                        descriptors,
                    });
                }
                Ok(_) => {
                    tracing::warn!(provider = provider.name(), "provider returned no media");
                    last_error = Some(ProviderError::EmptyResult {
                        provider: provider.name().to_string(),
                    });
                }
                Err(e) => {
                    tracing::warn!(provider = provider.name(), error = %e, "provider failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ProviderError::NoProvider(url.to_string())))
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}
