use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::provider::error::ProviderResult;

/// Optional media metadata a provider may know up front.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MediaAttributes {
    /// Seconds.
    pub duration: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl MediaAttributes {
    pub fn is_empty(&self) -> bool {
        self.duration.is_none() && self.width.is_none() && self.height.is_none()
    }
}

/// A resolved, directly fetchable media object.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MediaDescriptor {
    pub url: String,
    pub filename: String,
    /// Bytes; 0 when unknown.
    pub size: u64,
    /// Sent verbatim with every origin request (cookies, referer, UA overrides).
    pub headers: HashMap<String, String>,
    /// May be empty.
    pub mime: String,
    pub attributes: MediaAttributes,
}

impl MediaDescriptor {
    pub fn new(url: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            filename: filename.into(),
            ..Default::default()
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = mime.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_attributes(mut self, attributes: MediaAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn size_hint(&self) -> Option<u64> {
        (self.size > 0).then_some(self.size)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolveOptions {
    pub audio_only: bool,
}

/// Result of a successful resolve.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub provider: String,
    pub descriptors: Vec<MediaDescriptor>,
}

/// Adapter turning a user-supplied URL into fetchable descriptors.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    fn supports(&self, url: &str) -> bool;

    async fn get_media_info(
        &self,
        url: &str,
        opts: &ResolveOptions,
    ) -> ProviderResult<Vec<MediaDescriptor>>;
}
