//! Fallback provider for URLs that already point straight at a media file.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, Url};

use crate::network::{probe, FetchError, HttpConfig, ProbeInfo};
use crate::provider::error::{ProviderError, ProviderResult};
use crate::provider::types::{MediaDescriptor, Provider, ResolveOptions};

const NAME: &str = "direct";

pub struct DirectLinkProvider {
    client: Client,
    config: HttpConfig,
    headers: HashMap<String, String>,
}

impl DirectLinkProvider {
    pub fn new(client: Client, config: HttpConfig) -> Self {
        Self {
            client,
            config,
            headers: HashMap::new(),
        }
    }

    /// Headers attached to the probe and to every produced descriptor.
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }
}

/// Last non-empty path segment of `url`, or `"file"`.
pub fn filename_from_url(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| "file".to_string())
}

#[async_trait]
impl Provider for DirectLinkProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn supports(&self, url: &str) -> bool {
        Url::parse(url)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false)
    }

    async fn get_media_info(
        &self,
        url: &str,
        opts: &ResolveOptions,
    ) -> ProviderResult<Vec<MediaDescriptor>> {
        // Mirrors the reader: a refused or failed HEAD leaves the size unknown.
        let info = match probe(&self.client, url, &self.headers, &self.config).await {
            Ok(info) => info,
            Err(e @ (FetchError::InvalidHeader { .. } | FetchError::Client(_))) => {
                return Err(e.into());
            }
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "HEAD probe failed, size unknown");
                ProbeInfo::default()
            }
        };
        let mime = info
            .content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_string())
            .unwrap_or_default();

        if opts.audio_only && !mime.is_empty() && !mime.starts_with("audio/") {
            return Err(ProviderError::Failed {
                provider: NAME.to_string(),
                reason: format!("audio requested but {url} serves {mime}"),
            });
        }

        let mut descriptor = MediaDescriptor::new(url, filename_from_url(url))
            .with_size(info.size.unwrap_or(0))
            .with_mime(mime);
        descriptor.headers = self.headers.clone();

        Ok(vec![descriptor])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_from_url() {
        assert_eq!(
            filename_from_url("https://cdn.example.com/media/clip.mp4?token=abc"),
            "clip.mp4"
        );
        assert_eq!(filename_from_url("https://cdn.example.com/dir/"), "dir");
        assert_eq!(filename_from_url("https://cdn.example.com"), "file");
        assert_eq!(filename_from_url("not a url"), "file");
    }

    #[test]
    fn test_supports_only_http() {
        let provider = DirectLinkProvider::new(Client::new(), HttpConfig::default());
        assert!(provider.supports("https://example.com/a.mp3"));
        assert!(provider.supports("http://example.com/a.mp3"));
        assert!(!provider.supports("ftp://example.com/a.mp3"));
        assert!(!provider.supports("example.com/a.mp3"));
    }
}
