use async_trait::async_trait;
use reqwest::{Client, Url};

use crate::upload::error::{UploadError, UploadResult};
use crate::upload::sink::UploadSink;

/// Posts raw part bytes to an HTTP upload endpoint.
///
/// Small parts go to `{endpoint}/saveFilePart`, big parts to
/// `{endpoint}/saveBigFilePart`; identifiers travel as query parameters.
pub struct HttpUploadSink {
    client: Client,
    endpoint: Url,
}

impl HttpUploadSink {
    pub fn new(client: Client, endpoint: &str) -> UploadResult<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| UploadError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
        if endpoint.cannot_be_a_base() {
            return Err(UploadError::InvalidEndpoint(endpoint.to_string()));
        }
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn method_url(&self, method: &str, params: &[(&str, String)]) -> Url {
        let mut url = self.endpoint.clone();
        let path = format!("{}/{}", url.path().trim_end_matches('/'), method);
        url.set_path(&path);
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in params {
                query.append_pair(key, value);
            }
        }
        url
    }

    async fn post(&self, url: Url, bytes: &[u8]) -> UploadResult<()> {
        let response = self.client.post(url).body(bytes.to_vec()).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(UploadError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl UploadSink for HttpUploadSink {
    async fn upload_small(&self, file_id: i64, part: u32, bytes: &[u8]) -> UploadResult<()> {
        let url = self.method_url(
            "saveFilePart",
            &[("file_id", file_id.to_string()), ("file_part", part.to_string())],
        );
        self.post(url, bytes).await
    }

    async fn upload_big(
        &self,
        file_id: i64,
        part: u32,
        total_parts: u32,
        bytes: &[u8],
    ) -> UploadResult<()> {
        let url = self.method_url(
            "saveBigFilePart",
            &[
                ("file_id", file_id.to_string()),
                ("file_part", part.to_string()),
                ("file_total_parts", total_parts.to_string()),
            ],
        );
        self.post(url, bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_url() {
        let sink = HttpUploadSink::new(Client::new(), "http://127.0.0.1:9000/bot/").unwrap();
        let url = sink.method_url(
            "saveBigFilePart",
            &[
                ("file_id", "-5".to_string()),
                ("file_part", "2".to_string()),
                ("file_total_parts", "7".to_string()),
            ],
        );
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:9000/bot/saveBigFilePart?file_id=-5&file_part=2&file_total_parts=7"
        );
    }

    #[test]
    fn test_rejects_bad_endpoint() {
        assert!(matches!(
            HttpUploadSink::new(Client::new(), "not a url"),
            Err(UploadError::InvalidEndpoint(_))
        ));
        assert!(matches!(
            HttpUploadSink::new(Client::new(), "mailto:someone@example.com"),
            Err(UploadError::InvalidEndpoint(_))
        ));
    }
}
