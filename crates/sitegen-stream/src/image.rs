use std::time::Duration;

use tracing::debug;

use crate::errors::{BuildError, ImageLoadError};

/// Loads an image so it can be shown; resolves once it is ready or failed.
#[async_trait::async_trait]
pub trait ImageLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<(), ImageLoadError>;
}

/// `ImageLoader` that fetches the image over HTTP and requires a 2xx answer.
///
/// Relative URLs (the backend hands out `/mnt/media_storage/...` paths) are
/// resolved against `base_url`.
pub struct HttpImageLoader {
    client: reqwest::Client,
    base_url: String,
}

impl HttpImageLoader {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BuildError> {
        let base_url = base_url.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BuildError::Config(format!("failed to build image client: {e}")))?;
        Ok(Self { client, base_url })
    }

    pub(crate) fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") || url.starts_with("data:") {
            return url.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            url.trim_start_matches('/')
        )
    }
}

#[async_trait::async_trait]
impl ImageLoader for HttpImageLoader {
    async fn load(&self, url: &str) -> Result<(), ImageLoadError> {
        if url.starts_with("data:") {
            return Ok(());
        }
        let resolved = self.resolve(url);
        debug!(url = %resolved, "loading image");
        let response =
            self.client
                .get(&resolved)
                .send()
                .await
                .map_err(|e| ImageLoadError::Failed {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ImageLoadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.bytes().await.map_err(|e| ImageLoadError::Failed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_urls_resolve_against_base() {
        let loader =
            HttpImageLoader::new("http://localhost:8000/", Duration::from_secs(1)).expect("loader");
        assert_eq!(
            loader.resolve("/mnt/media_storage/generated/a.png"),
            "http://localhost:8000/mnt/media_storage/generated/a.png"
        );
        assert_eq!(
            loader.resolve("https://cdn.example.com/a.png"),
            "https://cdn.example.com/a.png"
        );
    }

    #[tokio::test]
    async fn data_urls_load_without_network() {
        let loader =
            HttpImageLoader::new("http://localhost:1", Duration::from_secs(1)).expect("loader");
        assert!(loader.load("data:image/png;base64,AAAA").await.is_ok());
    }
}
