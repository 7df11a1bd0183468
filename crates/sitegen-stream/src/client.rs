use std::pin::Pin;

use futures::Stream;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use crate::assembler::{AbortSignal, ConsumeReport, StreamAssembler};
use crate::config::BuildClientConfig;
use crate::errors::BuildError;
use crate::overlay::{Overlay, OverlayGuard};

/// Response body of an accepted build request.
pub type ByteStream =
    Pin<Box<dyn Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static>>;

#[derive(serde::Serialize)]
struct BuildRequest<'a> {
    website_description: &'a str,
}

/// HTTP client for the page builder endpoint.
pub struct BuildClient {
    client: reqwest::Client,
    config: BuildClientConfig,
}

impl BuildClient {
    pub fn new(config: BuildClientConfig) -> Result<Self, BuildError> {
        if config.base_url.trim().is_empty() {
            return Err(BuildError::Config("base_url must not be empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BuildError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self, BuildError> {
        Self::new(BuildClientConfig::from_env()?)
    }

    pub fn config(&self) -> &BuildClientConfig {
        &self.config
    }

    /// Posts a description and returns the response body once the backend
    /// has accepted it.
    pub async fn submit(&self, description: &str) -> Result<ByteStream, BuildError> {
        let description = validate_description(description)?;
        let url = self.config.build_url();
        debug!(url = %url, chars = description.chars().count(), "submitting build request");

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&BuildRequest {
                website_description: description,
            })
            .send()
            .await
            .map_err(|e| BuildError::transport(format!("build request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BuildError::RequestRejected {
                status: status.as_u16(),
                message: rejection_message(status, &body),
            });
        }
        Ok(Box::pin(response.bytes_stream()))
    }

    /// Runs one build end to end: shows the overlay, starts a new message
    /// group, submits the description and consumes the response.
    ///
    /// The overlay is hidden exactly once whichever way this returns.
    pub async fn build_page(
        &self,
        assembler: &StreamAssembler,
        overlay: &dyn Overlay,
        description: &str,
        abort: AbortSignal,
    ) -> Result<ConsumeReport, BuildError> {
        let description = validate_description(description)?;
        let _overlay = OverlayGuard::acquire(overlay);
        assembler.reset_group()?;

        let mut waiting = abort.clone();
        let bytes = tokio::select! {
            biased;
            _ = waiting.aborted() => return Err(BuildError::Cancelled),
            submitted = self.submit(description) => submitted?,
        };
        assembler.consume(bytes, abort).await
    }
}

fn validate_description(description: &str) -> Result<&str, BuildError> {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        return Err(BuildError::Validation(
            "please provide a website description".into(),
        ));
    }
    Ok(trimmed)
}

/// Picks the user-facing message out of a rejected response body.
///
/// The backend answers with `{"message": ...}` for its own checks and
/// `{"detail": ...}` for framework-level ones (auth, validation).
pub(crate) fn rejection_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(message) = value.get("message").and_then(Value::as_str) {
            return message.to_string();
        }
        match value.get("detail") {
            Some(Value::String(detail)) => return detail.clone(),
            Some(Value::Array(items)) => {
                let msgs: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(Value::as_str))
                    .collect();
                if !msgs.is_empty() {
                    return msgs.join("; ");
                }
            }
            _ => {}
        }
    }
    let body = body.trim();
    if !body.is_empty() {
        return body.to_string();
    }
    status
        .canonical_reason()
        .unwrap_or("request rejected")
        .to_string()
}
