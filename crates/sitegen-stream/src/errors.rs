use std::time::Duration;

/// Errors that end a build and are returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// Invalid user input (for example a blank description).
    #[error("validation error: {0}")]
    Validation(String),
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Backend answered with a non-success status before streaming began.
    #[error("request rejected ({status}): {message}")]
    RequestRejected { status: u16, message: String },
    /// Network or stream I/O failed.
    #[error("transport error: {0}")]
    Transport(String),
    /// Backend sent an explicit `error` event.
    #[error("{0}")]
    ServerReported(String),
    /// Another `consume` call is already running on this assembler.
    #[error("assembler is already consuming a stream")]
    Busy,
    /// The caller aborted the build.
    #[error("build cancelled")]
    Cancelled,
}

impl BuildError {
    pub(crate) fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Returns true when the error was produced before any event was applied.
    pub fn is_before_stream(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Config(_) | Self::RequestRejected { .. } | Self::Busy
        )
    }
}

/// One malformed frame. The stream keeps going after these.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameParseError {
    #[error("invalid JSON frame ({reason}): {payload_preview}")]
    InvalidJson {
        reason: String,
        payload_preview: String,
    },
    #[error("frame has no `type` field")]
    MissingType,
    #[error("`{kind}` frame is missing `{field}`")]
    MissingField { kind: String, field: &'static str },
}

/// One image that did not load. The stream keeps going after these.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageLoadError {
    #[error("image {url} failed to load: {reason}")]
    Failed { url: String, reason: String },
    #[error("image {url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("image {url} timed out after {after:?}")]
    TimedOut { url: String, after: Duration },
    /// The load future was dropped before it reported a result.
    #[error("image {url} load was abandoned")]
    Abandoned { url: String },
}

impl ImageLoadError {
    pub fn url(&self) -> &str {
        match self {
            Self::Failed { url, .. }
            | Self::Status { url, .. }
            | Self::TimedOut { url, .. }
            | Self::Abandoned { url } => url,
        }
    }
}

const PREVIEW_LEN: usize = 80;

pub(crate) fn payload_preview(payload: &str) -> String {
    let mut preview: String = payload.chars().take(PREVIEW_LEN).collect();
    if payload.chars().count() > PREVIEW_LEN {
        preview.push_str("...");
    }
    preview
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_preview_truncates_on_char_boundary() {
        let long = "é".repeat(100);
        let preview = payload_preview(&long);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), PREVIEW_LEN + 3);
        assert_eq!(payload_preview("short"), "short");
    }

    #[test]
    fn before_stream_classification() {
        assert!(
            BuildError::RequestRejected {
                status: 429,
                message: "limit".into()
            }
            .is_before_stream()
        );
        assert!(!BuildError::ServerReported("boom".into()).is_before_stream());
        assert!(!BuildError::Cancelled.is_before_stream());
    }

    #[test]
    fn server_reported_displays_bare_message() {
        assert_eq!(
            BuildError::ServerReported("Pipeline error: x".into()).to_string(),
            "Pipeline error: x"
        );
    }
}
