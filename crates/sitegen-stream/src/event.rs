use serde_json::Value;

use crate::errors::FrameParseError;

/// One event decoded from a frame of the build stream.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// Remaining request quota for the user.
    Info { remaining_requests: u64 },
    /// Human-readable progress line, optionally with a completion percentage.
    Progress {
        message: String,
        percent: Option<f64>,
    },
    /// Cumulative HTML after one section finished.
    SectionComplete { html_content: String },
    /// Final HTML for a whole component.
    ComponentComplete { html_content: String },
    /// A generated image to show in the progress log.
    Image { description: String, url: String },
    /// Non-fatal backend problem (for example one section failed).
    Warning { message: String },
    /// Fatal backend error. Ends the stream.
    Error { message: String },
    /// Unrecognized `type` tag.
    Unknown { kind: String },
}

impl StreamEvent {
    /// Wire tag of this event.
    pub fn kind(&self) -> &str {
        match self {
            Self::Info { .. } => "info",
            Self::Progress { .. } => "progress",
            Self::SectionComplete { .. } => "section_complete",
            Self::ComponentComplete { .. } => "component_complete",
            Self::Image { .. } => "image",
            Self::Warning { .. } => "warning",
            Self::Error { .. } => "error",
            Self::Unknown { kind } => kind,
        }
    }

    /// Builds an event from a decoded JSON payload.
    pub fn from_json(value: &Value) -> Result<Self, FrameParseError> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(FrameParseError::MissingType)?;
        let field = |name: &'static str| -> Result<String, FrameParseError> {
            value
                .get(name)
                .and_then(Value::as_str)
                .map(ToOwned::to_owned)
                .ok_or_else(|| FrameParseError::MissingField {
                    kind: kind.to_string(),
                    field: name,
                })
        };

        let event = match kind {
            "info" => {
                let remaining_requests = value
                    .get("remaining_requests")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| FrameParseError::MissingField {
                        kind: kind.to_string(),
                        field: "remaining_requests",
                    })?;
                Self::Info { remaining_requests }
            }
            "progress" => Self::Progress {
                message: field("message")?,
                percent: value.get("progress").and_then(Value::as_f64),
            },
            "section_complete" => Self::SectionComplete {
                html_content: field("content")?,
            },
            "component_complete" => Self::ComponentComplete {
                html_content: field("content")?,
            },
            "image" => Self::Image {
                description: field("description")?,
                url: field("url")?,
            },
            "warning" => Self::Warning {
                message: field("message")?,
            },
            "error" => Self::Error {
                message: field("message")?,
            },
            other => Self::Unknown {
                kind: other.to_string(),
            },
        };
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_known_variants() {
        let info = StreamEvent::from_json(&json!({"type":"info","remaining_requests":7}))
            .expect("info");
        assert_eq!(
            info,
            StreamEvent::Info {
                remaining_requests: 7
            }
        );

        let progress = StreamEvent::from_json(
            &json!({"type":"progress","message":"Section 1/2: hero","progress":50.0}),
        )
        .expect("progress");
        assert_eq!(
            progress,
            StreamEvent::Progress {
                message: "Section 1/2: hero".into(),
                percent: Some(50.0)
            }
        );

        let image = StreamEvent::from_json(
            &json!({"type":"image","description":"a cat","url":"/media/cat.png"}),
        )
        .expect("image");
        assert_eq!(image.kind(), "image");

        let done = StreamEvent::from_json(&json!({"type":"component_complete","content":"<p/>"}))
            .expect("component");
        assert_eq!(
            done,
            StreamEvent::ComponentComplete {
                html_content: "<p/>".into()
            }
        );
    }

    #[test]
    fn unknown_tag_is_tolerated() {
        let event = StreamEvent::from_json(&json!({"type":"heartbeat","n":1})).expect("unknown");
        assert_eq!(
            event,
            StreamEvent::Unknown {
                kind: "heartbeat".into()
            }
        );
        assert_eq!(event.kind(), "heartbeat");
    }

    #[test]
    fn fields_of_other_variants_are_ignored() {
        let event = StreamEvent::from_json(
            &json!({"type":"error","message":"boom","content":"<html>","url":"x"}),
        )
        .expect("error");
        assert_eq!(
            event,
            StreamEvent::Error {
                message: "boom".into()
            }
        );
    }

    #[test]
    fn missing_type_and_missing_field_are_errors() {
        assert_eq!(
            StreamEvent::from_json(&json!({"message":"hi"})),
            Err(FrameParseError::MissingType)
        );
        assert_eq!(
            StreamEvent::from_json(&json!({"type":"section_complete"})),
            Err(FrameParseError::MissingField {
                kind: "section_complete".into(),
                field: "content"
            })
        );
        assert!(matches!(
            StreamEvent::from_json(&json!({"type":"info","remaining_requests":"3"})),
            Err(FrameParseError::MissingField {
                field: "remaining_requests",
                ..
            })
        ));
    }
}
