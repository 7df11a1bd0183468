//! Incremental SSE framing and per-frame payload decoding.
use crate::errors::{FrameParseError, payload_preview};
use crate::event::StreamEvent;

/// One SSE frame after `data:` prefixes have been stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Stateful frame splitter.
///
/// Bytes are buffered until a blank-line delimiter arrives, and only complete
/// frames are turned into text. A multi-byte character split across two
/// chunks is therefore decoded intact.
#[derive(Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    /// Prefix of `buf` already searched for a delimiter.
    scanned: usize,
}

/// Longest delimiter (`\r\n\r\n`) minus one: a delimiter cut by a chunk
/// boundary starts at most this far before the end of the buffer.
const DELIMITER_OVERLAP: usize = 3;

impl SseDecoder {
    /// Feeds one chunk and returns every frame it completed.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        let mut start = 0;
        while let Some((end, delim_len)) = next_delimiter(&self.buf, start.max(self.scanned)) {
            frames.extend(parse_frame(&self.buf[start..end]));
            start = end + delim_len;
        }
        self.buf.drain(..start);
        self.scanned = self.buf.len().saturating_sub(DELIMITER_OVERLAP);
        frames
    }

    /// Flushes whatever is left once the byte stream has ended.
    pub fn finish(&mut self) -> Option<SseFrame> {
        self.scanned = 0;
        parse_frame(&std::mem::take(&mut self.buf))
    }
}

/// Position and length of the first frame delimiter at or after `from`.
fn next_delimiter(buf: &[u8], from: usize) -> Option<(usize, usize)> {
    (from..buf.len()).find_map(|i| {
        let tail = &buf[i..];
        if tail.starts_with(b"\n\n") {
            Some((i, 2))
        } else if tail.starts_with(b"\r\n\r\n") {
            Some((i, 4))
        } else {
            None
        }
    })
}

/// Collects the `event` and `data` fields of one frame. Frames without any
/// `data` line carry nothing and yield `None`.
fn parse_frame(bytes: &[u8]) -> Option<SseFrame> {
    let text = String::from_utf8_lossy(bytes);
    let mut event = None;
    let mut data: Option<String> = None;
    for line in text.lines() {
        let (field, value) = match line.split_once(':') {
            // comment
            Some(("", _)) => continue,
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => {
                if let Some(joined) = &mut data {
                    joined.push('\n');
                    joined.push_str(value);
                } else {
                    data = Some(value.to_string());
                }
            }
            "event" => event = Some(value.to_string()),
            _ => {}
        }
    }
    data.map(|data| SseFrame { event, data })
}

/// Decodes a frame's payload.
///
/// Returns `None` for frames that carry nothing to dispatch (empty data or the
/// `[DONE]` sentinel). A payload that is not JSON but starts with `<` is taken
/// as raw HTML and becomes an implicit [`StreamEvent::SectionComplete`]; this
/// keeps older backends that streamed bare markup working.
pub fn decode_frame(frame: &SseFrame) -> Option<Result<StreamEvent, FrameParseError>> {
    let payload = frame.data.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }
    let decoded = match serde_json::from_str::<serde_json::Value>(payload) {
        Ok(value) => StreamEvent::from_json(&value),
        Err(_) if payload.starts_with('<') => Ok(StreamEvent::SectionComplete {
            html_content: frame.data.clone(),
        }),
        Err(e) => Err(FrameParseError::InvalidJson {
            reason: e.to_string(),
            payload_preview: payload_preview(payload),
        }),
    };
    Some(decoded)
}
