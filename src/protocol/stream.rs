//! Push-stream message format.
//!
//! The frame server sends one JSON object per WebSocket text message:
//!
//! ```json
//! { "frame": "data:image/jpeg;base64,/9j/4AAQ..." }
//! ```
//!
//! or, when the camera cannot be read:
//!
//! ```json
//! { "error": "camera busy" }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::from_str;

use crate::error::Error;
use crate::frame::EncodedFrame;

// ============================================================================
// StreamMessage
// ============================================================================

/// Raw push-stream message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamMessage {
    /// JPEG data URI.
    #[serde(default)]
    pub frame: Option<String>,

    /// Server-side error description.
    #[serde(default)]
    pub error: Option<String>,
}

// ============================================================================
// StreamPayload
// ============================================================================

/// Classified push-stream message.
#[derive(Debug)]
pub enum StreamPayload {
    /// A valid JPEG frame.
    Frame(EncodedFrame),
    /// The server reported an error; the stream is over.
    ServerError(String),
    /// Anything else; the previous frame stays current.
    Malformed(Error),
}

impl StreamPayload {
    /// Parses and classifies one text message.
    ///
    /// A non-empty `error` field wins over any `frame` in the same message.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let message = match from_str::<StreamMessage>(text) {
            Ok(message) => message,
            Err(e) => return Self::Malformed(Error::malformed_frame(format!("invalid JSON: {e}"))),
        };

        if let Some(error) = message.error.filter(|e| !e.is_empty()) {
            return Self::ServerError(error);
        }

        match message.frame {
            Some(frame) => match EncodedFrame::from_data_uri(frame) {
                Ok(frame) => Self::Frame(frame),
                Err(e) => Self::Malformed(e),
            },
            None => Self::Malformed(Error::malformed_frame("missing frame field")),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_frame() {
        let payload = StreamPayload::parse(r#"{"frame":"data:image/jpeg;base64,AQID"}"#);
        assert!(matches!(payload, StreamPayload::Frame(_)));
    }

    #[test]
    fn test_error_field() {
        let payload = StreamPayload::parse(r#"{"error":"camera busy"}"#);
        assert!(matches!(payload, StreamPayload::ServerError(ref m) if m == "camera busy"));
    }

    #[test]
    fn test_error_wins_over_frame() {
        let payload =
            StreamPayload::parse(r#"{"error":"overheated","frame":"data:image/jpeg;base64,AQID"}"#);
        assert!(matches!(payload, StreamPayload::ServerError(_)));
    }

    #[test]
    fn test_empty_error_is_ignored() {
        let payload = StreamPayload::parse(r#"{"error":"","frame":"data:image/jpeg;base64,AQID"}"#);
        assert!(matches!(payload, StreamPayload::Frame(_)));
    }

    #[test]
    fn test_wrong_media_type_is_malformed() {
        let payload = StreamPayload::parse(r#"{"frame":"data:image/png;base64,AQID"}"#);
        assert!(matches!(payload, StreamPayload::Malformed(Error::MalformedFrame { .. })));
    }

    #[test]
    fn test_missing_frame_is_malformed() {
        assert!(matches!(
            StreamPayload::parse("{}"),
            StreamPayload::Malformed(_)
        ));
    }

    #[test]
    fn test_non_json_is_malformed() {
        assert!(matches!(
            StreamPayload::parse("not json"),
            StreamPayload::Malformed(_)
        ));
    }
}
