//! Encoded still frames.

// ============================================================================
// Imports
// ============================================================================

use std::time::Instant;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use bytes::Bytes;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Prefix every push-stream frame must start with.
pub const JPEG_DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

/// Media type of JPEG stills.
pub const JPEG_MIME: &str = "image/jpeg";

// ============================================================================
// FramePayload
// ============================================================================

/// Encoded image data of a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePayload {
    /// `data:image/jpeg;base64,...` as pushed by the frame server.
    DataUri(String),
    /// Raw encoded image bytes.
    Binary {
        /// Media type of `bytes`.
        mime: String,
        /// Encoded image.
        bytes: Bytes,
    },
}

// ============================================================================
// EncodedFrame
// ============================================================================

/// The most recent still captured from a live transport.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    payload: FramePayload,
    captured_at: Instant,
}

impl EncodedFrame {
    /// Wraps a JPEG data URI.
    ///
    /// # Errors
    ///
    /// [`Error::MalformedFrame`] if `uri` lacks the JPEG base64 prefix.
    pub fn from_data_uri(uri: impl Into<String>) -> Result<Self> {
        let uri = uri.into();
        if !uri.starts_with(JPEG_DATA_URI_PREFIX) {
            return Err(Error::malformed_frame("expected a base64 JPEG data URI"));
        }
        Ok(Self {
            payload: FramePayload::DataUri(uri),
            captured_at: Instant::now(),
        })
    }

    /// Wraps JPEG bytes.
    #[must_use]
    pub fn jpeg(bytes: impl Into<Bytes>) -> Self {
        Self {
            payload: FramePayload::Binary {
                mime: JPEG_MIME.to_string(),
                bytes: bytes.into(),
            },
            captured_at: Instant::now(),
        }
    }

    /// Returns the payload.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &FramePayload {
        &self.payload
    }

    /// Monotonic capture time.
    #[inline]
    #[must_use]
    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    /// Media type of the encoded image.
    #[must_use]
    pub fn mime(&self) -> &str {
        match &self.payload {
            FramePayload::DataUri(_) => JPEG_MIME,
            FramePayload::Binary { mime, .. } => mime,
        }
    }

    /// Decodes the frame into binary image bytes.
    ///
    /// # Errors
    ///
    /// [`Error::Base64`] if the data URI body is not valid base64.
    pub fn to_image_bytes(&self) -> Result<Bytes> {
        match &self.payload {
            FramePayload::DataUri(uri) => {
                let body = &uri[JPEG_DATA_URI_PREFIX.len()..];
                Ok(Bytes::from(Base64Standard.decode(body)?))
            }
            FramePayload::Binary { bytes, .. } => Ok(bytes.clone()),
        }
    }

    /// Renders the frame as a data URI for display surfaces.
    #[must_use]
    pub fn to_data_uri(&self) -> String {
        match &self.payload {
            FramePayload::DataUri(uri) => uri.clone(),
            FramePayload::Binary { mime, bytes } => {
                format!("data:{mime};base64,{}", Base64Standard.encode(bytes))
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
