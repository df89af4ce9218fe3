//! Image payloads submitted for analysis.

// ============================================================================
// Imports
// ============================================================================

use std::path::Path;

use bytes::Bytes;
use image::guess_format;
use tokio::fs;

use crate::error::{Error, Result};
use crate::frame::{EncodedFrame, JPEG_MIME};

// ============================================================================
// Constants
// ============================================================================

/// Filename used when uploading a live frame.
pub const LIVE_FRAME_NAME: &str = "webcam_frame.jpg";

// ============================================================================
// ImageFile
// ============================================================================

/// An image ready to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    /// Filename sent in the multipart part.
    pub name: String,
    /// Media type, e.g. `image/png`.
    pub mime: String,
    /// Encoded image bytes.
    pub bytes: Bytes,
}

impl ImageFile {
    /// Reads an image from disk and sniffs its media type.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if the file cannot be read
    /// - [`Error::Image`] if the content is not a known image format
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).await?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::config(format!("Not a file path: {}", path.display())))?
            .to_string();

        Self::from_bytes(name, bytes)
    }

    /// Wraps in-memory image bytes, sniffing the media type.
    ///
    /// # Errors
    ///
    /// [`Error::Image`] if the content is not a known image format.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Bytes>) -> Result<Self> {
        let bytes = bytes.into();
        let format = guess_format(&bytes)?;

        Ok(Self {
            name: name.into(),
            mime: format.to_mime_type().to_string(),
            bytes,
        })
    }

    /// Re-encodes a live frame as `webcam_frame.jpg`.
    ///
    /// # Errors
    ///
    /// [`Error::Base64`] if a data URI frame has an invalid body.
    pub fn from_frame(frame: &EncodedFrame) -> Result<Self> {
        Ok(Self {
            name: LIVE_FRAME_NAME.to_string(),
            mime: JPEG_MIME.to_string(),
            bytes: frame.to_image_bytes()?,
        })
    }

    /// Size in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` for an empty payload.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
