//! Video surface the remote track renders into.
//!
//! The surface keeps the most recent decoded picture. The frame sampler
//! snapshots it as a JPEG at a fixed cadence.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::Result;
use crate::frame::EncodedFrame;

use super::peer::MediaSample;

// ============================================================================
// Traits
// ============================================================================

/// Render target for a remote video track.
pub trait VideoSurface: Send + Sync {
    /// Feeds one encoded sample.
    fn present(&self, sample: &MediaSample);

    /// Encodes the current picture as a JPEG still.
    ///
    /// Returns `None` until a picture has been decoded.
    fn capture_still(&self) -> Option<EncodedFrame>;

    /// Drops the current picture.
    fn clear(&self);
}

/// Turns encoded samples into pictures.
pub trait FrameDecoder: Send {
    /// Decodes one access unit. `Ok(None)` when no picture is ready yet.
    fn decode(&mut self, data: &[u8]) -> Result<Option<RgbImage>>;
}

// ============================================================================
// DecodingSurface
// ============================================================================

/// [`VideoSurface`] backed by a [`FrameDecoder`].
pub struct DecodingSurface {
    decoder: Mutex<Option<Box<dyn FrameDecoder>>>,
    picture: Mutex<Option<RgbImage>>,
    jpeg_quality: u8,
    warned: AtomicBool,
}

impl DecodingSurface {
    /// Creates a surface with the built-in decoder, if one is compiled in.
    #[must_use]
    pub fn new(jpeg_quality: u8) -> Self {
        Self::from_parts(default_decoder(), jpeg_quality)
    }

    /// Creates a surface with a custom decoder.
    #[must_use]
    pub fn with_decoder(decoder: Box<dyn FrameDecoder>, jpeg_quality: u8) -> Self {
        Self::from_parts(Some(decoder), jpeg_quality)
    }

    fn from_parts(decoder: Option<Box<dyn FrameDecoder>>, jpeg_quality: u8) -> Self {
        Self {
            decoder: Mutex::new(decoder),
            picture: Mutex::new(None),
            jpeg_quality: jpeg_quality.clamp(1, 100),
            warned: AtomicBool::new(false),
        }
    }

    /// Returns `true` if samples can be decoded.
    #[must_use]
    pub fn has_decoder(&self) -> bool {
        self.decoder.lock().is_some()
    }

    /// Returns `true` once a picture is available.
    #[must_use]
    pub fn has_picture(&self) -> bool {
        self.picture.lock().is_some()
    }
}

impl VideoSurface for DecodingSurface {
    fn present(&self, sample: &MediaSample) {
        let mut decoder = self.decoder.lock();
        let Some(decoder) = decoder.as_mut() else {
            if !self.warned.swap(true, Ordering::Relaxed) {
                warn!("No video decoder compiled in; WebRTC stills are unavailable");
            }
            return;
        };

        match decoder.decode(&sample.data) {
            Ok(Some(picture)) => *self.picture.lock() = Some(picture),
            Ok(None) => {}
            Err(e) => debug!(error = %e, "Dropping undecodable sample"),
        }
    }

    fn capture_still(&self) -> Option<EncodedFrame> {
        let picture = self.picture.lock();
        let picture = picture.as_ref()?;

        let mut jpeg = Vec::new();
        match JpegEncoder::new_with_quality(&mut jpeg, self.jpeg_quality).encode_image(picture) {
            Ok(()) => Some(EncodedFrame::jpeg(jpeg)),
            Err(e) => {
                warn!(error = %e, "Failed to encode still");
                None
            }
        }
    }

    fn clear(&self) {
        *self.picture.lock() = None;
    }
}

impl fmt::Debug for DecodingSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodingSurface")
            .field("has_decoder", &self.has_decoder())
            .field("has_picture", &self.has_picture())
            .field("jpeg_quality", &self.jpeg_quality)
            .finish()
    }
}

#[cfg(feature = "h264")]
fn default_decoder() -> Option<Box<dyn FrameDecoder>> {
    match super::decoder::H264Decoder::new() {
        Ok(decoder) => Some(Box::new(decoder)),
        Err(e) => {
            warn!(error = %e, "H.264 decoder unavailable");
            None
        }
    }
}

#[cfg(not(feature = "h264"))]
fn default_decoder() -> Option<Box<dyn FrameDecoder>> {
    None
}

// ============================================================================
// Tests
// ============================================================================
