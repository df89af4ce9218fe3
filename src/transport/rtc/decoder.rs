//! H.264 decoding via OpenH264.

use image::RgbImage;
use openh264::decoder::Decoder;
use openh264::formats::YUVSource;

use crate::error::{Error, Result};

use super::surface::FrameDecoder;

/// OpenH264-backed [`FrameDecoder`].
pub struct H264Decoder {
    inner: Decoder,
}

impl H264Decoder {
    /// Creates a decoder.
    ///
    /// # Errors
    ///
    /// [`Error::Peer`] if OpenH264 cannot be initialized.
    pub fn new() -> Result<Self> {
        let inner = Decoder::new().map_err(|e| Error::peer(format!("H.264 decoder init failed: {e}")))?;
        Ok(Self { inner })
    }
}

impl FrameDecoder for H264Decoder {
    fn decode(&mut self, data: &[u8]) -> Result<Option<RgbImage>> {
        let Some(yuv) = self
            .inner
            .decode(data)
            .map_err(|e| Error::peer(format!("H.264 decode failed: {e}")))?
        else {
            return Ok(None);
        };

        let (width, height) = yuv.dimensions();
        let mut rgb = vec![0u8; width * height * 3];
        yuv.write_rgb8(&mut rgb);

        Ok(RgbImage::from_raw(width as u32, height as u32, rgb))
    }
}
