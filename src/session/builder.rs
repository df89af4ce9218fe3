//! Builder for [`CaptureSession`].
//!
//! # Example
//!
//! ```no_run
//! use imagoiq_capture::{ActivityLog, CaptureConfig, CaptureSession};
//!
//! # fn example() -> imagoiq_capture::Result<()> {
//! let log = ActivityLog::new();
//! let session = CaptureSession::builder()
//!     .config(CaptureConfig::new().with_server("http://camera.local:8000"))
//!     .log(log.shared())
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use crate::activity::{ActivityLog, SharedLog};
use crate::config::CaptureConfig;
use crate::error::Result;
use crate::frame::FrameCaptureBuffer;
use crate::transport::rtc::{DecodingSurface, PeerFactory, RtcPeerFactory, VideoSurface};

use super::core::CaptureSession;

// ============================================================================
// CaptureSessionBuilder
// ============================================================================

/// Builder for a [`CaptureSession`].
///
/// Use [`CaptureSession::builder()`] to create one. Every collaborator has
/// a default: the default configuration, a fresh [`ActivityLog`], a fresh
/// buffer, the `webrtc` crate peer factory and a [`DecodingSurface`].
#[derive(Default)]
pub struct CaptureSessionBuilder {
    config: Option<CaptureConfig>,
    log: Option<SharedLog>,
    buffer: Option<FrameCaptureBuffer>,
    peer_factory: Option<Arc<dyn PeerFactory>>,
    surface: Option<Arc<dyn VideoSurface>>,
}

impl CaptureSessionBuilder {
    /// Creates a builder with all defaults.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration.
    #[inline]
    #[must_use]
    pub fn config(mut self, config: CaptureConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the activity log sink.
    #[inline]
    #[must_use]
    pub fn log(mut self, log: SharedLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Shares a frame buffer, typically with an analysis coordinator.
    #[inline]
    #[must_use]
    pub fn buffer(mut self, buffer: FrameCaptureBuffer) -> Self {
        self.buffer = Some(buffer);
        self
    }

    /// Replaces the peer connection factory.
    #[inline]
    #[must_use]
    pub fn peer_factory(mut self, factory: Arc<dyn PeerFactory>) -> Self {
        self.peer_factory = Some(factory);
        self
    }

    /// Replaces the WebRTC video surface.
    #[inline]
    #[must_use]
    pub fn surface(mut self, surface: Arc<dyn VideoSurface>) -> Self {
        self.surface = Some(surface);
        self
    }

    /// Builds the session in the Idle state.
    ///
    /// # Errors
    ///
    /// [`Error::Config`](crate::Error::Config) if the configuration is invalid.
    pub fn build(self) -> Result<CaptureSession> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let surface = self
            .surface
            .unwrap_or_else(|| Arc::new(DecodingSurface::new(config.jpeg_quality)));

        Ok(CaptureSession::new(
            config,
            self.log.unwrap_or_else(|| ActivityLog::new().shared()),
            self.buffer.unwrap_or_default(),
            self.peer_factory.unwrap_or_else(|| Arc::new(RtcPeerFactory::new())),
            surface,
        ))
    }
}
