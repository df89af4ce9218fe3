//! Capture and analysis configuration.
//!
//! Provides endpoint locations, ICE servers, timing and the operator's
//! preferences (transport method, language).
//!
//! # Example
//!
//! ```ignore
//! use imagoiq_capture::{CaptureConfig, Language, TransportMethod};
//!
//! let config = CaptureConfig::new()
//!     .with_server("http://camera-box.local:8000")
//!     .with_transport(TransportMethod::WebRtcStream)
//!     .with_language(Language::English);
//!
//! config.validate()?;
//! let ws = config.stream_url()?;
//! // ws://camera-box.local:8000/ws/webcam
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::UploadId;
use crate::session::TransportMethod;

// ============================================================================
// Constants
// ============================================================================

/// Default analysis server.
pub const DEFAULT_SERVER: &str = "http://localhost:8000";

/// Default public STUN server.
pub const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";

// ============================================================================
// Language
// ============================================================================

/// Preferred language for scene descriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// French.
    #[default]
    French,
    /// English.
    English,
}

impl Language {
    /// ISO 639-1 code sent to the analyze endpoint.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::French => "fr",
            Self::English => "en",
        }
    }
}

// ============================================================================
// CaptureConfig
// ============================================================================

/// Configuration shared by the capture session and the analysis coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// HTTP base URL of the capture/analysis server.
    pub server: String,

    /// Path of the JPEG push-stream WebSocket.
    pub stream_path: String,

    /// Path of the WebRTC signaling WebSocket.
    pub signaling_path: String,

    /// Path of the multipart upload endpoint.
    pub upload_path: String,

    /// Path prefix of the analyze endpoint; the filename is appended.
    pub analyze_path: String,

    /// ICE server URLs for the peer connection.
    pub ice_servers: Vec<String>,

    /// Selected transport method.
    pub transport: TransportMethod,

    /// Preferred description language.
    pub language: Language,

    /// WebRTC frame sampler cadence in milliseconds.
    pub sample_interval_ms: u64,

    /// JPEG quality for stills sampled from the WebRTC surface (1-100).
    pub jpeg_quality: u8,

    /// Timeout for each analysis request, in milliseconds.
    pub request_timeout_ms: u64,

    /// Upper bound for transport teardown, in milliseconds.
    pub shutdown_timeout_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            stream_path: "/ws/webcam".to_string(),
            signaling_path: "/webrtc".to_string(),
            upload_path: "/upload-image/".to_string(),
            analyze_path: "/analyze/".to_string(),
            ice_servers: vec![DEFAULT_STUN_SERVER.to_string()],
            transport: TransportMethod::default(),
            language: Language::default(),
            sample_interval_ms: 16,
            jpeg_quality: 85,
            request_timeout_ms: 30_000,
            shutdown_timeout_ms: 5_000,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl CaptureConfig {
    /// Creates a configuration with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server base URL.
    #[inline]
    #[must_use]
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = server.into();
        self
    }

    /// Sets the transport method.
    #[inline]
    #[must_use]
    pub fn with_transport(mut self, transport: TransportMethod) -> Self {
        self.transport = transport;
        self
    }

    /// Sets the description language.
    #[inline]
    #[must_use]
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    /// Replaces the ICE server list.
    #[inline]
    #[must_use]
    pub fn with_ice_servers(mut self, servers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.ice_servers = servers.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the WebRTC sampler cadence.
    #[inline]
    #[must_use]
    pub fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval_ms = millis(interval);
        self
    }

    /// Sets the JPEG quality for sampled stills (clamped to 1-100).
    #[inline]
    #[must_use]
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Sets the per-request timeout for the analysis service.
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = millis(timeout);
        self
    }

    /// Sets the teardown timeout.
    #[inline]
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_ms = millis(timeout);
        self
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl CaptureConfig {
    /// Sampler cadence.
    #[inline]
    #[must_use]
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    /// Per-request timeout.
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Teardown timeout.
    #[inline]
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Parsed HTTP base URL.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the URL is not `http` or `https`.
    pub fn base_url(&self) -> Result<Url> {
        let url = Url::parse(&self.server)?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(Error::config(format!(
                "Server URL must be http or https, got {other}"
            ))),
        }
    }

    /// WebSocket URL of the push stream.
    pub fn stream_url(&self) -> Result<Url> {
        self.ws_url(&self.stream_path)
    }

    /// WebSocket URL of the signaling channel.
    pub fn signaling_url(&self) -> Result<Url> {
        self.ws_url(&self.signaling_path)
    }

    /// WebSocket URL for the given transport method.
    pub fn transport_url(&self, method: TransportMethod) -> Result<Url> {
        match method {
            TransportMethod::WebSocketStream => self.stream_url(),
            TransportMethod::WebRtcStream => self.signaling_url(),
        }
    }

    /// Upload endpoint.
    pub fn upload_url(&self) -> Result<Url> {
        Ok(self.base_url()?.join(&self.upload_path)?)
    }

    /// Analyze endpoint for an uploaded file, with the language hint.
    pub fn analyze_url(&self, upload: &UploadId) -> Result<Url> {
        let path = format!(
            "{}{}",
            self.analyze_path,
            urlencoding::encode(upload.as_str())
        );
        let mut url = self.base_url()?.join(&path)?;
        url.query_pairs_mut()
            .append_pair("language", self.language.code());
        Ok(url)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] on an unusable server URL, an empty ICE server
    /// list, or zero intervals.
    pub fn validate(&self) -> Result<()> {
        self.base_url()?;

        if self.ice_servers.is_empty() {
            return Err(Error::config("At least one ICE server is required"));
        }
        if self.sample_interval_ms == 0 {
            return Err(Error::config("Sample interval must be non-zero"));
        }
        if self.request_timeout_ms == 0 || self.shutdown_timeout_ms == 0 {
            return Err(Error::config("Timeouts must be non-zero"));
        }

        Ok(())
    }

    fn ws_url(&self, path: &str) -> Result<Url> {
        let mut url = self.base_url()?.join(path)?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| Error::config(format!("Cannot derive WebSocket URL from {url}")))?;
        Ok(url)
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Tests
// ============================================================================
