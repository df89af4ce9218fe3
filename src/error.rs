//! Error types for live capture and analysis.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use imagoiq_capture::{AnalysisSource, Result};
//!
//! async fn example(coordinator: &AnalysisRequestCoordinator) -> Result<()> {
//!     let outcome = coordinator.analyze(AnalysisSource::LiveFrame).await?;
//!     println!("{}", outcome.description);
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::Url`] |
//! | Session | [`Error::InvalidTransition`] |
//! | Transport | [`Error::TransportOpenFailure`], [`Error::Timeout`] |
//! | Stream | [`Error::MalformedFrame`], [`Error::ServerReported`] |
//! | Signaling | [`Error::SignalingProtocolViolation`], [`Error::Peer`] |
//! | Analysis | [`Error::NoImageAvailable`], [`Error::UploadRejected`], [`Error::AnalysisInProgress`], [`Error::Network`] |
//! | Protocol | [`Error::Protocol`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Http`], [`Error::Image`], [`Error::Base64`], [`Error::WebRtc`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::session::{ConnectionState, TransportMethod};

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for the activity log.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when capture configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// URL parse error.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// Operation not permitted in the current connection state.
    ///
    /// Returned by `start` while a capture is already connecting or active.
    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        /// Operation that was attempted.
        action: &'static str,
        /// State the session was in.
        state: ConnectionState,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Socket or peer connection failed to establish.
    #[error("{transport} connection failed: {message}")]
    TransportOpenFailure {
        /// Transport that failed.
        transport: TransportMethod,
        /// Description of the failure.
        message: String,
    },

    /// Operation timeout.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Stream Errors
    // ========================================================================
    /// Push-stream payload that is not a JPEG data URI.
    ///
    /// Non-fatal: the last good frame stays in the buffer.
    #[error("Malformed frame: {reason}")]
    MalformedFrame {
        /// Why the payload was rejected.
        reason: String,
    },

    /// Error reported by the frame server (`{ "error": ... }`).
    ///
    /// Fatal for the session.
    #[error("{message}")]
    ServerReported {
        /// Message sent by the server.
        message: String,
    },

    // ========================================================================
    // Signaling Errors
    // ========================================================================
    /// Out-of-order or duplicate signaling message, or unusable SDP.
    #[error("Signaling protocol violation: {message}")]
    SignalingProtocolViolation {
        /// Description of the violation.
        message: String,
    },

    /// Peer connection operation failed.
    #[error("Peer connection error: {message}")]
    Peer {
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // Analysis Errors
    // ========================================================================
    /// Neither a selected file nor a buffered live frame exists.
    #[error("No image available")]
    NoImageAvailable,

    /// Upload endpoint answered with a `message` instead of a filename.
    #[error("Upload rejected: {message}")]
    UploadRejected {
        /// Message returned by the upload endpoint.
        message: String,
    },

    /// Another analysis request is still in flight.
    #[error("Analysis already in progress")]
    AnalysisInProgress,

    /// Request to the analysis service failed.
    #[error("Network failure: {message}")]
    Network {
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Unexpected response or message shape.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Image decoding or encoding error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Base64 decoding error.
    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// WebRTC stack error.
    #[error("WebRTC error: {0}")]
    WebRtc(#[from] webrtc::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid transition error.
    #[inline]
    pub fn invalid_transition(action: &'static str, state: ConnectionState) -> Self {
        Self::InvalidTransition { action, state }
    }

    /// Creates a transport open failure.
    #[inline]
    pub fn transport_open_failure(transport: TransportMethod, message: impl Into<String>) -> Self {
        Self::TransportOpenFailure {
            transport,
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Creates a malformed frame error.
    #[inline]
    pub fn malformed_frame(reason: impl Into<String>) -> Self {
        Self::MalformedFrame {
            reason: reason.into(),
        }
    }

    /// Creates a server-reported error.
    #[inline]
    pub fn server_reported(message: impl Into<String>) -> Self {
        Self::ServerReported {
            message: message.into(),
        }
    }

    /// Creates a signaling protocol violation.
    #[inline]
    pub fn signaling(message: impl Into<String>) -> Self {
        Self::SignalingProtocolViolation {
            message: message.into(),
        }
    }

    /// Creates a peer connection error.
    #[inline]
    pub fn peer(message: impl Into<String>) -> Self {
        Self::Peer {
            message: message.into(),
        }
    }

    /// Creates an upload rejected error.
    #[inline]
    pub fn upload_rejected(message: impl Into<String>) -> Self {
        Self::UploadRejected {
            message: message.into(),
        }
    }

    /// Creates a network failure.
    #[inline]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::TransportOpenFailure { .. }
                | Self::Timeout { .. }
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error ends the capture session.
    ///
    /// Malformed frames and signaling violations are logged and survived;
    /// everything a transport reports through its error signal is fatal.
    #[inline]
    #[must_use]
    pub fn is_session_fatal(&self) -> bool {
        !matches!(
            self,
            Self::MalformedFrame { .. } | Self::SignalingProtocolViolation { .. }
        )
    }

    /// Returns `true` if this error came out of the analysis sequence.
    #[inline]
    #[must_use]
    pub fn is_analysis_error(&self) -> bool {
        matches!(
            self,
            Self::NoImageAvailable
                | Self::UploadRejected { .. }
                | Self::AnalysisInProgress
                | Self::Network { .. }
                | Self::Http(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
