//! ImagoIQ capture - live camera capture and scene analysis client.
//!
//! This library receives a live camera feed from a capture server, keeps the
//! most recent still, and submits stills to a remote analysis service for a
//! textual scene description.
//!
//! # Architecture
//!
//! Two interchangeable transports deliver the feed:
//!
//! - **WebSocket stream**: the server pushes base64 JPEG frames as JSON
//! - **WebRTC stream**: a peer connection negotiated over a signaling
//!   socket; stills are sampled from the decoded video at a fixed cadence
//!
//! Key design principles:
//!
//! - Each transport runs one driver task and reports four canonical events
//!   (opened, frame, error, closed) tagged with its attempt id
//! - [`CaptureSession`] is a single-owner state machine; a transport is
//!   fully released before the next one starts
//! - Analysis is upload-then-analyze, one request at a time
//! - Everything the operator should see goes to an append-only
//!   [`ActivityLog`]
//!
//! # Quick Start
//!
//! ```no_run
//! use imagoiq_capture::{
//!     ActivityLog, AnalysisRequestCoordinator, AnalysisSource, CaptureConfig, CaptureSession,
//!     FrameCaptureBuffer, HttpAnalysisService, Result, TransportMethod,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = CaptureConfig::default();
//!     let log = ActivityLog::new();
//!     let buffer = FrameCaptureBuffer::new();
//!
//!     let mut session = CaptureSession::builder()
//!         .config(config.clone())
//!         .log(log.shared())
//!         .buffer(buffer.clone())
//!         .build()?;
//!     session.start(TransportMethod::WebSocketStream)?;
//!
//!     while buffer.is_empty() && session.state().is_live() {
//!         session.process_next().await;
//!     }
//!
//!     let service = Arc::new(HttpAnalysisService::new(config)?);
//!     let coordinator = AnalysisRequestCoordinator::new(service, buffer, log.shared());
//!     let outcome = coordinator.analyze(AnalysisSource::LiveFrame).await?;
//!     println!("{}", outcome.description);
//!
//!     session.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`activity`] | Operator-facing activity log |
//! | [`analysis`] | Image upload and analysis |
//! | [`config`] | [`CaptureConfig`] and endpoint URLs |
//! | [`console`] | Operator facade |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`frame`] | Encoded frames, latest-frame buffer, FPS |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire message types |
//! | [`session`] | Capture session state machine |
//! | [`transport`] | WebSocket and WebRTC transports |
//!
//! # Features
//!
//! - `h264` (default): decode WebRTC video with OpenH264 so stills can be
//!   sampled. Without it the WebRTC method connects but yields no frames.

// ============================================================================
// Modules
// ============================================================================

/// Operator-facing activity log.
pub mod activity;

/// Image upload and analysis.
pub mod analysis;

/// Configuration and endpoint URLs.
pub mod config;

/// Operator facade over capture and analysis.
pub mod console;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Frame types shared by both transports.
pub mod frame;

/// Type-safe identifiers.
pub mod identifiers;

/// Wire message types.
pub mod protocol;

/// Capture session lifecycle.
///
/// Use [`CaptureSession::builder()`] to create a session.
pub mod session;

/// Live video transports.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Activity log
pub use activity::{ActivityLog, LogEntry, LogLevel, LogSink, LogSinkExt, SharedLog};

// Analysis
pub use analysis::{
    AnalysisOutcome, AnalysisRequestCoordinator, AnalysisService, AnalysisSource, HttpAnalysisService,
    ImageFile,
};

// Configuration
pub use config::{CaptureConfig, Language};

// Console
pub use console::Console;

// Error types
pub use error::{Error, Result};

// Frames
pub use frame::{EncodedFrame, FpsSample, FrameCaptureBuffer, FramePayload, FrameRateMonitor};

// Identifier types
pub use identifiers::{AttemptId, UploadId};

// Session types
pub use session::{CaptureSession, CaptureSessionBuilder, ConnectionState, LiveStatus, TransportMethod};

// Transport types
pub use transport::rtc::{DecodingSurface, PeerFactory, RtcPeerFactory, VideoSurface};
pub use transport::{CaptureStrategy, TransportEvent};
