//! Live video transports.
//!
//! Two interchangeable strategies deliver video to the viewer. Each one
//! adapts its native callbacks into four canonical [`TransportEvent`]s that
//! the capture session understands.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  (AttemptId, TransportEvent)  ┌──────────────────┐
//! │ Strategy driver  │ ─────────────────────────────►│  CaptureSession  │
//! │ (tokio task)     │                               │  (state machine) │
//! │                  │◄───────── Shutdown ───────────│                  │
//! └──────────────────┘                               └──────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `driver` | Shutdown handle and liveness gauge for driver tasks |
//! | `stream` | JPEG push stream over WebSocket |
//! | `rtc` | WebRTC peer stream negotiated over a signaling socket |

// ============================================================================
// Submodules
// ============================================================================

/// Driver task plumbing.
pub mod driver;

/// JPEG push stream.
pub mod stream;

/// WebRTC peer stream and signaling.
pub mod rtc;

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::activity::SharedLog;
use crate::error::Error;
use crate::frame::EncodedFrame;
use crate::identifiers::AttemptId;
use crate::session::TransportMethod;

// ============================================================================
// Re-exports
// ============================================================================

pub use driver::{DriverHandle, TransportGauge, TransportGuard};
pub use stream::WebSocketFrameStream;
pub use rtc::{WebRtcContext, WebRtcSignalingClient};

// ============================================================================
// TransportEvent
// ============================================================================

/// Canonical signal emitted by a transport strategy.
#[derive(Debug)]
pub enum TransportEvent {
    /// The transport is ready and frames may follow.
    Opened,
    /// A new still is available.
    Frame(EncodedFrame),
    /// Unrecoverable failure.
    Error(Error),
    /// The remote end closed the transport.
    Closed,
}

impl TransportEvent {
    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Opened => "opened",
            Self::Frame(_) => "frame",
            Self::Error(_) => "error",
            Self::Closed => "closed",
        }
    }
}

// ============================================================================
// EventSender
// ============================================================================

/// Receiving half of the session's event channel.
pub type EventReceiver = mpsc::UnboundedReceiver<(AttemptId, TransportEvent)>;

/// Sends [`TransportEvent`]s tagged with the attempt that produced them.
#[derive(Debug, Clone)]
pub struct EventSender {
    attempt: AttemptId,
    tx: mpsc::UnboundedSender<(AttemptId, TransportEvent)>,
}

impl EventSender {
    /// Creates a sender for `attempt`.
    #[must_use]
    pub fn new(attempt: AttemptId, tx: mpsc::UnboundedSender<(AttemptId, TransportEvent)>) -> Self {
        Self { attempt, tx }
    }

    /// Attempt this sender belongs to.
    #[inline]
    #[must_use]
    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    /// Emits an event. Returns `false` once the session is gone.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx.send((self.attempt, event)).is_ok()
    }

    /// Emits [`TransportEvent::Opened`].
    pub fn opened(&self) -> bool {
        self.emit(TransportEvent::Opened)
    }

    /// Emits [`TransportEvent::Frame`].
    pub fn frame(&self, frame: EncodedFrame) -> bool {
        self.emit(TransportEvent::Frame(frame))
    }

    /// Emits [`TransportEvent::Error`].
    pub fn error(&self, error: Error) -> bool {
        self.emit(TransportEvent::Error(error))
    }

    /// Emits [`TransportEvent::Closed`].
    pub fn closed(&self) -> bool {
        self.emit(TransportEvent::Closed)
    }
}

// ============================================================================
// StrategyContext
// ============================================================================

/// Everything a strategy needs from the session.
#[derive(Clone)]
pub struct StrategyContext {
    /// Event channel for this attempt.
    pub events: EventSender,
    /// Activity log.
    pub log: SharedLog,
    /// Liveness gauge shared by all strategies of the session.
    pub gauge: TransportGauge,
}

// ============================================================================
// CaptureStrategy
// ============================================================================

/// A running transport strategy.
///
/// The session owns exactly one boxed strategy while Connecting or Active
/// and calls [`shutdown`](CaptureStrategy::shutdown) before creating the
/// next one.
#[async_trait]
pub trait CaptureStrategy: Send {
    /// Transport method implemented by this strategy.
    fn method(&self) -> TransportMethod;

    /// Closes every connection object and waits for the driver to finish.
    ///
    /// The driver is aborted if it has not finished within `timeout`.
    async fn shutdown(self: Box<Self>, timeout: Duration);

    /// Aborts the driver without waiting. Used when the session is dropped.
    fn abort(&self);
}
