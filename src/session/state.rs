//! Connection states and transport selection.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identifiers::AttemptId;

// ============================================================================
// TransportMethod
// ============================================================================

/// How live video is delivered to the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TransportMethod {
    /// Server pushes base64 JPEG frames over a WebSocket.
    #[default]
    #[serde(rename = "WebSocket", alias = "websocket")]
    WebSocketStream,
    /// Browser-style WebRTC peer connection negotiated over a signaling socket.
    #[serde(rename = "WebRTC", alias = "webrtc")]
    WebRtcStream,
}

impl TransportMethod {
    /// Display name used in log lines.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::WebSocketStream => "WebSocket",
            Self::WebRtcStream => "WebRTC",
        }
    }
}

impl fmt::Display for TransportMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle of one capture attempt.
///
/// ```text
/// Idle ──start──► Connecting ──opened──► Active ──closed/stop──► Closed
///                      │                    │
///                      └──────error─────────┴──────────────────► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No capture has been started.
    #[default]
    Idle,
    /// Strategy created, transport not yet open.
    Connecting,
    /// Frames are flowing.
    Active,
    /// Stopped by the user or closed by the remote end.
    Closed,
    /// Unrecoverable transport error.
    Failed,
}

impl ConnectionState {
    /// Returns `true` if `start` is permitted from this state.
    #[inline]
    #[must_use]
    pub const fn can_start(&self) -> bool {
        matches!(self, Self::Idle | Self::Closed | Self::Failed)
    }

    /// Returns `true` while a strategy instance is alive.
    #[inline]
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Connecting | Self::Active)
    }

    /// Returns `true` for Closed and Failed.
    #[inline]
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::Connecting => "Connecting",
            Self::Active => "Active",
            Self::Closed => "Closed",
            Self::Failed => "Failed",
        };
        f.write_str(name)
    }
}

// ============================================================================
// LiveStatus
// ============================================================================

/// Snapshot published by the session for background tasks.
///
/// The WebRTC frame sampler re-reads this every tick and stops as soon as
/// it no longer describes its own attempt in the Active state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveStatus {
    /// Attempt the state belongs to.
    pub attempt: AttemptId,
    /// Current state of that attempt.
    pub state: ConnectionState,
}

impl LiveStatus {
    /// Status before any attempt.
    pub const IDLE: Self = Self {
        attempt: AttemptId::NONE,
        state: ConnectionState::Idle,
    };

    /// Returns `true` if `attempt` is the current attempt and Active.
    #[inline]
    #[must_use]
    pub fn is_active_for(&self, attempt: AttemptId) -> bool {
        self.attempt == attempt && self.state == ConnectionState::Active
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_start() {
        assert!(ConnectionState::Idle.can_start());
        assert!(ConnectionState::Closed.can_start());
        assert!(ConnectionState::Failed.can_start());
        assert!(!ConnectionState::Connecting.can_start());
        assert!(!ConnectionState::Active.can_start());
    }

    #[test]
    fn test_transport_method_serde_names() {
        let json = serde_json::to_string(&TransportMethod::WebRtcStream).unwrap();
        assert_eq!(json, "\"WebRTC\"");

        let parsed: TransportMethod = serde_json::from_str("\"websocket\"").unwrap();
        assert_eq!(parsed, TransportMethod::WebSocketStream);
    }

    #[test]
    fn test_live_status_matches_attempt() {
        let attempt = AttemptId::next();
        let status = LiveStatus {
            attempt,
            state: ConnectionState::Active,
        };

        assert!(status.is_active_for(attempt));
        assert!(!status.is_active_for(AttemptId::next()));
        assert!(!LiveStatus::IDLE.is_active_for(attempt));
    }
}
