//! WebRTC signaling messages.
//!
//! Carried as JSON text over the signaling WebSocket:
//!
//! | `type` | Direction | Payload |
//! |--------|-----------|---------|
//! | `offer` | Client → Server | `sdp` |
//! | `answer` | Server → Client | `sdp` |
//! | `candidate` | Both | `candidate` (browser `RTCIceCandidateInit` shape) |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

// ============================================================================
// SignalingMessage
// ============================================================================

/// One signaling message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SignalingMessage {
    /// Session description offered by the client.
    Offer {
        /// SDP text.
        sdp: String,
    },
    /// Session description answered by the server.
    Answer {
        /// SDP text.
        sdp: String,
    },
    /// Trickled ICE candidate. `None` marks end of candidates.
    Candidate {
        /// Candidate, or `null`.
        candidate: Option<IceCandidate>,
    },
}

impl SignalingMessage {
    /// Short name for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::Candidate { .. } => "candidate",
        }
    }

    /// Builds a candidate message.
    #[inline]
    #[must_use]
    pub fn candidate(candidate: IceCandidate) -> Self {
        Self::Candidate {
            candidate: Some(candidate),
        }
    }
}

// ============================================================================
// IceCandidate
// ============================================================================

/// ICE candidate in the JSON shape browsers produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    /// `candidate:...` attribute line.
    pub candidate: String,

    /// Media stream identification tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,

    /// Index of the media description.
    #[serde(default, rename = "sdpMLineIndex", skip_serializing_if = "Option::is_none")]
    pub sdp_mline_index: Option<u16>,

    /// ICE username fragment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    /// Returns `true` for the empty end-of-candidates marker.
    #[inline]
    #[must_use]
    pub fn is_end_of_candidates(&self) -> bool {
        self.candidate.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
