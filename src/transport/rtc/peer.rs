//! Peer connection seam.
//!
//! The signaling client drives any [`PeerConnection`]; the production
//! implementation lives in [`engine`](super::engine).

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::protocol::IceCandidate;

// ============================================================================
// Types
// ============================================================================

/// Aggregate connection state of a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    /// Created, nothing negotiated.
    New,
    /// ICE/DTLS in progress.
    Connecting,
    /// Media may flow.
    Connected,
    /// Connectivity lost, may recover.
    Disconnected,
    /// Connectivity lost for good.
    Failed,
    /// Closed locally or remotely.
    Closed,
}

impl fmt::Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::New => "new",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Failed => "failed",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// One depacketized media sample.
#[derive(Debug, Clone)]
pub struct MediaSample {
    /// Encoded access unit.
    pub data: Bytes,
}

/// Remote media track.
#[async_trait]
pub trait RemoteTrack: Send {
    /// Waits for the next sample. `None` once the track has ended.
    async fn next_sample(&mut self) -> Option<MediaSample>;
}

/// Asynchronous notifications from a peer.
pub enum PeerEvent {
    /// A local ICE candidate to trickle to the server.
    LocalCandidate(IceCandidate),
    /// A remote video track arrived.
    Track(Box<dyn RemoteTrack>),
    /// Connection state changed.
    StateChanged(PeerState),
}

impl fmt::Debug for PeerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalCandidate(c) => f.debug_tuple("LocalCandidate").field(c).finish(),
            Self::Track(_) => f.write_str("Track(..)"),
            Self::StateChanged(s) => f.debug_tuple("StateChanged").field(s).finish(),
        }
    }
}

/// Channel a peer reports its [`PeerEvent`]s on.
pub type PeerEventSender = mpsc::UnboundedSender<PeerEvent>;

// ============================================================================
// Traits
// ============================================================================

/// Receive-only video peer connection.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// Creates an offer, applies it as the local description and returns
    /// its SDP.
    async fn create_offer(&self) -> Result<String>;

    /// Applies the server's answer as the remote description.
    async fn apply_answer(&self, sdp: &str) -> Result<()>;

    /// Adds a trickled remote ICE candidate.
    async fn add_remote_candidate(&self, candidate: IceCandidate) -> Result<()>;

    /// Closes the connection and stops all tracks.
    async fn close(&self) -> Result<()>;
}

/// Creates peer connections.
#[async_trait]
pub trait PeerFactory: Send + Sync {
    /// Creates a peer that reports to `events`.
    async fn create(&self, ice_servers: &[String], events: PeerEventSender) -> Result<Arc<dyn PeerConnection>>;
}
