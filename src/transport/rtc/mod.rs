//! WebRTC peer stream.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `peer` | Peer connection, track and factory traits |
//! | `engine` | Production peer built on the `webrtc` crate |
//! | `signaling` | Offer/answer/candidate exchange and the driver task |
//! | `surface` | Video surface and decoder seam |
//! | `sampler` | Periodic JPEG stills from the surface |
//! | `decoder` | OpenH264 decoder (`h264` feature) |

// ============================================================================
// Submodules
// ============================================================================

#[cfg(feature = "h264")]
pub mod decoder;
pub mod engine;
pub mod peer;
pub mod sampler;
pub mod signaling;
pub mod surface;

// ============================================================================
// Re-exports
// ============================================================================

#[cfg(feature = "h264")]
pub use decoder::H264Decoder;
pub use engine::RtcPeerFactory;
pub use peer::{MediaSample, PeerConnection, PeerEvent, PeerEventSender, PeerFactory, PeerState, RemoteTrack};
pub use signaling::{WebRtcContext, WebRtcSignalingClient};
pub use surface::{DecodingSurface, FrameDecoder, VideoSurface};
