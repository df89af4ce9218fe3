//! Wire message types.
//!
//! # Protocol Overview
//!
//! | Message Type | Channel | Direction | Purpose |
//! |--------------|---------|-----------|---------|
//! | `StreamMessage` | `/ws/webcam` | Server → Client | JPEG frame or error |
//! | `SignalingMessage` | `/webrtc` | Both | SDP offer/answer, ICE candidates |
//! | `UploadResponse` | `POST /upload-image/` | Server → Client | Stored filename or rejection |
//! | `AnalyzeResponse` | `GET /analyze/{filename}` | Server → Client | Scene description |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `analysis` | Upload and analyze response bodies |
//! | `signaling` | WebRTC signaling messages |
//! | `stream` | Push-stream messages |

// ============================================================================
// Submodules
// ============================================================================

/// Upload and analyze response bodies.
pub mod analysis;

/// WebRTC signaling messages.
pub mod signaling;

/// Push-stream messages.
pub mod stream;

// ============================================================================
// Re-exports
// ============================================================================

pub use analysis::{AnalyzeResponse, UploadResponse};
pub use signaling::{IceCandidate, SignalingMessage};
pub use stream::{StreamMessage, StreamPayload};
